use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeMap;

use crate::models::{CategoryId, FieldName, Provenance, RawRecord, SourceId};

/// Last-resort record source used when a marketplace yields nothing.
pub trait SampleGenerator: Send + Sync {
    fn generate(&self, source: SourceId, category: CategoryId, count: usize) -> Vec<RawRecord>;
}

const VARIATIONS: &[&str] = &[
    "",
    "Heavy Duty",
    "Industrial Grade",
    "Premium Quality",
    "High Speed",
    "Automatic",
    "Semi-Automatic",
    "Digital",
];

const COMPANY_PREFIXES: &[&str] = &[
    "Shree", "Sri", "Om", "Jai", "Sai", "Perfect", "Prime", "Royal", "Supreme", "Global",
    "Universal", "National", "International", "Elite", "Diamond", "Golden", "Silver", "Modern",
    "Advanced", "Precision",
];

const COMPANY_SUFFIXES: &[&str] = &[
    "Industries",
    "Enterprises",
    "Traders",
    "Suppliers",
    "Manufacturing",
    "Engineers",
    "Solutions",
    "Systems",
    "Technologies",
];

const LOCATIONS: &[&str] = &[
    "Mumbai, Maharashtra",
    "Delhi, Delhi",
    "Bangalore, Karnataka",
    "Ahmedabad, Gujarat",
    "Chennai, Tamil Nadu",
    "Kolkata, West Bengal",
    "Pune, Maharashtra",
    "Hyderabad, Telangana",
    "Jaipur, Rajasthan",
    "Surat, Gujarat",
    "Lucknow, Uttar Pradesh",
    "Indore, Madhya Pradesh",
    "Coimbatore, Tamil Nadu",
    "Ludhiana, Punjab",
    "Visakhapatnam, Andhra Pradesh",
];

fn products(category: CategoryId) -> &'static [&'static str] {
    match category {
        CategoryId::IndustrialMachinery => &[
            "CNC Milling Machine",
            "Lathe Machine",
            "Drilling Machine",
            "Grinding Machine",
            "Industrial Mixer",
            "Conveyor Belt System",
            "Hydraulic Press Machine",
            "Power Press",
            "Injection Molding Machine",
            "Packaging Machine",
        ],
        CategoryId::ElectronicComponents => &[
            "LED Display Panel",
            "Circuit Breaker",
            "Control Transformer",
            "Electrolytic Capacitor",
            "Resistor Set",
            "Microcontroller Board",
            "Power Supply Unit",
            "Relay Switch",
            "Sensor Module",
            "PCB Board",
        ],
        CategoryId::TextileFabrics => &[
            "Cotton Fabric",
            "Polyester Fabric",
            "Silk Fabric",
            "Denim Fabric",
            "Linen Fabric",
            "Wool Fabric",
            "Rayon Fabric",
            "Georgette Fabric",
            "Canvas Fabric",
            "Velvet Fabric",
        ],
        CategoryId::PlasticRawMaterials => &[
            "PVC Granules",
            "HDPE Pellets",
            "PP Raw Material",
            "PET Resin",
            "LDPE Granules",
            "ABS Plastic Granules",
            "Polycarbonate Sheets",
            "Acrylic Sheets",
            "Nylon Granules",
            "Polystyrene Beads",
        ],
        CategoryId::SafetyEquipment => &[
            "Safety Helmet",
            "Safety Goggles",
            "Hand Gloves",
            "Safety Shoes",
            "Fire Extinguisher",
            "Safety Harness",
            "Reflective Jacket",
            "Ear Plugs",
            "Face Shield",
            "First Aid Kit",
        ],
    }
}

/// Seeded template generator. The same (seed, source, category, count)
/// always yields the same records apart from `fetched_at`.
#[derive(Debug, Clone)]
pub struct TemplateSampleGenerator {
    seed: u64,
}

impl TemplateSampleGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn rng_for(&self, source: SourceId, category: CategoryId) -> StdRng {
        let salt = ((source as u64) << 8) | category as u64;
        StdRng::seed_from_u64(self.seed ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    fn price_text(rng: &mut StdRng, category: CategoryId) -> Option<String> {
        // About one listing in five asks buyers to inquire.
        if rng.gen_bool(0.2) {
            return None;
        }

        let (min, max) = category.default_price_band();
        let min = min.to_u64().unwrap_or(100);
        let max = max.to_u64().unwrap_or(10_000).max(min);
        let price = rng.gen_range(min..=max);

        Some(if price >= 100_000 {
            format!("₹ {:.2} Lakh", price as f64 / 100_000.0)
        } else if price >= 1000 {
            format!("₹ {}", group_thousands(price))
        } else {
            format!("₹ {}", price)
        })
    }
}

impl SampleGenerator for TemplateSampleGenerator {
    fn generate(&self, source: SourceId, category: CategoryId, count: usize) -> Vec<RawRecord> {
        let mut rng = self.rng_for(source, category);
        let templates = products(category);

        (0..count)
            .map(|_| {
                let variation = VARIATIONS.choose(&mut rng).copied().unwrap_or_default();
                let product = templates.choose(&mut rng).copied().unwrap_or_default();
                let title = format!("{} {}", variation, product).trim().to_string();
                let company = format!(
                    "{} {}",
                    COMPANY_PREFIXES.choose(&mut rng).copied().unwrap_or_default(),
                    COMPANY_SUFFIXES.choose(&mut rng).copied().unwrap_or_default()
                );
                let location = LOCATIONS.choose(&mut rng).copied().unwrap_or_default();
                let price = Self::price_text(&mut rng, category);
                let rating = if rng.gen_bool(0.7) {
                    Some(format!("{:.1} ★", rng.gen_range(3.5..=5.0)))
                } else {
                    None
                };
                let url = format!(
                    "https://example.com/{}/product/{}",
                    source.as_str(),
                    rng.gen_range(10_000_000..100_000_000u64)
                );

                let fields = BTreeMap::from([
                    (FieldName::Title, Some(title)),
                    (FieldName::Price, price),
                    (FieldName::Company, Some(company)),
                    (FieldName::Location, Some(location.to_string())),
                    (FieldName::Description, None),
                    (FieldName::Url, Some(url)),
                    (FieldName::Rating, rating),
                ]);

                RawRecord {
                    source,
                    category,
                    fields,
                    fetched_at: Utc::now(),
                    source_url: format!("synthetic://{}/{}", source.as_str(), category.query()),
                    provenance: Provenance::Synthetic,
                }
            })
            .collect()
    }
}

/// `45000` -> `45,000`.
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Currency;
    use crate::processor::rule_normalizer::parse_price;

    #[test]
    fn test_generation_is_deterministic() {
        let generator = TemplateSampleGenerator::new(42);
        let first = generator.generate(SourceId::Alibaba, CategoryId::TextileFabrics, 12);
        let second = generator.generate(SourceId::Alibaba, CategoryId::TextileFabrics, 12);

        let fields = |records: &[RawRecord]| records.iter().map(|r| r.fields.clone()).collect::<Vec<_>>();
        assert_eq!(fields(&first), fields(&second));
    }

    #[test]
    fn test_records_are_flagged_synthetic() {
        let generator = TemplateSampleGenerator::new(42);
        let records = generator.generate(SourceId::DhGate, CategoryId::SafetyEquipment, 20);

        assert_eq!(records.len(), 20);
        assert!(records.iter().all(|r| r.provenance == Provenance::Synthetic));
        assert!(records.iter().all(|r| r.source == SourceId::DhGate));
        assert!(records.iter().all(|r| r.field(FieldName::Title).is_some()));
    }

    #[test]
    fn test_prices_stay_inside_category_band() {
        let generator = TemplateSampleGenerator::new(7);
        let (min, max) = CategoryId::IndustrialMachinery.default_price_band();

        for record in generator.generate(SourceId::TradeIndia, CategoryId::IndustrialMachinery, 60) {
            if let Some(text) = record.field(FieldName::Price) {
                let price = parse_price(text, Currency::Inr).unwrap();
                assert_eq!(price.currency, Currency::Inr);
                assert!(price.amount >= min && price.amount <= max, "{} out of band", text);
            }
        }
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(45_000), "45,000");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }
}
