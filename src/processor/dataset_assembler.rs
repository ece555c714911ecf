use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

use crate::models::{
    CategoryId, Currency, FieldName, Provenance, Region, ScoredRecord, SourceId,
};

/// Coarse INR price buckets used in the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriceBandLabel {
    Budget,
    Low,
    Medium,
    High,
    Premium,
    Unknown,
}

impl PriceBandLabel {
    /// Each edge belongs to the band above it: ₹1,000 is Low, ₹1,00,000 is Premium.
    pub fn for_inr(amount: Decimal) -> Self {
        if amount < Decimal::from(1_000) {
            PriceBandLabel::Budget
        } else if amount < Decimal::from(10_000) {
            PriceBandLabel::Low
        } else if amount < Decimal::from(50_000) {
            PriceBandLabel::Medium
        } else if amount < Decimal::from(100_000) {
            PriceBandLabel::High
        } else {
            PriceBandLabel::Premium
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceStats {
    pub count: usize,
    pub min: Decimal,
    pub max: Decimal,
    pub mean: Decimal,
    pub median: Decimal,
}

impl PriceStats {
    fn from_amounts(mut amounts: Vec<Decimal>) -> Option<Self> {
        if amounts.is_empty() {
            return None;
        }
        amounts.sort();

        let count = amounts.len();
        let sum: Decimal = amounts.iter().sum();
        let middle = count / 2;
        let median = if count % 2 == 0 {
            (amounts[middle - 1] + amounts[middle]) / Decimal::from(2)
        } else {
            amounts[middle]
        };

        Some(Self {
            count,
            min: amounts[0],
            max: amounts[count - 1],
            mean: (sum / Decimal::from(count as u64)).round_dp(2),
            median: median.round_dp(2),
        })
    }
}

/// Statistics over the final, deduplicated collection only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub total_records: usize,
    pub synthetic_records: usize,
    pub duplicates_removed: usize,
    pub per_source: BTreeMap<SourceId, usize>,
    pub per_category: BTreeMap<CategoryId, usize>,
    pub per_state: BTreeMap<Region, usize>,
    pub mean_score: f64,
    pub price_stats: BTreeMap<Currency, PriceStats>,
    pub price_bands: BTreeMap<PriceBandLabel, usize>,
    /// Percentage of records with each raw field present.
    pub completeness: BTreeMap<FieldName, f64>,
    /// Records whose keywords share nothing with their category's hints.
    pub category_mismatches: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledDataset {
    pub records: Vec<ScoredRecord>,
    pub summary: DatasetSummary,
}

pub struct DatasetAssembler {
    usd_to_inr: Decimal,
}

impl DatasetAssembler {
    pub fn new(usd_to_inr: Decimal) -> Self {
        Self { usd_to_inr }
    }

    pub fn assemble(&self, records: Vec<ScoredRecord>) -> AssembledDataset {
        let incoming = records.len();
        let mut records = deduplicate(records);
        records.sort_by(compare_records);

        let mut summary = self.summarize(&records);
        summary.duplicates_removed = incoming - records.len();

        info!(
            "📦 Assembled {} records ({} duplicates removed, mean score {:.1})",
            summary.total_records, summary.duplicates_removed, summary.mean_score
        );

        AssembledDataset { records, summary }
    }

    fn summarize(&self, records: &[ScoredRecord]) -> DatasetSummary {
        let mut summary = DatasetSummary {
            total_records: records.len(),
            ..DatasetSummary::default()
        };
        let mut amounts: BTreeMap<Currency, Vec<Decimal>> = BTreeMap::new();
        let mut score_sum = 0u64;

        for scored in records {
            let record = &scored.record;
            score_sum += u64::from(scored.score);

            if record.provenance == Provenance::Synthetic {
                summary.synthetic_records += 1;
            }
            *summary.per_source.entry(record.source).or_default() += 1;
            *summary.per_category.entry(record.category).or_default() += 1;
            *summary.per_state.entry(record.location.state).or_default() += 1;

            let band = match &record.price {
                Some(price) => {
                    amounts.entry(price.currency).or_default().push(price.amount);
                    PriceBandLabel::for_inr(price.in_inr(self.usd_to_inr))
                }
                None => PriceBandLabel::Unknown,
            };
            *summary.price_bands.entry(band).or_default() += 1;

            let hints = record.category.keyword_hints();
            if !record.keywords.iter().any(|keyword| hints.contains(&keyword.as_str())) {
                summary.category_mismatches += 1;
            }
        }

        if !records.is_empty() {
            let total = records.len() as f64;
            summary.mean_score = score_sum as f64 / total;

            for field in FieldName::ALL {
                let present = records
                    .iter()
                    .filter(|scored| scored.record.presence.contains(field))
                    .count();
                summary.completeness.insert(field, present as f64 * 100.0 / total);
            }
        }

        summary.price_stats = amounts
            .into_iter()
            .filter_map(|(currency, amounts)| {
                PriceStats::from_amounts(amounts).map(|stats| (currency, stats))
            })
            .collect();

        summary
    }

}

/// Keeps one record per identity: the higher score wins, ties keep the first seen.
fn deduplicate(records: Vec<ScoredRecord>) -> Vec<ScoredRecord> {
    let mut kept: Vec<ScoredRecord> = Vec::with_capacity(records.len());
    let mut index: HashMap<(SourceId, String, String), usize> = HashMap::new();

    for scored in records {
        let identity = scored.record.identity();
        match index.get(&identity) {
            Some(&position) => {
                if scored.score > kept[position].score {
                    kept[position] = scored;
                }
            }
            None => {
                index.insert(identity, kept.len());
                kept.push(scored);
            }
        }
    }

    kept
}

fn compare_records(a: &ScoredRecord, b: &ScoredRecord) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.record.source.cmp(&b.record.source))
        .then_with(|| a.record.category.cmp(&b.record.category))
        .then_with(|| a.record.title.cmp(&b.record.title))
        .then_with(|| a.record.company.cmp(&b.record.company))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CanonicalRecord, FieldPresence, Location, Price};
    use rstest::rstest;
    use std::collections::BTreeSet;

    fn scored(source: SourceId, title: &str, company: Option<&str>, score: u8) -> ScoredRecord {
        let mut presence = FieldPresence::default();
        presence.insert(FieldName::Title);
        if company.is_some() {
            presence.insert(FieldName::Company);
        }

        ScoredRecord {
            record: CanonicalRecord {
                source,
                category: CategoryId::ElectronicComponents,
                title: title.to_string(),
                company: company.map(str::to_string),
                price: None,
                location: Location::unknown(),
                keywords: title
                    .split_whitespace()
                    .map(|word| word.to_lowercase())
                    .collect::<BTreeSet<_>>(),
                rating: None,
                listing_url: None,
                presence,
                provenance: Provenance::Scraped,
            },
            score,
            deductions: Vec::new(),
        }
    }

    fn priced(mut record: ScoredRecord, amount: i64, currency: Currency) -> ScoredRecord {
        record.record.price = Some(Price {
            amount: Decimal::from(amount),
            currency,
        });
        record.record.presence.insert(FieldName::Price);
        record
    }

    #[test]
    fn test_higher_score_wins_on_identity_collision() {
        let assembler = DatasetAssembler::new(Decimal::from(83));
        let dataset = assembler.assemble(vec![
            scored(SourceId::Alibaba, "Relay Switch 12V", Some("Royal Systems"), 60),
            scored(SourceId::Alibaba, "relay  switch 12v", Some("Royal Systems"), 85),
        ]);

        assert_eq!(dataset.records.len(), 1);
        assert_eq!(dataset.records[0].score, 85);
        assert_eq!(dataset.summary.duplicates_removed, 1);
    }

    #[test]
    fn test_tie_keeps_first_seen() {
        let assembler = DatasetAssembler::new(Decimal::from(83));
        let dataset = assembler.assemble(vec![
            scored(SourceId::Alibaba, "Relay Switch 12V", None, 70),
            scored(SourceId::Alibaba, "Relay Switch 12V!", None, 70),
        ]);

        assert_eq!(dataset.records.len(), 1);
        assert_eq!(dataset.records[0].record.title, "Relay Switch 12V");
    }

    #[test]
    fn test_same_title_across_sources_is_kept() {
        let assembler = DatasetAssembler::new(Decimal::from(83));
        let dataset = assembler.assemble(vec![
            scored(SourceId::Alibaba, "Relay Switch 12V", None, 70),
            scored(SourceId::DhGate, "Relay Switch 12V", None, 70),
        ]);

        assert_eq!(dataset.records.len(), 2);
    }

    #[test]
    fn test_assembly_is_idempotent() {
        let assembler = DatasetAssembler::new(Decimal::from(83));
        let first = assembler.assemble(vec![
            scored(SourceId::DhGate, "Sensor Module Kit", Some("Elite Solutions"), 75),
            scored(SourceId::Alibaba, "PCB Board Double Sided", None, 90),
            scored(SourceId::Alibaba, "PCB Board Double Sided", None, 40),
            scored(SourceId::Alibaba, "Capacitor Bank 50kVAR", Some("Prime"), 75),
        ]);
        let second = assembler.assemble(first.records.clone());

        assert_eq!(first.records, second.records);
        assert_eq!(second.summary.duplicates_removed, 0);
    }

    #[test]
    fn test_sorted_by_score_then_source() {
        let assembler = DatasetAssembler::new(Decimal::from(83));
        let dataset = assembler.assemble(vec![
            scored(SourceId::DhGate, "Sensor Module Kit", None, 75),
            scored(SourceId::Alibaba, "Capacitor Bank", None, 75),
            scored(SourceId::TradeIndia, "LED Display Panel", None, 95),
        ]);

        let order: Vec<SourceId> = dataset.records.iter().map(|r| r.record.source).collect();
        assert_eq!(order, vec![SourceId::TradeIndia, SourceId::Alibaba, SourceId::DhGate]);
    }

    #[test]
    fn test_summary_statistics() {
        let assembler = DatasetAssembler::new(Decimal::from(83));
        let dataset = assembler.assemble(vec![
            priced(scored(SourceId::TradeIndia, "LED Display Panel", Some("Om Traders"), 100), 800, Currency::Inr),
            priced(scored(SourceId::TradeIndia, "Power Supply Unit", Some("Sai Systems"), 90), 12_000, Currency::Inr),
            priced(scored(SourceId::Alibaba, "Relay Switch", None, 70), 2, Currency::Usd),
            scored(SourceId::Alibaba, "Cotton Fabric Roll", None, 40),
        ]);
        let summary = &dataset.summary;

        assert_eq!(summary.total_records, 4);
        assert_eq!(summary.per_source[&SourceId::TradeIndia], 2);
        assert_eq!(summary.per_category[&CategoryId::ElectronicComponents], 4);
        assert_eq!(summary.per_state[&Region::Unknown], 4);
        assert_eq!(summary.mean_score, 75.0);

        let inr = &summary.price_stats[&Currency::Inr];
        assert_eq!(inr.count, 2);
        assert_eq!(inr.min, Decimal::from(800));
        assert_eq!(inr.median, Decimal::from(6_400));
        assert_eq!(summary.price_stats[&Currency::Usd].count, 1);

        assert_eq!(summary.price_bands[&PriceBandLabel::Budget], 2);
        assert_eq!(summary.price_bands[&PriceBandLabel::Medium], 1);
        assert_eq!(summary.price_bands[&PriceBandLabel::Unknown], 1);

        assert_eq!(summary.completeness[&FieldName::Title], 100.0);
        assert_eq!(summary.completeness[&FieldName::Company], 50.0);
        assert_eq!(summary.completeness[&FieldName::Price], 75.0);
        assert_eq!(summary.category_mismatches, 1);
    }

    #[rstest]
    #[case(999, PriceBandLabel::Budget)]
    #[case(1_000, PriceBandLabel::Low)]
    #[case(9_999, PriceBandLabel::Low)]
    #[case(10_000, PriceBandLabel::Medium)]
    #[case(50_000, PriceBandLabel::High)]
    #[case(99_999, PriceBandLabel::High)]
    #[case(100_000, PriceBandLabel::Premium)]
    fn test_price_band_edges_belong_to_upper_band(#[case] amount: i64, #[case] expected: PriceBandLabel) {
        assert_eq!(PriceBandLabel::for_inr(Decimal::from(amount)), expected);
    }

    #[test]
    fn test_usd_price_is_banded_at_configured_rate() {
        let assembler = DatasetAssembler::new(Decimal::from(100));
        let dataset = assembler.assemble(vec![priced(
            scored(SourceId::DhGate, "Relay Switch Module", None, 80),
            10,
            Currency::Usd,
        )]);

        assert_eq!(dataset.summary.price_bands[&PriceBandLabel::Low], 1);
    }

    #[test]
    fn test_empty_input() {
        let dataset = DatasetAssembler::new(Decimal::from(83)).assemble(Vec::new());

        assert!(dataset.records.is_empty());
        assert_eq!(dataset.summary.total_records, 0);
        assert_eq!(dataset.summary.mean_score, 0.0);
    }
}
