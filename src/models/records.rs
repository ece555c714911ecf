use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigurationError;

/// Marketplaces the pipeline knows how to scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    TradeIndia,
    Alibaba,
    DhGate,
    ExportersIndia,
}

impl SourceId {
    pub const ALL: [SourceId; 4] = [
        SourceId::TradeIndia,
        SourceId::Alibaba,
        SourceId::DhGate,
        SourceId::ExportersIndia,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::TradeIndia => "tradeindia",
            SourceId::Alibaba => "alibaba",
            SourceId::DhGate => "dhgate",
            SourceId::ExportersIndia => "exportersindia",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SourceId::TradeIndia => "TradeIndia",
            SourceId::Alibaba => "Alibaba",
            SourceId::DhGate => "DHgate",
            SourceId::ExportersIndia => "ExportersIndia",
        }
    }

    /// Currency assumed when a price carries no recognisable marker.
    pub fn default_currency(&self) -> Currency {
        match self {
            SourceId::TradeIndia | SourceId::ExportersIndia => Currency::Inr,
            SourceId::Alibaba | SourceId::DhGate => Currency::Usd,
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        SourceId::ALL
            .into_iter()
            .find(|source| source.as_str() == key)
            .ok_or_else(|| ConfigurationError::UnknownSource(s.to_string()))
    }
}

/// Product categories a run can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryId {
    IndustrialMachinery,
    ElectronicComponents,
    TextileFabrics,
    PlasticRawMaterials,
    SafetyEquipment,
}

impl CategoryId {
    pub const ALL: [CategoryId; 5] = [
        CategoryId::IndustrialMachinery,
        CategoryId::ElectronicComponents,
        CategoryId::TextileFabrics,
        CategoryId::PlasticRawMaterials,
        CategoryId::SafetyEquipment,
    ];

    /// Search phrase sent to the marketplaces.
    pub fn query(&self) -> &'static str {
        match self {
            CategoryId::IndustrialMachinery => "industrial machinery",
            CategoryId::ElectronicComponents => "electronic components",
            CategoryId::TextileFabrics => "textile fabrics",
            CategoryId::PlasticRawMaterials => "plastic raw materials",
            CategoryId::SafetyEquipment => "safety equipment",
        }
    }

    /// Plausible INR price range for a single listing in this category.
    pub fn default_price_band(&self) -> (Decimal, Decimal) {
        let (min, max): (i64, i64) = match self {
            CategoryId::IndustrialMachinery => (50_000, 5_000_000),
            CategoryId::ElectronicComponents => (100, 50_000),
            CategoryId::TextileFabrics => (50, 5_000),
            CategoryId::PlasticRawMaterials => (500, 100_000),
            CategoryId::SafetyEquipment => (100, 10_000),
        };
        (Decimal::from(min), Decimal::from(max))
    }

    /// Keywords expected to show up in listings of this category.
    pub fn keyword_hints(&self) -> &'static [&'static str] {
        match self {
            CategoryId::IndustrialMachinery => &[
                "machine", "machinery", "lathe", "press", "cnc", "milling", "drilling",
                "grinding", "mixer", "conveyor", "welding", "packaging", "hydraulic",
            ],
            CategoryId::ElectronicComponents => &[
                "led", "circuit", "transformer", "capacitor", "resistor", "relay", "sensor",
                "pcb", "microcontroller", "power", "module", "board", "display",
            ],
            CategoryId::TextileFabrics => &[
                "fabric", "cotton", "polyester", "silk", "denim", "linen", "wool", "rayon",
                "georgette", "canvas", "velvet", "cloth", "material",
            ],
            CategoryId::PlasticRawMaterials => &[
                "pvc", "hdpe", "ldpe", "pet", "abs", "resin", "granules", "pellets",
                "polycarbonate", "acrylic", "nylon", "polystyrene", "plastic",
            ],
            CategoryId::SafetyEquipment => &[
                "safety", "helmet", "gloves", "goggles", "shoes", "extinguisher", "harness",
                "reflective", "jacket", "ear", "shield", "aid", "protection",
            ],
        }
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query())
    }
}

impl FromStr for CategoryId {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s
            .replace(['_', '-'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        CategoryId::ALL
            .into_iter()
            .find(|category| category.query() == key)
            .ok_or_else(|| ConfigurationError::UnknownCategory(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "INR")]
    Inr,
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Inr => "INR",
            Currency::Usd => "USD",
            Currency::Unknown => "unknown",
        }
    }
}

/// Indian states and union territories recognised by the location gazetteer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "Andhra Pradesh")]
    AndhraPradesh,
    Assam,
    Bihar,
    Chandigarh,
    Chhattisgarh,
    Delhi,
    Goa,
    Gujarat,
    Haryana,
    #[serde(rename = "Himachal Pradesh")]
    HimachalPradesh,
    #[serde(rename = "Jammu and Kashmir")]
    JammuAndKashmir,
    Jharkhand,
    Karnataka,
    Kerala,
    #[serde(rename = "Madhya Pradesh")]
    MadhyaPradesh,
    Maharashtra,
    Odisha,
    Punjab,
    Rajasthan,
    #[serde(rename = "Tamil Nadu")]
    TamilNadu,
    Telangana,
    #[serde(rename = "Uttar Pradesh")]
    UttarPradesh,
    Uttarakhand,
    #[serde(rename = "West Bengal")]
    WestBengal,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Region {
    pub const KNOWN: [Region; 24] = [
        Region::AndhraPradesh,
        Region::Assam,
        Region::Bihar,
        Region::Chandigarh,
        Region::Chhattisgarh,
        Region::Delhi,
        Region::Goa,
        Region::Gujarat,
        Region::Haryana,
        Region::HimachalPradesh,
        Region::JammuAndKashmir,
        Region::Jharkhand,
        Region::Karnataka,
        Region::Kerala,
        Region::MadhyaPradesh,
        Region::Maharashtra,
        Region::Odisha,
        Region::Punjab,
        Region::Rajasthan,
        Region::TamilNadu,
        Region::Telangana,
        Region::UttarPradesh,
        Region::Uttarakhand,
        Region::WestBengal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Region::AndhraPradesh => "Andhra Pradesh",
            Region::Assam => "Assam",
            Region::Bihar => "Bihar",
            Region::Chandigarh => "Chandigarh",
            Region::Chhattisgarh => "Chhattisgarh",
            Region::Delhi => "Delhi",
            Region::Goa => "Goa",
            Region::Gujarat => "Gujarat",
            Region::Haryana => "Haryana",
            Region::HimachalPradesh => "Himachal Pradesh",
            Region::JammuAndKashmir => "Jammu and Kashmir",
            Region::Jharkhand => "Jharkhand",
            Region::Karnataka => "Karnataka",
            Region::Kerala => "Kerala",
            Region::MadhyaPradesh => "Madhya Pradesh",
            Region::Maharashtra => "Maharashtra",
            Region::Odisha => "Odisha",
            Region::Punjab => "Punjab",
            Region::Rajasthan => "Rajasthan",
            Region::TamilNadu => "Tamil Nadu",
            Region::Telangana => "Telangana",
            Region::UttarPradesh => "Uttar Pradesh",
            Region::Uttarakhand => "Uttarakhand",
            Region::WestBengal => "West Bengal",
            Region::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fields every source adapter tries to extract from a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Title,
    Price,
    Company,
    Location,
    Description,
    Url,
    Rating,
}

impl FieldName {
    pub const ALL: [FieldName; 7] = [
        FieldName::Title,
        FieldName::Price,
        FieldName::Company,
        FieldName::Location,
        FieldName::Description,
        FieldName::Url,
        FieldName::Rating,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::Title => "title",
            FieldName::Price => "price",
            FieldName::Company => "company",
            FieldName::Location => "location",
            FieldName::Description => "description",
            FieldName::Url => "url",
            FieldName::Rating => "rating",
        }
    }

    fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

/// Bitmap of which expected raw fields were non-missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPresence(u8);

impl FieldPresence {
    pub fn insert(&mut self, field: FieldName) {
        self.0 |= field.bit();
    }

    pub fn contains(&self, field: FieldName) -> bool {
        self.0 & field.bit() != 0
    }

    pub fn count(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

/// Whether a record came from a marketplace or from the fallback generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    #[default]
    Scraped,
    Synthetic,
}

/// Unprocessed field values pulled out of one listing fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source: SourceId,
    pub category: CategoryId,
    pub fields: BTreeMap<FieldName, Option<String>>,
    pub fetched_at: DateTime<Utc>,
    pub source_url: String,
    pub provenance: Provenance,
}

impl RawRecord {
    pub fn field(&self, name: FieldName) -> Option<&str> {
        self.fields.get(&name).and_then(|value| value.as_deref())
    }

    pub fn presence(&self) -> FieldPresence {
        let mut presence = FieldPresence::default();
        for name in FieldName::ALL {
            if self.field(name).is_some() {
                presence.insert(name);
            }
        }
        presence
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub amount: Decimal,
    pub currency: Currency,
}

impl Price {
    /// Amount in INR at the given USD rate; unknown currency is taken as INR.
    pub fn in_inr(&self, usd_to_inr: Decimal) -> Decimal {
        match self.currency {
            Currency::Usd => self.amount * usd_to_inr,
            Currency::Inr | Currency::Unknown => self.amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub city: Option<String>,
    pub state: Region,
}

impl Location {
    pub fn unknown() -> Self {
        Self {
            city: None,
            state: Region::Unknown,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.city.is_none() && self.state == Region::Unknown
    }
}

/// Normalized, typed representation of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub source: SourceId,
    pub category: CategoryId,
    pub title: String,
    pub company: Option<String>,
    /// `None` means the listing asks buyers to inquire for a price.
    pub price: Option<Price>,
    pub location: Location,
    pub keywords: BTreeSet<String>,
    pub rating: Option<f64>,
    pub listing_url: Option<String>,
    pub presence: FieldPresence,
    pub provenance: Provenance,
}

impl CanonicalRecord {
    /// Identity used for deduplication: source, normalized title, company.
    pub fn identity(&self) -> (SourceId, String, String) {
        (
            self.source,
            identity_key(&self.title),
            self.company.as_deref().map(identity_key).unwrap_or_default(),
        )
    }

    pub fn title_tokens(&self) -> usize {
        self.title.split_whitespace().count()
    }
}

/// Lowercased alphanumeric tokens joined by single spaces.
pub fn identity_key(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeductionKind {
    MissingTitle,
    MissingPrice,
    MissingLocation,
    MissingCompany,
    ShortTitle,
    PriceOutsideBand,
    DuplicateTitle,
    MissingListingUrl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deduction {
    pub kind: DeductionKind,
    pub points: u8,
}

/// A canonical record annotated with its quality score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: CanonicalRecord,
    pub score: u8,
    pub deductions: Vec<Deduction>,
}

impl ScoredRecord {
    pub fn has_deduction(&self, kind: DeductionKind) -> bool {
        self.deductions.iter().any(|d| d.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_ids_parse_loosely() {
        assert_eq!("TradeIndia".parse::<SourceId>().unwrap(), SourceId::TradeIndia);
        assert_eq!("dh-gate".parse::<SourceId>().unwrap(), SourceId::DhGate);
        assert!(matches!(
            "indiamart".parse::<SourceId>(),
            Err(ConfigurationError::UnknownSource(_))
        ));
    }

    #[test]
    fn test_category_ids_accept_slugs_and_queries() {
        assert_eq!(
            "industrial_machinery".parse::<CategoryId>().unwrap(),
            CategoryId::IndustrialMachinery
        );
        assert_eq!(
            "Safety  Equipment".parse::<CategoryId>().unwrap(),
            CategoryId::SafetyEquipment
        );
        assert!("garden tools".parse::<CategoryId>().is_err());
    }

    #[test]
    fn test_field_presence_bitmap() {
        let mut presence = FieldPresence::default();
        assert!(presence.is_empty());

        presence.insert(FieldName::Title);
        presence.insert(FieldName::Rating);
        presence.insert(FieldName::Title);

        assert!(presence.contains(FieldName::Title));
        assert!(presence.contains(FieldName::Rating));
        assert!(!presence.contains(FieldName::Price));
        assert_eq!(presence.count(), 2);
    }

    #[test]
    fn test_identity_key_ignores_case_and_punctuation() {
        assert_eq!(identity_key("  CNC Milling-Machine! "), "cnc milling machine");
        assert_eq!(identity_key(""), "");
    }
}
