use regex::Regex;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::models::{
    CanonicalRecord, Currency, FieldName, Location, Price, RawRecord,
};
use crate::processor::gazetteer::{Gazetteer, title_case};

static PRICE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<neg>-\s*)?(?:₹|₨|rs\.?|inr|us\s?\$|\$|usd)?\s*(?P<num>\d[\d,.]*)")
        .expect("hardcoded regex pattern is valid")
});

static PRICE_MULTIPLIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<unit>lakhs?|lacs?|crores?|cr|k)\b").expect("hardcoded regex pattern is valid")
});

static INR_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:rs|inr|rupees?)\b").expect("hardcoded regex pattern is valid")
});

static USD_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\busd\b").expect("hardcoded regex pattern is valid"));

static RATING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("hardcoded regex pattern is valid"));

// Promotional tails such as "Pump | Best Price | Free Shipping"
static PROMO_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\|.*$").expect("hardcoded regex pattern is valid"));

static COMPANY_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:pvt\.?\s*ltd|private\s+limited|ltd|inc|corporation|corp|llp)\b\.?")
        .expect("hardcoded regex pattern is valid")
});

const COMPANY_PLACEHOLDERS: &[&str] = &[
    "to be updated",
    "unknown",
    "n/a",
    "na",
    "-",
    "not available",
];

const STOPWORDS: &[&str] = &[
    "and", "or", "the", "a", "an", "in", "on", "at", "for", "with", "from", "to", "of", "by",
    "is", "are", "this", "that", "per", "new", "buy", "best", "price", "piece", "pieces",
];

/// Parses a price-shaped string into a positive amount with an explicit
/// currency. Returns `None` when no digits are present or the amount is zero
/// or negative.
pub fn parse_price(text: &str, default_currency: Currency) -> Option<Price> {
    let lower = text.to_lowercase();
    let captures = PRICE_NUMBER.captures(&lower)?;
    let number = captures.name("num")?;

    let mut amount = parse_amount(number.as_str())?;

    if let Some(unit) = PRICE_MULTIPLIER
        .captures(&lower[number.end()..])
        .and_then(|c| c.name("unit"))
    {
        let factor = match unit.as_str() {
            "lakh" | "lakhs" | "lac" | "lacs" => 100_000,
            "crore" | "crores" | "cr" => 10_000_000,
            _ => 1_000,
        };
        amount = amount.checked_mul(Decimal::from(factor))?;
    }

    // A sub-cent amount rounds to zero and counts as absent.
    let amount = amount.round_dp(2);
    if captures.name("neg").is_some() || amount <= Decimal::ZERO {
        return None;
    }

    Some(Price {
        amount,
        currency: detect_currency(&lower, default_currency),
    })
}

fn detect_currency(lower: &str, default_currency: Currency) -> Currency {
    if lower.contains('₹') || lower.contains('₨') || INR_MARKER.is_match(lower) {
        Currency::Inr
    } else if lower.contains('$') || USD_MARKER.is_match(lower) {
        Currency::Usd
    } else {
        default_currency
    }
}

/// Resolves thousands/decimal separators. The last separator is the decimal
/// point when both `,` and `.` appear; a single `,` followed by exactly three
/// digits groups thousands (so lakh grouping `1,20,000` works).
fn parse_amount(number: &str) -> Option<Decimal> {
    let number = number.trim_end_matches([',', '.']);
    let commas = number.matches(',').count();
    let dots = number.matches('.').count();

    let normalized = if commas > 0 && dots > 0 {
        if number.rfind('.') > number.rfind(',') {
            number.replace(',', "")
        } else {
            number.replace('.', "").replace(',', ".")
        }
    } else if commas == 1 && number.rsplit(',').next().map_or(0, str::len) != 3 {
        number.replace(',', ".")
    } else if commas > 0 {
        number.replace(',', "")
    } else if dots > 1 {
        number.replace('.', "")
    } else {
        number.to_string()
    };

    Decimal::from_str(&normalized).ok()
}

/// First number in `text`, accepted when it lies in [0, 5].
pub fn parse_rating(text: &str) -> Option<f64> {
    RATING_NUMBER
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|rating| (0.0..=5.0).contains(rating))
}

pub fn clean_title(title: &str) -> String {
    let without_promo = PROMO_TAIL.replace(title, "");
    without_promo.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strips legal suffixes and placeholders; `None` when nothing meaningful is left.
pub fn clean_company(company: &str) -> Option<String> {
    let trimmed = company.trim();
    if COMPANY_PLACEHOLDERS.contains(&trimmed.to_lowercase().as_str()) {
        return None;
    }

    let stripped = COMPANY_SUFFIX.replace_all(trimmed, "");
    let cleaned = stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == ',' || c == '.' || c == '-' || c.is_whitespace())
        .to_string();

    if cleaned.chars().any(char::is_alphanumeric) {
        Some(title_case(&cleaned))
    } else {
        None
    }
}

/// Lowercased, deduplicated title/description tokens minus stopwords.
pub fn extract_keywords(title: &str, description: Option<&str>) -> BTreeSet<String> {
    let text = match description {
        Some(description) => format!("{} {}", title, description),
        None => title.to_string(),
    };

    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() > 2)
        .filter(|token| !token.chars().all(|c| c.is_ascii_digit()))
        .filter(|token| !STOPWORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Converts raw extracted strings into canonical typed fields.
pub struct RuleNormalizer {
    gazetteer: Gazetteer,
}

impl RuleNormalizer {
    pub fn new() -> Self {
        Self {
            gazetteer: Gazetteer::new(),
        }
    }

    pub fn normalize(&self, raw: &RawRecord) -> CanonicalRecord {
        let title = raw.field(FieldName::Title).map(clean_title).unwrap_or_default();
        let keywords = extract_keywords(&title, raw.field(FieldName::Description));

        CanonicalRecord {
            source: raw.source,
            category: raw.category,
            company: raw.field(FieldName::Company).and_then(clean_company),
            price: raw
                .field(FieldName::Price)
                .and_then(|text| parse_price(text, raw.source.default_currency())),
            location: raw
                .field(FieldName::Location)
                .map_or_else(Location::unknown, |text| self.gazetteer.parse_location(text)),
            keywords,
            rating: raw.field(FieldName::Rating).and_then(parse_rating),
            listing_url: raw.field(FieldName::Url).map(str::to_string),
            presence: raw.presence(),
            provenance: raw.provenance,
            title,
        }
    }

    pub fn normalize_all(&self, records: &[RawRecord]) -> Vec<CanonicalRecord> {
        records.iter().map(|raw| self.normalize(raw)).collect()
    }
}

impl Default for RuleNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
