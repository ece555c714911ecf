use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::{
    CanonicalRecord, CategoryId, Deduction, DeductionKind, Price, ScoredRecord, SourceId,
    identity_key,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBand {
    pub min: Decimal,
    pub max: Decimal,
}

impl PriceBand {
    pub fn contains(&self, amount: Decimal) -> bool {
        amount >= self.min && amount <= self.max
    }
}

/// Deduction weights and plausibility bands. Every weight is configurable;
/// only determinism and the [0, 100] bound are fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub missing_title: u8,
    pub missing_price: u8,
    pub missing_location: u8,
    pub missing_company: u8,
    pub short_title: u8,
    pub min_title_tokens: usize,
    pub price_outside_band: u8,
    pub duplicate_title: u8,
    pub missing_listing_url: u8,
    /// Conversion used to compare USD prices against INR bands.
    pub usd_to_inr: Decimal,
    /// Per-category overrides of the built-in INR bands.
    pub price_bands: BTreeMap<CategoryId, PriceBand>,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            missing_title: 20,
            missing_price: 15,
            missing_location: 10,
            missing_company: 10,
            short_title: 10,
            min_title_tokens: 3,
            price_outside_band: 10,
            duplicate_title: 5,
            missing_listing_url: 5,
            usd_to_inr: Decimal::from(83),
            price_bands: BTreeMap::new(),
        }
    }
}

impl ScoringPolicy {
    pub fn band_for(&self, category: CategoryId) -> PriceBand {
        self.price_bands.get(&category).copied().unwrap_or_else(|| {
            let (min, max) = category.default_price_band();
            PriceBand { min, max }
        })
    }

    pub fn in_inr(&self, price: &Price) -> Decimal {
        price.in_inr(self.usd_to_inr)
    }
}

pub struct QualityScorer {
    policy: ScoringPolicy,
}

impl QualityScorer {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Scores one record on its own. Never applies the duplicate-title
    /// deduction, which needs the rest of the batch.
    pub fn score(&self, record: CanonicalRecord) -> ScoredRecord {
        self.score_with(record, false)
    }

    /// Scores a batch. A title counts as duplicate-looking when the same
    /// source lists it under two or more different companies.
    pub fn score_all(&self, records: Vec<CanonicalRecord>) -> Vec<ScoredRecord> {
        let duplicates = duplicate_titles(&records);

        records
            .into_iter()
            .map(|record| {
                let duplicate = duplicates.contains(&(record.source, identity_key(&record.title)));
                self.score_with(record, duplicate)
            })
            .collect()
    }

    fn score_with(&self, record: CanonicalRecord, duplicate_title: bool) -> ScoredRecord {
        let policy = &self.policy;
        let mut deductions = Vec::new();
        let mut deduct = |kind, points| {
            if points > 0 {
                deductions.push(Deduction { kind, points });
            }
        };

        if record.title.trim().is_empty() {
            deduct(DeductionKind::MissingTitle, policy.missing_title);
        } else if record.title_tokens() < policy.min_title_tokens {
            deduct(DeductionKind::ShortTitle, policy.short_title);
        }

        match &record.price {
            None => deduct(DeductionKind::MissingPrice, policy.missing_price),
            Some(price) if !policy.band_for(record.category).contains(policy.in_inr(price)) => {
                deduct(DeductionKind::PriceOutsideBand, policy.price_outside_band)
            }
            Some(_) => {}
        }

        if record.location.is_missing() {
            deduct(DeductionKind::MissingLocation, policy.missing_location);
        }
        if record.company.is_none() {
            deduct(DeductionKind::MissingCompany, policy.missing_company);
        }
        if record.listing_url.is_none() {
            deduct(DeductionKind::MissingListingUrl, policy.missing_listing_url);
        }
        if duplicate_title {
            deduct(DeductionKind::DuplicateTitle, policy.duplicate_title);
        }

        let total: u32 = deductions.iter().map(|d| u32::from(d.points)).sum();
        let score = 100u32.saturating_sub(total) as u8;

        ScoredRecord {
            record,
            score,
            deductions,
        }
    }
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new(ScoringPolicy::default())
    }
}

fn duplicate_titles(records: &[CanonicalRecord]) -> BTreeSet<(SourceId, String)> {
    let mut companies: HashMap<(SourceId, String), BTreeSet<String>> = HashMap::new();
    for record in records {
        let title = identity_key(&record.title);
        if title.is_empty() {
            continue;
        }
        let company = record.company.as_deref().map(identity_key).unwrap_or_default();
        companies.entry((record.source, title)).or_default().insert(company);
    }

    companies
        .into_iter()
        .filter(|(_, companies)| companies.len() > 1)
        .map(|(key, _)| key)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Currency, FieldPresence, Location, Provenance, Region};
    use std::collections::BTreeSet;

    fn record(title: &str) -> CanonicalRecord {
        CanonicalRecord {
            source: SourceId::TradeIndia,
            category: CategoryId::SafetyEquipment,
            title: title.to_string(),
            company: Some("Royal Suppliers".to_string()),
            price: Some(Price {
                amount: Decimal::from(850),
                currency: Currency::Inr,
            }),
            location: Location {
                city: Some("Surat".to_string()),
                state: Region::Gujarat,
            },
            keywords: BTreeSet::new(),
            rating: Some(4.2),
            listing_url: Some("https://www.tradeindia.com/products/helmet-1.html".to_string()),
            presence: FieldPresence::default(),
            provenance: Provenance::Scraped,
        }
    }

    #[test]
    fn test_complete_record_scores_full_marks() {
        let scored = QualityScorer::default().score(record("ISI Marked Safety Helmet"));

        assert_eq!(scored.score, 100);
        assert!(scored.deductions.is_empty());
    }

    #[test]
    fn test_sparse_record_with_short_title() {
        let mut sparse = record("Safety Helmet");
        sparse.price = None;
        sparse.location = Location::unknown();
        sparse.company = None;

        let scored = QualityScorer::default().score(sparse);
        let total: u32 = scored.deductions.iter().map(|d| u32::from(d.points)).sum();

        assert!(total >= 45);
        assert!(scored.score <= 55);
        assert!(scored.has_deduction(DeductionKind::ShortTitle));
        assert!(scored.has_deduction(DeductionKind::MissingPrice));
        assert!(scored.has_deduction(DeductionKind::MissingLocation));
        assert!(scored.has_deduction(DeductionKind::MissingCompany));
    }

    #[test]
    fn test_usd_price_is_converted_for_band_check() {
        let scorer = QualityScorer::default();

        let mut cheap = record("Full Body Safety Harness");
        cheap.price = Some(Price {
            amount: Decimal::from(50),
            currency: Currency::Usd,
        });
        assert!(!scorer.score(cheap).has_deduction(DeductionKind::PriceOutsideBand));

        let mut pricey = record("Full Body Safety Harness");
        pricey.price = Some(Price {
            amount: Decimal::from(500),
            currency: Currency::Usd,
        });
        assert!(scorer.score(pricey).has_deduction(DeductionKind::PriceOutsideBand));
    }

    #[test]
    fn test_band_override_applies() {
        let mut policy = ScoringPolicy::default();
        policy.price_bands.insert(
            CategoryId::SafetyEquipment,
            PriceBand {
                min: Decimal::from(1000),
                max: Decimal::from(2000),
            },
        );

        let scored = QualityScorer::new(policy).score(record("ISI Marked Safety Helmet"));
        assert!(scored.has_deduction(DeductionKind::PriceOutsideBand));
        assert_eq!(scored.score, 90);
    }

    #[test]
    fn test_score_is_clamped_to_zero() {
        let policy = ScoringPolicy {
            missing_title: 200,
            missing_price: 200,
            ..ScoringPolicy::default()
        };
        let mut empty = record("");
        empty.price = None;

        let scored = QualityScorer::new(policy).score(empty);
        assert_eq!(scored.score, 0);
    }

    #[test]
    fn test_duplicate_titles_flagged_independent_of_order() {
        let scorer = QualityScorer::default();
        let mut other_company = record("ISI Marked Safety Helmet");
        other_company.company = Some("Elite Solutions".to_string());
        let mut other_source = record("ISI Marked Safety Helmet");
        other_source.source = SourceId::Alibaba;
        let unique = record("Reflective Safety Jacket");

        let batch = vec![
            record("ISI Marked Safety Helmet"),
            other_company,
            other_source,
            unique,
        ];
        let mut reversed = batch.clone();
        reversed.reverse();

        let forward = scorer.score_all(batch);
        let mut backward = scorer.score_all(reversed);
        backward.reverse();

        assert_eq!(forward, backward);
        assert!(forward[0].has_deduction(DeductionKind::DuplicateTitle));
        assert!(forward[1].has_deduction(DeductionKind::DuplicateTitle));
        assert!(!forward[2].has_deduction(DeductionKind::DuplicateTitle));
        assert!(!forward[3].has_deduction(DeductionKind::DuplicateTitle));
        assert_eq!(forward[0].score, 95);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let scorer = QualityScorer::default();
        let mut input = record("Helmet");
        input.listing_url = None;

        assert_eq!(scorer.score(input.clone()), scorer.score(input));
    }
}
