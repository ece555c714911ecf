use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{FieldName, SourceId};

/// Declarative description of one marketplace: where to search, how to
/// recognise a genuine results page, and how to pull fields out of a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub site: SiteConfig,
    pub selectors: SelectorConfig,
    pub pagination: PaginationConfig,
    pub fields: BTreeMap<FieldName, Vec<StrategyConfig>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub source: SourceId,
    pub base_url: String,
    /// Must contain `{query}`.
    pub search_url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// At least one must match for a page to count as a real results page.
    pub page_markers: Vec<String>,
    /// Tried in order; the first selector that matches anything wins.
    pub listing_selectors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationConfig {
    QueryParam { param: String, first: u32 },
    NextLink { selector: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    Attribute {
        #[serde(default)]
        selector: Option<String>,
        attr: String,
    },
    Text {
        selector: String,
    },
    Regex {
        #[serde(default)]
        selector: Option<String>,
        pattern: String,
        #[serde(default)]
        group: usize,
    },
}

impl SourceConfig {
    /// Load an adapter override from a TOML file
    pub fn from_file(path: &str) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: SourceConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Built-in adapter for each supported marketplace
    pub fn builtin(source: SourceId) -> Self {
        match source {
            SourceId::TradeIndia => tradeindia(),
            SourceId::Alibaba => alibaba(),
            SourceId::DhGate => dhgate(),
            SourceId::ExportersIndia => exportersindia(),
        }
    }
}

fn text(selector: &str) -> StrategyConfig {
    StrategyConfig::Text {
        selector: selector.to_string(),
    }
}

fn attr(selector: &str, attr: &str) -> StrategyConfig {
    StrategyConfig::Attribute {
        selector: Some(selector.to_string()),
        attr: attr.to_string(),
    }
}

fn regex(selector: Option<&str>, pattern: &str, group: usize) -> StrategyConfig {
    StrategyConfig::Regex {
        selector: selector.map(str::to_string),
        pattern: pattern.to_string(),
        group,
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        ),
        ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
    ])
}

fn tradeindia() -> SourceConfig {
    SourceConfig {
        site: SiteConfig {
            source: SourceId::TradeIndia,
            base_url: "https://www.tradeindia.com".to_string(),
            search_url: "https://www.tradeindia.com/search.html?ss={query}".to_string(),
            headers: default_headers(),
        },
        selectors: SelectorConfig {
            page_markers: strings(&["[class*='card_container']", "#__next", "footer"]),
            listing_selectors: strings(&[
                "[class*='card_container']",
                "[data-testid='product-card']",
                ".product-card",
            ]),
        },
        pagination: PaginationConfig::QueryParam {
            param: "page".to_string(),
            first: 1,
        },
        fields: BTreeMap::from([
            (
                FieldName::Title,
                vec![attr("a[title]", "title"), text("h2"), text("h3"), text("a")],
            ),
            (
                FieldName::Price,
                vec![
                    text("[class*='price']"),
                    regex(None, r"(?i)((?:₹|rs\.?|inr)\s*[\d.,]+\s*(?:lakh|crore)?)", 1),
                ],
            ),
            (
                FieldName::Company,
                vec![text("[class*='company']"), text("[class*='seller']")],
            ),
            (
                FieldName::Location,
                vec![text("[class*='location']"), text("[class*='city']")],
            ),
            (FieldName::Description, vec![text("[class*='spec']"), text("p")]),
            (FieldName::Url, vec![attr("a[href]", "href")]),
            (FieldName::Rating, vec![text("[class*='rating']")]),
        ]),
    }
}

fn alibaba() -> SourceConfig {
    SourceConfig {
        site: SiteConfig {
            source: SourceId::Alibaba,
            base_url: "https://www.alibaba.com".to_string(),
            search_url: "https://www.alibaba.com/trade/search?SearchText={query}".to_string(),
            headers: default_headers(),
        },
        selectors: SelectorConfig {
            page_markers: strings(&[".organic-list", ".fy23-search-card", "[data-spm='list']"]),
            listing_selectors: strings(&[
                ".fy23-search-card",
                ".organic-list .list-no-v2-outter",
                ".organic-gallery-offer-outter",
            ]),
        },
        pagination: PaginationConfig::QueryParam {
            param: "page".to_string(),
            first: 1,
        },
        fields: BTreeMap::from([
            (
                FieldName::Title,
                vec![
                    text(".search-card-e-title"),
                    text("h2"),
                    attr("a[title]", "title"),
                ],
            ),
            (
                FieldName::Price,
                vec![
                    text(".search-card-e-price-main"),
                    regex(None, r"(?i)((?:us\s?)?\$\s*[\d.,]+)", 1),
                ],
            ),
            (
                FieldName::Company,
                vec![text(".search-card-e-company"), text("[class*='supplier']")],
            ),
            (
                FieldName::Location,
                vec![text(".search-card-e-country"), text("[class*='location']")],
            ),
            (FieldName::Description, vec![text(".search-card-e-sell-point")]),
            (FieldName::Url, vec![attr("a.search-card-e-slider__link", "href"), attr("a[href]", "href")]),
            (FieldName::Rating, vec![text(".search-card-e-review strong")]),
        ]),
    }
}

fn dhgate() -> SourceConfig {
    SourceConfig {
        site: SiteConfig {
            source: SourceId::DhGate,
            base_url: "https://www.dhgate.com".to_string(),
            search_url: "https://www.dhgate.com/wholesale/{query}.html".to_string(),
            headers: default_headers(),
        },
        selectors: SelectorConfig {
            page_markers: strings(&["#proList", ".gitem", ".gallery-main"]),
            listing_selectors: strings(&[".gitem", "#proList .gallery-item"]),
        },
        pagination: PaginationConfig::NextLink {
            selector: "a.next, a[rel='next']".to_string(),
        },
        fields: BTreeMap::from([
            (
                FieldName::Title,
                vec![attr("h3 a[title]", "title"), text("h3"), text(".pro-title")],
            ),
            (
                FieldName::Price,
                vec![text(".price"), regex(None, r"(?i)((?:us\s?)?\$\s*[\d.,]+)", 1)],
            ),
            (FieldName::Company, vec![text(".seller-name"), text(".store-name")]),
            (FieldName::Location, vec![text(".seller-country")]),
            (FieldName::Description, vec![text(".pro-detail")]),
            (FieldName::Url, vec![attr("h3 a[href]", "href"), attr("a[href]", "href")]),
            (
                FieldName::Rating,
                vec![regex(Some(".reviewbox"), r"(\d(?:\.\d+)?)", 1)],
            ),
        ]),
    }
}

fn exportersindia() -> SourceConfig {
    SourceConfig {
        site: SiteConfig {
            source: SourceId::ExportersIndia,
            base_url: "https://www.exportersindia.com".to_string(),
            search_url: "https://www.exportersindia.com/search.htm?keyword={query}".to_string(),
            headers: default_headers(),
        },
        selectors: SelectorConfig {
            page_markers: strings(&[".classified", ".search-result", "#search_result"]),
            listing_selectors: strings(&[".classified", ".search-result .listing"]),
        },
        pagination: PaginationConfig::QueryParam {
            param: "pageno".to_string(),
            first: 1,
        },
        fields: BTreeMap::from([
            (
                FieldName::Title,
                vec![text(".prd-name"), attr("h2 a[title]", "title"), text("h2")],
            ),
            (
                FieldName::Price,
                vec![
                    text(".prd-price"),
                    regex(None, r"(?i)((?:₹|rs\.?|inr)\s*[\d.,]+\s*(?:lakh|crore)?)", 1),
                ],
            ),
            (FieldName::Company, vec![text(".com-name"), text(".company")]),
            (FieldName::Location, vec![text(".com-location"), text(".city")]),
            (FieldName::Description, vec![text(".prd-desc")]),
            (FieldName::Url, vec![attr(".prd-name a[href]", "href"), attr("a[href]", "href")]),
            (FieldName::Rating, vec![text(".rating")]),
        ]),
    }
}
