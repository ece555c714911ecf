use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::models::{Currency, FieldName};
use crate::processor::rule_normalizer::{parse_price, parse_rating};

/// One way of pulling a value out of a listing fragment. Strategies are pure
/// functions of the fragment.
#[derive(Debug, Clone)]
pub enum Strategy {
    /// Attribute of the fragment root, or of the first element matching `selector`.
    Attribute {
        selector: Option<Selector>,
        attr: String,
    },
    /// Whitespace-collapsed text of the first element matching `selector`.
    Text { selector: Selector },
    /// Capture group of `regex` applied to the text of `selector` (or the whole fragment).
    Pattern {
        selector: Option<Selector>,
        regex: Regex,
        group: usize,
    },
}

impl Strategy {
    pub fn apply(&self, fragment: ElementRef<'_>) -> Option<String> {
        match self {
            Strategy::Attribute { selector, attr } => {
                let element = match selector {
                    Some(selector) => fragment.select(selector).next()?,
                    None => fragment,
                };
                element.value().attr(attr).map(collapse_whitespace)
            }
            Strategy::Text { selector } => fragment.select(selector).next().map(element_text),
            Strategy::Pattern {
                selector,
                regex,
                group,
            } => {
                let text = match selector {
                    Some(selector) => element_text(fragment.select(selector).next()?),
                    None => element_text(fragment),
                };
                regex
                    .captures(&text)
                    .and_then(|captures| captures.get(*group))
                    .map(|m| m.as_str().trim().to_string())
            }
        }
    }
}

/// Post-extraction validation applied to a candidate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Price,
    Url,
    Rating,
}

impl FieldKind {
    pub fn for_field(field: FieldName) -> Self {
        match field {
            FieldName::Price => FieldKind::Price,
            FieldName::Url => FieldKind::Url,
            FieldName::Rating => FieldKind::Rating,
            FieldName::Title
            | FieldName::Company
            | FieldName::Location
            | FieldName::Description => FieldKind::Text,
        }
    }

    fn accepts(&self, value: &str) -> bool {
        match self {
            FieldKind::Text => {
                let len = value.chars().count();
                (2..=300).contains(&len) && value.chars().any(char::is_alphanumeric)
            }
            FieldKind::Price => parse_price(value, Currency::Unknown).is_some(),
            FieldKind::Url => {
                let lower = value.to_lowercase();
                !lower.starts_with('#') && !lower.starts_with("javascript:")
            }
            FieldKind::Rating => parse_rating(value).is_some(),
        }
    }
}

/// Ordered strategy chain for one field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub strategies: Vec<Strategy>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    Value(String),
    Missing,
}

impl Extracted {
    pub fn into_option(self) -> Option<String> {
        match self {
            Extracted::Value(value) => Some(value),
            Extracted::Missing => None,
        }
    }
}

/// Runs the strategies in order and keeps the first non-empty, valid result.
pub fn extract(fragment: ElementRef<'_>, spec: &FieldSpec) -> Extracted {
    spec.strategies
        .iter()
        .filter_map(|strategy| strategy.apply(fragment))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty() && spec.kind.accepts(value))
        .map_or(Extracted::Missing, Extracted::Value)
}

/// Parses an HTML fragment for one listing.
pub fn parse_fragment(html: &str) -> Html {
    Html::parse_fragment(html)
}

/// The listing element inside a parsed fragment.
pub fn fragment_root(document: &Html) -> Option<ElementRef<'_>> {
    document
        .root_element()
        .children()
        .filter_map(ElementRef::wrap)
        .next()
}

pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(css: &str) -> Selector {
        Selector::parse(css).unwrap()
    }

    const CARD: &str = r#"
        <div class="card" data-id="77">
            <a class="name" href="/p/77" title="Hydraulic Press Machine 50 Ton">Hydraulic Press</a>
            <span class="price">Price on Request</span>
            <p class="meta">Offer: ₹ 2.5 Lakh / Piece</p>
            <span class="company">   </span>
        </div>"#;

    #[test]
    fn test_first_successful_strategy_wins() {
        let document = parse_fragment(CARD);
        let root = fragment_root(&document).unwrap();
        let spec = FieldSpec {
            kind: FieldKind::Text,
            strategies: vec![
                Strategy::Text { selector: selector("h2") },
                Strategy::Attribute {
                    selector: Some(selector("a.name")),
                    attr: "title".to_string(),
                },
                Strategy::Text { selector: selector("a.name") },
            ],
        };

        assert_eq!(
            extract(root, &spec),
            Extracted::Value("Hydraulic Press Machine 50 Ton".to_string())
        );
    }

    #[test]
    fn test_price_chain_skips_values_without_digits() {
        let document = parse_fragment(CARD);
        let root = fragment_root(&document).unwrap();
        let spec = FieldSpec {
            kind: FieldKind::Price,
            strategies: vec![
                Strategy::Text { selector: selector(".price") },
                Strategy::Pattern {
                    selector: Some(selector(".meta")),
                    regex: Regex::new(r"(?i)(₹\s*[\d.,]+\s*(?:lakh)?)").unwrap(),
                    group: 1,
                },
            ],
        };

        assert_eq!(extract(root, &spec), Extracted::Value("₹ 2.5 Lakh".to_string()));
    }

    #[test]
    fn test_blank_values_are_missing() {
        let document = parse_fragment(CARD);
        let root = fragment_root(&document).unwrap();
        let spec = FieldSpec {
            kind: FieldKind::Text,
            strategies: vec![
                Strategy::Text { selector: selector(".company") },
                Strategy::Text { selector: selector(".supplier") },
            ],
        };

        assert_eq!(extract(root, &spec), Extracted::Missing);
    }

    #[test]
    fn test_attribute_on_fragment_root() {
        let document = parse_fragment(CARD);
        let root = fragment_root(&document).unwrap();
        let strategy = Strategy::Attribute {
            selector: None,
            attr: "data-id".to_string(),
        };

        assert_eq!(strategy.apply(root), Some("77".to_string()));
    }

    #[test]
    fn test_url_kind_rejects_script_links() {
        let document = parse_fragment(r##"<div><a href="javascript:void(0)">x</a><a href="#top">y</a></div>"##);
        let root = fragment_root(&document).unwrap();
        let spec = FieldSpec {
            kind: FieldKind::Url,
            strategies: vec![Strategy::Attribute {
                selector: Some(selector("a[href]")),
                attr: "href".to_string(),
            }],
        };

        assert_eq!(extract(root, &spec), Extracted::Missing);
    }
}
