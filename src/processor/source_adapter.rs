use chrono::Utc;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

use crate::config::source_config::{PaginationConfig, SourceConfig, StrategyConfig};
use crate::error::ConfigurationError;
use crate::models::{CategoryId, FieldName, Provenance, RawRecord, SourceId};
use crate::processor::field_extractor::{
    FieldKind, FieldSpec, Strategy, extract, fragment_root, parse_fragment,
};

/// A page to fetch for one (source, category) pair. `page_index` is zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
    pub page_index: u32,
}

/// What a results page looks like structurally, from a single parse.
#[derive(Debug, Clone, Default)]
pub struct PageShape {
    pub has_marker: bool,
    pub listings: Vec<String>,
    /// Raw `href` of the next-page link, for link-following adapters.
    pub next_href: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PageHarvest {
    pub records: Vec<RawRecord>,
    /// Listings where no strategy produced a value for any field.
    pub corrupt_fragments: usize,
}

#[derive(Debug, Clone)]
enum Pagination {
    QueryParam { param: String, first: u32 },
    NextLink { selector: Selector },
}

/// Compiled, immutable form of a [`SourceConfig`]. Knows where listings live
/// on a page and how to pull fields out of them; holds no timing or retry state.
#[derive(Debug, Clone)]
pub struct SourceAdapter {
    source: SourceId,
    base_url: Url,
    search_url: String,
    headers: Vec<(String, String)>,
    page_markers: Vec<Selector>,
    listing_selectors: Vec<Selector>,
    pagination: Pagination,
    fields: BTreeMap<FieldName, FieldSpec>,
}

impl SourceAdapter {
    pub fn from_config(config: &SourceConfig) -> Result<Self, ConfigurationError> {
        let source = config.site.source;
        let source_name = source.as_str();

        let base_url = Url::parse(&config.site.base_url).map_err(|_| {
            ConfigurationError::InvalidUrlTemplate {
                source_name: source_name.to_string(),
                template: config.site.base_url.clone(),
            }
        })?;

        let template = &config.site.search_url;
        if !template.contains("{query}") || Url::parse(&template.replace("{query}", "probe")).is_err() {
            return Err(ConfigurationError::InvalidUrlTemplate {
                source_name: source_name.to_string(),
                template: template.clone(),
            });
        }

        let compile_all = |selectors: &[String]| -> Result<Vec<Selector>, ConfigurationError> {
            selectors
                .iter()
                .map(|css| compile_selector(source, css))
                .collect()
        };

        let pagination = match &config.pagination {
            PaginationConfig::QueryParam { param, first } => Pagination::QueryParam {
                param: param.clone(),
                first: *first,
            },
            PaginationConfig::NextLink { selector } => Pagination::NextLink {
                selector: compile_selector(source, selector)?,
            },
        };

        let mut fields = BTreeMap::new();
        for (name, strategies) in &config.fields {
            let strategies = strategies
                .iter()
                .map(|strategy| compile_strategy(source, strategy))
                .collect::<Result<Vec<_>, _>>()?;
            fields.insert(
                *name,
                FieldSpec {
                    kind: FieldKind::for_field(*name),
                    strategies,
                },
            );
        }

        Ok(Self {
            source,
            base_url,
            search_url: template.clone(),
            headers: config
                .site
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            page_markers: compile_all(&config.selectors.page_markers)?,
            listing_selectors: compile_all(&config.selectors.listing_selectors)?,
            pagination,
            fields,
        })
    }

    pub fn builtin(source: SourceId) -> Result<Self, ConfigurationError> {
        Self::from_config(&SourceConfig::builtin(source))
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Static adapter headers plus the rotated user agent.
    pub fn headers_with(&self, user_agent: &str) -> Vec<(String, String)> {
        let mut headers = self.headers.clone();
        headers.push(("User-Agent".to_string(), user_agent.to_string()));
        headers
    }

    pub fn first_page_request(&self, category: CategoryId) -> PageRequest {
        let query: String = url::form_urlencoded::byte_serialize(category.query().as_bytes()).collect();
        PageRequest {
            url: self.search_url.replace("{query}", &query),
            page_index: 0,
        }
    }

    /// Request for the page after `current`, or `None` when the page offers no way forward.
    pub fn next_page_request(&self, shape: &PageShape, current: &PageRequest) -> Option<PageRequest> {
        let current_url = Url::parse(&current.url).ok()?;
        let page_index = current.page_index + 1;

        let next_url = match &self.pagination {
            Pagination::QueryParam { param, first } => {
                let page = first + page_index;
                let retained: Vec<(String, String)> = current_url
                    .query_pairs()
                    .filter(|(key, _)| key != param)
                    .map(|(key, value)| (key.into_owned(), value.into_owned()))
                    .collect();

                let mut next = current_url.clone();
                next.query_pairs_mut()
                    .clear()
                    .extend_pairs(retained)
                    .append_pair(param, &page.to_string());
                next
            }
            Pagination::NextLink { .. } => current_url.join(shape.next_href.as_deref()?).ok()?,
        };

        if next_url == current_url {
            return None;
        }

        Some(PageRequest {
            url: next_url.to_string(),
            page_index,
        })
    }

    /// Parses the page once: page markers, listing fragments (outer HTML,
    /// from the first listing selector that matches anything) and the next link.
    pub fn page_shape(&self, body: &str) -> PageShape {
        let document = Html::parse_document(body);
        let next_href = match &self.pagination {
            Pagination::NextLink { selector } => document
                .select(selector)
                .find_map(|element| element.value().attr("href"))
                .map(str::to_string),
            Pagination::QueryParam { .. } => None,
        };

        PageShape {
            has_marker: self.marker_in(&document),
            listings: self.listings_in(&document),
            next_href,
        }
    }

    pub fn field_spec_for(&self, field: FieldName) -> Option<&FieldSpec> {
        self.fields.get(&field)
    }

    /// Runs every field chain over one fragment. Returns `None` when nothing
    /// at all could be extracted.
    pub fn extract_record(&self, fragment: &str, category: CategoryId, page_url: &str) -> Option<RawRecord> {
        let document = parse_fragment(fragment);
        let root = fragment_root(&document)?;

        let fields: BTreeMap<FieldName, Option<String>> = FieldName::ALL
            .into_iter()
            .map(|name| {
                let value = self
                    .field_spec_for(name)
                    .and_then(|spec| extract(root, spec).into_option())
                    .map(|value| match name {
                        FieldName::Url => self.resolve_url(&value),
                        _ => value,
                    });
                (name, value)
            })
            .collect();

        if fields.values().all(Option::is_none) {
            return None;
        }

        Some(RawRecord {
            source: self.source,
            category,
            fields,
            fetched_at: Utc::now(),
            source_url: page_url.to_string(),
            provenance: Provenance::Scraped,
        })
    }

    pub fn harvest_fragments(&self, fragments: &[String], category: CategoryId, page_url: &str) -> PageHarvest {
        let mut harvest = PageHarvest::default();
        for fragment in fragments {
            match self.extract_record(fragment, category, page_url) {
                Some(record) => harvest.records.push(record),
                None => harvest.corrupt_fragments += 1,
            }
        }

        if harvest.corrupt_fragments > 0 {
            debug!(
                "{}: dropped {} corrupt listing(s) on {}",
                self.source, harvest.corrupt_fragments, page_url
            );
        }
        harvest
    }

    pub fn harvest_page(&self, body: &str, category: CategoryId, page_url: &str) -> PageHarvest {
        let shape = self.page_shape(body);
        self.harvest_fragments(&shape.listings, category, page_url)
    }

    fn resolve_url(&self, href: &str) -> String {
        self.base_url
            .join(href)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| href.to_string())
    }

    fn marker_in(&self, document: &Html) -> bool {
        self.page_markers
            .iter()
            .any(|selector| document.select(selector).next().is_some())
    }

    fn listings_in(&self, document: &Html) -> Vec<String> {
        self.listing_selectors
            .iter()
            .map(|selector| {
                document
                    .select(selector)
                    .map(|element| element.html())
                    .collect::<Vec<_>>()
            })
            .find(|fragments| !fragments.is_empty())
            .unwrap_or_default()
    }
}

fn compile_selector(source: SourceId, css: &str) -> Result<Selector, ConfigurationError> {
    Selector::parse(css).map_err(|_| ConfigurationError::InvalidSelector {
        source_name: source.as_str().to_string(),
        selector: css.to_string(),
    })
}

fn compile_strategy(source: SourceId, strategy: &StrategyConfig) -> Result<Strategy, ConfigurationError> {
    let optional = |selector: &Option<String>| {
        selector
            .as_deref()
            .map(|css| compile_selector(source, css))
            .transpose()
    };

    Ok(match strategy {
        StrategyConfig::Attribute { selector, attr } => Strategy::Attribute {
            selector: optional(selector)?,
            attr: attr.clone(),
        },
        StrategyConfig::Text { selector } => Strategy::Text {
            selector: compile_selector(source, selector)?,
        },
        StrategyConfig::Regex {
            selector,
            pattern,
            group,
        } => Strategy::Pattern {
            selector: optional(selector)?,
            regex: Regex::new(pattern).map_err(|cause| ConfigurationError::InvalidPattern {
                source_name: source.as_str().to_string(),
                pattern: pattern.clone(),
                cause,
            })?,
            group: *group,
        },
    })
}
