//! Parameter sweep over facet values and result pages.
//!
//! A crawl visits every `(facet, page)` pair exactly once, facet-major and
//! page-minor, so request numbering is stable between runs.

use std::fmt;
use std::iter;

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::config::CrawlerConfig;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuerySpec {
    pub facet_value: String,
    pub page_index: u32,
}

impl QuerySpec {
    pub fn new(facet_value: impl Into<String>, page_index: u32) -> Self {
        Self {
            facet_value: facet_value.into(),
            page_index,
        }
    }
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "facet={} page={}", self.facet_value, self.page_index)
    }
}

/// Generation of the catalog URL scheme.
///
/// Both generations nest a `key:value` filter expression inside a single
/// query parameter but escape it differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum SiteGeneration {
    /// `?type=product&page=N&filter=...`, separators pre-escaped in lowercase
    Legacy,
    /// `?page=N&path=...`
    Current,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterTerm {
    pub key: String,
    pub value: String,
}

impl FilterTerm {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogTarget {
    pub generation: SiteGeneration,
    pub base_url: String,
    /// Fixed category path, rendered before the facet term
    pub category: Vec<FilterTerm>,
    /// Filter key the swept facet value is bound to
    pub facet_key: String,
}

impl CatalogTarget {
    pub fn current() -> Self {
        Self {
            generation: SiteGeneration::Current,
            base_url: "https://www.bestbuy.ca/en-ca/category/windows-laptops/36711".into(),
            category: vec![
                FilterTerm::new("category", "Computers & Tablets"),
                FilterTerm::new("category", "Laptops & MacBooks"),
                FilterTerm::new("category", "Windows Laptops"),
            ],
            facet_key: "custom0ramsize".into(),
        }
    }

    pub fn legacy() -> Self {
        Self {
            generation: SiteGeneration::Legacy,
            base_url: "https://www.bestbuy.ca/en-ca/category/laptops-macbooks/20352.aspx".into(),
            category: vec![
                FilterTerm::new("category", "Computers & Tablets"),
                FilterTerm::new("category", "Laptops & MacBooks"),
            ],
            facet_key: "custom0ramsize".into(),
        }
    }

    pub fn for_generation(generation: SiteGeneration) -> Self {
        match generation {
            SiteGeneration::Legacy => Self::legacy(),
            SiteGeneration::Current => Self::current(),
        }
    }
}

impl Default for CatalogTarget {
    fn default() -> Self {
        Self::current()
    }
}

#[derive(Debug, Clone)]
pub struct QueryPlanner {
    target: CatalogTarget,
    facet_values: Vec<String>,
    pages: Vec<u32>,
}

impl QueryPlanner {
    pub fn new(target: CatalogTarget, facet_values: Vec<String>, pages: Vec<u32>) -> Self {
        Self {
            target,
            facet_values,
            pages,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.target.clone(),
            config.facet_values.clone(),
            config.pages.clone(),
        )
    }

    /// A fresh pass over the sweep, calling it again yields the same sequence
    pub fn plan(&self) -> Plan<'_> {
        Plan {
            facet_values: &self.facet_values,
            pages: &self.pages,
            facet: 0,
            page: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.facet_values.len() * self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn target(&self) -> &CatalogTarget {
        &self.target
    }

    pub fn render(&self, spec: &QuerySpec) -> String {
        let filter = encode(&self.filter_expression(&spec.facet_value));
        match self.target.generation {
            SiteGeneration::Legacy => format!(
                "{}?type=product&page={}&filter={}",
                self.target.base_url, spec.page_index, filter
            ),
            SiteGeneration::Current => format!(
                "{}?page={}&path={}",
                self.target.base_url, spec.page_index, filter
            ),
        }
    }

    fn filter_expression(&self, facet_value: &str) -> String {
        let (assign, separator) = match self.target.generation {
            SiteGeneration::Legacy => ("%3a", "%3b"),
            SiteGeneration::Current => (":", ";"),
        };
        self.target
            .category
            .iter()
            .map(|term| (term.key.as_str(), term.value.as_str()))
            .chain(iter::once((self.target.facet_key.as_str(), facet_value)))
            .map(|(key, value)| format!("{key}{assign}{}", encode(value)))
            .collect::<Vec<_>>()
            .join(separator)
    }
}

// `application/x-www-form-urlencoded`, escapes every separator used above
fn encode(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[derive(Debug, Clone)]
pub struct Plan<'a> {
    facet_values: &'a [String],
    pages: &'a [u32],
    facet: usize,
    page: usize,
}

impl Iterator for Plan<'_> {
    type Item = QuerySpec;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pages.is_empty() {
            return None;
        }
        let facet_value = self.facet_values.get(self.facet)?;
        let spec = QuerySpec::new(facet_value.as_str(), self.pages[self.page]);
        self.page += 1;
        if self.page == self.pages.len() {
            self.page = 0;
            self.facet += 1;
        }
        Some(spec)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let total = self.facet_values.len() * self.pages.len();
        let done = self.facet * self.pages.len() + self.page;
        let left = total.saturating_sub(done);
        (left, Some(left))
    }
}

impl ExactSizeIterator for Plan<'_> {}
