use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fetch::FetchConfig;
use crate::planner::CatalogTarget;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerConfig {
    /// Page indices swept for every facet value, in order
    #[serde(default = "default_pages")]
    pub pages: Vec<u32>,

    /// Facet filter values, iterated in order (outer loop)
    #[serde(default = "default_facet_values")]
    pub facet_values: Vec<String>,

    /// Minimum delay in seconds between two requests of a worker
    #[serde(default = "default_sleep_min")]
    pub sleep_min: u64,

    /// Maximum delay in seconds between two requests of a worker
    #[serde(default = "default_sleep_max")]
    pub sleep_max: u64,

    /// Hard cap on fetches issued during one crawl
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Extra request headers, override the defaults on name clash
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    #[serde(default)]
    pub target: CatalogTarget,

    /// Number of workers fetching in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub backend: Backend,

    #[serde(default = "default_handle_sigint")]
    pub handle_sigint: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            pages: default_pages(),
            facet_values: default_facet_values(),
            sleep_min: default_sleep_min(),
            sleep_max: default_sleep_max(),
            max_requests: default_max_requests(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
            headers: BTreeMap::new(),
            output_path: default_output_path(),
            target: CatalogTarget::default(),
            concurrency: default_concurrency(),
            backend: Backend::default(),
            handle_sigint: default_handle_sigint(),
        }
    }
}

impl CrawlerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pages.is_empty() {
            anyhow::bail!("Invalid crawler config: `pages` is empty");
        }
        if let Some(page) = self.pages.iter().find(|&&p| p == 0) {
            anyhow::bail!("Invalid crawler config: page index {page} is not positive");
        }
        if self.facet_values.is_empty() {
            anyhow::bail!("Invalid crawler config: `facetValues` is empty");
        }
        if self.sleep_min > self.sleep_max {
            anyhow::bail!(
                "Invalid crawler config: sleepMin ({}) is greater than sleepMax ({})",
                self.sleep_min,
                self.sleep_max
            );
        }
        if self.max_requests == 0 {
            anyhow::bail!("Invalid crawler config: maxRequests must be positive");
        }
        if self.concurrency == 0 {
            anyhow::bail!("Invalid crawler config: concurrency must be positive");
        }
        if let Err(e) = url::Url::parse(&self.target.base_url) {
            anyhow::bail!(
                "Invalid crawler config: base URL {} got: {e}",
                self.target.base_url
            );
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Default browser-like headers with user overrides applied on top
    pub fn fetch_config(&self) -> FetchConfig {
        let mut headers: BTreeMap<String, String> = DEFAULT_HEADERS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        headers.extend(self.headers.clone());
        FetchConfig {
            user_agent: self.user_agent.clone(),
            timeout: self.timeout(),
            headers,
        }
    }
}

const DEFAULT_HEADERS: &[(&str, &str)] = &[
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,en;q=0.5"),
    ("Connection", "keep-alive"),
    ("Upgrade-Insecure-Requests", "1"),
    ("Cache-Control", "max-age=0"),
];

fn default_pages() -> Vec<u32> {
    (1..=20).collect()
}

fn default_facet_values() -> Vec<String> {
    ["8", "12", "32"].iter().map(|s| s.to_string()).collect()
}

fn default_sleep_min() -> u64 {
    5
}

fn default_sleep_max() -> u64 {
    8
}

fn default_max_requests() -> usize {
    65
}

fn default_user_agent() -> String {
    String::from(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    )
}

fn default_timeout() -> u64 {
    30
}

fn default_output_path() -> PathBuf {
    PathBuf::from("data/laptops.csv")
}

fn default_concurrency() -> usize {
    1
}

fn default_handle_sigint() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Backend {
    /// Plain HTTP GET
    #[default]
    Http,
    /// Headless Chromium dumping the DOM once page scripts ran
    Chrome {
        binary: PathBuf,
        /// Seconds granted to page scripts before the DOM is dumped
        #[serde(default = "default_render_wait")]
        wait: u64,
    },
}

pub fn default_render_wait() -> u64 {
    15
}
