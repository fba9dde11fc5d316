mod budget;
mod config;
mod crawler;
mod fetch;
mod pacing;
mod planner;
mod render;
mod scrapable;

pub use budget::{CrawlBudget, CrawlClock, StopHandle};
pub use config::{default_render_wait, Backend, CrawlerConfig};
pub use crawler::{crawl_catalog, crawl_site, fetcher_for, CrawlReport, CrawlState, Dataset};
pub use fetch::{Fetch, FetchConfig, FetchResult, FetchStatus, HttpFetcher, TransportKind};
pub use pacing::{FixedDelay, NoDelay, Pacing, RandomDelay};
pub use planner::{CatalogTarget, FilterTerm, Plan, QueryPlanner, QuerySpec, SiteGeneration};
pub use render::{ChromeRenderer, RenderedFetcher, Renderer, WaitCondition};
pub use scrapable::{PageLocation, Scrapable, Scraped, ScrapingContext};

pub use anyhow;
pub use async_trait::async_trait;
