use std::fmt;
use std::path::PathBuf;

use crate::planner::QuerySpec;
use crate::render::WaitCondition;

pub trait Scrapable {
    type Config: Clone + Send + 'static;
    type Record;

    fn new(config: &Self::Config) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Condition a rendered page must meet before it is handed to `scrap`
    fn ready_check(&self) -> Option<WaitCondition> {
        None
    }

    /// Extracts every record of one page. Must not fail as a whole, markup
    /// problems are reported through the counters of [`Scraped`].
    fn scrap(&self, page: &str, ctx: &ScrapingContext) -> Scraped<Self::Record>;
}

#[derive(Debug)]
pub struct Scraped<R> {
    pub records: Vec<R>,
    /// Item fragments located on the page
    pub containers: usize,
    /// Fragments missing a required field
    pub skipped: usize,
    /// Records whose values couldn't be normalized
    pub dropped: usize,
}

impl<R> Default for Scraped<R> {
    fn default() -> Self {
        Self {
            records: vec![],
            containers: 0,
            skipped: 0,
            dropped: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PageLocation {
    Url(String),
    Path(PathBuf),
}

impl fmt::Display for PageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrapingContext {
    location: PageLocation,
    query: Option<QuerySpec>,
    request: Option<usize>,
}

impl ScrapingContext {
    pub fn with_location(location: PageLocation) -> Self {
        Self {
            location,
            query: None,
            request: None,
        }
    }

    pub fn for_query(query: QuerySpec, request: usize, url: &str) -> Self {
        Self {
            location: PageLocation::Url(url.to_string()),
            query: Some(query),
            request: Some(request),
        }
    }

    pub fn location(&self) -> &PageLocation {
        &self.location
    }

    pub fn query(&self) -> Option<&QuerySpec> {
        self.query.as_ref()
    }

    pub fn request(&self) -> Option<usize> {
        self.request
    }
}
