use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

/// One catalog entry inside a parsed page, cannot outlive the document
pub type ItemFragment<'a> = ElementRef<'a>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("Invalid selector `{selector}`: {reason}")]
    Invalid { selector: String, reason: String },

    #[error("No {0} selector configured")]
    Empty(&'static str),
}

pub(crate) fn compile(selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|e| SelectorError::Invalid {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Clone)]
struct Strategy {
    source: String,
    selector: Selector,
}

/// Number of nodes one container strategy matches on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyMatch {
    pub selector: String,
    pub count: usize,
}

/// Finds item containers with ranked selectors, a fallback is only tried
/// when every strategy before it matched nothing.
#[derive(Debug, Clone)]
pub struct ContainerLocator {
    strategies: Vec<Strategy>,
}

impl ContainerLocator {
    pub fn new<S: AsRef<str>>(selectors: &[S]) -> Result<Self, SelectorError> {
        if selectors.is_empty() {
            return Err(SelectorError::Empty("container"));
        }
        let strategies = selectors
            .iter()
            .map(|s| {
                let source = s.as_ref();
                Ok(Strategy {
                    source: source.to_string(),
                    selector: compile(source)?,
                })
            })
            .collect::<Result<Vec<_>, SelectorError>>()?;
        Ok(Self { strategies })
    }

    pub fn locate<'a>(&self, document: &'a Html) -> Vec<ItemFragment<'a>> {
        for (rank, strategy) in self.strategies.iter().enumerate() {
            let fragments = document.select(&strategy.selector).collect::<Vec<_>>();
            if !fragments.is_empty() {
                if rank > 0 {
                    log::debug!(
                        "Primary container selector matched nothing, using fallback `{}`",
                        strategy.source
                    );
                }
                return fragments;
            }
        }
        vec![]
    }

    /// Match count of every strategy, fallbacks included
    pub fn inspect(&self, document: &Html) -> Vec<StrategyMatch> {
        self.strategies
            .iter()
            .map(|s| StrategyMatch {
                selector: s.source.clone(),
                count: document.select(&s.selector).count(),
            })
            .collect()
    }

    pub fn is_present(&self, page: &str) -> bool {
        let document = Html::parse_document(page);
        self.strategies
            .iter()
            .any(|s| document.select(&s.selector).next().is_some())
    }

    pub fn primary(&self) -> &str {
        // Non-empty, checked at construction
        self.strategies
            .first()
            .map(|s| s.source.as_str())
            .unwrap_or_default()
    }
}
