mod fields;
mod listing;
mod locator;
mod normalize;
mod profile;
mod record;
pub mod writer;

pub use fields::FieldExtractor;
pub use listing::{scrap_glob, scrap_page, ListingScraper, ScraperConfig};
pub use locator::{ContainerLocator, ItemFragment, SelectorError, StrategyMatch};
pub use normalize::{normalize_count, normalize_price, normalize_record, FormatError};
pub use profile::{FieldRule, ListingSelectors, MarkupProfile, RatingRule, RatingScale};
pub use record::{CleanRecord, RawCount, RawRecord};

pub use anyhow;
