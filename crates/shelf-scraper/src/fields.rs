//! Field lookups over an item fragment.
//!
//! A lookup never fails, a missing node, attribute or unreadable value is the
//! field's absence and leaves sibling fields alone.

use scraper::Selector;

use crate::locator::{compile, ItemFragment, SelectorError};
use crate::normalize::try_count;
use crate::profile::{FieldRule, ListingSelectors, RatingRule, RatingScale};
use crate::record::{RawCount, RawRecord};

#[derive(Debug, Clone)]
enum FieldLookup {
    Text(Selector),
    Attr(Selector, String),
    StyleWidth(Selector),
}

impl FieldLookup {
    fn compile(rule: &FieldRule) -> Result<Self, SelectorError> {
        Ok(match rule {
            FieldRule::Text { selector } => Self::Text(compile(selector)?),
            FieldRule::Attr { selector, attr } => Self::Attr(compile(selector)?, attr.clone()),
            FieldRule::StyleWidth { selector } => Self::StyleWidth(compile(selector)?),
        })
    }

    fn lookup(&self, fragment: &ItemFragment<'_>) -> Option<String> {
        let value = match self {
            Self::Text(sel) => fragment.select(sel).next().map(|el| collapse(el.text()))?,
            Self::Attr(sel, attr) => fragment
                .select(sel)
                .next()
                .and_then(|el| el.value().attr(attr))
                .map(|v| v.trim().to_string())?,
            Self::StyleWidth(sel) => fragment
                .select(sel)
                .next()
                .and_then(|el| el.value().attr("style"))
                .and_then(style_width)?,
        };
        (!value.is_empty()).then_some(value)
    }
}

fn collapse<'a>(text: impl Iterator<Item = &'a str>) -> String {
    text.flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `"width: 80%;"` -> `"80"`
fn style_width(style: &str) -> Option<String> {
    style.split(';').find_map(|decl| {
        let (prop, value) = decl.split_once(':')?;
        (prop.trim().eq_ignore_ascii_case("width"))
            .then(|| value.trim().trim_end_matches('%').trim().to_string())
    })
}

/// Ranked lookups for one field, the first non-empty value wins
#[derive(Debug, Clone)]
struct RankedSource {
    field: &'static str,
    strategies: Vec<FieldLookup>,
}

impl RankedSource {
    fn new(field: &'static str, rules: &[FieldRule]) -> Result<Self, SelectorError> {
        if rules.is_empty() {
            return Err(SelectorError::Empty(field));
        }
        let strategies = rules
            .iter()
            .map(FieldLookup::compile)
            .collect::<Result<_, _>>()?;
        Ok(Self { field, strategies })
    }

    fn first_match(&self, fragment: &ItemFragment<'_>) -> Option<String> {
        self.strategies.iter().find_map(|s| s.lookup(fragment))
    }
}

#[derive(Debug, Clone)]
struct RatingSource {
    scope: Option<Selector>,
    rating: FieldLookup,
    count: FieldLookup,
    scale: RatingScale,
}

impl RatingSource {
    fn new(rule: &RatingRule) -> Result<Self, SelectorError> {
        Ok(Self {
            scope: rule.scope.as_deref().map(compile).transpose()?,
            rating: FieldLookup::compile(&rule.rating)?,
            count: FieldLookup::compile(&rule.count)?,
            scale: rule.scale,
        })
    }

    /// Both values or none
    fn lookup(&self, fragment: &ItemFragment<'_>) -> Option<(f64, RawCount)> {
        let scope = match &self.scope {
            Some(sel) => fragment.select(sel).next()?,
            None => *fragment,
        };
        let rating = self.rating.lookup(&scope)?.parse::<f64>().ok()?;
        if !rating.is_finite() {
            return None;
        }
        let count = RawCount::classify(&self.count.lookup(&scope)?);
        try_count(&count)?;
        Some((self.scale.to_stars(rating), count))
    }
}

/// Reads the raw fields of one item fragment
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    name: RankedSource,
    price: RankedSource,
    rating: RatingSource,
}

impl FieldExtractor {
    pub fn new(selectors: &ListingSelectors) -> Result<Self, SelectorError> {
        Ok(Self {
            name: RankedSource::new("name", &selectors.name)?,
            price: RankedSource::new("price", &selectors.price)?,
            rating: RatingSource::new(&selectors.rating)?,
        })
    }

    /// `None` when the name or the price is missing
    pub fn extract(&self, fragment: &ItemFragment<'_>) -> Option<RawRecord> {
        let Some(name) = self.name.first_match(fragment) else {
            log::debug!("Skipping item without {}", self.name.field);
            return None;
        };
        let Some(raw_price) = self.price.first_match(fragment) else {
            log::debug!("Skipping item {name:?} without {}", self.price.field);
            return None;
        };

        let (rating, raw_review_count) = match self.rating.lookup(fragment) {
            Some((rating, count)) => (Some(rating), count),
            None => (None, RawCount::Absent),
        };

        Some(RawRecord {
            name,
            raw_price,
            rating,
            raw_review_count,
        })
    }
}
