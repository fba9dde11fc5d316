//! Selector sets for the markup generations of the catalog.
//!
//! Every list is ranked, the first strategy yielding something wins. Class
//! names of the current generation carry build hashes (`productItemName_3IZ3c`)
//! so they are matched on their stable prefix.

use serde::{Deserialize, Serialize};
use shelf_crawler::SiteGeneration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum MarkupProfile {
    /// Script-rendered listing with schema.org product microdata
    #[default]
    Current,
    /// Server-rendered `.aspx` listing
    Legacy,
}

impl MarkupProfile {
    pub fn selectors(self) -> ListingSelectors {
        match self {
            Self::Current => current(),
            Self::Legacy => legacy(),
        }
    }
}

impl From<SiteGeneration> for MarkupProfile {
    fn from(generation: SiteGeneration) -> Self {
        match generation {
            SiteGeneration::Current => Self::Current,
            SiteGeneration::Legacy => Self::Legacy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingSelectors {
    /// Item container selectors, primary first
    pub containers: Vec<String>,
    pub name: Vec<FieldRule>,
    pub price: Vec<FieldRule>,
    pub rating: RatingRule,
}

/// How a single value is read out of an item fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum FieldRule {
    /// Whitespace-collapsed text of the first match
    Text { selector: String },
    /// Attribute of the first match
    Attr { selector: String, attr: String },
    /// `width` percentage of the first match's inline style
    StyleWidth { selector: String },
}

impl FieldRule {
    pub fn text(selector: &str) -> Self {
        Self::Text {
            selector: selector.to_string(),
        }
    }

    pub fn attr(selector: &str, attr: &str) -> Self {
        Self::Attr {
            selector: selector.to_string(),
            attr: attr.to_string(),
        }
    }

    pub fn style_width(selector: &str) -> Self {
        Self::StyleWidth {
            selector: selector.to_string(),
        }
    }

    pub fn selector(&self) -> &str {
        match self {
            Self::Text { selector } | Self::Attr { selector, .. } | Self::StyleWidth { selector } => {
                selector
            }
        }
    }
}

/// Rating and review count, read together from one sub-element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRule {
    /// Sub-element holding both values, the whole fragment when unset
    #[serde(default)]
    pub scope: Option<String>,
    pub rating: FieldRule,
    pub count: FieldRule,
    #[serde(default)]
    pub scale: RatingScale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RatingScale {
    /// Already a 0-5 star value
    #[default]
    FiveStars,
    /// 0-100 fill percentage of the star bar
    Percent,
}

impl RatingScale {
    pub fn to_stars(self, value: f64) -> f64 {
        let stars = match self {
            Self::FiveStars => value,
            Self::Percent => value / 20.0,
        };
        stars.clamp(0.0, 5.0)
    }
}

fn current() -> ListingSelectors {
    ListingSelectors {
        containers: vec![
            r#"div[itemtype="http://schema.org/Product"]"#.into(),
            r#"div[itemtype*="Product"]"#.into(),
            r#"div[class*="listItem"]"#.into(),
        ],
        name: vec![FieldRule::text(r#"h3[class*="productItemName"]"#)],
        price: vec![
            FieldRule::text(r#"span[class*="screenReaderOnly"]"#),
            FieldRule::text(r#"div[class*="style-module_price"]"#),
        ],
        rating: RatingRule {
            scope: Some(r#"span[class*="reviewCountContainer"]"#.into()),
            rating: FieldRule::attr(r#"meta[itemprop="ratingValue"]"#, "content"),
            count: FieldRule::attr(r#"meta[itemprop="reviewCount"]"#, "content"),
            scale: RatingScale::FiveStars,
        },
    }
}

fn legacy() -> ListingSelectors {
    ListingSelectors {
        containers: vec!["div.item-inner.clearfix".into()],
        name: vec![FieldRule::text("h4 a")],
        price: vec![FieldRule::text("span.amount")],
        rating: RatingRule {
            scope: None,
            rating: FieldRule::style_width("div.rating-stars-yellow"),
            count: FieldRule::text("div.rating-num"),
            scale: RatingScale::Percent,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_scale() {
        assert_eq!(4.0, RatingScale::Percent.to_stars(80.0));
        assert_eq!(5.0, RatingScale::Percent.to_stars(120.0));
        assert_eq!(4.5, RatingScale::FiveStars.to_stars(4.5));
        assert_eq!(0.0, RatingScale::FiveStars.to_stars(-1.0));
    }

    #[test]
    fn profile_follows_generation() {
        assert_eq!(
            MarkupProfile::Legacy,
            MarkupProfile::from(SiteGeneration::Legacy)
        );
        assert_eq!(MarkupProfile::Current, MarkupProfile::default());
    }
}
