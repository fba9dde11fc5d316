use serde::{Deserialize, Serialize};

/// Review count as found in the markup. Generations disagree on the format:
/// `content="123"` on a meta tag, `(123)` as visible text.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RawCount {
    Numeric(f64),
    Parenthesized(String),
    Plain(String),
    #[default]
    Absent,
}

impl RawCount {
    pub fn classify(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            Self::Absent
        } else if raw.len() >= 2 && raw.starts_with('(') && raw.ends_with(')') {
            Self::Parenthesized(raw.to_string())
        } else {
            Self::Plain(raw.to_string())
        }
    }
}

impl From<&str> for RawCount {
    fn from(raw: &str) -> Self {
        Self::classify(raw)
    }
}

impl From<f64> for RawCount {
    fn from(n: f64) -> Self {
        Self::Numeric(n)
    }
}

impl From<u64> for RawCount {
    fn from(n: u64) -> Self {
        Self::Numeric(n as f64)
    }
}

impl<T: Into<RawCount>> From<Option<T>> for RawCount {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Self::Absent)
    }
}

/// Field values of one item before normalization
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub name: String,
    pub raw_price: String,
    pub rating: Option<f64>,
    pub raw_review_count: RawCount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanRecord {
    #[serde(rename = "laptops")]
    pub name: String,
    #[serde(rename = "prices")]
    pub price: f64,
    #[serde(rename = "ratings")]
    pub rating: f64,
    #[serde(rename = "votes")]
    pub review_count: u64,
}
