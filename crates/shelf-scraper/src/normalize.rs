use thiserror::Error;

use crate::record::{CleanRecord, RawCount, RawRecord};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Price `{0}` is not numeric")]
    NotNumeric(String),

    #[error("Price `{0}` is negative or not finite")]
    OutOfRange(String),
}

/// Parses a displayed price such as `$1,234.56`.
///
/// Thousands separators are removed, then a single leading currency symbol.
/// A price already starting with a digit is parsed as is.
pub fn normalize_price(raw: &str) -> Result<f64, FormatError> {
    let stripped = raw.trim().replace(',', "");
    let mut chars = stripped.chars();
    let amount = match chars.next() {
        Some(c) if !c.is_ascii_digit() && c != '-' && c != '+' && c != '.' => chars.as_str(),
        _ => stripped.as_str(),
    };

    let price = amount
        .trim()
        .parse::<f64>()
        .map_err(|_| FormatError::NotNumeric(raw.to_string()))?;
    if !price.is_finite() || price < 0.0 {
        return Err(FormatError::OutOfRange(raw.to_string()));
    }
    Ok(price)
}

/// Never fails, anything unreadable counts as zero
pub fn normalize_count(raw: &RawCount) -> u64 {
    try_count(raw).unwrap_or(0)
}

/// `None` when the count is absent or unreadable
pub(crate) fn try_count(raw: &RawCount) -> Option<u64> {
    match raw {
        RawCount::Numeric(n) => n.is_finite().then(|| count_from_float(*n)),
        RawCount::Parenthesized(s) => {
            let s = s.trim();
            parse_count(
                s.strip_prefix('(')
                    .and_then(|s| s.strip_suffix(')'))
                    .unwrap_or(s),
            )
        }
        RawCount::Plain(s) => parse_count(s),
        RawCount::Absent => None,
    }
}

// Negative counts clamp to zero
fn count_from_float(n: f64) -> u64 {
    if n > 0.0 {
        n.round() as u64
    } else {
        0
    }
}

fn parse_count(s: &str) -> Option<u64> {
    let s = s.trim().replace(',', "");
    match s.parse::<u64>() {
        Ok(n) => Some(n),
        Err(_) => s
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(count_from_float),
    }
}

pub fn normalize_record(raw: RawRecord) -> Result<CleanRecord, FormatError> {
    let price = normalize_price(&raw.raw_price)?;
    Ok(CleanRecord {
        name: raw.name,
        price,
        rating: raw.rating.unwrap_or(0.0),
        review_count: normalize_count(&raw.raw_review_count),
    })
}
