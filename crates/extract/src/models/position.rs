use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A work's position within a series.
///
/// Positions are ordered and may be fractional (novellas set between two main
/// books are commonly numbered `2.5`). Only finite, non-negative values are
/// representable, which lets the type be totally ordered and hashable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SeriesPosition(f64);

impl SeriesPosition {
    pub fn new(value: f64) -> Option<Self> {
        // `+ 0.0` folds negative zero into positive zero.
        (value.is_finite() && value >= 0.0).then_some(Self(value + 0.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Parse a raw tag or filename value.
    ///
    /// Accepts surrounding whitespace, a leading `#` and a trailing `/total`
    /// (`"3/12"` is position 3). Anything else that isn't a number, such as
    /// `"Bonus"`, isn't a position.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().trim_start_matches('#').trim();
        let raw = raw.split_once('/').map_or(raw, |(position, _total)| position.trim());
        raw.parse::<f64>().ok().and_then(Self::new)
    }
}
impl PartialEq for SeriesPosition {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for SeriesPosition {}
impl Ord for SeriesPosition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}
impl PartialOrd for SeriesPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Hash for SeriesPosition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state)
    }
}
/// Whole numbers render without a fractional part: `1`, `2.5`.
impl Display for SeriesPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}
impl FromStr for SeriesPosition {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("not a series position: {s:?}"))
    }
}
impl TryFrom<f64> for SeriesPosition {
    type Error = String;
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("not a series position: {value}"))
    }
}
impl From<SeriesPosition> for f64 {
    fn from(position: SeriesPosition) -> Self {
        position.0
    }
}
