//! Bucket definitions: ordered half-open numeric intervals with labels.
//!
//! Intervals are left-inclusive, `[lo, hi)`. A value outside every
//! interval has no label.

use color_eyre::eyre::eyre;
use color_eyre::Result;

/// Width of the age brackets.
pub const AGE_BIN_WIDTH: i64 = 10;

/// Week-of-month edges: days 1-7, 8-14, 15-21 and 22-31. The last edge is a
/// fixed cutoff for months of at most 31 days.
pub const WEEK_OF_MONTH_EDGES: [i64; 5] = [1, 8, 15, 22, 32];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketDefinition {
    edges: Vec<i64>,
    labels: Vec<String>,
}

impl BucketDefinition {
    /// Explicit edges and labels; `labels.len()` must be `edges.len() - 1`.
    pub fn from_edges(edges: Vec<i64>, labels: Vec<String>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(eyre!("bucket definition needs at least two edges"));
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(eyre!("bucket edges must be strictly increasing: {:?}", edges));
        }
        if labels.len() != edges.len() - 1 {
            return Err(eyre!(
                "{} bucket labels for {} intervals",
                labels.len(),
                edges.len() - 1
            ));
        }
        Ok(Self { edges, labels })
    }

    /// Contiguous `width`-wide intervals from 0 until the last one contains
    /// `max`. Labels read `"{lo}-{lo + width - 1}"`.
    pub fn fixed_width(max: i64, width: i64) -> Result<Self> {
        if width <= 0 {
            return Err(eyre!("bucket width must be positive, got {}", width));
        }
        let max = max.max(0);
        let count = max / width + 1;
        let edges: Vec<i64> = (0..=count).map(|i| i * width).collect();
        let labels = edges
            .windows(2)
            .map(|w| format!("{}-{}", w[0], w[1] - 1))
            .collect();
        Self::from_edges(edges, labels)
    }

    /// Age brackets covering `[0, max_age]`.
    pub fn age_groups(max_age: i64) -> Result<Self> {
        Self::fixed_width(max_age, AGE_BIN_WIDTH)
    }

    /// Week-of-month buckets labelled `1` to `4`.
    pub fn week_of_month() -> Self {
        Self {
            edges: WEEK_OF_MONTH_EDGES.to_vec(),
            labels: (1..WEEK_OF_MONTH_EDGES.len())
                .map(|w| w.to_string())
                .collect(),
        }
    }

    pub fn edges(&self) -> &[i64] {
        &self.edges
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Index of the interval containing `value`.
    pub fn index_of(&self, value: i64) -> Option<usize> {
        if value < self.edges[0] || value >= self.edges[self.edges.len() - 1] {
            return None;
        }
        // First edge strictly greater than value closes its interval.
        let upper = self.edges.partition_point(|&e| e <= value);
        Some(upper - 1)
    }

    pub fn assign(&self, value: i64) -> Option<&str> {
        self.index_of(value).map(|i| self.labels[i].as_str())
    }
}
