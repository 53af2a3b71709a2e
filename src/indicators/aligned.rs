// =============================================================================
// AlignedSeries — indicator output tagged with its position in the input
// =============================================================================
//
// Indicators truncate their input differently (EMA-12 starts at index 11,
// EMA-26 at index 25, the MACD signal line later still). Each output carries
// `start`, the input index of its first value, so series are combined by
// absolute index instead of hand-computed slice offsets.
// =============================================================================

/// A series of values where `values[0]` corresponds to input index `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSeries {
    start: usize,
    values: Vec<f64>,
}

impl AlignedSeries {
    pub fn new(start: usize, values: Vec<f64>) -> Self {
        Self { start, values }
    }

    /// Input index of the first value.
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the input index of the last value.
    pub fn end(&self) -> usize {
        self.start + self.values.len()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Combine two series elementwise over their overlapping index range.
    ///
    /// The result starts at `max(starts)` and ends at `min(ends)`; it is
    /// empty when the ranges do not overlap.
    pub fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        let start = self.start.max(other.start);
        let end = self.end().min(other.end());
        if end <= start {
            return Self::new(start, Vec::new());
        }
        let a = &self.values[start - self.start..end - self.start];
        let b = &other.values[start - other.start..end - other.start];
        let values = a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect();
        Self { start, values }
    }
}
