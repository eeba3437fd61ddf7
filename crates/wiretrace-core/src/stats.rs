//! Summary statistics over a growable sample buffer.

/// Collected samples, e.g. tracing lengths or intensities along a path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueStats {
    values: Vec<f64>,
}

/// Descriptive statistics of a [`ValueStats`] buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    /// Number of samples.
    pub count: usize,
    /// Sum of all samples.
    pub sum: f64,
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample standard deviation (divides by `count - 1`); zero for
    /// fewer than two samples.
    pub sd: f64,
    /// Smallest sample.
    pub min: f64,
    /// Largest sample.
    pub max: f64,
}

impl ValueStats {
    /// An empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Add one sample.
    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no samples were added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The raw samples.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Drop all samples.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Statistics of the current samples; all zero when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn summary(&self) -> Summary {
        let count = self.values.len();
        if count == 0 {
            return Summary::default();
        }
        let sum: f64 = self.values.iter().sum();
        let mean = sum / count as f64;
        let (min, max) = self
            .values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let sd = if count > 1 {
            let squares: f64 = self.values.iter().map(|v| (v - mean) * (v - mean)).sum();
            (squares / (count - 1) as f64).sqrt()
        } else {
            0.0
        };
        Summary {
            count,
            sum,
            mean,
            sd,
            min,
            max,
        }
    }
}

impl Extend<f64> for ValueStats {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        self.values.extend(iter);
    }
}
