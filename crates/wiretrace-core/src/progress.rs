//! Coarse progress reporting for long-running computations.
//!
//! Only the cost-field computation is slow enough to need a progress
//! indicator. It reports through the [`Progress`] trait so a host UI can
//! show a bar, while headless callers pass [`NoProgress`].

/// Receiver for progress updates.
pub trait Progress {
    /// Overall completed fraction in `[0, 1]`.
    fn report(&mut self, fraction: f64);

    /// Short human-readable description of the current phase.
    fn status(&mut self, _message: &str) {}
}

/// Discards all progress updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn report(&mut self, _fraction: f64) {}
}

/// Maps the `[0, 1]` progress of a sub-task onto `[start, end]` of its
/// parent.
pub struct SubRange<'a> {
    parent: &'a mut dyn Progress,
    start: f64,
    end: f64,
}

impl<'a> SubRange<'a> {
    /// Wrap `parent` so that sub-task progress lands in `[start, end]`.
    pub fn new(parent: &'a mut dyn Progress, start: f64, end: f64) -> Self {
        Self { parent, start, end }
    }
}

impl Progress for SubRange<'_> {
    fn report(&mut self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        self.parent
            .report((self.end - self.start).mul_add(fraction, self.start));
    }

    fn status(&mut self, message: &str) {
        self.parent.status(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<f64>);

    impl Progress for Recorder {
        fn report(&mut self, fraction: f64) {
            self.0.push(fraction);
        }
    }

    #[test]
    fn sub_range_maps_into_parent_interval() {
        let mut recorder = Recorder::default();
        {
            let mut sub = SubRange::new(&mut recorder, 0.3, 0.6);
            sub.report(0.0);
            sub.report(0.5);
            sub.report(1.0);
            sub.report(2.0);
        }
        let expected = [0.3, 0.45, 0.6, 0.6];
        assert_eq!(recorder.0.len(), expected.len());
        for (got, want) in recorder.0.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "got {got}, want {want}");
        }
    }
}
