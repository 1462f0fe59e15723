//! Progress reporting and cooperative cancellation shared across a whole operation.

use crate::errors::CsgError;
use crate::float_types::Real;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A phase label plus overall completion in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressStatus {
    pub status: String,
    pub progress_0_to_1: Real,
}

/// Sink for progress notifications.
///
/// Any `Fn(&ProgressStatus)` closure is a reporter. Pass `None` to discard progress.
pub trait ProgressReporter {
    fn report(&self, status: &ProgressStatus);
}

impl<F: Fn(&ProgressStatus)> ProgressReporter for F {
    fn report(&self, status: &ProgressStatus) {
        self(status)
    }
}

/// Owns the shared [`ProgressStatus`] of one multi-step operation and keeps
/// the reported fraction from ever moving backwards.
pub struct ProgressTracker<'a> {
    reporter: Option<&'a dyn ProgressReporter>,
    status: ProgressStatus,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(reporter: Option<&'a dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            status: ProgressStatus::default(),
        }
    }

    /// Overall fraction reported so far
    pub fn fraction(&self) -> Real {
        self.status.progress_0_to_1
    }

    /// Report `fraction` of the whole operation under `label`.
    pub fn report(&mut self, label: &str, fraction: Real) {
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        self.status.progress_0_to_1 = self.status.progress_0_to_1.max(fraction);
        if self.status.status != label {
            self.status.status.clear();
            self.status.status.push_str(label);
        }
        if let Some(reporter) = self.reporter {
            reporter.report(&self.status);
        }
    }

    /// Report a step-local fraction rescaled into `[start, start + span]`.
    pub fn report_window(&mut self, label: &str, start: Real, span: Real, local: Real) {
        self.report(label, start + local.clamp(0.0, 1.0) * span);
    }
}

/// Shared cancellation flag checked at well-defined checkpoints.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(CsgError::Cancelled)` once [`cancel`](Self::cancel) has been called.
    #[inline]
    pub fn check(&self) -> Result<(), CsgError> {
        if self.is_cancelled() {
            Err(CsgError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn fraction_never_decreases() {
        let seen = RefCell::new(Vec::new());
        let sink = |s: &ProgressStatus| seen.borrow_mut().push(s.progress_0_to_1);
        let mut tracker = ProgressTracker::new(Some(&sink));
        tracker.report("a", 0.5);
        tracker.report("b", 0.2);
        tracker.report_window("c", 0.5, 0.5, 0.5);
        tracker.report("d", 7.0);
        assert_eq!(*seen.borrow(), vec![0.5, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn clones_share_cancellation() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(token.check().is_ok());
        other.cancel();
        assert!(matches!(token.check(), Err(CsgError::Cancelled)));
    }
}
