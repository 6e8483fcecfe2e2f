//! Cooperative cancellation for walks and materialization.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Returned when a cancellation signal or deadline was observed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Shared cancellation flag with an optional deadline.
///
/// Clones observe the same flag. Checked between page fetches and before each
/// write; archiving is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel automatically once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_clones_share_flag() {
        let cancel = Cancellation::new();
        let observer = cancel.clone();
        assert!(observer.check().is_ok());

        cancel.cancel();
        assert_eq!(observer.check(), Err(Cancelled));
    }

    #[test]
    fn test_deadline_in_the_past_cancels() {
        let past = Instant::now() - Duration::from_millis(1);
        let cancel = Cancellation::new().with_deadline(past);
        assert!(cancel.is_cancelled());

        let future = Instant::now() + Duration::from_secs(3600);
        assert!(!Cancellation::new().with_deadline(future).is_cancelled());
    }
}
