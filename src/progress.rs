//! Progress reporting and cooperative cancellation.
//!
//! Long-running loops (one iteration per taxon in the decomposer, one batch of
//! annealing moves in the orderer) poll a [`Progress`] implementation. The data
//! model itself never holds a callback; observers are passed in by the caller.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{DecompositionError, Result};

/// Sink for progress updates and source of cancellation requests.
pub trait Progress {
    /// Reports that `done` out of `total` units of work are finished.
    fn report(&mut self, _done: usize, _total: usize) {}

    /// Returns true once the caller asked to stop.
    fn is_cancelled(&self) -> bool {
        false
    }

    /// Converts a pending cancellation into [`DecompositionError::Cancelled`].
    fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(DecompositionError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Ignores updates and never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Default, Clone)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl Progress for CancellationToken {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Forwards updates to a closure, optionally paired with a cancellation token.
pub struct CallbackProgress<F: FnMut(usize, usize)> {
    callback: F,
    token: Option<CancellationToken>,
}

impl<F: FnMut(usize, usize)> CallbackProgress<F> {
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            token: None,
        }
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }
}

impl<F: FnMut(usize, usize)> Progress for CallbackProgress<F> {
    fn report(&mut self, done: usize, total: usize) {
        (self.callback)(done, total);
    }

    fn is_cancelled(&self) -> bool {
        self.token.as_ref().is_some_and(|t| t.is_cancelled())
    }
}
