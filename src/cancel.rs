// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::sync::{atomic::AtomicBool, Arc};

/// Cooperative cancellation signal shared between a caller and an operation.
///
/// Operations consult the token before each file access and between bulk
/// items; they never abort I/O that is already in flight.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Requests cancellation.
    ///
    /// Operations observe the request at their next checkpoint.
    pub fn cancel(&self) {
        self.0.store(true, std::sync::atomic::Ordering::Release);
    }

    /// Returns `true` if cancellation was requested.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::Acquire)
    }

    /// Fails with [`crate::Error::Canceled`] once cancellation was requested.
    pub fn checkpoint(&self) -> crate::Result<()> {
        if self.is_canceled() {
            Err(crate::Error::Canceled)
        } else {
            Ok(())
        }
    }
}
