//! Cooperative cancellation.

use crate::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type CancelCallback = dyn Fn() -> bool + Send + Sync;

/// Shared cancellation flag polled between layers and pipeline stages.
///
/// Clones observe the same flag. An optional callback is polled as well, so
/// a host application can cancel without holding on to the token.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    callback: Option<Arc<CancelCallback>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that also reports cancellation when `callback` returns `true`.
    pub fn with_callback(callback: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            callback: Some(Arc::new(callback)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.callback.as_ref().is_some_and(|cb| cb())
    }

    /// `Err(Error::Cancelled)` once cancellation was requested.
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.flag.load(Ordering::Relaxed))
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_clones_share_flag() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_callback_is_polled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let token = CancelToken::with_callback(move || counter.fetch_add(1, Ordering::Relaxed) >= 1);
        assert!(token.check().is_ok());
        assert!(token.check().is_err());
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }
}
