//! Observer trait for per-document conversion events.
//!
//! Inject an [`Arc<dyn ConversionObserver>`] via
//! [`crate::config::ConversionConfigBuilder::observer`] to receive events as
//! the orchestrator moves each document through its backends.
//!
//! The library itself only emits `tracing` events inside a per-document
//! span; the observer is the channel for callers that want to react to
//! progress (a terminal progress bar, a web page, a test counter) without
//! installing a global subscriber.
//!
//! # Example
//!
//! ```rust
//! use mdpdfusion::{Backend, ConversionConfig, ConversionObserver};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingObserver {
//!     converted: AtomicUsize,
//! }
//!
//! impl ConversionObserver for CountingObserver {
//!     fn on_document_converted(&self, name: &str, backend: Backend) {
//!         self.converted.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{name} converted by {backend}");
//!     }
//! }
//!
//! let observer = Arc::new(CountingObserver { converted: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .observer(observer as Arc<dyn ConversionObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::Backend;
use std::sync::Arc;

/// Called by the orchestrator and the batch runner as documents progress.
///
/// All methods have default no-op implementations so implementors only
/// override what they care about. Implementations must be `Send + Sync`
/// because the HTTP front end shares one config across requests.
pub trait ConversionObserver: Send + Sync {
    /// Called once before the first document of a batch.
    ///
    /// # Arguments
    /// * `total_documents` — number of uploads in the batch
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called when a document's source has been read and conversion begins.
    fn on_document_start(&self, name: &str) {
        let _ = name;
    }

    /// Called when a backend gave up on a document.
    ///
    /// # Arguments
    /// * `name`    — document file name
    /// * `backend` — the backend that failed
    /// * `reason`  — human-readable description
    fn on_backend_failed(&self, name: &str, backend: Backend, reason: &str) {
        let _ = (name, backend, reason);
    }

    /// Called when a document produced its PDF.
    fn on_document_converted(&self, name: &str, backend: Backend) {
        let _ = (name, backend);
    }

    /// Called when a document produced no PDF (input error or both
    /// backends failed).
    fn on_document_failed(&self, name: &str, message: &str) {
        let _ = (name, message);
    }

    /// Called once after every document of a batch has been attempted.
    ///
    /// # Arguments
    /// * `total_documents` — uploads in the batch
    /// * `converted`       — documents that produced a PDF
    fn on_batch_complete(&self, total_documents: usize, converted: usize) {
        let _ = (total_documents, converted);
    }
}

/// Observer that ignores every event. Used when none is configured.
pub struct NoopObserver;

impl ConversionObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ObserverRef = Arc<dyn ConversionObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingObserver {
        starts: AtomicUsize,
        backend_failures: AtomicUsize,
        converted: AtomicUsize,
        failed: AtomicUsize,
        batch_total: AtomicUsize,
    }

    impl ConversionObserver for TrackingObserver {
        fn on_batch_start(&self, total_documents: usize) {
            self.batch_total.store(total_documents, Ordering::SeqCst);
        }

        fn on_document_start(&self, _name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_backend_failed(&self, _name: &str, _backend: Backend, _reason: &str) {
            self.backend_failures.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_converted(&self, _name: &str, _backend: Backend) {
            self.converted.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_failed(&self, _name: &str, _message: &str) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let obs = NoopObserver;
        obs.on_batch_start(2);
        obs.on_document_start("a.md");
        obs.on_backend_failed("a.md", Backend::External, "pandoc missing");
        obs.on_document_converted("a.md", Backend::Renderer);
        obs.on_document_failed("b.md", "not UTF-8");
        obs.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_observer_receives_events() {
        let tracker = TrackingObserver::default();

        tracker.on_batch_start(3);
        tracker.on_document_start("a.md");
        tracker.on_backend_failed("a.md", Backend::External, "unavailable");
        tracker.on_document_converted("a.md", Backend::Renderer);
        tracker.on_document_start("b.md");
        tracker.on_document_converted("b.md", Backend::External);
        tracker.on_document_failed("c.md", "unreadable");

        assert_eq!(tracker.batch_total.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.backend_failures.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.converted.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.failed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_observer_works() {
        let obs: ObserverRef = Arc::new(NoopObserver);
        obs.on_document_start("notes.md");
        obs.on_document_converted("notes.md", Backend::External);
    }
}
