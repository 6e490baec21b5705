//! Step-count callbacks for multi-step operations.
//!
//! Animation baking solves one deformation per frame and calls
//! [`Progress::report`] after each.
//!
//! # Example
//!
//! ```
//! use ductile::algo::progress::Progress;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&seen);
//! let progress = Progress::new(move |done, total, _step| {
//!     assert!(done <= total);
//!     counter.fetch_add(1, Ordering::Relaxed);
//! });
//!
//! progress.report(1, 2, "frame 1");
//! assert_eq!(seen.load(Ordering::Relaxed), 1);
//! ```

type Callback = dyn Fn(usize, usize, &str) + Send + Sync;

/// Receives `(steps done, total steps, label of the finished step)`.
pub struct Progress {
    sink: Box<Callback>,
}

impl Progress {
    /// Wrap a closure.
    pub fn new<F>(sink: F) -> Self
    where
        F: Fn(usize, usize, &str) + Send + Sync + 'static,
    {
        Self { sink: Box::new(sink) }
    }

    /// Forward one update to the closure.
    #[inline]
    pub fn report(&self, done: usize, total: usize, step: &str) {
        (self.sink)(done, total, step);
    }

    /// Send every update to `log::info!`.
    pub fn logging() -> Self {
        Self::new(|done, total, step| log::info!("[{}/{}] {}", done, total, step))
    }

    /// Drop every update.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Progress")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_report_forwards_arguments() {
        let log = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&log);
        let progress = Progress::new(move |done, total, step| {
            sink.lock().unwrap().push((done, total, step.to_string()));
        });
        progress.report(1, 3, "frame 1");
        progress.report(3, 3, "frame 3");
        assert_eq!(
            *log.lock().unwrap(),
            vec![(1, 3, "frame 1".to_string()), (3, 3, "frame 3".to_string())]
        );
    }

    #[test]
    fn test_builtin_sinks_accept_updates() {
        Progress::none().report(0, 0, "");
        Progress::logging().report(1, 1, "done");
        assert_eq!(format!("{:?}", Progress::default()), "Progress");
    }
}
