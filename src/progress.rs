//! In-process progress reporting.
//!
//! The engine publishes monotonically non-decreasing counters on a watch
//! channel; any front-end (CLI progress bar, GUI) consumes snapshots
//! directly instead of scraping another surface's text output.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;

/// Point-in-time view of run progress.
///
/// Chapter counters track chapters that reached a terminal state; image
/// counters track images that reached a terminal state (fetched or failed)
/// across all chapters. Totals only ever grow as page lists resolve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Chapters in a terminal per-chapter state.
    pub chapters_done: usize,
    /// Total selected chapters.
    pub chapters_total: usize,
    /// Images that reached a terminal state.
    pub images_done: usize,
    /// Total images across all resolved page lists so far.
    pub images_total: usize,
}

/// Thread-safe progress counters shared by all chapter workers.
///
/// Counters are atomics so workers update without locking; every update
/// publishes a fresh snapshot to the watch channel.
#[derive(Debug)]
pub struct ProgressTracker {
    chapters_done: AtomicUsize,
    chapters_total: AtomicUsize,
    images_done: AtomicUsize,
    images_total: AtomicUsize,
    tx: watch::Sender<ProgressSnapshot>,
}

impl ProgressTracker {
    /// Creates a tracker and the receiver half of its snapshot stream.
    #[must_use]
    pub fn new() -> (Arc<Self>, watch::Receiver<ProgressSnapshot>) {
        let (tx, rx) = watch::channel(ProgressSnapshot::default());
        (
            Arc::new(Self {
                chapters_done: AtomicUsize::new(0),
                chapters_total: AtomicUsize::new(0),
                images_done: AtomicUsize::new(0),
                images_total: AtomicUsize::new(0),
                tx,
            }),
            rx,
        )
    }

    /// Records the number of selected chapters. Called once after selection.
    pub fn set_chapters_total(&self, total: usize) {
        self.chapters_total.store(total, Ordering::SeqCst);
        self.publish();
    }

    /// Adds a resolved page list's image count to the total.
    pub fn add_images_total(&self, count: usize) {
        self.images_total.fetch_add(count, Ordering::SeqCst);
        self.publish();
    }

    /// Records one image reaching a terminal state.
    pub fn image_done(&self) {
        self.images_done.fetch_add(1, Ordering::SeqCst);
        self.publish();
    }

    /// Records one chapter reaching a terminal state.
    pub fn chapter_done(&self) {
        self.chapters_done.fetch_add(1, Ordering::SeqCst);
        self.publish();
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            chapters_done: self.chapters_done.load(Ordering::SeqCst),
            chapters_total: self.chapters_total.load(Ordering::SeqCst),
            images_done: self.images_done.load(Ordering::SeqCst),
            images_total: self.images_total.load(Ordering::SeqCst),
        }
    }

    fn publish(&self) {
        // Receivers may be gone (e.g. headless runs); that's fine.
        let _ = self.tx.send(self.snapshot());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let (tracker, _rx) = ProgressTracker::new();
        tracker.set_chapters_total(3);
        tracker.add_images_total(10);
        tracker.add_images_total(5);
        tracker.image_done();
        tracker.image_done();
        tracker.chapter_done();

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.chapters_total, 3);
        assert_eq!(snapshot.images_total, 15);
        assert_eq!(snapshot.images_done, 2);
        assert_eq!(snapshot.chapters_done, 1);
    }

    #[tokio::test]
    async fn test_watch_channel_sees_updates() {
        let (tracker, mut rx) = ProgressTracker::new();
        tracker.set_chapters_total(2);

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().chapters_total, 2);

        tracker.chapter_done();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().chapters_done, 1);
    }

    #[test]
    fn test_publish_without_receivers_does_not_panic() {
        let (tracker, rx) = ProgressTracker::new();
        drop(rx);
        tracker.image_done();
    }

    #[test]
    fn test_counters_thread_safe() {
        use std::thread;

        let (tracker, _rx) = ProgressTracker::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let tracker = Arc::clone(&tracker);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    tracker.image_done();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.snapshot().images_done, 800);
    }
}
