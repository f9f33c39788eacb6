use log::{log_enabled, Level};
use std::time::{Duration, Instant};

/// Scoped timer that traces how long a narrow-phase or reporting pass took.
pub struct ScopedTimer<'a> {
    label: &'a str,
    items: usize,
    start: Instant,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(label: &'a str) -> Self {
        Self::with_items(label, 0)
    }

    /// Timer for a batch of `items` units of work (pairs, manifolds).
    pub fn with_items(label: &'a str, items: usize) -> Self {
        if log_enabled!(Level::Trace) {
            log::trace!("⏱️ start {label} ({items} items)");
        }
        Self {
            label,
            items,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        if log_enabled!(Level::Trace) {
            let elapsed = self.start.elapsed();
            log::trace!(
                "⏱️ end {} ({} items, {} µs)",
                self.label,
                self.items,
                elapsed.as_micros()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_measures_forward() {
        let timer = ScopedTimer::with_items("test", 3);
        let first = timer.elapsed();
        assert!(timer.elapsed() >= first);
    }

    #[test]
    fn plain_timer_counts_no_items() {
        let timer = ScopedTimer::new("cook");
        assert_eq!(timer.items, 0);
        assert_eq!(timer.label, "cook");
    }
}
