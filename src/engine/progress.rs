//! Progress bar utilities for displaying generation status

use kdam::{Animation, Bar, BarExt};
use std::sync::{Arc, Mutex};

use crate::pipeline::Progress;

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Configuration for creating a progress bar
pub struct ProgressBarConfig {
    pub total: usize,
    pub desc: &'static str,
    pub animation: Animation,
}

impl ProgressBarConfig {
    /// Create a new progress bar configuration
    pub fn new(total: usize, desc: &'static str, animation: Animation) -> Self {
        Self {
            total,
            desc,
            animation,
        }
    }
}

/// Create a progress bar with the given configuration
pub fn create_progress_bar(config: ProgressBarConfig) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = config.total,
        desc = config.desc,
        animation = config.animation,
        unit = " codes"
    )))
}

/// Advance the bar by `n`. Skips the update if the mutex is contended.
pub fn update_progress_bar(pb: &ProgressBar, n: usize) {
    if let Ok(mut pb) = pb.try_lock() {
        let _ = pb.update(n);
    }
}

/// Force a refresh of the bar and end its line.
pub fn finish_bar(pb: &ProgressBar) {
    if let Ok(mut bar) = pb.lock() {
        let _ = bar.refresh();
        eprintln!();
    }
}

/// Chunk hook that moves `bar` to each reported `current` and logs an ETA at debug level.
pub fn progress_hook(bar: Option<ProgressBar>) -> impl FnMut(&Progress) {
    let mut shown = 0_usize;
    move |p: &Progress| {
        if let Some(ref bar) = bar
            && p.current > shown
        {
            update_progress_bar(bar, p.current - shown);
        }
        shown = shown.max(p.current);
        match p.remaining_secs() {
            Some(eta) => log::debug!(
                "{}/{} ({:.0}%), {:.1}/s, ~{}s left",
                p.current,
                p.total,
                p.percent(),
                p.throughput(),
                eta
            ),
            None => log::debug!("{}/{}", p.current, p.total),
        }
    }
}
