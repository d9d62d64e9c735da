//! Stage progress on stderr.
//!
//! `scrape` and `sample` dispatch one unit per host or index; on a large
//! database that is thousands of units. [`StageProgress`] draws a
//! `done / total` bar while they run. The bar goes to **stderr** and is
//! only drawn when stderr is a terminal, so piped and logged runs see
//! nothing but the `tracing` output.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const TEMPLATE: &str = "{prefix:>8} [{bar:40.cyan/blue}] {pos}/{len} ({eta})";

/// Counter of finished units for one stage. Cheap to clone; clones share
/// the same bar.
#[derive(Clone)]
pub struct StageProgress {
    bar: ProgressBar,
}

impl std::fmt::Debug for StageProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageProgress")
            .field("position", &self.bar.position())
            .field("length", &self.bar.length())
            .finish()
    }
}

impl StageProgress {
    /// A bar labelled `stage`, drawn on stderr when it is a TTY.
    pub fn stderr(stage: &str, total: u64) -> Self {
        if !atty::is(atty::Stream::Stderr) {
            return Self::hidden(total);
        }
        let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        bar.set_prefix(stage.to_string());
        Self { bar }
    }

    /// Counts units without drawing anything.
    pub fn hidden(total: u64) -> Self {
        Self {
            bar: ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::hidden()),
        }
    }

    /// Guard that records one finished unit when dropped, including when
    /// the unit panics.
    pub fn unit(&self) -> UnitDone {
        UnitDone {
            bar: self.bar.clone(),
        }
    }

    pub fn done(&self) -> u64 {
        self.bar.position()
    }

    pub fn total(&self) -> u64 {
        self.bar.length().unwrap_or(0)
    }

    pub fn finish(&self) {
        self.bar.finish();
    }
}

/// See [`StageProgress::unit`].
pub struct UnitDone {
    bar: ProgressBar,
}

impl Drop for UnitDone {
    fn drop(&mut self) {
        self.bar.inc(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_count_on_drop() {
        let progress = StageProgress::hidden(3);
        {
            let _a = progress.unit();
            let _b = progress.unit();
            assert_eq!(progress.done(), 0);
        }
        assert_eq!(progress.done(), 2);
        assert_eq!(progress.total(), 3);
    }

    #[test]
    fn clones_share_the_count() {
        let progress = StageProgress::hidden(2);
        let other = progress.clone();
        drop(other.unit());
        assert_eq!(progress.done(), 1);
    }
}
