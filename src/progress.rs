//! Request progress shared between the download pipeline and the front end.
//!
//! The pipeline publishes into a `watch` channel; whoever renders progress only
//! ever sees the most recent value, so a slow consumer never backs up a
//! download.

use tokio::sync::watch;

/// Pipeline stage shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    GettingInfo,
    Downloading,
    Sending,
}

impl Stage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GettingInfo => "getting_info",
            Self::Downloading => "downloading",
            Self::Sending => "sending",
        }
    }
}

/// Snapshot of a request's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub stage: Stage,
    /// Percentage in `0..=100`.
    pub percent: u8,
}

impl Progress {
    #[must_use]
    pub fn new(stage: Stage, percent: u8) -> Self {
        Self {
            stage,
            percent: percent.min(100),
        }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new(Stage::GettingInfo, 0)
    }
}

/// Publishing half of a progress channel.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: watch::Sender<Progress>,
}

impl ProgressReporter {
    /// Create a reporter and the receiver that observes it.
    #[must_use]
    pub fn channel() -> (Self, watch::Receiver<Progress>) {
        let (tx, rx) = watch::channel(Progress::default());
        (Self { tx }, rx)
    }

    /// Reporter whose updates go nowhere.
    #[must_use]
    pub fn detached() -> Self {
        Self::channel().0
    }

    /// Publish a new value. Unchanged values do not wake receivers.
    pub fn report(&self, stage: Stage, percent: u8) {
        let next = Progress::new(stage, percent);
        self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    /// Map a fraction of work done onto `start..=end` percent of a stage.
    pub fn report_fraction(&self, stage: Stage, done: u64, total: u64, start: u8, end: u8) {
        if total == 0 {
            return;
        }
        let span = u64::from(end.saturating_sub(start));
        let scaled = done.min(total) * span / total;
        self.report(stage, start.saturating_add(scaled as u8));
    }

    #[must_use]
    pub fn current(&self) -> Progress {
        *self.tx.borrow()
    }
}
