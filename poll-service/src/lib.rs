//! The polling driver: fetch a timeline, archive what is new, sleep, repeat.

use archive_store::ArchiveStore;
use archiver_core::{CoreError, Fetcher, PersistOutcome, PollConfig};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Blocks the driver between cycles. Swapped out in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Fetching,
    Sleeping,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub written: usize,
    pub skipped: usize,
}

impl CycleReport {
    /// True when a full batch came back and none of it had been seen before.
    ///
    /// Without a cursor that is the only hint that older posts scrolled past
    /// the fetch window between cycles.
    pub fn may_have_missed(&self, limit: u32) -> bool {
        self.fetched > 0 && self.fetched >= limit as usize && self.written == self.fetched
    }
}

pub struct Poller<F, S = TokioSleeper> {
    config: PollConfig,
    fetcher: F,
    store: ArchiveStore,
    sleeper: S,
    phase: PollPhase,
    cycles_completed: u64,
}

impl<F: Fetcher> Poller<F, TokioSleeper> {
    pub fn new(config: PollConfig, fetcher: F) -> Self {
        let store = ArchiveStore::new(config.output_dir.clone());
        Self {
            config,
            fetcher,
            store,
            sleeper: TokioSleeper,
            phase: PollPhase::Fetching,
            cycles_completed: 0,
        }
    }
}

impl<F: Fetcher, S: Sleeper> Poller<F, S> {
    pub fn with_sleeper<T: Sleeper>(self, sleeper: T) -> Poller<F, T> {
        Poller {
            config: self.config,
            fetcher: self.fetcher,
            store: self.store,
            sleeper,
            phase: self.phase,
            cycles_completed: self.cycles_completed,
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn store(&self) -> &ArchiveStore {
        &self.store
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    /// One fetch+persist pass. Does not change the phase.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CoreError> {
        let username = &self.config.username;
        let limit = self.config.limit;

        let posts = self.fetcher.fetch(username, limit).await?;
        info!("pulled {} posts", posts.len());
        if posts.len() > limit as usize {
            warn!(
                "source returned {} posts for a limit of {}",
                posts.len(),
                limit
            );
        }

        let mut report = CycleReport {
            fetched: posts.len(),
            ..CycleReport::default()
        };
        for post in &posts {
            match self.store.persist_if_new(post)? {
                PersistOutcome::Written => report.written += 1,
                PersistOutcome::Skipped => report.skipped += 1,
            }
        }

        if report.may_have_missed(limit) {
            warn!(
                "all {} fetched posts were new; posts older than the newest {} may have been missed",
                report.fetched, limit
            );
        }

        debug!(
            "cycle done: fetched={} written={} skipped={}",
            report.fetched, report.written, report.skipped
        );
        Ok(report)
    }

    /// Advances the state machine by one state.
    ///
    /// Returns the cycle report after a FETCHING step and `None` after a
    /// SLEEPING step. A failed fetch or write leaves the phase unchanged.
    pub async fn step(&mut self) -> Result<Option<CycleReport>, CoreError> {
        match self.phase {
            PollPhase::Fetching => {
                let report = self.run_cycle().await?;
                self.cycles_completed += 1;
                self.phase = PollPhase::Sleeping;
                Ok(Some(report))
            }
            PollPhase::Sleeping => {
                let interval = self.config.sleep_interval();
                info!("sleep for {} seconds", interval.as_secs());
                self.sleeper.sleep(interval).await;
                self.phase = PollPhase::Fetching;
                Ok(None)
            }
        }
    }

    /// Steps forever. Only returns with the first error.
    pub async fn run(&mut self) -> Result<(), CoreError> {
        info!(
            "polling @{} every {} seconds into {}",
            self.config.username,
            self.config.sleep_seconds,
            self.store.root().display()
        );
        loop {
            self.step().await?;
        }
    }
}
