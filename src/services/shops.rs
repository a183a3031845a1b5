// src/services/shops.rs

//! Hierarchy traversal: states in sequence, tehsils of one state concurrently.
//!
//! A state is fully resolved (discovery, every shop request, artifact write)
//! before the next state starts, so at most `max_concurrent` shop requests are
//! in flight at any time. No single failure stops the traversal.

use futures::stream::{self, StreamExt};

use crate::models::{
    Config, ShopBatch, ShopRecord, StateCode, StateReport, StateStatus, TehsilDescriptor,
};
use crate::services::ShopDirectory;
use crate::storage::ShopStorage;

/// Shops and per-state reports of a traversal.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    /// One batch per state, in state order
    pub batches: Vec<Vec<ShopRecord>>,
    pub states: Vec<StateReport>,
}

impl CrawlOutcome {
    pub fn push(&mut self, shops: Vec<ShopRecord>, report: StateReport) {
        self.batches.push(shops);
        self.states.push(report);
    }

    pub fn record_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    pub fn state_failures(&self) -> usize {
        self.states
            .iter()
            .filter(|s| s.status == StateStatus::Failed)
            .count()
    }

    pub fn tehsil_total(&self) -> usize {
        self.states.iter().map(|s| s.tehsil_count).sum()
    }

    pub fn tehsil_failures(&self) -> usize {
        self.states.iter().map(|s| s.failed_tehsils).sum()
    }

    pub fn rejected_tehsils(&self) -> usize {
        self.states.iter().map(|s| s.rejected_tehsils).sum()
    }

    pub fn rejected_records(&self) -> usize {
        self.states.iter().map(|s| s.rejected_records).sum()
    }
}

/// Walks the state → tehsil → shop hierarchy.
pub struct ShopCrawler<'a> {
    config: &'a Config,
    directory: &'a dyn ShopDirectory,
    storage: &'a dyn ShopStorage,
    resume: bool,
}

impl<'a> ShopCrawler<'a> {
    pub fn new(
        config: &'a Config,
        directory: &'a dyn ShopDirectory,
        storage: &'a dyn ShopStorage,
    ) -> Self {
        Self {
            config,
            directory,
            storage,
            resume: false,
        }
    }

    /// Reuse existing per-state artifacts instead of fetching those states.
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Traverse every state.
    pub async fn fetch_all(&self) -> CrawlOutcome {
        self.fetch_states(StateCode::all()).await
    }

    /// Traverse the given states strictly one after another.
    pub async fn fetch_states(&self, states: impl IntoIterator<Item = StateCode>) -> CrawlOutcome {
        let mut outcome = CrawlOutcome::default();

        for state in states {
            let (shops, report) = match self.resumed_state(&state).await {
                Some(batch) => {
                    let mut report = StateReport::new(state.clone(), StateStatus::Resumed);
                    report.rejected_records = batch.rejected;
                    report.shop_count = batch.records.len();
                    (batch.records, report)
                }
                None => self.fetch_state(&state).await,
            };

            log::info!(
                "State {}: {} shops ({:?}, {} tehsils, {} failed)",
                state,
                report.shop_count,
                report.status,
                report.tehsil_count,
                report.failed_tehsils
            );
            outcome.push(shops, report);
        }

        if outcome.state_failures() > 0 || outcome.tehsil_failures() > 0 {
            log::warn!(
                "Incomplete traversal: {} states and {} of {} tehsils failed",
                outcome.state_failures(),
                outcome.tehsil_failures(),
                outcome.tehsil_total()
            );
        }
        outcome
    }

    async fn resumed_state(&self, state: &StateCode) -> Option<ShopBatch> {
        if !self.resume {
            return None;
        }
        match self.storage.load_state_shops(state).await {
            Ok(Some(batch)) => {
                log::info!("State {}: resuming from saved artifact", state);
                Some(batch)
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("State {}: saved artifact unusable, refetching: {}", state, e);
                None
            }
        }
    }

    /// Discover one state's tehsils, fetch their shops with bounded
    /// concurrency and persist the state's artifact.
    ///
    /// A failed discovery yields no shops and writes no artifact.
    pub async fn fetch_state(&self, state: &StateCode) -> (Vec<ShopRecord>, StateReport) {
        log::info!("Processing state code: {}", state);

        let listing = match self.directory.list_tehsils(state).await {
            Ok(listing) => listing,
            Err(e) => {
                log::warn!("Failed to fetch tehsils for state code {}: {}", state, e);
                return (
                    Vec::new(),
                    StateReport::new(state.clone(), StateStatus::Failed),
                );
            }
        };

        let mut report = StateReport::new(state.clone(), StateStatus::Fetched);
        report.tehsil_count = listing.tehsils.len();
        report.rejected_tehsils = listing.rejected;
        let shops = self.fetch_tehsils(&listing.tehsils, &mut report).await;
        report.shop_count = shops.len();

        if let Err(e) = self.storage.write_state_shops(state, &shops).await {
            log::error!("State {}: failed to save artifact: {}", state, e);
        }

        (shops, report)
    }

    /// Fan out one request per tehsil and wait for all of them.
    async fn fetch_tehsils(
        &self,
        tehsils: &[TehsilDescriptor],
        report: &mut StateReport,
    ) -> Vec<ShopRecord> {
        let concurrency = self.config.crawler.max_concurrent.max(1);

        let mut results = stream::iter(tehsils)
            .map(|tehsil| async move { (tehsil, self.directory.list_shops(tehsil).await) })
            .buffer_unordered(concurrency);

        let mut shops = Vec::new();
        while let Some((tehsil, result)) = results.next().await {
            match result {
                Ok(batch) => {
                    log::debug!(
                        "  Tehsil {} ({}): {} shops",
                        tehsil.tehsil_name,
                        tehsil.tehsil_code,
                        batch.records.len()
                    );
                    report.rejected_records += batch.rejected;
                    shops.extend(batch.records);
                }
                Err(e) => {
                    report.failed_tehsils += 1;
                    log::warn!(
                        "State {}: failed to fetch shops for tehsil {} ({}): {}",
                        tehsil.state_code,
                        tehsil.tehsil_name,
                        tehsil.tehsil_code,
                        e
                    );
                }
            }
        }
        shops
    }
}
