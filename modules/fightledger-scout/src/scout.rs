use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use espn_client::{ClientConfig, EspnClient, EspnWorker, RetryPolicy};
use fightledger_archive::{DocumentStore, StoreOutcome};
use fightledger_common::{
    ClinchRecord, DataLayout, DatasetKind, FetchConfig, FileConfig, GroundRecord, LedgerRecord,
    ProfileRecord, RunConfig, RunMode, StrikingRecord,
};
use futures::future::join_all;
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::ScoutError;
use crate::extractor::{extract_events, extract_profile, EventBatch};
use crate::input::normalize;
use crate::ledger::{DatasetReport, Ledger};

// --- Run summary ---

#[derive(Debug, Default)]
pub struct RunSummary {
    pub succeeded: u32,
    /// Succeeded from a stored document without any request.
    pub cached: u32,
    pub failed: u32,
    pub failing_entities: Vec<String>,
    pub parse_failures: u32,
    pub documents_written: u32,
    pub documents_unchanged: u32,
    pub datasets: Vec<DatasetReport>,
    pub dataset_failures: Vec<(DatasetKind, String)>,
    pub cancelled: bool,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Fightledger Run Complete ===")?;
        writeln!(f, "Entities succeeded:  {} ({} cached)", self.succeeded, self.cached)?;
        writeln!(f, "Entities failed:     {}", self.failed)?;
        writeln!(f, "Documents written:   {}", self.documents_written)?;
        writeln!(f, "Documents unchanged: {}", self.documents_unchanged)?;
        writeln!(f, "Parse failures:      {}", self.parse_failures)?;
        if self.cancelled {
            writeln!(f, "Run cancelled at a chunk boundary")?;
        }
        if !self.failing_entities.is_empty() {
            writeln!(f, "\nFailed entities:")?;
            for name in &self.failing_entities {
                writeln!(f, "  {name}")?;
            }
        }
        writeln!(f, "\nDatasets:")?;
        for report in &self.datasets {
            writeln!(f, "  {report}")?;
        }
        for (kind, err) in &self.dataset_failures {
            writeln!(f, "  {} FAILED: {err}", kind.file_name())?;
        }
        Ok(())
    }
}

enum EntityOutcome {
    Fetched(StoreOutcome),
    Cached,
}

/// Counters of a single run. Fresh per `run` call.
#[derive(Default)]
struct RunSession {
    summary: RunSummary,
    /// Entities that succeeded this run, with whether they came from cache.
    succeeded: BTreeMap<String, bool>,
}

impl RunSession {
    fn record(&mut self, name: &str, result: Result<EntityOutcome, ScoutError>) {
        match result {
            Ok(EntityOutcome::Cached) => {
                self.summary.succeeded += 1;
                self.summary.cached += 1;
                self.succeeded.insert(name.to_string(), true);
            }
            Ok(EntityOutcome::Fetched(outcome)) => {
                self.summary.succeeded += 1;
                self.succeeded.insert(name.to_string(), false);
                if outcome.wrote() {
                    self.summary.documents_written += 1;
                } else {
                    self.summary.documents_unchanged += 1;
                }
            }
            Err(e) => {
                warn!(entity = name, error = %e, "Entity failed");
                self.fail(name);
            }
        }
    }

    fn fail(&mut self, name: &str) {
        self.summary.failed += 1;
        self.summary.failing_entities.push(name.to_string());
    }

    /// A stored document of this run's entity had no usable profile.
    fn profile_unparsed(&mut self, name: &str) {
        self.summary.parse_failures += 1;
        if let Some(cached) = self.succeeded.remove(name) {
            self.summary.succeeded -= 1;
            if cached {
                self.summary.cached -= 1;
            }
            self.fail(name);
        }
    }
}

// --- Options ---

#[derive(Debug, Clone)]
pub struct ScoutOptions {
    pub chunk_size: usize,
    pub workers: usize,
    pub chunk_pause_min: Duration,
    pub chunk_pause_max: Duration,
    /// Fetch and extract, but leave the datasets alone.
    pub dry_run: bool,
}

impl Default for ScoutOptions {
    fn default() -> Self {
        Self::from(&RunConfig::default())
    }
}

impl From<&RunConfig> for ScoutOptions {
    fn from(run: &RunConfig) -> Self {
        Self {
            chunk_size: run.chunk_size.max(1),
            workers: run.workers.max(1),
            chunk_pause_min: Duration::from_millis(run.chunk_pause_min_ms),
            chunk_pause_max: Duration::from_millis(run.chunk_pause_max_ms),
            dry_run: false,
        }
    }
}

impl ScoutOptions {
    fn chunk_pause(&self) -> Duration {
        let min = self.chunk_pause_min.as_millis() as u64;
        let max = (self.chunk_pause_max.as_millis() as u64).max(min);
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

pub fn client_config(fetch: &FetchConfig) -> ClientConfig {
    ClientConfig {
        search_url: fetch.search_url.clone(),
        requests_per_minute: fetch.requests_per_minute,
        worker_spacing: fetch.worker_spacing(),
        request_timeout: fetch.request_timeout(),
        retry: RetryPolicy {
            max_attempts: fetch.max_attempts,
            base_delay: fetch.backoff_base(),
            max_delay: fetch.backoff_cap(),
            jitter: fetch.jitter(),
        },
    }
}

// --- Scout ---

pub struct Scout {
    client: EspnClient,
    archive: DocumentStore,
    ledger: Ledger,
    options: ScoutOptions,
    cancel: Arc<AtomicBool>,
}

impl Scout {
    pub fn new(config: &FileConfig, layout: &DataLayout, dry_run: bool) -> Result<Self, ScoutError> {
        let client = EspnClient::new(client_config(&config.fetch))?;
        let options = ScoutOptions {
            dry_run,
            ..ScoutOptions::from(&config.run)
        };
        Self::with_client(client, layout, options)
    }

    pub fn with_client(
        client: EspnClient,
        layout: &DataLayout,
        options: ScoutOptions,
    ) -> Result<Self, ScoutError> {
        let archive = DocumentStore::open(layout.documents_dir())?;
        let ledger = Ledger::new(layout.clone()).dry_run(options.dry_run);
        Ok(Self {
            client,
            archive,
            ledger,
            options,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Set to stop the run at the next chunk boundary.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn archive(&self) -> &DocumentStore {
        &self.archive
    }

    pub async fn run(&self, names: &[String], mode: RunMode) -> RunSummary {
        let names = normalize(names);
        let chunks: Vec<&[String]> = names.chunks(self.options.chunk_size.max(1)).collect();
        info!(
            entities = names.len(),
            chunks = chunks.len(),
            workers = self.options.workers,
            %mode,
            "Starting run"
        );

        let mut session = RunSession::default();
        for (i, chunk) in chunks.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                warn!(chunk = i + 1, "Run cancelled, skipping remaining chunks");
                session.summary.cancelled = true;
                break;
            }

            for (name, result) in self.run_chunk(chunk, mode).await {
                session.record(&name, result);
            }
            info!(
                chunk = i + 1,
                of = chunks.len(),
                succeeded = session.summary.succeeded,
                failed = session.summary.failed,
                "Chunk complete"
            );

            if i + 1 < chunks.len() {
                let pause = self.options.chunk_pause();
                if !pause.is_zero() {
                    info!(pause_ms = pause.as_millis() as u64, "Pausing before next chunk");
                    tokio::time::sleep(pause).await;
                }
            }
        }

        self.extract_and_merge(&mut session);
        session.summary.failing_entities.sort();
        info!(
            succeeded = session.summary.succeeded,
            failed = session.summary.failed,
            "Run finished"
        );
        session.summary
    }

    /// Drain a chunk through the worker pool. Completion order is arbitrary.
    async fn run_chunk(
        &self,
        chunk: &[String],
        mode: RunMode,
    ) -> Vec<(String, Result<EntityOutcome, ScoutError>)> {
        let queue: Mutex<VecDeque<&String>> = Mutex::new(chunk.iter().collect());
        let workers = self.options.workers.min(chunk.len()).max(1);

        let results = join_all((0..workers).map(|_| async {
            let worker = self.client.worker();
            let mut done = Vec::new();
            loop {
                let next = queue.lock().await.pop_front();
                let Some(name) = next else {
                    break;
                };
                let result = self.process_entity(&worker, name, mode).await;
                done.push((name.clone(), result));
            }
            done
        }))
        .await;

        results.into_iter().flatten().collect()
    }

    async fn process_entity(
        &self,
        worker: &EspnWorker<'_>,
        name: &str,
        mode: RunMode,
    ) -> Result<EntityOutcome, ScoutError> {
        if mode == RunMode::Incremental && self.archive.exists(name) {
            info!(entity = name, "Document already stored, skipping fetch");
            return Ok(EntityOutcome::Cached);
        }
        let handle = worker.resolve(name).await?;
        let page = worker.fetch(&handle).await?;
        let outcome = self.archive.store(name, &page, &handle.stats_url)?;
        Ok(EntityOutcome::Fetched(outcome))
    }

    /// Extract every stored document, sorted by entity, and merge once per
    /// dataset. An unparseable profile fails its entity when that entity was
    /// part of this run.
    fn extract_and_merge(&self, session: &mut RunSession) {
        let docs = match self.archive.list() {
            Ok(docs) => docs,
            Err(e) => {
                error!(error = %e, "Failed to list stored documents");
                Vec::new()
            }
        };

        let mut profiles: Vec<ProfileRecord> = Vec::with_capacity(docs.len());
        let mut events = EventBatch::default();
        for doc in &docs {
            match extract_profile(doc) {
                Ok(profile) => profiles.push(profile),
                Err(e) => {
                    warn!(entity = %doc.entity, error = %e, "Profile extraction failed");
                    session.profile_unparsed(&doc.entity);
                }
            }
            match extract_events(doc) {
                Ok(batch) => events.extend(batch),
                Err(e) => {
                    warn!(entity = %doc.entity, error = %e, "Event extraction failed");
                    session.summary.parse_failures += 1;
                }
            }
        }
        info!(
            documents = docs.len(),
            profiles = profiles.len(),
            striking = events.striking.len(),
            clinch = events.clinch.len(),
            ground = events.ground.len(),
            "Extraction complete"
        );

        let summary = &mut session.summary;
        self.merge(summary, &profiles);
        self.merge::<StrikingRecord>(summary, &events.striking);
        self.merge::<ClinchRecord>(summary, &events.clinch);
        self.merge::<GroundRecord>(summary, &events.ground);
    }

    fn merge<R: LedgerRecord>(&self, summary: &mut RunSummary, records: &[R]) {
        match self.ledger.merge_records(records) {
            Ok(report) => summary.datasets.push(report),
            Err(e) => {
                error!(dataset = %R::DATASET, error = %e, "Dataset merge failed, previous file kept");
                summary.dataset_failures.push((R::DATASET, e.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_run_config() {
        let run = RunConfig {
            chunk_size: 0,
            workers: 4,
            chunk_pause_min_ms: 10,
            chunk_pause_max_ms: 20,
        };
        let options = ScoutOptions::from(&run);
        assert_eq!(options.chunk_size, 1);
        assert_eq!(options.workers, 4);
        for _ in 0..50 {
            let pause = options.chunk_pause();
            assert!(pause >= Duration::from_millis(10) && pause <= Duration::from_millis(20));
        }
    }

    #[test]
    fn client_config_carries_fetch_settings() {
        let fetch = FetchConfig {
            requests_per_minute: 7,
            max_attempts: 2,
            jitter_ms: 0,
            ..FetchConfig::default()
        };
        let config = client_config(&fetch);
        assert_eq!(config.requests_per_minute, 7);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.jitter, Duration::ZERO);
        assert_eq!(config.worker_spacing, Duration::from_secs(2));
    }

    #[test]
    fn unparsed_profile_fails_only_entities_of_this_run() {
        let mut session = RunSession::default();
        session.record("Alpha", Ok(EntityOutcome::Cached));
        session.record("Bravo", Ok(EntityOutcome::Fetched(StoreOutcome::Created)));

        session.profile_unparsed("Alpha");
        session.profile_unparsed("Earlier Run");

        let summary = &session.summary;
        assert_eq!((summary.succeeded, summary.cached, summary.failed), (1, 0, 1));
        assert_eq!(summary.failing_entities, vec!["Alpha"]);
        assert_eq!(summary.parse_failures, 2);
    }

    #[test]
    fn summary_display_lists_failures() {
        let summary = RunSummary {
            succeeded: 2,
            failed: 1,
            failing_entities: vec!["Unknown Person".into()],
            ..Default::default()
        };
        let text = summary.to_string();
        assert!(text.contains("Entities failed:     1"));
        assert!(text.contains("Unknown Person"));
    }
}
