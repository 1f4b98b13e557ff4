//! Ingestion coordinator.
//!
//! Drives one upload through the pipeline:
//! - Allocation: job id plus an exclusive directory subtree
//! - Fan-out: encoder pool, metadata probe, poster and transcript run together
//! - Fan-in: full pool settlement, then the side tasks
//! - Compose the master manifest, persist the record, report
//!
//! The coordinator is the only writer to a job's progress channel.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::error::{ErrorClass, IngestError};
use super::hashtags::extract_hashtags;
use super::manifest::ManifestComposer;
use super::pool::{PoolStatus, RenditionPool, RenditionUpdate};
use super::poster::{Poster, PosterResolution, PosterResolver, PosterSource};
use super::prober::{MetadataProber, ProbeResult, ProbedMetadata};
use super::progress::{JobOutcome, ProgressEvent, ProgressObserver, ProgressReporter};
use super::types::{
    ActiveJob, Degradation, IngestRequest, JobContext, JobFailure, JobId, JobReport, JobState,
    RenditionStatus, RenditionTask,
};
use crate::catalog::{CatalogError, CatalogRecord, NewVideo, TranscriptSegment, VideoCatalog};
use crate::encoder::MediaEncoder;
use crate::ladder::QualityTier;
use crate::layout::StorageLayout;
use crate::metrics;
use crate::transcript::Transcriber;

const PERCENT_RECEIVED: u8 = 0;
const PERCENT_ALLOCATED: u8 = 5;
const PERCENT_ENCODING: u8 = 10;
const PERCENT_ENCODING_SPAN: usize = 70;
const PERCENT_MANIFEST: u8 = 85;
const PERCENT_METADATA: u8 = 90;
const PERCENT_PERSISTING: u8 = 95;

/// Coordinator status for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStatus {
    pub active_jobs: Vec<ActiveJob>,
    pub pool: PoolStatus,
}

/// Mutable bookkeeping for one job. Dropped when the job ends.
struct JobRun {
    job_id: Option<String>,
    state: JobState,
    renditions: Vec<RenditionTask>,
    degradations: Vec<Degradation>,
    started: Instant,
}

impl JobRun {
    fn new() -> Self {
        Self {
            job_id: None,
            state: JobState::Created,
            renditions: Vec::new(),
            degradations: Vec::new(),
            started: Instant::now(),
        }
    }

    fn degrade(&mut self, degradation: Degradation) {
        metrics::INGEST_DEGRADATIONS
            .with_label_values(&[degradation.class.as_str()])
            .inc();
        self.degradations.push(degradation);
    }

    fn into_report(self, record: Option<CatalogRecord>, failure: Option<JobFailure>) -> JobReport {
        JobReport {
            job_id: self.job_id,
            state: self.state,
            record,
            renditions: self.renditions,
            degradations: self.degradations,
            failure,
        }
    }
}

/// Side tasks started next to the encoder pool.
struct SideTasks {
    probe: JoinHandle<ProbeResult>,
    poster: JoinHandle<PosterResolution>,
    transcript: Option<JoinHandle<Option<Vec<TranscriptSegment>>>>,
}

/// Settled side-task results.
struct SideResults {
    metadata: ProbedMetadata,
    poster: Poster,
    transcript: Option<Vec<TranscriptSegment>>,
}

/// Orchestrates ingestion jobs.
pub struct IngestCoordinator {
    storage: StorageLayout,
    catalog: Arc<dyn VideoCatalog>,
    pool: RenditionPool,
    prober: Arc<MetadataProber>,
    poster: Arc<PosterResolver>,
    composer: ManifestComposer,
    transcriber: Option<Arc<dyn Transcriber>>,
    observer: Option<ProgressObserver>,
    keep_sources: bool,
    active_jobs: Arc<RwLock<HashMap<String, ActiveJob>>>,
}

impl IngestCoordinator {
    pub fn new(
        encoder: Arc<dyn MediaEncoder>,
        catalog: Arc<dyn VideoCatalog>,
        storage: StorageLayout,
        ladder: Vec<QualityTier>,
        max_parallel_encodes: usize,
    ) -> Self {
        Self {
            pool: RenditionPool::new(Arc::clone(&encoder), ladder, max_parallel_encodes),
            prober: Arc::new(MetadataProber::new(Arc::clone(&encoder))),
            poster: Arc::new(PosterResolver::new(encoder, storage.clone())),
            composer: ManifestComposer::new(),
            storage,
            catalog,
            transcriber: None,
            observer: None,
            keep_sources: true,
            active_jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Enables transcripts.
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Observer called with every event of every job.
    pub fn with_observer(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Whether raw uploads survive a completed job.
    pub fn with_keep_sources(mut self, keep_sources: bool) -> Self {
        self.keep_sources = keep_sources;
        self
    }

    pub fn storage(&self) -> &StorageLayout {
        &self.storage
    }

    pub fn ladder(&self) -> &[QualityTier] {
        self.pool.ladder()
    }

    /// A progress channel wired to this coordinator's observer.
    pub fn reporter(&self) -> (ProgressReporter, mpsc::UnboundedReceiver<ProgressEvent>) {
        ProgressReporter::channel(self.observer.clone())
    }

    /// Starts a job in the background and returns its progress stream.
    ///
    /// Dropping the receiver does not cancel the job.
    pub fn submit(
        self: &Arc<Self>,
        request: IngestRequest,
    ) -> mpsc::UnboundedReceiver<ProgressEvent> {
        let (reporter, rx) = self.reporter();
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            coordinator.ingest(request, reporter).await;
        });
        rx
    }

    /// Job ids the coordinator currently owns.
    pub async fn active_job_ids(&self) -> Vec<String> {
        self.active_jobs.read().await.keys().cloned().collect()
    }

    /// Marks a job as owned by this coordinator until released.
    pub(crate) async fn track(&self, job: ActiveJob) {
        self.active_jobs.write().await.insert(job.job_id.clone(), job);
    }

    pub(crate) async fn release(&self, job_id: &str) {
        self.active_jobs.write().await.remove(job_id);
    }

    /// Releases a job from synchronous code; a no-op while the table is locked.
    #[cfg(test)]
    pub(crate) fn try_release(&self, job_id: &str) -> bool {
        match self.active_jobs.try_write() {
            Ok(mut jobs) => jobs.remove(job_id).is_some(),
            Err(_) => false,
        }
    }

    pub async fn status(&self) -> CoordinatorStatus {
        let mut active_jobs: Vec<ActiveJob> =
            self.active_jobs.read().await.values().cloned().collect();
        active_jobs.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        CoordinatorStatus {
            active_jobs,
            pool: self.pool.status(),
        }
    }

    /// Runs one job to its terminal event.
    pub async fn ingest(
        &self,
        request: IngestRequest,
        mut reporter: ProgressReporter,
    ) -> JobReport {
        let mut run = JobRun::new();

        let source = match self.check_source(&request).await {
            Ok(source) => source,
            Err(e) => {
                warn!(error = %e, "Rejected upload");
                run.state = JobState::Failed;
                return self.fail(run, reporter, e);
            }
        };

        let job_id = JobId::generate();
        run.job_id = Some(job_id.to_string());
        reporter.bind(job_id.as_str());
        reporter.info("Upload received", PERCENT_RECEIVED);

        let layout = match self.storage.allocate_job(job_id.as_str()).await {
            Ok(layout) => layout,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Failed to allocate job directory");
                run.state = JobState::Failed;
                return self.fail(run, reporter, IngestError::Allocation(e));
            }
        };
        let ctx = JobContext {
            job_id,
            layout,
            source,
        };

        info!(job_id = %ctx.job_id, title = %request.title, "Ingest job created");
        metrics::INGEST_ACTIVE.inc();
        self.track(ActiveJob {
            job_id: ctx.id().to_string(),
            title: request.title.clone(),
            state: JobState::Created,
            started_at: Utc::now(),
            renditions: self
                .pool
                .ladder()
                .iter()
                .map(|tier| (tier.label.clone(), RenditionStatus::Pending))
                .collect(),
        })
        .await;
        reporter.info("Job directories ready", PERCENT_ALLOCATED);

        let report = self.run_job(&ctx, request, run, reporter).await;

        self.release(ctx.id()).await;
        metrics::INGEST_ACTIVE.dec();
        report
    }

    async fn check_source(&self, request: &IngestRequest) -> Result<PathBuf, IngestError> {
        let source = request.source.clone().ok_or(IngestError::MissingSource)?;
        match tokio::fs::metadata(&source).await {
            Ok(meta) if meta.is_file() => Ok(source),
            _ => Err(IngestError::SourceNotFound { path: source }),
        }
    }

    async fn run_job(
        &self,
        ctx: &JobContext,
        request: IngestRequest,
        mut run: JobRun,
        mut reporter: ProgressReporter,
    ) -> JobReport {
        self.advance(ctx, &mut run, JobState::Encoding).await;
        let side = self.spawn_side_tasks(ctx, &request);

        let total = self.pool.ladder().len();
        reporter.info(format!("Encoding {} renditions", total), PERCENT_ENCODING);

        run.renditions = self.encode_all(ctx, &mut reporter, total).await;

        let failures: Vec<String> = run
            .renditions
            .iter()
            .filter(|t| !t.is_succeeded())
            .map(|task| {
                format!(
                    "Rendition {} failed: {}",
                    task.label(),
                    task.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect();
        for message in failures {
            run.degrade(Degradation::new(ErrorClass::EncodeError, message));
        }

        let succeeded = run.renditions.iter().filter(|t| t.is_succeeded()).count();
        if succeeded == 0 {
            let results = self.settle_side_tasks(ctx, side, &mut run).await;
            self.discard_job(ctx, &results.poster).await;
            self.advance(ctx, &mut run, JobState::Failed).await;
            return self.fail(run, reporter, IngestError::TotalEncodeFailure { attempted: total });
        }

        self.advance(ctx, &mut run, JobState::Composing).await;
        reporter.info("Building master manifest", PERCENT_MANIFEST);

        let entries = match self.composer.compose(&ctx.layout, &run.renditions).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(job_id = %ctx.job_id, error = %e, "Failed to write master manifest");
                self.settle_side_tasks(ctx, side, &mut run).await;
                self.advance(ctx, &mut run, JobState::Failed).await;
                return self.fail(run, reporter, IngestError::Manifest(e));
            }
        };
        if entries.is_empty() {
            let results = self.settle_side_tasks(ctx, side, &mut run).await;
            self.discard_job(ctx, &results.poster).await;
            self.advance(ctx, &mut run, JobState::Failed).await;
            return self.fail(run, reporter, IngestError::TotalEncodeFailure { attempted: total });
        }

        reporter.info("Collecting metadata and poster", PERCENT_METADATA);
        let results = self.settle_side_tasks(ctx, side, &mut run).await;

        self.advance(ctx, &mut run, JobState::Persisting).await;
        reporter.info("Saving video", PERCENT_PERSISTING);

        let video = NewVideo {
            title: request.title,
            hashtags: extract_hashtags(&request.description),
            description: request.description,
            storage_folder: ctx.id().to_string(),
            available_qualities: entries.into_iter().map(|e| e.label).collect(),
            thumbnail: self.storage.reference(&results.poster.path),
            duration_secs: results.metadata.duration_secs,
            codec: results.metadata.codec,
            bitrate: results.metadata.bitrate,
            resolution: results.metadata.resolution,
            owner: request.owner,
            transcript: results.transcript,
        };

        let record = match self.persist(video).await {
            Ok(record) => record,
            Err(e) => {
                // Artifacts stay on disk unreferenced until the sweeper's grace period ends.
                error!(job_id = %ctx.job_id, error = %e, "Failed to persist catalog record");
                self.advance(ctx, &mut run, JobState::Failed).await;
                return self.fail(run, reporter, IngestError::Catalog(e));
            }
        };

        self.advance(ctx, &mut run, JobState::Completed).await;

        if !self.keep_sources {
            if let Err(e) = tokio::fs::remove_file(&ctx.source).await {
                warn!(job_id = %ctx.job_id, error = %e, "Failed to remove raw upload");
            }
        }

        info!(
            job_id = %ctx.job_id,
            record_id = %record.id,
            qualities = ?record.available_qualities,
            degradations = run.degradations.len(),
            "Ingest job completed"
        );
        self.record_outcome(&run, "completed");
        reporter.finish(JobOutcome::Succeeded {
            record_id: record.id.clone(),
        });
        run.into_report(Some(record), None)
    }

    /// Runs the pool and turns settled tasks into progress, in completion order.
    async fn encode_all(
        &self,
        ctx: &JobContext,
        reporter: &mut ProgressReporter,
        total: usize,
    ) -> Vec<RenditionTask> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pool_run = self.pool.run(ctx, tx);
        tokio::pin!(pool_run);

        let mut settled = 0;
        let tasks = loop {
            tokio::select! {
                tasks = &mut pool_run => break tasks,
                Some(update) = rx.recv() => {
                    self.on_rendition_update(ctx, reporter, update, &mut settled, total).await;
                }
            }
        };
        while let Ok(update) = rx.try_recv() {
            self.on_rendition_update(ctx, reporter, update, &mut settled, total).await;
        }
        tasks
    }

    async fn on_rendition_update(
        &self,
        ctx: &JobContext,
        reporter: &mut ProgressReporter,
        update: RenditionUpdate,
        settled: &mut usize,
        total: usize,
    ) {
        if let Some(job) = self.active_jobs.write().await.get_mut(ctx.id()) {
            job.set_rendition(&update.label, update.status);
        }

        let verb = match update.status {
            RenditionStatus::Succeeded => "ready",
            RenditionStatus::Failed => "failed",
            _ => return,
        };
        *settled += 1;
        let percent = PERCENT_ENCODING as usize + PERCENT_ENCODING_SPAN * *settled / total.max(1);
        reporter.info(
            format!("Rendition {} {} ({}/{})", update.label, verb, settled, total),
            percent.min(u8::MAX as usize) as u8,
        );
    }

    fn spawn_side_tasks(&self, ctx: &JobContext, request: &IngestRequest) -> SideTasks {
        // The source is inspected once; the poster waits for its duration.
        let (duration_tx, duration_rx) = oneshot::channel();
        let probe = {
            let prober = Arc::clone(&self.prober);
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let result = prober.probe(&ctx).await;
                let known = result.metadata.duration_secs;
                let _ = duration_tx.send(Some(known).filter(|d| *d > 0.0));
                result
            })
        };

        let poster = {
            let resolver = Arc::clone(&self.poster);
            let ctx = ctx.clone();
            let supplied = request.thumbnail.clone();
            tokio::spawn(async move {
                let duration = duration_rx.await.ok().flatten();
                resolver.resolve(&ctx, supplied, duration).await
            })
        };

        let transcript = self.transcriber.as_ref().map(|transcriber| {
            let transcriber = Arc::clone(transcriber);
            let ctx = ctx.clone();
            tokio::spawn(async move {
                match transcriber.transcribe(&ctx).await {
                    Ok(segments) => Some(segments),
                    Err(e) => {
                        warn!(job_id = %ctx.job_id, error = %e, "Transcript unavailable");
                        None
                    }
                }
            })
        });

        SideTasks {
            probe,
            poster,
            transcript,
        }
    }

    async fn settle_side_tasks(
        &self,
        ctx: &JobContext,
        side: SideTasks,
        run: &mut JobRun,
    ) -> SideResults {
        let metadata = match side.probe.await {
            Ok(result) => {
                if let Some(degradation) = result.degradation {
                    run.degrade(degradation);
                }
                result.metadata
            }
            Err(e) => {
                run.degrade(Degradation::new(
                    ErrorClass::MetadataError,
                    format!("Probe task aborted: {}", e),
                ));
                ProbedMetadata::default()
            }
        };

        let poster = match side.poster.await {
            Ok(resolution) => {
                for degradation in resolution.degradations {
                    run.degrade(degradation);
                }
                resolution.poster
            }
            Err(e) => {
                run.degrade(Degradation::new(
                    ErrorClass::ThumbnailError,
                    format!("Poster task aborted: {}", e),
                ));
                Poster {
                    path: self
                        .storage
                        .ensure_placeholder()
                        .await
                        .unwrap_or_else(|_| self.storage.placeholder_thumbnail()),
                    source: PosterSource::Placeholder,
                }
            }
        };

        let transcript = match side.transcript {
            Some(handle) => match handle.await {
                Ok(Some(segments)) => Some(segments),
                Ok(None) => {
                    run.degrade(Degradation::new(
                        ErrorClass::TranscriptError,
                        "Transcript could not be generated",
                    ));
                    None
                }
                Err(e) => {
                    run.degrade(Degradation::new(
                        ErrorClass::TranscriptError,
                        format!("Transcript task aborted: {}", e),
                    ));
                    None
                }
            },
            None => None,
        };

        debug!(
            job_id = %ctx.job_id,
            poster = ?poster.source,
            transcript = transcript.is_some(),
            "Side tasks settled"
        );

        SideResults {
            metadata,
            poster,
            transcript,
        }
    }

    async fn persist(&self, video: NewVideo) -> Result<CatalogRecord, CatalogError> {
        let catalog = Arc::clone(&self.catalog);
        tokio::task::spawn_blocking(move || catalog.insert(&video))
            .await
            .map_err(|e| CatalogError::Internal(format!("insert task failed: {}", e)))?
    }

    /// Removes what a job that produced nothing playable left behind.
    async fn discard_job(&self, ctx: &JobContext, poster: &Poster) {
        if let Err(e) = tokio::fs::remove_dir_all(ctx.layout.root()).await {
            warn!(job_id = %ctx.job_id, error = %e, "Failed to remove job directory");
        }
        if poster.source != PosterSource::Placeholder {
            if let Err(e) = tokio::fs::remove_file(&poster.path).await {
                debug!(path = %poster.path.display(), error = %e, "Failed to remove poster");
            }
        }
    }

    async fn advance(&self, ctx: &JobContext, run: &mut JobRun, next: JobState) {
        if !run.state.can_transition_to(next) {
            warn!(
                job_id = %ctx.job_id,
                from = run.state.state_type(),
                to = next.state_type(),
                "Unexpected job state transition"
            );
        }
        debug!(job_id = %ctx.job_id, state = next.state_type(), "Job state changed");
        run.state = next;
        if let Some(job) = self.active_jobs.write().await.get_mut(ctx.id()) {
            job.state = next;
        }
    }

    fn fail(&self, run: JobRun, reporter: ProgressReporter, error: IngestError) -> JobReport {
        let class = error.class();
        let message = error.to_string();
        if run.job_id.is_some() {
            warn!(
                job_id = ?run.job_id,
                class = class.as_str(),
                error = %message,
                "Ingest job failed"
            );
        }
        self.record_outcome(&run, class.as_str());
        reporter.finish(JobOutcome::Failed {
            error: class,
            message: message.clone(),
        });
        run.into_report(None, Some(JobFailure { class, message }))
    }

    fn record_outcome(&self, run: &JobRun, outcome: &str) {
        metrics::INGEST_JOBS_TOTAL.with_label_values(&[outcome]).inc();
        metrics::INGEST_DURATION
            .with_label_values(&[outcome])
            .observe(run.started.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SqliteVideoCatalog;
    use crate::testing::{fixtures, MockEncoder, MockTranscriber, ScriptedCatalog};
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        encoder: Arc<MockEncoder>,
        catalog: Arc<SqliteVideoCatalog>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
                encoder: Arc::new(MockEncoder::new()),
                catalog: Arc::new(SqliteVideoCatalog::in_memory().unwrap()),
            }
        }

        fn coordinator(&self) -> IngestCoordinator {
            IngestCoordinator::new(
                self.encoder.clone(),
                self.catalog.clone(),
                StorageLayout::new(self.dir.path().join("media")),
                fixtures::three_tier_ladder(),
                2,
            )
        }

        async fn source(&self) -> PathBuf {
            fixtures::write_source(self.dir.path(), "raw.mov").await.unwrap()
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_missing_source_is_input_error() {
        let fx = Fixture::new();
        let coordinator = fx.coordinator();
        let (reporter, mut rx) = coordinator.reporter();

        let mut request = fixtures::ingest_request(&fx.dir.path().join("x"), "t", "");
        request.source = None;
        let report = coordinator.ingest(request, reporter).await;

        assert_eq!(report.state, JobState::Failed);
        assert!(report.job_id.is_none());
        assert_eq!(report.failure.unwrap().class, ErrorClass::InputError);
        assert!(!fx.dir.path().join("media").join("hls").exists());

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(events[0].is_done());
    }

    #[tokio::test]
    async fn test_completed_job_records_everything() {
        let fx = Fixture::new();
        let coordinator = fx
            .coordinator()
            .with_transcriber(Arc::new(MockTranscriber::with_segments(fixtures::transcript())));
        let source = fx.source().await;
        let (reporter, mut rx) = coordinator.reporter();

        let report = coordinator
            .ingest(fixtures::ingest_request(&source, "Trip", "trip to #paris"), reporter)
            .await;

        assert_eq!(report.state, JobState::Completed);
        assert!(report.degradations.is_empty());
        let record = report.record.unwrap();
        assert_eq!(record.available_qualities, vec!["360p", "720p", "1080p"]);
        assert_eq!(record.hashtags, vec!["paris"]);
        assert_eq!(record.codec, "h264");
        assert_eq!(record.storage_folder, report.job_id.unwrap());
        assert_eq!(record.transcript.as_ref().map(|t| t.len()), Some(2));
        assert_eq!(record.views, 0);
        assert!(coordinator.storage().resolve(&record.thumbnail).exists());
        assert!(source.exists());

        let events = drain(&mut rx);
        let last = events.last().unwrap();
        assert!(last.is_done());
        assert_eq!(last.percent(), 100);
        assert!(coordinator.active_job_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_source_inspected_once_per_job() {
        let fx = Fixture::new();
        let coordinator = fx.coordinator();
        let source = fx.source().await;
        let (reporter, _rx) = coordinator.reporter();

        let report = coordinator
            .ingest(fixtures::ingest_request(&source, "t", ""), reporter)
            .await;

        assert_eq!(report.state, JobState::Completed);
        assert_eq!(fx.encoder.inspection_count(), 1);
        let captures = fx.encoder.captures().await;
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0].seek_secs, 6.0);
    }

    #[tokio::test]
    async fn test_transcript_failure_degrades() {
        let fx = Fixture::new();
        let transcriber = Arc::new(MockTranscriber::new());
        transcriber.set_fails(true).await;
        let coordinator = fx.coordinator().with_transcriber(transcriber);
        let source = fx.source().await;
        let (reporter, _rx) = coordinator.reporter();

        let report = coordinator
            .ingest(fixtures::ingest_request(&source, "t", ""), reporter)
            .await;

        assert_eq!(report.state, JobState::Completed);
        assert!(report.record.unwrap().transcript.is_none());
        assert_eq!(report.degradations.len(), 1);
        assert_eq!(report.degradations[0].class, ErrorClass::TranscriptError);
    }

    #[tokio::test]
    async fn test_total_failure_discards_job_dir() {
        let fx = Fixture::new();
        for tier in fixtures::three_tier_ladder() {
            fx.encoder.fail_label(&tier.label).await;
        }
        let coordinator = fx.coordinator();
        let source = fx.source().await;
        let (reporter, _rx) = coordinator.reporter();

        let report = coordinator
            .ingest(fixtures::ingest_request(&source, "t", ""), reporter)
            .await;

        assert_eq!(report.state, JobState::Failed);
        let job_id = report.job_id.unwrap();
        assert!(!coordinator.storage().job(&job_id).root().exists());
        assert_eq!(fx.catalog.count().unwrap(), 0);
        let encode_errors = report
            .degradations
            .iter()
            .filter(|d| d.class == ErrorClass::EncodeError)
            .count();
        assert_eq!(encode_errors, 3);
    }

    #[tokio::test]
    async fn test_persistence_failure_leaves_artifacts() {
        let fx = Fixture::new();
        let catalog = Arc::new(ScriptedCatalog::in_memory().unwrap());
        catalog.set_fail_inserts(true);
        let coordinator = IngestCoordinator::new(
            fx.encoder.clone(),
            catalog.clone(),
            StorageLayout::new(fx.dir.path().join("media")),
            fixtures::three_tier_ladder(),
            2,
        )
        .with_keep_sources(false);
        let source = fx.source().await;
        let (reporter, mut rx) = coordinator.reporter();

        let report = coordinator
            .ingest(fixtures::ingest_request(&source, "t", ""), reporter)
            .await;

        assert_eq!(report.state, JobState::Failed);
        assert!(report.record.is_none());
        assert_eq!(report.failure.unwrap().class, ErrorClass::PersistenceError);
        assert_eq!(catalog.count().unwrap(), 0);
        let job_id = report.job_id.unwrap();
        assert!(coordinator.storage().job(&job_id).master_manifest_path().exists());
        assert!(source.exists());

        let events = drain(&mut rx);
        match events.last().unwrap() {
            ProgressEvent::Done {
                outcome: JobOutcome::Failed { error, .. },
                ..
            } => assert_eq!(*error, ErrorClass::PersistenceError),
            other => panic!("unexpected terminal event: {:?}", other),
        }
        assert!(coordinator.active_job_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_drop_sources_after_success() {
        let fx = Fixture::new();
        let coordinator = fx.coordinator().with_keep_sources(false);
        let source = fx.source().await;
        let (reporter, _rx) = coordinator.reporter();

        let report = coordinator
            .ingest(fixtures::ingest_request(&source, "t", ""), reporter)
            .await;

        assert_eq!(report.state, JobState::Completed);
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn test_submit_streams_to_done() {
        let fx = Fixture::new();
        let coordinator = Arc::new(fx.coordinator());
        let source = fx.source().await;

        let mut rx = coordinator.submit(fixtures::ingest_request(&source, "t", ""));
        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event);
        }
        let last = last.unwrap();
        assert!(last.is_done());
        assert_eq!(fx.catalog.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_status_reports_pool() {
        let fx = Fixture::new();
        let status = fx.coordinator().status().await;
        assert!(status.active_jobs.is_empty());
        assert_eq!(status.pool.max_concurrent, 2);
    }
}
