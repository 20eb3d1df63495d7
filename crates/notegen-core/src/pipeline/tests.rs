use super::*;
use crate::checkpoint::{DurableMedium, MemoryMedium};
use crate::provider::TextProvider;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const SOURCE: &str = "lecture-1";
const TRANSCRIPT: &str = "c0. c1. c2. c3. c4.";
/// Every unit of TRANSCRIPT lands in its own chunk at this size
const CHUNK_SIZE: usize = 4;

/// Deterministic provider: folds each chunk into the document as `prior|chunk`.
///
/// Fails whenever the chunk it is asked about is in `fail_on`.
#[derive(Default)]
struct ScriptedProvider {
    fail_on: Mutex<Vec<String>>,
    seen_chunks: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn failing_on(chunk: &str) -> Self {
        Self {
            fail_on: Mutex::new(vec![chunk.to_string()]),
            ..Default::default()
        }
    }

    fn heal(&self) {
        self.fail_on.lock().unwrap().clear();
    }

    fn seen(&self) -> Vec<String> {
        self.seen_chunks.lock().unwrap().clone()
    }

    fn reset_seen(&self) {
        self.seen_chunks.lock().unwrap().clear();
    }
}

/// Split a prompt back into (prior document, chunk).
fn parse_prompt(prompt: &str) -> (Option<String>, String) {
    match prompt.split_once("\n---\nNew transcript part:\n") {
        Some((head, chunk)) => {
            let prior = head
                .split_once("Notes so far:\n")
                .map(|(_, prior)| prior.to_string())
                .unwrap();
            (Some(prior), chunk.to_string())
        }
        None => {
            let (_, chunk) = prompt.rsplit_once("Transcript part:\n").unwrap();
            (None, chunk.to_string())
        }
    }
}

#[async_trait]
impl TextProvider for ScriptedProvider {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let (prior, chunk) = parse_prompt(prompt);
        self.seen_chunks.lock().unwrap().push(chunk.clone());

        if self.fail_on.lock().unwrap().contains(&chunk) {
            return Err(anyhow::anyhow!("429 quota exceeded"));
        }

        Ok(match prior {
            Some(prior) => format!("{}|{}", prior, chunk),
            None => chunk,
        })
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-1"
    }
}

/// Serves fixed transcripts by identifier
struct StaticSource {
    texts: HashMap<String, String>,
    fetches: AtomicUsize,
}

impl StaticSource {
    fn with(entries: &[(&str, &str)]) -> Self {
        Self {
            texts: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TranscriptSource for StaticSource {
    async fn fetch(&self, source_id: &str) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.texts
            .get(source_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(source_id.to_string()))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Memory medium that rejects writes after the first `allowed`
struct FlakyMedium {
    inner: MemoryMedium,
    allowed: usize,
    writes: AtomicUsize,
}

impl FlakyMedium {
    fn allowing(allowed: usize) -> Self {
        Self {
            inner: MemoryMedium::new(),
            allowed,
            writes: AtomicUsize::new(0),
        }
    }
}

impl DurableMedium for FlakyMedium {
    fn read(&self) -> std::io::Result<Option<Vec<u8>>> {
        self.inner.read()
    }

    fn write_atomic(&self, bytes: &[u8]) -> std::io::Result<()> {
        if self.writes.fetch_add(1, Ordering::SeqCst) >= self.allowed {
            return Err(std::io::Error::other("disk full"));
        }
        self.inner.write_atomic(bytes)
    }

    fn remove(&self) -> std::io::Result<()> {
        self.inner.remove()
    }

    fn describe(&self) -> String {
        "flaky".to_string()
    }
}

struct Harness {
    pipeline: Pipeline,
    provider: Arc<ScriptedProvider>,
    source: Arc<StaticSource>,
    emitter: Arc<RecordingEmitter>,
}

fn harness_with(store: CheckpointStore, provider: ScriptedProvider) -> Harness {
    let provider = Arc::new(provider);
    let source = Arc::new(StaticSource::with(&[
        (SOURCE, TRANSCRIPT),
        ("lecture-2", "other0. other1."),
        ("silent", ""),
    ]));
    let emitter = Arc::new(RecordingEmitter::new());

    let pipeline = Pipeline::new(
        store,
        NoteGenerator::new(provider.clone()),
        source.clone(),
        Chunker::new(CHUNK_SIZE),
    )
    .with_emitter(emitter.clone());

    Harness {
        pipeline,
        provider,
        source,
        emitter,
    }
}

fn harness(provider: ScriptedProvider) -> Harness {
    harness_with(CheckpointStore::in_memory(), provider)
}

fn all_chunks() -> Vec<String> {
    vec![
        "c0.".to_string(),
        " c1.".to_string(),
        " c2.".to_string(),
        " c3.".to_string(),
        " c4.".to_string(),
    ]
}

const FULL_DOCUMENT: &str = "c0.| c1.| c2.| c3.| c4.";

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_fresh_run_completes_and_clears_checkpoint() {
    let h = harness(ScriptedProvider::default());

    let outcome = h.pipeline.run(RunRequest::new(SOURCE)).await.unwrap();

    assert!(outcome.is_completed());
    assert_eq!(outcome.document(), FULL_DOCUMENT);
    assert_eq!(outcome.source_id(), SOURCE);
    assert!(h.pipeline.store().load().unwrap().is_none());
}

#[tokio::test]
async fn test_chunks_processed_in_order_once() {
    let h = harness(ScriptedProvider::default());

    h.pipeline.run(RunRequest::new(SOURCE)).await.unwrap();

    assert_eq!(h.provider.seen(), all_chunks());
}

#[tokio::test]
async fn test_fresh_run_event_sequence() {
    let h = harness(ScriptedProvider::default());

    h.pipeline.run(RunRequest::new(SOURCE)).await.unwrap();

    let events = h.emitter.events();
    let states: Vec<JobState> = events.iter().filter_map(|e| e.state()).collect();
    assert_eq!(
        states,
        vec![
            JobState::Init,
            JobState::Chunking,
            JobState::Stepping(0),
            JobState::Stepping(1),
            JobState::Stepping(2),
            JobState::Stepping(3),
            JobState::Stepping(4),
            JobState::Completed,
        ]
    );
    assert_eq!(
        events[0],
        PipelineEvent::Init {
            source_id: Some(SOURCE.to_string())
        }
    );
    assert_eq!(events[2], PipelineEvent::Chunked { total_chunks: 5 });

    // Every step commits before the next one starts
    for index in 0..4 {
        let committed = events
            .iter()
            .position(|e| *e == PipelineEvent::StepCommitted { index, total_chunks: 5 })
            .unwrap();
        let next = events
            .iter()
            .position(|e| {
                *e == PipelineEvent::Stepping {
                    index: index + 1,
                    total_chunks: 5,
                }
            })
            .unwrap();
        assert!(committed < next);
    }
}

// ============================================================================
// Failure and resumption
// ============================================================================

#[tokio::test]
async fn test_generation_failure_keeps_last_checkpoint() {
    let h = harness(ScriptedProvider::failing_on(" c2."));

    let outcome = h.pipeline.run(RunRequest::new(SOURCE)).await.unwrap();

    match &outcome {
        PipelineOutcome::PartiallyFailed {
            document,
            next_index,
            total_chunks,
            error,
            ..
        } => {
            assert_eq!(document, "c0.| c1.");
            assert_eq!(*next_index, 2);
            assert_eq!(*total_chunks, 5);
            assert!(matches!(error, Error::Capability(_)));
        }
        other => panic!("expected partial failure, got {:?}", other),
    }

    let checkpoint = h.pipeline.store().load().unwrap().unwrap();
    assert_eq!(checkpoint.next_index, 2);
    assert_eq!(checkpoint.document, "c0.| c1.");
    assert_eq!(checkpoint.chunks, all_chunks());
    assert_eq!(checkpoint.source_id, SOURCE);
}

#[tokio::test]
async fn test_resume_after_failure_completes() {
    let h = harness(ScriptedProvider::failing_on(" c2."));
    h.pipeline.run(RunRequest::new(SOURCE)).await.unwrap();

    h.provider.heal();
    h.provider.reset_seen();
    let outcome = h.pipeline.run(RunRequest::new(SOURCE)).await.unwrap();

    assert!(outcome.is_completed());
    assert_eq!(outcome.document(), FULL_DOCUMENT);
    assert_eq!(
        h.provider.seen(),
        vec![" c2.".to_string(), " c3.".to_string(), " c4.".to_string()]
    );
    assert!(h.pipeline.store().load().unwrap().is_none());
    // The transcript was only fetched for the first run
    assert_eq!(h.source.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_resumed_run_matches_uninterrupted_run() {
    let uninterrupted = harness(ScriptedProvider::default());
    let expected = uninterrupted
        .pipeline
        .run(RunRequest::new(SOURCE))
        .await
        .unwrap()
        .into_document();

    for k in 0..5 {
        let interrupted = harness(ScriptedProvider::failing_on(&all_chunks()[k]));
        let first = interrupted
            .pipeline
            .run(RunRequest::new(SOURCE))
            .await
            .unwrap();
        assert!(!first.is_completed());

        interrupted.provider.heal();
        let resumed = interrupted
            .pipeline
            .run(RunRequest::new(SOURCE))
            .await
            .unwrap();

        assert!(resumed.is_completed());
        assert_eq!(resumed.document(), expected, "interrupted at chunk {}", k);
    }
}

#[tokio::test]
async fn test_failure_on_first_chunk_returns_empty_document() {
    let h = harness(ScriptedProvider::failing_on("c0."));

    let outcome = h.pipeline.run(RunRequest::new(SOURCE)).await.unwrap();

    assert!(!outcome.is_completed());
    assert_eq!(outcome.document(), "");
    assert!(h.pipeline.store().load().unwrap().is_none());
}

#[tokio::test]
async fn test_resume_event_reports_position() {
    let h = harness(ScriptedProvider::failing_on(" c3."));
    h.pipeline.run(RunRequest::new(SOURCE)).await.unwrap();
    h.provider.heal();

    h.pipeline.run(RunRequest::new(SOURCE)).await.unwrap();

    assert!(h.emitter.events().contains(&PipelineEvent::Resuming {
        source_id: SOURCE.to_string(),
        next_index: 3,
        total_chunks: 5,
    }));
}

#[tokio::test]
async fn test_checkpoint_write_failure_is_partial_failure() {
    let store = CheckpointStore::new(Arc::new(FlakyMedium::allowing(1)));
    let h = harness_with(store, ScriptedProvider::default());

    let outcome = h.pipeline.run(RunRequest::new(SOURCE)).await.unwrap();

    match &outcome {
        PipelineOutcome::PartiallyFailed {
            document,
            next_index,
            error,
            ..
        } => {
            // Chunk 1 was generated but never committed
            assert_eq!(document, "c0.");
            assert_eq!(*next_index, 1);
            assert!(matches!(error, Error::Io(_)));
        }
        other => panic!("expected partial failure, got {:?}", other),
    }

    let checkpoint = h.pipeline.store().load().unwrap().unwrap();
    assert_eq!(checkpoint.next_index, 1);
    assert_eq!(checkpoint.document, "c0.");
    // No step was attempted after the failed write
    assert_eq!(h.provider.seen(), vec!["c0.".to_string(), " c1.".to_string()]);
}

// ============================================================================
// Starting a job
// ============================================================================

#[tokio::test]
async fn test_source_error_creates_no_checkpoint() {
    let h = harness(ScriptedProvider::default());

    let err = h
        .pipeline
        .run(RunRequest::new("no-such-lecture"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(_)));
    assert!(h.pipeline.store().load().unwrap().is_none());
    assert!(h.provider.seen().is_empty());
}

#[tokio::test]
async fn test_empty_transcript_is_not_found() {
    let h = harness(ScriptedProvider::default());

    let err = h.pipeline.run(RunRequest::new("silent")).await.unwrap_err();

    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_no_source_and_no_checkpoint_is_config_error() {
    let h = harness(ScriptedProvider::default());

    let err = h.pipeline.run(RunRequest::resume_saved()).await.unwrap_err();

    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn test_no_source_resumes_saved_job() {
    let h = harness(ScriptedProvider::default());
    let saved = Checkpoint::new(SOURCE, all_chunks(), "c0.| c1.| c2.", 3);
    h.pipeline.store().save(&saved).unwrap();

    let outcome = h.pipeline.run(RunRequest::resume_saved()).await.unwrap();

    assert!(outcome.is_completed());
    assert_eq!(outcome.document(), FULL_DOCUMENT);
    assert_eq!(h.provider.seen(), vec![" c3.".to_string(), " c4.".to_string()]);
    assert_eq!(h.source.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_discard_policy_starts_over() {
    let h = harness(ScriptedProvider::default());
    let saved = Checkpoint::new(SOURCE, all_chunks(), "stale", 3);
    h.pipeline.store().save(&saved).unwrap();

    let outcome = h
        .pipeline
        .run(RunRequest::new(SOURCE).with_policy(ResumePolicy::Discard))
        .await
        .unwrap();

    assert_eq!(outcome.document(), FULL_DOCUMENT);
    assert_eq!(h.provider.seen(), all_chunks());
}

#[tokio::test]
async fn test_different_source_discards_saved_job() {
    let h = harness(ScriptedProvider::failing_on(" other1."));
    let saved = Checkpoint::new(SOURCE, all_chunks(), "c0.", 1);
    h.pipeline.store().save(&saved).unwrap();

    let outcome = h.pipeline.run(RunRequest::new("lecture-2")).await.unwrap();

    assert_eq!(outcome.document(), "other0.");
    let checkpoint = h.pipeline.store().load().unwrap().unwrap();
    assert_eq!(checkpoint.source_id, "lecture-2");
    assert_eq!(checkpoint.next_index, 1);
}

#[tokio::test]
async fn test_failing_new_source_keeps_saved_job() {
    let h = harness(ScriptedProvider::default());
    let saved = Checkpoint::new(SOURCE, all_chunks(), "c0.", 1);
    h.pipeline.store().save(&saved).unwrap();

    let err = h
        .pipeline
        .run(RunRequest::new("no-such-lecture"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(_)));
    let kept = h.pipeline.store().load().unwrap().unwrap();
    assert_eq!(kept.source_id, SOURCE);
    assert_eq!(kept.next_index, 1);
    assert_eq!(kept.document, "c0.");
}

#[tokio::test]
async fn test_discard_with_failing_source_clears_saved_job() {
    let h = harness(ScriptedProvider::default());
    h.pipeline
        .store()
        .save(&Checkpoint::new(SOURCE, all_chunks(), "c0.", 1))
        .unwrap();

    let result = h
        .pipeline
        .run(RunRequest::new("no-such-lecture").with_policy(ResumePolicy::Discard))
        .await;

    assert!(result.is_err());
    assert!(h.pipeline.store().load().unwrap().is_none());
}

#[tokio::test]
async fn test_corrupt_checkpoint_degrades_to_fresh_start() {
    let store = CheckpointStore::new(Arc::new(MemoryMedium::with_record("{\"source_id\": 3")));
    let h = harness_with(store, ScriptedProvider::default());

    let outcome = h.pipeline.run(RunRequest::new(SOURCE)).await.unwrap();

    assert!(outcome.is_completed());
    assert_eq!(h.provider.seen(), all_chunks());
}

#[tokio::test]
async fn test_finished_checkpoint_completes_without_steps() {
    let h = harness(ScriptedProvider::default());
    h.pipeline
        .store()
        .save(&Checkpoint::new(SOURCE, all_chunks(), FULL_DOCUMENT, 5))
        .unwrap();

    let outcome = h.pipeline.run(RunRequest::resume_saved()).await.unwrap();

    assert!(outcome.is_completed());
    assert_eq!(outcome.document(), FULL_DOCUMENT);
    assert!(h.provider.seen().is_empty());
    assert!(h.pipeline.store().load().unwrap().is_none());
}

#[tokio::test]
async fn test_pending_job_matches_source() {
    let h = harness(ScriptedProvider::default());
    assert!(h.pipeline.pending_job(None).is_none());

    h.pipeline
        .store()
        .save(&Checkpoint::new(SOURCE, all_chunks(), "c0.", 1))
        .unwrap();

    assert!(h.pipeline.pending_job(None).is_some());
    assert!(h.pipeline.pending_job(Some(SOURCE)).is_some());
    assert!(h.pipeline.pending_job(Some("lecture-2")).is_none());
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cancels the run once the first chunk is committed
struct CancelAfterFirstStep(CancellationToken);

impl PipelineEmitter for CancelAfterFirstStep {
    fn emit(&self, event: PipelineEvent) {
        if let PipelineEvent::StepCommitted { index: 0, .. } = event {
            self.0.cancel();
        }
    }
}

#[tokio::test]
async fn test_cancellation_stops_between_steps() {
    let token = CancellationToken::new();
    let h = harness(ScriptedProvider::default());
    let pipeline = h
        .pipeline
        .with_emitter(Arc::new(CancelAfterFirstStep(token.clone())))
        .with_cancel_token(token);

    let outcome = pipeline.run(RunRequest::new(SOURCE)).await.unwrap();

    match &outcome {
        PipelineOutcome::PartiallyFailed {
            document,
            next_index,
            error,
            ..
        } => {
            assert_eq!(document, "c0.");
            assert_eq!(*next_index, 1);
            assert!(matches!(error, Error::Cancelled(1)));
        }
        other => panic!("expected partial failure, got {:?}", other),
    }
    assert_eq!(h.provider.seen(), vec!["c0.".to_string()]);
    assert_eq!(pipeline.store().load().unwrap().unwrap().next_index, 1);
}
