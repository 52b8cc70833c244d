//! Multi-segment restyle workflow tests
//!
//! Exercise consistency-reference gating, partial-failure isolation, and
//! the progress stream's wire contract through the public API.

use image::DynamicImage;
use maskguard::backends::test_utils::{MockGenerativeModel, MockReply};
use maskguard::{
    EditConfig, GenerativeEditBroker, MemoryBlobStore, MemoryEditLedger, ProgressEvent,
    ProgressStream, RestyleStyle, RetryPolicy, SegmentConsistencyOrchestrator, SegmentJob,
    SegmentRole, SegmentState,
};
use std::sync::Arc;

fn jobs(count: usize) -> Vec<SegmentJob> {
    (0..count)
        .map(|index| SegmentJob {
            order_index: index,
            image: DynamicImage::new_rgba8(40, 30),
            role: match index {
                0 => SegmentRole::First,
                i if i == count - 1 => SegmentRole::Last,
                _ => SegmentRole::Middle,
            },
            section_id: format!("sec-{index}"),
            previous_image_id: None,
        })
        .collect()
}

fn config(style: RestyleStyle) -> EditConfig {
    EditConfig::builder()
        .style(style)
        .retry_policy(RetryPolicy {
            max_attempts: 2,
            backoff_base_ms: 1,
        })
        .build()
        .unwrap()
}

fn orchestrator(
    primary: Arc<MockGenerativeModel>,
    style: RestyleStyle,
) -> (
    SegmentConsistencyOrchestrator,
    Arc<MemoryBlobStore>,
    Arc<MemoryEditLedger>,
) {
    let fallback = Arc::new(MockGenerativeModel::always_unavailable("fallback"));
    let broker = GenerativeEditBroker::new(primary, fallback);
    let blobs = Arc::new(MemoryBlobStore::new());
    let ledger = Arc::new(MemoryEditLedger::new());
    let orch = SegmentConsistencyOrchestrator::new(
        broker,
        blobs.clone(),
        ledger.clone(),
        config(style),
    );
    (orch, blobs, ledger)
}

#[tokio::test(start_paused = true)]
async fn professional_run_attaches_reference_to_later_segments() {
    let _ = env_logger::builder().is_test(true).try_init();
    let primary = Arc::new(MockGenerativeModel::always_image("primary", 40, 30));
    let (orch, blobs, ledger) = orchestrator(primary.clone(), RestyleStyle::Professional);

    let (stream, mut rx) = ProgressStream::channel();
    let summary = orch.run_restyle(&jobs(3), &*stream).await.unwrap();
    drop(stream);

    assert_eq!(summary.updated_count, 3);
    assert_eq!(summary.total_count, 3);

    let requests = primary.recorded_requests();
    assert_eq!(requests[0].image_part_count(), 1);
    assert_eq!(requests[1].image_part_count(), 2);
    assert_eq!(requests[2].image_part_count(), 2);

    // Everything persisted: three blobs, three pointers, three history rows
    assert_eq!(blobs.len(), 3);
    assert_eq!(ledger.image_count(), 3);
    assert_eq!(ledger.history().len(), 3);

    // Wire contract: ordered frames, each a single `data: <JSON>` line,
    // exactly one terminal event, and it is the last one
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert!(events.len() >= 5); // init + setup + 3 processing + complete
    for event in &events {
        let frame = event.to_sse();
        assert!(frame.starts_with("data: {\"type\":"));
        assert!(frame.ends_with("\n\n"));
    }
    let terminal_count = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminal_count, 1);
    assert_eq!(events.last(), Some(&ProgressEvent::complete(3, 3)));
}

#[tokio::test(start_paused = true)]
async fn sampling_run_never_attaches_a_reference() {
    let primary = Arc::new(MockGenerativeModel::always_image("primary", 40, 30));
    let (orch, _, _) = orchestrator(primary.clone(), RestyleStyle::Sampling);

    orch.run_restyle(&jobs(3), &maskguard::NoOpProgressSink)
        .await
        .unwrap();

    for request in primary.recorded_requests() {
        assert_eq!(request.image_part_count(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn failed_middle_segment_does_not_halt_the_run() {
    // Segment 1 exhausts both attempt-cycles; segments 0 and 2 succeed
    let primary = Arc::new(MockGenerativeModel::scripted(
        "primary",
        vec![
            MockReply::image(40, 30),
            MockReply::Unavailable("outage".to_string()),
            MockReply::Unavailable("outage".to_string()),
        ],
        MockReply::image(40, 30),
    ));
    let (orch, blobs, _) = orchestrator(primary, RestyleStyle::Professional);

    let summary = orch
        .run_restyle(&jobs(3), &maskguard::NoOpProgressSink)
        .await
        .unwrap();

    assert_eq!(summary.updated_count, 2);
    assert_eq!(summary.total_count, 3);
    assert_eq!(summary.segments[1].state, SegmentState::Failed);
    assert!(summary.segments[1].image_url.is_none());
    assert_eq!(summary.segments[2].state, SegmentState::Succeeded);
    assert_eq!(blobs.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn all_segments_failing_still_reaches_complete() {
    let primary = Arc::new(MockGenerativeModel::always_unavailable("primary"));
    let (orch, blobs, ledger) = orchestrator(primary, RestyleStyle::Vibrant);

    let (stream, mut rx) = ProgressStream::channel();
    let summary = orch.run_restyle(&jobs(2), &*stream).await.unwrap();
    drop(stream);

    assert_eq!(summary.updated_count, 0);
    assert!(blobs.is_empty());
    assert!(ledger.history().is_empty());

    let mut last = None;
    while let Some(event) = rx.recv().await {
        last = Some(event);
    }
    // A run with zero successes is still a completed run, not an error
    assert_eq!(last, Some(ProgressEvent::complete(0, 2)));
}

#[tokio::test(start_paused = true)]
async fn restyled_frames_match_segment_slot_dimensions() {
    // The model answers with a frame sized nothing like the slot
    let primary = Arc::new(MockGenerativeModel::always_image("primary", 512, 512));
    let (orch, blobs, _) = orchestrator(primary, RestyleStyle::Minimal);

    let summary = orch
        .run_restyle(&jobs(1), &maskguard::NoOpProgressSink)
        .await
        .unwrap();
    assert_eq!(summary.updated_count, 1);

    // The persisted frame was normalized to the 40x30 slot
    let url = summary.segments[0].image_url.clone().unwrap();
    let key = url.strip_prefix("memory://").unwrap();
    let bytes = blobs.get(key).unwrap();
    let stored = image::load_from_memory(&bytes).unwrap();
    assert_eq!((stored.width(), stored.height()), (40, 30));
}
