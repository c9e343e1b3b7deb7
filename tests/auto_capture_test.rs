//! Auto-capture scheduling against a paused clock

use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use studycam::notify::PipelineEvent;
use studycam::pipeline::{
    CaptureInterval, CaptureOrchestrator, CaptureOutcome, CaptureSettings, CaptureTrigger,
    FrameMailbox,
};
use studycam::testing::{checkerboard_frame, uniform_frame, RecordingNotifier, StubAnalysisClient};
use tokio::runtime::Handle;

fn orchestrator() -> (CaptureOrchestrator, Arc<FrameMailbox>, Arc<RecordingNotifier>) {
    let mailbox = Arc::new(FrameMailbox::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = CaptureOrchestrator::new(
        mailbox.clone(),
        Arc::new(StubAnalysisClient::succeeding(json!({}))),
        notifier.clone(),
        CaptureSettings::default(),
        Handle::current(),
    );
    (orchestrator, mailbox, notifier)
}

fn scheduled_attempts(notifier: &RecordingNotifier) -> usize {
    notifier.count(|e| {
        matches!(
            e,
            PipelineEvent::NoFrame { trigger: CaptureTrigger::Scheduled }
                | PipelineEvent::CaptureRejected { trigger: CaptureTrigger::Scheduled, .. }
                | PipelineEvent::AnalysisSubmitted { trigger: CaptureTrigger::Scheduled, .. }
        )
    })
}

fn secs(n: u64) -> CaptureInterval {
    CaptureInterval::from_secs(n).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_fires_once_per_interval() {
    let (orchestrator, _mailbox, notifier) = orchestrator();
    orchestrator.set_auto_capture(true, secs(5));
    assert_eq!(orchestrator.pending_fires(), 1);

    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert_eq!(scheduled_attempts(&notifier), 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(scheduled_attempts(&notifier), 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(scheduled_attempts(&notifier), 3);
    assert_eq!(orchestrator.pending_fires(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rearms_after_rejection() {
    let (orchestrator, mailbox, notifier) = orchestrator();
    mailbox.put(uniform_frame(32, 32, 120));
    orchestrator.set_auto_capture(true, secs(1));

    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(
        notifier.count(|e| matches!(e, PipelineEvent::CaptureRejected { .. })),
        1
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        notifier.count(|e| matches!(e, PipelineEvent::NoFrame { .. })),
        1
    );
    assert_eq!(orchestrator.pending_fires(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_changing_interval_keeps_single_pending_fire() {
    let (orchestrator, _mailbox, notifier) = orchestrator();
    orchestrator.set_auto_capture(true, secs(10));
    orchestrator.set_auto_capture(true, secs(10));
    orchestrator.set_auto_capture(true, secs(3));
    assert_eq!(orchestrator.pending_fires(), 1);

    tokio::time::sleep(Duration::from_millis(3_100)).await;
    assert_eq!(scheduled_attempts(&notifier), 1);

    // The superseded 10s fires never land
    tokio::time::sleep(Duration::from_millis(7_000)).await;
    assert_eq!(scheduled_attempts(&notifier), 3);
}

#[tokio::test(start_paused = true)]
async fn test_disable_stops_future_fires() {
    let (orchestrator, _mailbox, notifier) = orchestrator();
    orchestrator.set_auto_capture(true, secs(2));
    tokio::time::sleep(Duration::from_millis(2_100)).await;
    assert_eq!(scheduled_attempts(&notifier), 1);

    orchestrator.set_auto_capture(false, secs(2));
    assert_eq!(orchestrator.pending_fires(), 0);
    assert!(orchestrator.next_fire().is_none());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(scheduled_attempts(&notifier), 1);
    assert_eq!(
        notifier.count(|e| matches!(e, PipelineEvent::AutoCaptureDisabled)),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_bad_interval_text_is_clamped_not_zero() {
    let (orchestrator, _mailbox, notifier) = orchestrator();
    let applied = orchestrator.set_auto_capture_text(true, "0");
    assert_eq!(applied.secs(), 1);

    let applied = orchestrator.set_auto_capture_text(true, "ten");
    assert_eq!(applied.secs(), 1);
    assert_eq!(orchestrator.pending_fires(), 1);
    assert_eq!(
        notifier.count(|e| matches!(e, PipelineEvent::IntervalAdjusted(_))),
        2
    );

    tokio::time::sleep(Duration::from_millis(3_100)).await;
    assert_eq!(scheduled_attempts(&notifier), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_manual_captures_share_one_frame() {
    let (orchestrator, mailbox, _notifier) = orchestrator();
    mailbox.put(checkerboard_frame(64, 64, 8, 0, 240));

    let attempts = (0..8).map(|_| {
        let orchestrator = orchestrator.clone();
        tokio::task::spawn_blocking(move || orchestrator.capture_now())
    });
    let outcomes: Vec<CaptureOutcome> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let submitted = outcomes
        .iter()
        .filter(|o| matches!(o, CaptureOutcome::Submitted { .. }))
        .count();
    let no_frame = outcomes
        .iter()
        .filter(|o| matches!(o, CaptureOutcome::NoFrame))
        .count();
    assert_eq!(submitted, 1);
    assert_eq!(no_frame, 7);

    let stats = orchestrator.stats();
    assert_eq!(stats.attempts, 8);
    assert_eq!(stats.submitted, 1);
}
