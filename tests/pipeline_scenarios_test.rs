//! End-to-end pipeline scenarios with a scripted camera and analysis client

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use studycam::errors::{AnalysisError, DeviceError, StudyCamError};
use studycam::notify::PipelineEvent;
use studycam::pipeline::{
    CaptureOutcome, CaptureSettings, Pipeline, PipelineConfig, PipelineParts,
};
use studycam::testing::{
    RecordingNotifier, RecordingSink, ScriptedBackend, ScriptedRead, StubAnalysisClient,
};
use tokio::runtime::Handle;

struct Harness {
    pipeline: Pipeline,
    client: Arc<StubAnalysisClient>,
    notifier: Arc<RecordingNotifier>,
}

fn start(read: ScriptedRead, client: StubAnalysisClient, config: PipelineConfig) -> Harness {
    let client = Arc::new(client);
    let notifier = Arc::new(RecordingNotifier::default());
    let parts = PipelineParts {
        backend: Arc::new(ScriptedBackend::new(vec![read]).repeat_last()),
        client: client.clone(),
        sink: Arc::new(RecordingSink::default()),
        notifier: notifier.clone(),
    };
    let pipeline = Pipeline::start(parts, config, Handle::current()).unwrap();
    Harness {
        pipeline,
        client,
        notifier,
    }
}

/// The preview may drain the slot first; retry until the capture sees a frame
async fn capture_until_frame(pipeline: &Pipeline) -> CaptureOutcome {
    for _ in 0..200 {
        match pipeline.orchestrator().capture_now().unwrap() {
            CaptureOutcome::NoFrame => tokio::time::sleep(Duration::from_millis(5)).await,
            other => return other,
        }
    }
    panic!("no frame reached the capture path");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_good_frame_is_analyzed_and_stored() {
    let harness = start(
        ScriptedRead::Sharp,
        StubAnalysisClient::succeeding(json!({"material_type": "math", "analysis": "quadratics"})),
        PipelineConfig::default(),
    );

    let task = match capture_until_frame(&harness.pipeline).await {
        CaptureOutcome::Submitted { report, task } => {
            assert!(report.passed);
            assert!(report.sharpness >= 100.0);
            assert_eq!(report.brightness, 120.0);
            task
        }
        other => panic!("expected submission, got {:?}", other),
    };

    let record = task.await.unwrap().unwrap();
    assert_eq!(harness.client.calls(), 1);
    assert!(harness.client.last_payload().is_some_and(|b| b.starts_with(&[0xFF, 0xD8])));

    let latest = harness.pipeline.orchestrator().latest().unwrap();
    assert_eq!(latest.id, record.id);
    assert_eq!(latest.outcome.summary(), "quadratics");
    assert!(harness
        .notifier
        .events()
        .iter()
        .any(|e| matches!(e, PipelineEvent::AnalysisCompleted(r) if r.version == 1)));

    harness.pipeline.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_blurry_frame_never_reaches_client() {
    let harness = start(
        ScriptedRead::Frame(120),
        StubAnalysisClient::succeeding(json!({})),
        PipelineConfig::default(),
    );

    match capture_until_frame(&harness.pipeline).await {
        CaptureOutcome::Rejected(report) => {
            assert!(!report.passed);
            assert_eq!(report.sharpness, 0.0);
            assert_eq!(report.brightness, 120.0);
        }
        other => panic!("expected rejection, got {:?}", other),
    }

    assert_eq!(harness.client.calls(), 0);
    assert!(harness.pipeline.orchestrator().latest().is_none());

    let lines = harness.notifier.lines();
    assert!(lines
        .iter()
        .any(|l| l.contains("sharpness 0.0") && l.contains("brightness 120.0")));

    harness.pipeline.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_device_open_failure_is_synchronous() {
    let notifier = Arc::new(RecordingNotifier::default());
    let sink = Arc::new(RecordingSink::default());
    let parts = PipelineParts {
        backend: Arc::new(ScriptedBackend::failing_open()),
        client: Arc::new(StubAnalysisClient::succeeding(json!({}))),
        sink: sink.clone(),
        notifier: notifier.clone(),
    };

    let result = Pipeline::start(parts, PipelineConfig::default(), Handle::current());
    assert!(matches!(
        result,
        Err(StudyCamError::Device(DeviceError::OpenFailed { index: 0, .. }))
    ));

    // Preview never started
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(sink.frames(), 0);
    assert!(sink.statuses().is_empty());
    assert!(notifier
        .events()
        .iter()
        .any(|e| matches!(e, PipelineEvent::CameraOpenFailed(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scenario_analysis_timeout_keeps_pipeline_usable() {
    let config = PipelineConfig {
        capture: CaptureSettings {
            analysis_timeout: Duration::from_millis(100),
            ..Default::default()
        },
        ..Default::default()
    };
    let harness = start(
        ScriptedRead::Sharp,
        StubAnalysisClient::succeeding(json!({})).with_delay(Duration::from_secs(10)),
        config,
    );

    let task = match capture_until_frame(&harness.pipeline).await {
        CaptureOutcome::Submitted { task, .. } => task,
        other => panic!("expected submission, got {:?}", other),
    };
    let err = task.await.unwrap().unwrap_err();
    assert_eq!(err, AnalysisError::Timeout(Duration::from_millis(100)));
    assert!(harness
        .notifier
        .events()
        .iter()
        .any(|e| matches!(e, PipelineEvent::AnalysisFailed { error: AnalysisError::Timeout(_), .. })));

    // Next manual capture still goes through
    assert!(harness.pipeline.is_running());
    let task = match capture_until_frame(&harness.pipeline).await {
        CaptureOutcome::Submitted { task, .. } => task,
        other => panic!("expected submission, got {:?}", other),
    };
    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, AnalysisError::Timeout(_)));
    assert_eq!(harness.client.calls(), 2);

    let stats = harness.pipeline.orchestrator().stats();
    assert_eq!(stats.submitted, 2);
    assert_eq!(stats.failed, 2);
    assert!(harness.pipeline.is_running());

    harness.pipeline.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn preview_reports_connected_once() {
    let sink = Arc::new(RecordingSink::default());
    let parts = PipelineParts {
        backend: Arc::new(ScriptedBackend::new(vec![ScriptedRead::Sharp]).repeat_last()),
        client: Arc::new(StubAnalysisClient::succeeding(json!({}))),
        sink: sink.clone(),
        notifier: Arc::new(RecordingNotifier::default()),
    };
    let pipeline = Pipeline::start(parts, PipelineConfig::default(), Handle::current()).unwrap();

    tokio::time::sleep(Duration::from_millis(550)).await;
    assert!(sink.frames() >= 2);
    assert_eq!(sink.statuses(), vec![true]);

    pipeline.stop();
    pipeline.stop();
    assert!(!pipeline.is_running());
    assert!(pipeline.mailbox().try_get().is_none());
}
