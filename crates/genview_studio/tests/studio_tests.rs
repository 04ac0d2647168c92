//! Studio integration tests
//!
//! These drive the full generate / watch / auto-fix loop against scripted
//! transports and error sources.

use std::sync::Arc;
use std::time::Duration;

use genview_protocol::{GenerationMode, StreamEvent};
use genview_studio::mock::{
    RecordingPreview, ScriptedErrorSource, ScriptedTransport, TransportScript,
};
use genview_studio::{
    CheckOutcome, DetectedError, FixOrigin, GenerationKind, Phase, SkipReason, Studio,
    StudioConfig, StudioError, StudioEvent,
};
use tokio::sync::{broadcast, Semaphore};
use tokio::time::timeout;

struct Harness {
    studio: Studio,
    transport: ScriptedTransport,
    source: ScriptedErrorSource,
    preview: RecordingPreview,
}

fn harness(transport: ScriptedTransport, source: ScriptedErrorSource) -> Harness {
    harness_with(StudioConfig::default(), transport, source)
}

fn harness_with(
    config: StudioConfig,
    transport: ScriptedTransport,
    source: ScriptedErrorSource,
) -> Harness {
    let preview = RecordingPreview::new();
    let studio = Studio::new(
        config,
        Arc::new(transport.clone()),
        Arc::new(preview.clone()),
        Arc::new(source.clone()),
    );
    Harness {
        studio,
        transport,
        source,
        preview,
    }
}

fn versions(count: usize) -> ScriptedTransport {
    (1..=count).fold(ScriptedTransport::new(), |t, i| {
        t.with_script(TransportScript::fragments([format!("v{}", i)]))
    })
}

async fn wait_for<F>(events: &mut broadcast::Receiver<StudioEvent>, matches: F) -> StudioEvent
where
    F: Fn(&StudioEvent) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("event channel open");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event arrives in time")
}

async fn wait_for_phase(studio: &Studio, phase: Phase) {
    timeout(Duration::from_secs(5), async {
        while studio.phase() != phase {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("phase reached in time");
}

/// A missing module is detected after generation and repaired automatically.
#[tokio::test]
async fn test_missing_module_is_fixed_automatically() {
    let transport = ScriptedTransport::new()
        .with_script(TransportScript::fragments([
            "import axios from 'axios';\n",
            "export default function App() { return null; }",
        ]))
        .with_script(TransportScript::fragments([
            "export default function App() { return <p>ok</p>; }",
        ]));
    let source = ScriptedErrorSource::new()
        .then(Some(DetectedError::missing_module("axios")))
        .then(None);
    let h = harness(transport, source);
    let mut events = h.studio.subscribe();

    h.studio.generate("build a counter").await.unwrap();
    assert_eq!(h.studio.check_for_errors().await, CheckOutcome::Fixed { attempt: 1 });

    let requests = h.transport.requests();
    assert_eq!(requests.len(), 2);
    let fix = &requests[1];
    assert_eq!(fix.mode(), GenerationMode::Fix);
    assert!(fix.prompt.contains("'axios'"));
    assert!(fix.prompt.contains("React, TypeScript and Tailwind CSS"));
    assert!(fix.current_code.as_deref().unwrap().starts_with("import axios"));

    assert_eq!(
        h.preview.last_app_source().as_deref(),
        Some("export default function App() { return <p>ok</p>; }")
    );
    assert_eq!(h.studio.auto_fix_status().to_string(), "1/3");
    assert!(h.studio.active_error().is_none());

    let history = h.studio.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].origin, FixOrigin::Auto);

    wait_for(&mut events, |e| {
        matches!(e, StudioEvent::ErrorDetected { message } if message == "Cannot find module 'axios'")
    })
    .await;
    wait_for(&mut events, |e| {
        matches!(e, StudioEvent::AutoFixDispatched { attempt: 1, max_attempts: 3, .. })
    })
    .await;
    wait_for(&mut events, |e| {
        matches!(e, StudioEvent::GenerationFinished { kind: GenerationKind::AutoFix, .. })
    })
    .await;

    // The repaired code renders cleanly.
    assert_eq!(h.studio.check_for_errors().await, CheckOutcome::Clean);
    assert_eq!(h.studio.phase(), Phase::Idle);
}

/// Three distinct errors use up the budget; the fourth is never dispatched.
#[tokio::test]
async fn test_auto_fix_stops_after_three_attempts() {
    let source = ScriptedErrorSource::new()
        .then(Some(DetectedError::reported("A")))
        .then(Some(DetectedError::reported("B")))
        .then(Some(DetectedError::reported("C")))
        .then(Some(DetectedError::reported("D")));
    let h = harness(versions(4), source);
    let mut events = h.studio.subscribe();

    h.studio.generate("build a counter").await.unwrap();
    for attempt in 1..=3 {
        assert_eq!(h.studio.check_for_errors().await, CheckOutcome::Fixed { attempt });
    }

    assert_eq!(h.studio.phase(), Phase::Exhausted);
    assert_eq!(h.studio.check_for_errors().await, CheckOutcome::Skipped);
    assert_eq!(h.source.inspections(), 3);
    assert_eq!(h.transport.requests().len(), 4);
    assert_eq!(h.studio.auto_fix_status().to_string(), "3/3");

    wait_for(&mut events, |e| matches!(e, StudioEvent::AutoFixExhausted { attempts: 3 })).await;
}

/// The same unresolved error is acted on once.
#[tokio::test]
async fn test_repeated_error_dispatches_once() {
    let source = ScriptedErrorSource::new().then(Some(DetectedError::reported("A")));
    let h = harness(versions(3), source);

    h.studio.generate("build a counter").await.unwrap();
    assert_eq!(h.studio.check_for_errors().await, CheckOutcome::Fixed { attempt: 1 });
    assert_eq!(
        h.studio.check_for_errors().await,
        CheckOutcome::Ignored(SkipReason::Duplicate)
    );
    assert_eq!(
        h.studio.check_for_errors().await,
        CheckOutcome::Ignored(SkipReason::Duplicate)
    );
    assert_eq!(h.transport.requests().len(), 2);
}

/// An error that comes back after a different one is fixed again.
#[tokio::test]
async fn test_alternating_errors_dispatch_each_time() {
    let source = ScriptedErrorSource::new()
        .then(Some(DetectedError::reported("A")))
        .then(Some(DetectedError::reported("B")))
        .then(Some(DetectedError::reported("A")));
    let h = harness(versions(4), source);

    h.studio.generate("build a counter").await.unwrap();
    for attempt in 1..=3 {
        assert_eq!(h.studio.check_for_errors().await, CheckOutcome::Fixed { attempt });
    }
    assert_eq!(h.transport.requests().len(), 4);
}

/// Checks are no-ops while a generation is streaming.
#[tokio::test]
async fn test_no_auto_fix_while_generation_in_flight() {
    let gate = Arc::new(Semaphore::new(1));
    let transport = versions(3).with_gate(gate.clone());
    let source = ScriptedErrorSource::new().then(Some(DetectedError::reported("A")));
    let h = harness(transport, source);

    h.studio.generate("build a counter").await.unwrap();

    let studio = h.studio.clone();
    let manual = tokio::spawn(async move { studio.fix("make it blue").await });
    wait_for_phase(&h.studio, Phase::Generating).await;

    assert_eq!(h.studio.check_for_errors().await, CheckOutcome::Skipped);
    assert_eq!(h.source.inspections(), 0);
    assert!(matches!(h.studio.restart(), Err(StudioError::Busy)));
    assert!(matches!(h.studio.generate("other").await, Err(StudioError::Busy)));

    gate.add_permits(1);
    manual.await.unwrap().unwrap();

    gate.add_permits(1);
    assert_eq!(h.studio.check_for_errors().await, CheckOutcome::Fixed { attempt: 1 });
    assert_eq!(h.transport.requests().len(), 3);
}

/// A stream that breaks off keeps the partial code visible.
#[tokio::test]
async fn test_broken_stream_keeps_partial_code() {
    let transport = ScriptedTransport::new()
        .with_script(TransportScript::fragments(["v1"]))
        .with_script(TransportScript::FailAfter(
            vec![StreamEvent::Fragment("import Rea".to_string())],
            "connection reset".to_string(),
        ));
    let h = harness(transport, ScriptedErrorSource::new());
    let mut events = h.studio.subscribe();

    h.studio.generate("build a counter").await.unwrap();
    let err = h.studio.fix("make it blue").await.unwrap_err();
    assert!(err.is_transport());

    assert_eq!(h.studio.current_code().as_deref(), Some("import Rea"));
    assert_eq!(h.preview.last_app_source().as_deref(), Some("import Rea"));
    assert_eq!(h.studio.phase(), Phase::Idle);
    wait_for(&mut events, |e| {
        matches!(e, StudioEvent::GenerationFailed { kind: GenerationKind::ManualFix, .. })
    })
    .await;
}

/// A refusal before any fragment leaves the previous code untouched.
#[tokio::test]
async fn test_refusal_keeps_previous_code() {
    let transport = ScriptedTransport::new()
        .with_script(TransportScript::fragments(["v1"]))
        .with_script(TransportScript::Refuse {
            status: 502,
            body: "overloaded".to_string(),
        });
    let h = harness(transport, ScriptedErrorSource::new());

    h.studio.generate("build a counter").await.unwrap();
    assert!(matches!(
        h.studio.fix("make it blue").await,
        Err(StudioError::Status { status: 502, .. })
    ));
    assert_eq!(h.studio.current_code().as_deref(), Some("v1"));
    assert_eq!(h.preview.loaded().len(), 1);
}

/// A successful manual fix gives the auto-fixer a fresh budget.
#[tokio::test]
async fn test_manual_fix_resets_attempts() {
    let source = ScriptedErrorSource::new()
        .then(Some(DetectedError::reported("A")))
        .then(Some(DetectedError::reported("B")))
        .then(None);
    let h = harness(versions(4), source);

    h.studio.generate("build a counter").await.unwrap();
    h.studio.check_for_errors().await;
    h.studio.check_for_errors().await;
    assert_eq!(h.studio.auto_fix_status().attempts, 2);

    h.studio.fix("make it blue").await.unwrap();
    assert_eq!(h.studio.auto_fix_status().attempts, 0);

    let origins: Vec<_> = h.studio.history().iter().map(|r| r.origin).collect();
    assert_eq!(origins, vec![FixOrigin::Auto, FixOrigin::Auto, FixOrigin::Manual]);
}

/// The scheduler runs the settle check on its own after a generation.
#[tokio::test]
async fn test_scheduler_checks_after_settle_delay() {
    let config = StudioConfig::default()
        .settle_delay(Duration::from_millis(10))
        .poll_interval(Duration::from_secs(60));
    let source = ScriptedErrorSource::new()
        .then(Some(DetectedError::undefined_reference("useState")))
        .then(None);
    let h = harness_with(config, versions(2), source);
    let mut events = h.studio.subscribe();
    let scheduler = h.studio.start().unwrap();

    h.studio.generate("build a counter").await.unwrap();

    let dispatched = wait_for(&mut events, |e| matches!(e, StudioEvent::AutoFixDispatched { .. })).await;
    match dispatched {
        StudioEvent::AutoFixDispatched { instruction, .. } => {
            assert!(instruction.contains("useState is not defined"))
        }
        other => panic!("unexpected event: {other:?}"),
    }
    wait_for(&mut events, |e| {
        matches!(e, StudioEvent::GenerationFinished { kind: GenerationKind::AutoFix, .. })
    })
    .await;

    timeout(Duration::from_secs(5), async {
        while h.studio.phase() != Phase::Idle {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("post-fix check runs");

    assert_eq!(h.transport.requests().len(), 2);
    scheduler.abort();
}

/// The recurring poll checks only while code exists and nothing streams.
#[tokio::test(start_paused = true)]
async fn test_poll_interval_checks_when_idle_with_code() {
    let config = StudioConfig::default()
        .settle_delay(Duration::from_secs(600))
        .poll_interval(Duration::from_millis(100));
    let gate = Arc::new(Semaphore::new(0));
    let source = ScriptedErrorSource::new()
        .then(Some(DetectedError::reported("boom")))
        .then(None);
    let h = harness_with(config, versions(2).with_gate(gate.clone()), source);
    let scheduler = h.studio.start().unwrap();

    // No code yet.
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(h.source.inspections(), 0);

    let studio = h.studio.clone();
    let initial = tokio::spawn(async move { studio.generate("build a counter").await });
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(h.studio.phase(), Phase::Generating);
    assert_eq!(h.source.inspections(), 0);

    gate.add_permits(2);
    initial.await.unwrap().unwrap();

    // Long before the settle delay the poll picks the error up.
    tokio::time::sleep(Duration::from_secs(1)).await;
    let requests = h.transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].prompt, "Fix this error: boom");
    assert_eq!(h.studio.auto_fix_status().attempts, 1);
    assert!(h.source.inspections() >= 2);

    scheduler.abort();
}

/// An error read from code that a manual fix replaced during the check is dropped.
#[tokio::test]
async fn test_error_from_replaced_code_is_not_dispatched() {
    let gate = Arc::new(Semaphore::new(0));
    let source = ScriptedErrorSource::new()
        .then(Some(DetectedError::reported("error from v1")))
        .with_gate(gate.clone());
    let h = harness(versions(3), source);

    h.studio.generate("build a counter").await.unwrap();

    let studio = h.studio.clone();
    let check = tokio::spawn(async move { studio.check_for_errors().await });
    timeout(Duration::from_secs(5), async {
        while h.source.inspections() == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("inspection started");

    h.studio.fix("make it blue").await.unwrap();
    gate.add_permits(1);

    assert_eq!(check.await.unwrap(), CheckOutcome::Ignored(SkipReason::Stale));
    assert_eq!(h.transport.requests().len(), 2);
    assert_eq!(h.studio.auto_fix_status().attempts, 0);
    assert_eq!(h.studio.phase(), Phase::AwaitingErrorCheck);

    // The replaced code gets its own check.
    gate.add_permits(1);
    assert_eq!(h.studio.check_for_errors().await, CheckOutcome::Fixed { attempt: 1 });
}

#[tokio::test]
async fn test_restart_forgets_session() {
    let source = ScriptedErrorSource::new().then(Some(DetectedError::reported("A")));
    let h = harness(versions(3), source);

    h.studio.generate("build a counter").await.unwrap();
    h.studio.check_for_errors().await;
    h.studio.restart().unwrap();

    assert_eq!(h.studio.current_code(), None);
    assert_eq!(h.studio.auto_fix_status().attempts, 0);
    assert!(h.studio.history().is_empty());
    assert!(h.studio.transcript().is_empty());
    assert!(matches!(h.studio.fix("make it blue").await, Err(StudioError::NoArtifact)));
    assert!(h.source.resets() >= 1);

    // A new session may act on the same error again.
    h.studio.generate("build a counter").await.unwrap();
    assert_eq!(h.studio.check_for_errors().await, CheckOutcome::Fixed { attempt: 1 });
}
