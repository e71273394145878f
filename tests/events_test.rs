use std::sync::Arc;
use std::time::Duration;

use batchcheck::checker::mock::{Script, ScriptedChecker};
use batchcheck::checker::{NETWORK_ERROR, Status};
use batchcheck::controller::{BatchController, ControllerConfig};
use batchcheck::events::Event;

fn controller(checker: ScriptedChecker) -> BatchController {
    BatchController::new(Arc::new(checker), ControllerConfig::default())
}

#[tokio::test]
async fn completed_run_streams_outcomes_in_order() {
    let controller = controller(ScriptedChecker::new().on("B", Script::Fail("boom".into())));
    let mut rx = controller.subscribe();

    controller.start("A\nB\nC").unwrap();

    let mut events = Vec::new();
    loop {
        let event = rx.recv().await.unwrap();
        let done = matches!(event, Event::RunFinished { .. });
        events.push(event);
        if done {
            break;
        }
    }

    assert!(matches!(events[0], Event::RunStarted { total: 3, .. }));
    let completed: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::ItemCompleted { index, outcome, .. } => Some((*index, outcome.clone())),
            _ => None,
        })
        .collect();
    let order: Vec<_> = completed
        .iter()
        .map(|(i, o)| (*i, o.record.as_str().to_string()))
        .collect();
    assert_eq!(
        order,
        [(0, "A".to_string()), (1, "B".to_string()), (2, "C".to_string())]
    );
    assert_eq!(completed[1].1.status, Status::Declined);
    assert_eq!(completed[1].1.reason.as_deref(), Some(NETWORK_ERROR));
    assert!(matches!(
        events.last(),
        Some(Event::RunFinished { processed: 3, .. })
    ));

    // Every item starts before it completes.
    let started = events
        .iter()
        .position(|e| matches!(e, Event::ItemStarted { index: 1, .. }))
        .unwrap();
    let finished = events
        .iter()
        .position(|e| matches!(e, Event::ItemCompleted { index: 1, .. }))
        .unwrap();
    assert!(started < finished);
}

#[tokio::test]
async fn control_events_carry_run_id() {
    let controller = controller(ScriptedChecker::new());
    let mut rx = controller.subscribe();

    controller.start("a\nb").unwrap();
    controller.pause();
    controller.resume();
    controller.stop();
    controller.settled().await;
    controller.clear().unwrap();

    let run_id = match rx.recv().await.unwrap() {
        Event::RunStarted { run_id, .. } => run_id,
        other => panic!("unexpected event: {other:?}"),
    };
    assert!(matches!(rx.recv().await.unwrap(), Event::RunPaused { run_id: id } if id == run_id));
    assert!(matches!(rx.recv().await.unwrap(), Event::RunResumed { run_id: id } if id == run_id));
    assert!(matches!(
        rx.recv().await.unwrap(),
        Event::RunStopped { run_id: id, processed: 0 } if id == run_id
    ));
    assert!(matches!(rx.recv().await.unwrap(), Event::RunCleared));
}

#[tokio::test]
async fn no_op_controls_emit_nothing() {
    let controller = controller(ScriptedChecker::new());
    let mut rx = controller.subscribe();

    controller.pause();
    controller.resume();
    controller.stop();

    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn cleared_run_closes_in_flight_item_as_discarded() {
    let controller = controller(
        ScriptedChecker::new().on("slow", Script::Delay(Duration::from_secs(2))),
    );
    let mut rx = controller.subscribe();

    controller.start("slow\nnext").unwrap();
    let mut state = controller.watch();
    state.wait_for(|s| s.current_record.is_some()).await.unwrap();
    controller.stop();
    controller.clear().unwrap();
    controller.settled().await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(events.iter().any(|e| matches!(e, Event::ItemStarted { index: 0, .. })));
    assert!(!events.iter().any(|e| matches!(e, Event::ItemCompleted { .. })));
    assert!(matches!(
        events.last(),
        Some(Event::ItemDiscarded { index: 0, .. })
    ));
}
