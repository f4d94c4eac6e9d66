use std::time::Duration;

use super::*;
use crate::{
    highlight::strip_markup,
    scripted::{RecordedCall, ScriptedBinder, ScriptedConnector},
};

struct Harness {
    controller: Arc<ConsoleController>,
    view: Arc<MemoryView>,
    binder: Arc<ScriptedBinder>,
}

fn harness() -> Harness {
    let view = Arc::new(MemoryView::new());
    let controller = ConsoleController::new(ConsoleOptions::default(), view.clone());
    Harness {
        controller,
        view,
        binder: ScriptedBinder::new(),
    }
}

async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn ok_status() -> Reply {
    Reply::Success(json!({"status": "ok"}))
}

async fn open_session(h: &Harness) -> JoinHandle<()> {
    h.binder.set_reply("radio/subscribe", ok_status());
    h.binder.set_reply("radio/unsubscribe", ok_status());
    let pump = h
        .controller
        .initialize(&ScriptedConnector::new(h.binder.clone()))
        .await
        .expect("initialize");
    assert!(h.binder.open());
    let binder = h.binder.clone();
    eventually(move || binder.calls_to("radio/subscribe").len() == 2).await;
    eventually(|| h.view.outputs().len() == 2).await;
    pump
}

#[tokio::test]
async fn second_initialize_is_rejected() {
    let h = harness();
    let connector = ScriptedConnector::new(h.binder.clone());
    h.controller.initialize(&connector).await.expect("first");
    let err = h
        .controller
        .initialize(&connector)
        .await
        .expect_err("second open attempt");
    assert!(matches!(err, ConsoleError::AlreadyInitialized));
}

#[tokio::test]
async fn invoke_before_initialize_renders_local_error() {
    let h = harness();
    let reply = h.controller.set_band(Band::Fm).await;

    assert!(!reply.is_success());
    assert_eq!(reply.payload()["code"], json!("unavailable"));
    let output = h.view.last_output().expect("rendered");
    assert!(output.starts_with("ERROR: "), "{output}");
}

#[tokio::test]
async fn open_marks_active_and_subscribes_default_topics() {
    let h = harness();
    let mut state = h.controller.watch_state();
    let _pump = open_session(&h).await;

    state
        .wait_for(|state| *state == ConnectionState::Open)
        .await
        .expect("state");
    assert_eq!(h.view.status(), Some(ConnectionState::Open));

    let mut topics = h
        .binder
        .calls_to("radio/subscribe")
        .into_iter()
        .map(|call| call.argument["value"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<_>>();
    topics.sort();
    assert_eq!(topics, vec!["frequency", "station_found"]);
    assert!(h.view.outputs().iter().all(|out| out.starts_with("OK: ")));
}

#[tokio::test]
async fn duplicate_open_notice_subscribes_once() {
    let h = harness();
    let _pump = open_session(&h).await;
    assert!(h.binder.open());
    h.binder.emit(BinderEvent::new("radio/frequency", json!({"value": 1})));

    // The event is processed after the second open notice.
    eventually(|| h.view.events().len() == 1).await;
    assert_eq!(h.binder.calls_to("radio/subscribe").len(), 2);
}

#[tokio::test]
async fn events_render_while_default_subscribes_are_pending() {
    let h = harness();
    h.binder.set_delayed_reply(
        "radio/subscribe",
        ok_status(),
        Duration::from_millis(500),
    );
    let _pump = h
        .controller
        .initialize(&ScriptedConnector::new(h.binder.clone()))
        .await
        .expect("initialize");
    h.binder.open();
    h.binder.emit(BinderEvent::new("radio/frequency", json!({"value": 101100000})));

    eventually(|| h.view.events().len() == 1).await;
    assert!(h.view.outputs().is_empty());
    assert_eq!(h.controller.state(), ConnectionState::Open);

    h.controller.settle_subscriptions().await;
    assert_eq!(h.view.outputs().len(), 2);
}

#[tokio::test]
async fn settle_subscriptions_without_open_returns_immediately() {
    let h = harness();
    h.controller.settle_subscriptions().await;
    assert!(h.binder.calls().is_empty());
}

#[tokio::test]
async fn events_are_numbered_from_zero_regardless_of_topic() {
    let h = harness();
    let _pump = open_session(&h).await;

    h.binder.emit(BinderEvent::new("radio/frequency", json!({"value": 101100000})));
    h.binder.emit(BinderEvent::new("radio/station_found", json!({"value": 98500000})));
    h.binder.emit(BinderEvent::new("radio/frequency", json!({"value": 101200000})));
    eventually(|| h.view.events().len() == 3).await;

    let events = h.view.events();
    for (idx, rendered) in events.iter().enumerate() {
        assert!(rendered.starts_with(&format!("{idx}: ")), "{rendered}");
    }
    assert_eq!(h.controller.event_count(), 3);
}

#[tokio::test]
async fn abort_before_open_marks_closed_and_still_unsubscribes() {
    let h = harness();
    let pump = h
        .controller
        .initialize(&ScriptedConnector::new(h.binder.clone()))
        .await
        .expect("initialize");
    assert!(h.binder.abort());
    pump.await.expect("pump");

    assert_eq!(h.controller.state(), ConnectionState::Closed);
    assert_eq!(h.view.status(), Some(ConnectionState::Closed));
    assert_eq!(h.binder.calls_to("radio/unsubscribe").len(), 2);
    assert!(h.binder.calls_to("radio/subscribe").is_empty());
    let outputs = h.view.outputs();
    assert_eq!(outputs.len(), 2);
    assert!(outputs.iter().all(|out| out.starts_with("ERROR: ")));
}

struct DroppedNoticeConnector;

impl BinderConnector for DroppedNoticeConnector {
    fn connect(&self) -> Connection {
        let (_tx, notices) = mpsc::unbounded_channel();
        Connection {
            session: Arc::new(MissingBinder),
            notices,
        }
    }
}

#[tokio::test]
async fn dropped_notice_channel_is_treated_as_abort() {
    let h = harness();
    let pump = h
        .controller
        .initialize(&DroppedNoticeConnector)
        .await
        .expect("initialize");
    pump.await.expect("pump");

    assert_eq!(h.controller.state(), ConnectionState::Closed);
    assert_eq!(h.view.outputs().len(), 2);
}

#[tokio::test]
async fn invalid_call_is_rejected_before_sending() {
    let h = harness();
    let _pump = open_session(&h).await;
    let before = h.binder.calls().len();

    let err = h
        .controller
        .call("radio", "", json!({}))
        .await
        .expect_err("empty verb");
    assert!(matches!(err, ConsoleError::Validation(_)));
    assert_eq!(h.binder.calls().len(), before);
    assert_eq!(h.view.outputs().len(), 2);
}

#[tokio::test]
async fn send_wraps_message_in_data_field() {
    let h = harness();
    let _pump = open_session(&h).await;
    h.binder
        .set_reply("radio/ping", Reply::Success(json!("pong")));

    let path = VerbPath::new("radio", "ping").expect("path");
    let reply = h.controller.send(&path, json!({"x": 1})).await;

    assert_eq!(reply, Reply::Success(json!("pong")));
    assert_eq!(
        h.binder.calls_to("radio/ping"),
        vec![RecordedCall {
            verb: "radio/ping".into(),
            argument: json!({"data": {"x": 1}}),
        }]
    );
    let question = h.view.questions().pop().expect("question");
    assert_eq!(strip_markup(&question), r#"subscribe: radio/ping ({"x":1})"#);
}

#[tokio::test]
async fn question_line_shows_binder_url_and_query() {
    let h = harness();
    let _pump = open_session(&h).await;
    h.controller.check_band(Band::Am).await;

    let question = h.view.questions().pop().expect("question");
    assert_eq!(
        strip_markup(&question),
        r#"ws://localhost:1234/api/radio/band_supported?query={"band":"AM"}"#
    );
    assert!(question.contains(r#"<span class="key">"band":</span>"#));
}

#[tokio::test]
async fn concurrent_calls_render_in_completion_order() {
    let h = harness();
    let _pump = open_session(&h).await;
    h.binder.set_delayed_reply(
        "radio/frequency_range",
        Reply::Success(json!({"min": 87500000, "max": 108000000})),
        Duration::from_millis(50),
    );
    h.binder.set_reply(
        "radio/frequency_step",
        Reply::Success(json!({"step": 100000})),
    );

    let (range, step) = tokio::join!(
        h.controller.frequency_range(Band::Fm),
        h.controller.frequency_step(Band::Fm)
    );
    assert!(range.is_success());
    assert!(step.is_success());

    let outputs = h.view.outputs();
    assert_eq!(outputs.len(), 4);
    assert!(strip_markup(&outputs[2]).contains("step"));
    assert!(strip_markup(&outputs[3]).contains("min"));
}

#[tokio::test]
async fn convenience_operations_send_literal_verbs() {
    let h = harness();
    let _pump = open_session(&h).await;
    let before = h.binder.calls().len();

    h.controller.set_band(Band::Fm).await;
    h.controller.check_band(Band::Am).await;
    h.controller.frequency_range(Band::Fm).await;
    h.controller.frequency_step(Band::Am).await;
    h.controller.get_stereo_mode().await;
    h.controller.set_stereo_mode(StereoMode::Stereo).await;

    let sent = h.binder.calls()[before..]
        .iter()
        .map(|call| (call.verb.clone(), call.argument.clone()))
        .collect::<Vec<_>>();
    assert_eq!(
        sent,
        vec![
            ("radio/band".to_string(), json!({"value": "FM"})),
            ("radio/band_supported".to_string(), json!({"band": "AM"})),
            ("radio/frequency_range".to_string(), json!({"band": "FM"})),
            ("radio/frequency_step".to_string(), json!({"band": "AM"})),
            ("radio/stereo_mode".to_string(), json!({})),
            ("radio/stereo_mode".to_string(), json!({"value": "stereo"})),
        ]
    );
}

#[tokio::test]
async fn custom_api_namespace_prefixes_typed_requests() {
    let view = Arc::new(MemoryView::new());
    let options = ConsoleOptions {
        api: ApiName::new("tuner").expect("api"),
        topics: vec![EventTopic::Frequency],
        ..ConsoleOptions::default()
    };
    let controller = ConsoleController::new(options, view);
    let binder = ScriptedBinder::new();
    let _pump = controller
        .initialize(&ScriptedConnector::new(binder.clone()))
        .await
        .expect("initialize");
    binder.open();

    let probe = binder.clone();
    eventually(move || probe.calls().len() == 1).await;
    assert_eq!(binder.calls()[0].verb, "tuner/subscribe");
}
