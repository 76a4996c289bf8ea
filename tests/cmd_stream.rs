// Command result streams, routed through the in-process runtime.

use axis_msgbridge::Core::{BridgeError, CmdRequest, LocalRuntime, RuntimeConfig};
use axis_msgbridge::Core::{Field, FieldValue, NativeRuntime};
use axis_msgbridge::Msg::Structs::{MsgKind, StatusCode};
use axis_msgbridge::{Cmd, CmdResult, Env, Message, StreamState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn setup(config: RuntimeConfig) -> (Arc<LocalRuntime>, Env) {
    let _ = env_logger::builder().is_test(true).try_init();
    let rt = LocalRuntime::new(config);
    let env = Env::new(rt.clone()).unwrap();
    (rt, env)
}

/// Route `name` to a responder that parks the request for the test to drive.
fn park_requests(rt: &LocalRuntime, name: &str) -> Arc<Mutex<Option<CmdRequest>>> {
    let slot = Arc::new(Mutex::new(None));
    let parked = slot.clone();
    rt.on_cmd(name, move |req| {
        *parked.lock() = Some(req);
    });
    slot
}

#[test]
fn ping_streams_two_results() {
    let (rt, env) = setup(RuntimeConfig::default());
    let slot = park_requests(&rt, "ping");

    let cmd = Cmd::create(&env, "ping").unwrap();
    assert_eq!(cmd.cmd_id().unwrap(), 0);
    let stream = env.send_cmd(&cmd).unwrap();
    assert_eq!(cmd.cmd_id().unwrap(), stream.cmd_id());
    assert_eq!(stream.state(), StreamState::Pending);
    assert!(!stream.is_completed());

    let req = slot.lock().take().unwrap();
    assert_eq!(req.name(), "ping");
    assert_eq!(req.cmd_id(), stream.cmd_id());

    req.respond(StatusCode::Ok, false).unwrap();
    assert_eq!(stream.state(), StreamState::Streaming);
    assert!(!stream.is_completed());
    let first = stream.try_recv().unwrap();
    assert!(!first.is_final().unwrap());
    assert!(!first.is_completed().unwrap());
    assert_eq!(first.name(), "ping");

    req.respond(StatusCode::Ok, true).unwrap();
    assert!(stream.is_completed());
    let second = stream.recv().unwrap();
    assert!(second.is_final().unwrap());
    assert!(second.is_completed().unwrap());
    assert_eq!(second.cmd_id().unwrap(), stream.cmd_id());

    assert!(stream.recv().is_none());
    assert_eq!(env.open_streams(), 0);
}

#[test]
fn stream_rejects_results_of_other_commands() {
    let (rt, env) = setup(RuntimeConfig::default());
    let slot = park_requests(&rt, "ping");
    assert!(rt.has_responder("ping"));
    assert!(!rt.has_responder("pong"));

    let first_cmd = Cmd::create(&env, "ping").unwrap();
    let first = env.send_cmd(&first_cmd).unwrap();
    let first_req = slot.lock().take().unwrap();
    let second_cmd = Cmd::create(&env, "ping").unwrap();
    let second = env.send_cmd(&second_cmd).unwrap();
    assert_ne!(first.cmd_id(), second.cmd_id());

    let stray = CmdResult::create_from_cmd(&env, StatusCode::Ok, &second_cmd).unwrap();
    assert!(matches!(
        first.accept(stray.clone()),
        Err(BridgeError::InvalidArgument(_))
    ));
    assert_eq!(first.state(), StreamState::Pending);
    assert_eq!(first.accepted(), 0);
    assert!(first.try_recv().is_none());
    assert!(!stray.is_completed().unwrap());

    // Both streams still take their own results.
    second.accept(stray).unwrap();
    assert!(second.is_completed());
    first_req.respond(StatusCode::Ok, true).unwrap();
    assert!(first.is_completed());
    assert_eq!(
        first.try_recv().unwrap().cmd_id().unwrap(),
        first_cmd.cmd_id().unwrap()
    );
}

#[test]
fn result_after_final_is_late() {
    let (rt, env) = setup(RuntimeConfig::default());
    let slot = park_requests(&rt, "ping");

    let cmd = Cmd::create(&env, "ping").unwrap();
    let stream = env.send_cmd(&cmd).unwrap();
    let req = slot.lock().take().unwrap();

    req.respond(StatusCode::Ok, true).unwrap();
    assert_eq!(
        req.respond(StatusCode::Ok, false),
        Err(BridgeError::LateResult {
            cmd_id: stream.cmd_id()
        })
    );
    assert_eq!(stream.accepted(), 1);

    // Direct routing into a finished stream is rejected the same way.
    let extra = CmdResult::create_from_cmd(&env, StatusCode::Ok, &cmd).unwrap();
    assert!(matches!(
        stream.accept(extra),
        Err(BridgeError::LateResult { .. })
    ));

    drop(req);
    drop(stream);
    drop(cmd);
    assert_eq!(rt.live_count(), 0);
}

#[test]
fn dropped_stream_turns_results_late() {
    let (rt, env) = setup(RuntimeConfig::default());
    let slot = park_requests(&rt, "ping");

    let cmd = Cmd::create(&env, "ping").unwrap();
    let cmd_id = env.send_cmd(&cmd).unwrap().cmd_id();
    let req = slot.lock().take().unwrap();

    assert_eq!(
        req.respond(StatusCode::Ok, true),
        Err(BridgeError::LateResult { cmd_id })
    );
}

#[test]
fn cmd_without_destination_fails() {
    let (_rt, env) = setup(RuntimeConfig::default());
    let cmd = Cmd::create(&env, "nowhere").unwrap();
    match env.send_cmd(&cmd) {
        Err(BridgeError::CrossBoundaryFailure(msg)) => assert!(msg.contains("no destination")),
        other => panic!("expected CrossBoundaryFailure, got {:?}", other),
    }
    assert_eq!(env.open_streams(), 0);
}

#[test]
fn inline_responder_results_are_queued_in_order() {
    let (rt, env) = setup(RuntimeConfig::default());
    rt.on_cmd("count", |req| {
        for i in 0..5u32 {
            req.respond_with(StatusCode::Ok, i == 4, |rt, h| {
                rt.set_property(h, "seq", serde_json::json!(i))
            })
            .unwrap();
        }
    });

    let cmd = Cmd::create(&env, "count").unwrap();
    let stream = env.send_cmd(&cmd).unwrap();
    assert!(stream.is_completed());

    let seqs: Vec<u32> = stream
        .map(|r| r.get_property::<u32>("seq").unwrap().unwrap())
        .collect();
    assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
}

#[test]
fn threaded_responder_unblocks_recv() {
    let (rt, env) = setup(RuntimeConfig::default().with_threaded_dispatch(true));
    rt.on_cmd("slow", |req| {
        for i in 0..3 {
            thread::sleep(Duration::from_millis(20));
            req.respond(StatusCode::Ok, i == 2).unwrap();
        }
    });

    let cmd = Cmd::create(&env, "slow").unwrap();
    let stream = env.send_cmd(&cmd).unwrap();

    let mut finals = Vec::new();
    while let Some(result) = stream.recv() {
        finals.push(result.is_final().unwrap());
    }
    assert_eq!(finals, vec![false, false, true]);
    assert!(stream.is_completed());
}

#[test]
fn recv_timeout_gives_up() {
    let (rt, env) = setup(RuntimeConfig::default());
    let slot = park_requests(&rt, "silent");

    let cmd = Cmd::create(&env, "silent").unwrap();
    let stream = env.send_cmd(&cmd).unwrap();
    assert!(stream.recv_timeout(Duration::from_millis(30)).is_none());
    assert_eq!(stream.state(), StreamState::Pending);

    let req = slot.lock().take().unwrap();
    req.respond(StatusCode::Error, true).unwrap();
    let result = stream.recv_timeout(Duration::from_millis(30)).unwrap();
    assert_eq!(result.status_code().unwrap(), StatusCode::Error);
}

#[test]
fn inbound_cmd_answered_once_final() {
    let (rt, env) = setup(RuntimeConfig::default());
    let inbox: Arc<Mutex<Vec<Message>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = inbox.clone();
    env.on_msg(move |_, msg| sink.lock().push(msg));

    let h = rt.create(MsgKind::Cmd, "hello").unwrap();
    rt.set_field(h, Field::CmdId, FieldValue::U64(77)).unwrap();
    rt.deliver(h).unwrap();
    rt.destroy(h);

    let cmd: Cmd = inbox.lock().pop().unwrap().try_into().unwrap();
    assert_eq!(cmd.name(), "hello");
    assert_eq!(cmd.cmd_id().unwrap(), 77);

    let partial = CmdResult::create_from_cmd(&env, StatusCode::Ok, &cmd).unwrap();
    partial.set_final(false).unwrap();
    env.return_result(&partial).unwrap();

    let last = CmdResult::create_from_cmd(&env, StatusCode::Ok, &cmd).unwrap();
    assert!(last.is_final().unwrap());
    env.return_result(&last).unwrap();

    let late = CmdResult::create_from_cmd(&env, StatusCode::Error, &cmd).unwrap();
    assert_eq!(
        env.return_result(&late),
        Err(BridgeError::LateResult { cmd_id: 77 })
    );

    let returned = rt.take_returned(77);
    assert_eq!(returned.len(), 2);
    for h in returned {
        rt.destroy(h);
    }
}
