//! End-to-end tests over a live listener.
//!
//! These run the real TCP server with in-process thread workers so they are
//! independent of the worker binary's build location; the process-isolation
//! suite lives in `process_workers.rs`.

use std::net::{SocketAddr, TcpStream};
use std::thread;

use serde_json::json;

use envlane::{ClientError, MakeSpec, RemoteEnv, Server, ServerConfig, WorkerMode};
use envlane_env::Space;
use envlane_protocol::{frame, Dtype, Response, Tensor};

fn start_server(worker_mode: WorkerMode) -> SocketAddr {
    let config = ServerConfig {
        port: 0,
        worker_mode,
        ..ServerConfig::default()
    };
    let server = Server::bind(config).expect("bind listener");
    let addr = server.local_addr().expect("local addr");
    thread::spawn(move || {
        let _ = server.run();
    });
    addr
}

fn demo_spec() -> MakeSpec {
    MakeSpec::new("demo-env").kwarg("seed", json!(11))
}

// === The canonical scenario ===

#[test]
fn test_make_reset_step_scenario() {
    let addr = start_server(WorkerMode::Thread);
    let mut env = RemoteEnv::connect(addr).expect("connect");

    let info = env.make(&demo_spec()).expect("make");
    assert_eq!(info.action_space, Space::Discrete { n: 2 });
    match &info.observation_space {
        Space::Box { shape, dtype, .. } => {
            assert_eq!(shape, &vec![4]);
            assert_eq!(*dtype, Dtype::F32);
        }
        other => panic!("expected box observation space, got {:?}", other),
    }
    assert_eq!(info.render_fps, Some(30.0));

    let (observation, _info) = env.reset().expect("reset");
    let tensor = Tensor::from_value(&observation).expect("observation tensor");
    assert_eq!(tensor.shape, vec![4]);

    let outcome = env.step(json!(1)).expect("step");
    assert!(!outcome.terminated);
    assert!(!outcome.truncated);
    assert_eq!(outcome.reward, 1.0);
    let tensor = Tensor::from_value(&outcome.observation).expect("step observation");
    assert_eq!(tensor.shape, vec![4]);

    env.close().expect("close");
}

#[test]
fn test_render_returns_declared_image_shape() {
    let addr = start_server(WorkerMode::Thread);
    let mut env = RemoteEnv::connect(addr).expect("connect");

    env.make(&demo_spec()).expect("make");
    env.reset().expect("reset");

    let image = env.render().expect("render");
    let tensor = Tensor::from_value(&image).expect("image tensor");
    assert_eq!(tensor.shape, vec![48, 64, 3]);
    assert_eq!(tensor.dtype, Dtype::U8);
}

// === Ordering and state machine over the wire ===

#[test]
fn test_step_before_make_is_an_error_and_session_survives() {
    let addr = start_server(WorkerMode::Thread);
    let mut env = RemoteEnv::connect(addr).expect("connect");

    let err = env.step(json!(0)).expect_err("step before make");
    match err {
        ClientError::Remote { message, .. } => {
            assert!(message.contains("not initialized"), "got {:?}", message);
        }
        other => panic!("expected remote error, got {:?}", other),
    }

    let err = env.reset().expect_err("reset before make");
    assert!(matches!(err, ClientError::Remote { .. }));

    // The session is still usable.
    env.make(&demo_spec()).expect("make after errors");
    env.reset().expect("reset");
}

#[test]
fn test_make_after_make_replaces_environment() {
    let addr = start_server(WorkerMode::Thread);
    let mut env = RemoteEnv::connect(addr).expect("connect");

    env.make(&demo_spec()).expect("first make");
    env.reset().expect("reset");

    let spec = demo_spec().kwarg("max_steps", json!(1));
    env.make(&spec).expect("second make");
    env.reset().expect("reset after remake");

    // The replacement's step budget applies.
    let outcome = env.step(json!(0)).expect("step");
    assert!(outcome.truncated || outcome.terminated);
}

#[test]
fn test_session_is_terminal_after_close() {
    let addr = start_server(WorkerMode::Thread);
    let mut env = RemoteEnv::connect(addr).expect("connect");
    env.make(&demo_spec()).expect("make");
    env.close().expect("close");

    // A fresh connection is the way to start over.
    let mut again = RemoteEnv::connect(addr).expect("reconnect");
    again.make(&demo_spec()).expect("make on new session");
}

#[test]
fn test_unknown_request_type_gets_error_response() {
    let addr = start_server(WorkerMode::Thread);
    let mut stream = TcpStream::connect(addr).expect("connect");

    let raw = serde_json::to_vec(&json!({"type": "teleport", "payload": {}})).unwrap();
    frame::write_frame(&mut stream, &raw).expect("write");

    let payload = frame::read_frame(&mut stream)
        .expect("read")
        .expect("response frame");
    let response: Response = serde_json::from_slice(&payload).expect("parse");
    match response {
        Response::Error { message, .. } => {
            assert!(message.contains("invalid request"), "got {:?}", message);
        }
        other => panic!("expected error response, got {:?}", other),
    }

    // And the connection still answers well-formed requests.
    let raw = serde_json::to_vec(&json!({
        "type": "make",
        "payload": {"env_id": "demo-env"}
    }))
    .unwrap();
    frame::write_frame(&mut stream, &raw).expect("write make");
    let payload = frame::read_frame(&mut stream)
        .expect("read make")
        .expect("make response frame");
    let response: Response = serde_json::from_slice(&payload).expect("parse make");
    assert!(matches!(response, Response::Ok { .. }));
}

#[test]
fn test_unknown_env_id_error_carries_traceback_field() {
    let addr = start_server(WorkerMode::Thread);
    let mut env = RemoteEnv::connect(addr).expect("connect");

    let err = env
        .make(&MakeSpec::new("no-such-env"))
        .expect_err("make should fail");
    match err {
        ClientError::Remote { message, traceback } => {
            assert!(message.contains("no-such-env"));
            assert!(!traceback.is_empty());
        }
        other => panic!("expected remote error, got {:?}", other),
    }
}

// === Isolation and concurrency ===

#[test]
fn test_collaborator_fault_does_not_disturb_other_session() {
    let addr = start_server(WorkerMode::Thread);

    let mut healthy = RemoteEnv::connect(addr).expect("connect healthy");
    let mut faulty = RemoteEnv::connect(addr).expect("connect faulty");

    healthy.make(&demo_spec()).expect("make healthy");
    faulty
        .make(&MakeSpec::new("faulty-env"))
        .expect("make faulty");

    healthy.reset().expect("reset healthy");
    faulty.reset().expect("reset faulty");

    let err = faulty.step(json!(0)).expect_err("injected failure");
    assert!(matches!(err, ClientError::Remote { .. }));

    // Interleave: the healthy session keeps working, and the faulty
    // session recovers within its own connection.
    let outcome = healthy.step(json!(0)).expect("step healthy");
    assert_eq!(outcome.reward, 1.0);
    faulty.reset().expect("faulty session still serves");

    healthy.close().expect("close healthy");
}

#[test]
fn test_ten_concurrent_sessions_no_cross_talk() {
    let addr = start_server(WorkerMode::Thread);

    let handles: Vec<_> = (0..10)
        .map(|i| {
            thread::spawn(move || {
                let mut env = RemoteEnv::connect(addr).expect("connect");
                // Distinct budgets per session: a response delivered to the
                // wrong connection would truncate at the wrong step.
                let budget = 5 + i;
                let spec = MakeSpec::new("demo-env")
                    .kwarg("seed", json!(i))
                    .kwarg("max_steps", json!(budget));
                let info = env.make(&spec).expect("make");
                assert_eq!(info.action_space, Space::Discrete { n: 2 });

                env.reset().expect("reset");
                let mut expected_steps = 0u64;
                for step in 0..5 {
                    let outcome = env.step(json!(step % 2)).expect("step");
                    expected_steps += 1;
                    let tensor =
                        Tensor::from_value(&outcome.observation).expect("observation");
                    assert_eq!(tensor.shape, vec![4]);
                    assert_eq!(outcome.info["steps"], json!(expected_steps));
                    if outcome.terminated {
                        env.reset().expect("reset after termination");
                        expected_steps = 0;
                    }
                }
                env.close().expect("close");
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("session thread panicked");
    }
}

#[test]
fn test_disconnect_without_close_leaves_server_healthy() {
    let addr = start_server(WorkerMode::Thread);

    {
        let mut env = RemoteEnv::connect(addr).expect("connect");
        env.make(&demo_spec()).expect("make");
        env.reset().expect("reset");
        // Dropped without close: the handler must tear the session down on
        // its own.
    }

    let mut env = RemoteEnv::connect(addr).expect("reconnect");
    env.make(&demo_spec()).expect("make after abrupt disconnect");
    env.close().expect("close");
}
