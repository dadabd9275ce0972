//! End-to-end tests over real TCP connections: a Backend host with generated
//! constructs on both sides of the wire.

use std::sync::Arc;

use pathcall_lib::{BindStatus, CallError, ServerOptions, Target, TargetOptions};
use pathcall_macro::schema_file;
use serde_json::json;
use tokio::sync::{mpsc, Mutex};

schema_file!("pathcall_macro/tests/fixtures/chat.schema");

fn server_options() -> ServerOptions {
    ServerOptions {
        port: 0,
        allowed_cors_origins: vec![],
    }
}

/// Spawns the accept loop and returns the ephemeral port it bound.
async fn start(server: &BackendServer) -> u16 {
    tokio::spawn(server.run().await.expect("server should bind"));
    server.local_addr().expect("server should be bound").port()
}

async fn connect(port: u16) -> BackendTarget {
    BackendTarget::connect(
        TargetOptions {
            address: "127.0.0.1".to_string(),
            port,
        },
        Role::Frontend,
    )
    .await
    .expect("target should connect")
}

#[tokio::test]
async fn nested_module_call_round_trip() {
    let mut server = BackendServer::new(server_options(), true);
    let status = server
        .handlers
        .api
        .bind_ping(|_msg: String| async { "PONG".to_string() });
    assert_eq!(status, BindStatus::Registered);
    server
        .handlers
        .api
        .roles
        .models
        .bind_test9(|flag: bool| async move { if flag { 9 } else { 0 } });
    let port = start(&server).await;

    let target = connect(port).await;
    assert_eq!(target.api.ping("PING".to_string()).await.unwrap(), "PONG");
    assert_eq!(target.api.roles.models.test9(true).await.unwrap(), 9);

    server.stop().unwrap();
}

#[tokio::test]
async fn arguments_arrive_typed_and_in_declaration_order() {
    let mut server = BackendServer::new(server_options(), true);
    server.handlers.some.handler.bind_identifier(
        |p1: String, p2: i64, p3: i64, p4: f64, p5: bool, p6: serde_json::Value| async move {
            // Report a mismatch through the return value; a panic here would
            // leave the caller waiting instead of failing the test.
            let received = format!("{p1}|{p2}|{p3}|{p4}|{p5}|{p6}");
            if received == "p1|17|-17|-17.6|true|{\"a\":17}" {
                "helllloooo".to_string()
            } else {
                received
            }
        },
    );
    let port = start(&server).await;

    let target = connect(port).await;
    let result = target
        .some
        .handler
        .identifier("p1".to_string(), 17, -17, -17.6, true, json!({"a": 17}))
        .await
        .unwrap();
    assert_eq!(result, "helllloooo");

    server.stop().unwrap();
}

#[tokio::test]
async fn methods_without_return_type_still_reply() {
    let mut server = BackendServer::new(server_options(), true);
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    server.handlers.some.handler.bind_empty(move || {
        let done_tx = done_tx.clone();
        async move {
            done_tx.send(()).unwrap();
        }
    });
    let port = start(&server).await;

    let target = connect(port).await;
    target.some.handler.empty().await.unwrap();
    done_rx.recv().await.unwrap();

    server.stop().unwrap();
}

#[tokio::test]
async fn calling_an_unbound_path_reports_the_path() {
    let server = BackendServer::new(server_options(), true);
    let port = start(&server).await;

    let target = connect(port).await;
    let error = target.api.ping("hello".to_string()).await.unwrap_err();
    match error {
        CallError::UnregisteredPath(path) => assert_eq!(path, "api/ping"),
        other => panic!("unexpected error: {other:?}"),
    }

    server.stop().unwrap();
}

#[tokio::test]
async fn rebinding_replaces_the_previous_handler() {
    let mut server = BackendServer::new(server_options(), true);
    let status = server
        .handlers
        .api
        .bind_ping(|_msg: String| async { "first".to_string() });
    assert_eq!(status, BindStatus::Registered);
    let status = server
        .handlers
        .api
        .bind_ping(|_msg: String| async { "second".to_string() });
    assert_eq!(status, BindStatus::Replaced);
    let port = start(&server).await;

    let target = connect(port).await;
    assert_eq!(target.api.ping("hi".to_string()).await.unwrap(), "second");

    server.stop().unwrap();
}

#[tokio::test]
async fn host_calls_back_through_the_connected_peer_proxy() {
    let mut server = BackendServer::new(server_options(), true);
    let (proxy_tx, proxy_rx) = mpsc::unbounded_channel::<FrontendProxy>();
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<()>();
    server.on_connection(move |peer| {
        seen_tx.send(()).unwrap();
        let BackendPeer::Frontend(proxy) = peer;
        proxy_tx.send(proxy).unwrap();
    });
    // The host notifies the peer when asked for its status, so the peer
    // controls when the callback fires and can attach its bindings first.
    let proxy_rx = Arc::new(Mutex::new(proxy_rx));
    let (ack_tx, mut ack_rx) = mpsc::unbounded_channel();
    server.handlers.bind_status(move || {
        let proxy_rx = Arc::clone(&proxy_rx);
        let ack_tx = ack_tx.clone();
        async move {
            let proxy = proxy_rx.lock().await.recv().await.unwrap();
            let reply = proxy.api.notify("hi".to_string()).await.unwrap();
            ack_tx.send(reply).unwrap();
            true
        }
    });
    let port = start(&server).await;

    let mut frontend = FrontendRegistrar::new();
    let status = frontend
        .api
        .bind_notify(|message: String| async move { format!("ack:{message}") });
    assert_eq!(status, BindStatus::Buffered);

    let target = connect(port).await;
    frontend.attach(target.dispatcher());

    assert!(target.status().await.unwrap());
    assert_eq!(ack_rx.recv().await.unwrap(), "ack:hi");

    // Exactly one connection callback for the single accepted connection.
    seen_rx.recv().await.unwrap();
    assert!(seen_rx.try_recv().is_err());

    server.stop().unwrap();
}

#[tokio::test]
async fn unrecognized_role_is_ignored_but_still_served() {
    let mut server = BackendServer::new(server_options(), true);
    server
        .handlers
        .api
        .bind_ping(|_msg: String| async { "PONG".to_string() });
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<()>();
    server.on_connection(move |_peer| {
        seen_tx.send(()).unwrap();
    });
    let port = start(&server).await;

    // A peer announcing a role outside the schema never reaches the
    // connection callback, but its calls still dispatch.
    let target = Target::connect(
        TargetOptions {
            address: "127.0.0.1".to_string(),
            port,
        },
        "Intruder",
    )
    .await
    .expect("target should connect");
    let result = target
        .channel()
        .call("api/ping", vec![json!("PING")])
        .await
        .unwrap();
    assert_eq!(result, json!("PONG"));
    assert!(seen_rx.try_recv().is_err());

    server.stop().unwrap();
}

#[tokio::test]
async fn replies_resolve_out_of_order_by_correlation() {
    let mut server = BackendServer::new(server_options(), true);
    server.handlers.api.bind_ping(|_msg: String| async {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        "slow".to_string()
    });
    server.handlers.bind_status(|| async { true });
    let port = start(&server).await;

    let target = connect(port).await;
    let slow = target.api.ping("x".to_string());
    let fast = target.status();
    let (slow, fast) = tokio::join!(slow, fast);
    assert_eq!(slow.unwrap(), "slow");
    assert!(fast.unwrap());

    server.stop().unwrap();
}
