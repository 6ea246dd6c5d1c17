//! Integration tests for the server, client and full request flow.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;
use tether::prelude::*;
use tether::{QueueError, Value};

// =========================================================================
// Handlers
// =========================================================================

/// Sends every request straight back.
struct Echo;

impl Handler for Echo {
    async fn handle(
        &self,
        table: &ConnectionTable,
        from: Address,
        message: Message,
    ) -> Result<(), HandlerError> {
        if table.send_to(&from, &message).await {
            Ok(())
        } else {
            Err(HandlerError::Undelivered(from))
        }
    }
}

/// Echoes, except for requests flagged `"fail"`, which are rejected
/// without a reply.
struct Picky;

impl Handler for Picky {
    async fn handle(
        &self,
        table: &ConnectionTable,
        from: Address,
        message: Message,
    ) -> Result<(), HandlerError> {
        if message.get("fail") == Some(&Value::Bool(true)) {
            return Err(HandlerError::Rejected("asked to fail".into()));
        }
        table.send_to(&from, &message).await;
        Ok(())
    }
}

/// Never replies.
struct Silent;

impl Handler for Silent {
    async fn handle(
        &self,
        _table: &ConnectionTable,
        _from: Address,
        _message: Message,
    ) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Replies with a running count of requests seen.
#[derive(Default)]
struct Counter {
    seen: AtomicU64,
}

impl Handler for Counter {
    async fn handle(
        &self,
        table: &ConnectionTable,
        from: Address,
        message: Message,
    ) -> Result<(), HandlerError> {
        let count = self.seen.fetch_add(1, Ordering::Relaxed) + 1;
        let reply = Message::new()
            .with("count", count)
            .with("echo", message.into_value());
        table.send_to(&from, &reply).await;
        Ok(())
    }
}

/// Answers `"flood"` requests with 64 one-megabyte replies and echoes
/// everything else.
struct Flood;

impl Handler for Flood {
    async fn handle(
        &self,
        table: &ConnectionTable,
        from: Address,
        message: Message,
    ) -> Result<(), HandlerError> {
        if message.get("flood") == Some(&Value::Bool(true)) {
            let blob = Message::new().with("blob", "x".repeat(1 << 20));
            for _ in 0..64 {
                if !table.send_to(&from, &blob).await {
                    return Err(HandlerError::Undelivered(from));
                }
            }
            return Ok(());
        }
        table.send_to(&from, &message).await;
        Ok(())
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn loopback() -> Address {
    Address::new("127.0.0.1", 0)
}

fn builder() -> ServerBuilder {
    ServerBuilder::new()
        .bind(loopback())
        .timeout(Duration::from_millis(200))
        .poll_interval(Duration::from_millis(10))
}

/// Starts an operating server on a random port.
async fn start<H: Handler>(handler: H) -> Server<H> {
    let mut server = builder().build(handler).await.expect("server should bind");
    server.operate().expect("server should operate");
    server
}

fn client_config() -> ClientConfig {
    ClientConfig {
        timeout: Duration::from_millis(200),
        // Keeps a broken test from hanging forever.
        request_deadline: Some(Duration::from_secs(10)),
    }
}

async fn connect<H: Handler>(server: &Server<H>) -> Client {
    Client::connect(server.local_addr(), client_config())
        .await
        .expect("should connect")
}

/// Polls `check` until it holds, panicking after five seconds.
async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check().await {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn tagged(id: usize) -> Message {
    Message::new().with("id", id)
}

// =========================================================================
// Echo
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_echo_small_message() {
    let mut server = start(Echo).await;
    let mut client = connect(&server).await;

    let request = Message::new().with("k", 52);
    let reply = client.request(&request).await.unwrap();
    assert_eq!(reply, request);

    client.close().await;
    server.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_echo_large_payloads() {
    let mut server = start(Echo).await;
    let mut client = connect(&server).await;

    let list = Message::new().with("list", (0..900).collect::<Vec<_>>());

    let nested: Message = (0..500)
        .map(|i| (i.to_string(), json!({"value": i + 5, "tags": ["a", "b"]})))
        .collect();

    let floats: Message = (0..600)
        .map(|i| (format!("f{i}"), json!(f64::from(i) * 0.1 + 1.0 / 3.0)))
        .collect();

    for request in [list, nested, floats] {
        let reply = client.request(&request).await.unwrap();
        assert_eq!(reply, request);
    }

    server.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_repeated_requests_on_one_connection() {
    let mut server = start(Echo).await;
    let mut client = connect(&server).await;

    for i in 0..300 {
        let reply = client.request(&tagged(i)).await.unwrap();
        assert_eq!(reply["id"], json!(i));
    }

    server.close().await;
}

// =========================================================================
// Many clients
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fan_out_round_robin() {
    for k in [2, 4, 16, 32] {
        let mut server = start(Echo).await;
        let mut clients = Vec::with_capacity(k);
        for _ in 0..k {
            clients.push(connect(&server).await);
        }

        for round in 0..5 {
            for (i, client) in clients.iter_mut().enumerate() {
                let id = round * k + i;
                let reply = client.request(&tagged(id)).await.unwrap();
                assert_eq!(reply["id"], json!(id), "k={k}");
            }
        }

        server.close().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fan_out_random_order() {
    const K: usize = 16;
    let picks: Vec<usize> = {
        let mut rng = rand::rng();
        (0..400).map(|_| rng.random_range(0..K)).collect()
    };

    let mut server = start(Echo).await;
    let mut clients = Vec::with_capacity(K);
    for _ in 0..K {
        clients.push(connect(&server).await);
    }

    for (n, &i) in picks.iter().enumerate() {
        let reply = clients[i].request(&tagged(n)).await.unwrap();
        assert_eq!(reply["id"], json!(n));
    }

    server.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_send_all_then_receive_in_shuffled_order() {
    const K: usize = 32;
    let order: Vec<usize> = {
        let mut order: Vec<_> = (0..K).collect();
        order.shuffle(&mut rand::rng());
        order
    };

    let mut server = start(Echo).await;
    let mut clients = Vec::with_capacity(K);
    for _ in 0..K {
        clients.push(connect(&server).await);
    }

    for (i, client) in clients.iter_mut().enumerate() {
        client.send(&tagged(i)).await.unwrap();
    }
    for &i in &order {
        let reply = clients[i].recv().await.unwrap();
        assert_eq!(reply["id"], json!(i));
    }

    server.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients_on_separate_tasks() {
    let mut server = start(Echo).await;
    let addr = server.local_addr().clone();

    let tasks: Vec<_> = (0..8)
        .map(|t| {
            let addr = addr.clone();
            tokio::spawn(async move {
                let mut client = Client::connect(&addr, client_config()).await.unwrap();
                for i in 0..50 {
                    let id = t * 1000 + i;
                    let reply = client.request(&tagged(id)).await.unwrap();
                    assert_eq!(reply["id"], json!(id));
                }
                client.close().await;
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }
    server.close().await;
}

// =========================================================================
// Connection lifecycle
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disconnected_clients_are_removed() {
    const C: usize = 10;
    let mut server = start(Echo).await;

    let mut clients = Vec::with_capacity(C);
    for _ in 0..C {
        clients.push(connect(&server).await);
    }
    let s = &server;
    eventually("all clients registered", move || async move {
        s.connection_count().await == C
    })
    .await;

    for client in &mut clients {
        client.close().await;
    }

    eventually("table emptied", move || async move { s.connection_count().await == 0 }).await;
    eventually("sentinels dispatched", move || async move {
        let stats = s.inbound_stats();
        stats.read == C as u64 && stats.write == C as u64
    })
    .await;

    server.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_send_all_reaches_every_client() {
    let mut server = start(Silent).await;
    let mut clients = Vec::new();
    for _ in 0..5 {
        clients.push(connect(&server).await);
    }
    let s = &server;
    eventually("all clients registered", move || async move {
        s.connection_count().await == 5
    })
    .await;

    let notice = Message::new().with("notice", "maintenance");
    assert_eq!(server.send_all(&notice).await, 5);

    for client in &mut clients {
        assert_eq!(client.recv().await.unwrap(), notice);
    }

    server.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_addresses_match_clients() {
    let mut server = start(Echo).await;
    let a = connect(&server).await;
    let b = connect(&server).await;

    let s = &server;
    eventually("both registered", move || async move { s.connection_count().await == 2 }).await;

    let addresses = server.addresses().await;
    assert_eq!(addresses.len(), 2);
    for address in &addresses {
        assert!(server.contains(address).await);
    }
    assert_eq!(a.peer(), server.local_addr());
    assert_eq!(b.peer(), server.local_addr());

    server.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_client_sees_server_close() {
    let mut server = start(Silent).await;
    let mut client = connect(&server).await;

    client.send(&tagged(1)).await.unwrap();
    server.close().await;

    assert!(matches!(client.recv().await, Err(TetherError::Disconnected)));
    assert!(client.is_closed());
}

// =========================================================================
// Errors and edge cases
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_request_after_close_fails() {
    let mut server = start(Echo).await;
    let mut client = connect(&server).await;

    client.close().await;
    client.close().await;

    assert!(matches!(
        client.request(&tagged(0)).await,
        Err(TetherError::Closed)
    ));
    server.close().await;
}

#[tokio::test]
async fn test_connect_to_dead_port_fails() {
    let port = {
        let mut server = builder().build(Silent).await.unwrap();
        let port = server.local_addr().port();
        server.close().await;
        port
    };

    let err = Client::connect(&Address::new("127.0.0.1", port), client_config())
        .await
        .unwrap_err();
    assert!(matches!(err, TetherError::Transport(_)));
}

#[tokio::test]
async fn test_bind_rejects_bad_config() {
    let err = builder().queue_capacity(0).build(Silent).await.unwrap_err();
    assert!(matches!(err, TetherError::Config(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_is_idempotent() {
    let mut server = start(Echo).await;
    assert!(server.is_operating());

    server.close().await;
    server.close().await;

    assert!(server.is_closed());
    assert!(!server.is_operating());
    assert!(matches!(server.operate(), Err(TetherError::Closed)));
    assert_eq!(server.connection_count().await, 0);
}

#[tokio::test]
async fn test_operate_twice_fails() {
    let mut server = start(Echo).await;
    assert!(matches!(server.operate(), Err(TetherError::AlreadyOperating)));
    server.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_handler_error_does_not_stop_dispatch() {
    let mut server = start(Picky).await;
    let mut client = connect(&server).await;

    client
        .send(&Message::new().with("fail", true))
        .await
        .unwrap();
    let reply = client.request(&tagged(7)).await.unwrap();
    assert_eq!(reply["id"], json!(7));

    server.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_flush_without_operate() {
    let mut server = builder().build(Echo).await.unwrap();
    let mut client = connect(&server).await;

    for i in 0..3 {
        client.send(&tagged(i)).await.unwrap();
    }
    let s = &server;
    eventually("requests queued", move || async move { s.inbound_stats().write == 3 }).await;

    assert_eq!(server.flush().await, 3);
    for i in 0..3 {
        assert_eq!(client.recv().await.unwrap()["id"], json!(i));
    }

    server.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overflow_shuts_server_down() {
    let mut server = builder().queue_capacity(2).build(Silent).await.unwrap();
    let mut client = connect(&server).await;

    // Not operating, so nothing drains the queue.
    for i in 0..3 {
        client.send(&tagged(i)).await.unwrap();
    }

    let s = &server;
    eventually("overflow shutdown", move || async move { s.is_closed() }).await;
    assert!(matches!(
        server.fault(),
        Some(QueueError::Overflow { capacity: 2, .. })
    ));
    assert!(matches!(server.operate(), Err(TetherError::Closed)));

    server.close().await;
    assert_eq!(server.connection_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_request_deadline_closes_client() {
    let mut server = start(Silent).await;
    let config = ClientConfig {
        timeout: Duration::from_millis(50),
        request_deadline: Some(Duration::from_millis(150)),
    };
    let mut client = Client::connect(server.local_addr(), config).await.unwrap();

    let err = client.request(&tagged(1)).await.unwrap_err();
    assert!(matches!(err, TetherError::DeadlineElapsed));
    assert!(client.is_closed());

    server.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_client_that_stops_reading_does_not_stall_server() {
    let mut server = start(Flood).await;

    // Asks for a flood of replies and never reads any of them.
    let mut stalled = connect(&server).await;
    stalled
        .send(&Message::new().with("flood", true))
        .await
        .unwrap();

    let mut other = connect(&server).await;
    let reply = other.request(&tagged(3)).await.unwrap();
    assert_eq!(reply["id"], json!(3));

    let s = &server;
    eventually("stalled client dropped", move || async move {
        s.connection_count().await == 1
    })
    .await;

    tokio::time::timeout(Duration::from_secs(5), server.close())
        .await
        .expect("close should finish");
}

// =========================================================================
// Auto-updater
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_auto_updater_polls_and_hands_client_back() {
    let mut server = start(Counter::default()).await;
    let client = connect(&server).await;

    let updater = AutoUpdater::spawn(
        client,
        Message::new().with("input", 0),
        Duration::from_millis(10),
    );
    let u = &updater;
    eventually("first responses", move || async move { u.pending() >= 3 }).await;

    updater.set_message(Message::new().with("input", 1));
    eventually("updated message sent", move || async move {
        u.drain()
            .iter()
            .any(|reply| reply["echo"]["input"] == json!(1))
    })
    .await;

    assert!(updater.is_running());
    let mut client = updater.stop().await.unwrap();

    // The client is intact after the handover.
    let reply = client.request(&tagged(9)).await.unwrap();
    assert_eq!(reply["echo"]["id"], json!(9));

    server.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_auto_updater_reports_disconnect() {
    let mut server = start(Counter::default()).await;
    let client = connect(&server).await;

    let updater = AutoUpdater::spawn(client, Message::new(), Duration::from_millis(10));
    let u = &updater;
    eventually("first response", move || async move { u.try_next().is_some() }).await;

    server.close().await;
    eventually("worker ended", move || async move { !u.is_running() }).await;

    // Usually a clean EOF; a reset on the next write is also possible.
    assert!(matches!(
        updater.stop().await,
        Err(TetherError::Disconnected | TetherError::Transport(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_connection_table_shared_with_handler() {
    // A handler that broadcasts every request to everyone.
    struct Relay;

    impl Handler for Relay {
        async fn handle(
            &self,
            table: &ConnectionTable,
            _from: Address,
            message: Message,
        ) -> Result<(), HandlerError> {
            table.send_all(&message).await;
            Ok(())
        }
    }

    let mut server = start(Relay).await;
    let mut speaker = connect(&server).await;
    let mut listener = connect(&server).await;
    let s = &server;
    eventually("both registered", move || async move { s.connection_count().await == 2 }).await;

    let shout = Message::new().with("shout", "hello");
    speaker.send(&shout).await.unwrap();

    assert_eq!(listener.recv().await.unwrap(), shout);
    assert_eq!(speaker.recv().await.unwrap(), shout);

    let server_table: &ConnectionTable = server.table();
    assert_eq!(server_table.len().await, 2);

    server.close().await;
}
