use std::time::Duration;

use tether_protocol::{Address, JsonCodec, Message, json};
use tether_transport::{ReadOutcome, TcpTransport, TransportError, connect, read_frame, write_frame};

const TIMEOUT: Duration = Duration::from_secs(5);

fn loopback() -> Address {
    Address::new("127.0.0.1", 0)
}

#[tokio::test]
async fn frames_cross_a_real_socket() {
    let transport = TcpTransport::bind(&loopback()).await.unwrap();
    let addr = transport.local_addr().clone();
    assert_ne!(addr.port(), 0);

    let server = tokio::spawn(async move {
        let (mut stream, _peer) = transport.accept().await.unwrap();
        let outcome = read_frame(&mut stream, &JsonCodec, TIMEOUT).await.unwrap();
        let ReadOutcome::Message(mut message) = outcome else {
            panic!("expected a message, got {outcome:?}");
        };
        message.insert("seen", true);
        write_frame(&mut stream, &JsonCodec, &message).await.unwrap();
    });

    let mut client = connect(&addr, TIMEOUT).await.unwrap();
    let request = Message::new().with("list", (0..900).collect::<Vec<_>>());
    write_frame(&mut client, &JsonCodec, &request).await.unwrap();

    let reply = read_frame(&mut client, &JsonCodec, TIMEOUT).await.unwrap();
    let ReadOutcome::Message(reply) = reply else {
        panic!("expected a reply, got {reply:?}");
    };
    assert_eq!(reply["seen"], json!(true));
    assert_eq!(reply["list"], request["list"]);

    server.await.unwrap();
}

#[tokio::test]
async fn closed_peer_reads_as_disconnected() {
    let transport = TcpTransport::bind(&loopback()).await.unwrap();
    let addr = transport.local_addr().clone();

    let server = tokio::spawn(async move {
        let (stream, _) = transport.accept().await.unwrap();
        drop(stream);
    });

    let mut client = connect(&addr, TIMEOUT).await.unwrap();
    server.await.unwrap();

    let outcome = read_frame(&mut client, &JsonCodec, TIMEOUT).await.unwrap();
    assert_eq!(outcome, ReadOutcome::Disconnected);
}

#[tokio::test]
async fn accepted_peer_address_matches_client() {
    let transport = TcpTransport::bind(&loopback()).await.unwrap();
    let addr = transport.local_addr().clone();

    let client = connect(&addr, TIMEOUT).await.unwrap();
    let (_stream, peer) = transport.accept().await.unwrap();

    assert_eq!(peer, Address::from(client.local_addr().unwrap()));
}

#[tokio::test]
async fn connect_to_dead_port_fails() {
    // Bind then drop to find a port nobody is listening on.
    let port = {
        let transport = TcpTransport::bind(&loopback()).await.unwrap();
        transport.local_addr().port()
    };

    let err = connect(&Address::new("127.0.0.1", port), TIMEOUT)
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::ConnectFailed { .. }));
}

#[tokio::test]
async fn binding_a_taken_port_fails() {
    let first = TcpTransport::bind(&loopback()).await.unwrap();
    let err = TcpTransport::bind(first.local_addr()).await.unwrap_err();
    assert!(matches!(err, TransportError::BindFailed { .. }));
}

#[tokio::test]
async fn empty_host_is_rejected() {
    let err = connect(&Address::new("", 80), TIMEOUT).await.unwrap_err();
    assert!(matches!(err, TransportError::InvalidAddress(_)));
}
