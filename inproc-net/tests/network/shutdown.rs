//! Tests for forced close, listener shutdown and network teardown.

use std::sync::Arc;
use std::time::Duration;

use inproc_net::{SocketError, VirtualNetwork};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::{init_tracing, server_addr};

#[tokio::test]
async fn test_close_unblocks_a_parked_peer_reader() {
    init_tracing();
    let network = VirtualNetwork::new();
    let listener = network.listening_socket();

    let client = network.connected_socket(server_addr()).expect("connect");
    let mut server = listener.accept().await.expect("accept");

    let reader = tokio::spawn(async move {
        let mut buf = [0u8; 16];
        server.read(&mut buf).await
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!reader.is_finished());

    client.close();
    let err = tokio::time::timeout(Duration::from_secs(5), reader)
        .await
        .expect("reader should wake")
        .expect("join")
        .expect_err("read should fail");
    assert!(SocketError::is_canceled(&err));
}

#[tokio::test]
async fn test_close_cancels_an_in_flight_write() {
    let network = VirtualNetwork::with_buffer_size(4);
    let listener = network.listening_socket();

    let client = network.connected_socket(server_addr()).expect("connect");
    let _server = listener.accept().await.expect("accept");

    let mut writer = client.output_stream().expect("output");
    let write = tokio::spawn(async move { writer.write_all(&[1u8; 100]).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!write.is_finished(), "write should be parked on a full pipe");

    client.close();
    let err = write
        .await
        .expect("join")
        .expect_err("write should fail");
    assert!(SocketError::is_canceled(&err));
    assert_eq!(err.kind(), std::io::ErrorKind::ConnectionAborted);
}

#[tokio::test]
async fn test_server_close_unblocks_the_client_writer() {
    let network = VirtualNetwork::with_buffer_size(4);
    let listener = network.listening_socket();

    let mut client = network.connected_socket(server_addr()).expect("connect");
    let server = listener.accept().await.expect("accept");

    let write = tokio::spawn(async move { client.write_all(&[2u8; 64]).await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    server.close();
    assert!(server.is_closed());
    let err = write.await.expect("join").expect_err("write should fail");
    assert!(SocketError::is_canceled(&err));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_is_idempotent_across_tasks() {
    let network = VirtualNetwork::new();
    let listener = network.listening_socket();

    let client = Arc::new(network.connected_socket(server_addr()).expect("connect"));
    let mut server = listener.accept().await.expect("accept");

    let closers: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.close() })
        })
        .collect();
    for closer in closers {
        closer.await.expect("join");
    }
    client.close();
    assert!(client.is_closed());

    let mut buf = [0u8; 1];
    let err = server.read(&mut buf).await.expect_err("read should fail");
    assert!(SocketError::is_canceled(&err));
}

#[tokio::test]
async fn test_closed_socket_fails_every_operation() {
    let network = VirtualNetwork::new();
    let listener = network.listening_socket();

    let mut unbound = network.client_socket();
    unbound.close();
    assert!(matches!(
        unbound.bind(server_addr()),
        Err(SocketError::Closed)
    ));
    assert!(matches!(
        unbound.connect(server_addr()),
        Err(SocketError::Closed)
    ));
    assert_eq!(listener.pending(), 0);

    let mut connected = network.connected_socket(server_addr()).expect("connect");
    connected.close();
    assert!(matches!(
        connected.connect(server_addr()),
        Err(SocketError::Closed)
    ));
    let err = connected.write_all(b"x").await.expect_err("write after close");
    assert!(SocketError::is_canceled(&err));
    let mut buf = [0u8; 1];
    let err = connected.read(&mut buf).await.expect_err("read after close");
    assert!(SocketError::is_canceled(&err));
}

#[tokio::test]
async fn test_closed_listener_fails_accept_repeatedly() {
    let network = VirtualNetwork::new();
    let listener = network.listening_socket();

    listener.close();
    listener.close();
    assert!(listener.is_closed());
    assert!(network.listening_socket().is_closed());

    for _ in 0..3 {
        assert!(matches!(listener.accept().await, Err(SocketError::Closed)));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_listener_close_wakes_every_parked_accept() {
    let network = VirtualNetwork::new();
    let listener = network.listening_socket();

    let accepts: Vec<_> = (0..3)
        .map(|_| {
            let listener = listener.clone();
            tokio::spawn(async move { listener.accept().await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(20)).await;

    network.listening_socket_on(9999).close();
    for accept in accepts {
        let result = tokio::time::timeout(Duration::from_secs(5), accept)
            .await
            .expect("accept should wake")
            .expect("join");
        assert!(matches!(result, Err(SocketError::Closed)));
    }
}

#[tokio::test]
async fn test_peers_queued_before_close_are_still_accepted() {
    let network = VirtualNetwork::new();
    let listener = network.listening_socket();

    let mut first = network.connected_socket(server_addr()).expect("connect");
    let _second = network.connected_socket(server_addr()).expect("connect");
    first.write_all(b"hi").await.expect("write");
    listener.close();

    let mut accepted = listener.accept().await.expect("first queued peer");
    let mut buf = [0u8; 2];
    accepted.read_exact(&mut buf).await.expect("read");
    assert_eq!(&buf, b"hi");

    listener.accept().await.expect("second queued peer");
    assert!(matches!(listener.accept().await, Err(SocketError::Closed)));
}

#[test]
fn test_connect_to_closed_listener_fails() {
    let network = VirtualNetwork::new();
    network.listening_socket().close();

    assert!(matches!(
        network.connected_socket(server_addr()),
        Err(SocketError::Closed)
    ));
    assert_eq!(network.listening_socket().pending(), 0);
}

#[test]
fn test_connect_after_network_is_dropped_fails() {
    let network = VirtualNetwork::new();
    let listener = network.listening_socket();
    let mut socket = network.client_socket();
    drop(network);

    assert!(matches!(
        socket.connect(server_addr()),
        Err(SocketError::Closed)
    ));
    assert!(!socket.is_bound());
    assert_eq!(listener.pending(), 0);
}
