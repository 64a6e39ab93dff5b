//! Tests for data transfer: ordering, backpressure, half-close and drop.

use std::io;
use std::time::Duration;

use inproc_net::{SocketError, VirtualNetwork};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::{init_tracing, server_addr};

#[tokio::test]
async fn test_round_trip_in_both_directions() {
    init_tracing();
    let network = VirtualNetwork::new();
    let listener = network.listening_socket();

    let mut client = network.connected_socket(server_addr()).expect("connect");
    let mut server = listener.accept().await.expect("accept");

    client.write_all(b"ping").await.expect("client write");
    let mut buf = [0u8; 4];
    server.read_exact(&mut buf).await.expect("server read");
    assert_eq!(&buf, b"ping");

    server.write_all(b"pong").await.expect("server write");
    client.read_exact(&mut buf).await.expect("client read");
    assert_eq!(&buf, b"pong");
}

#[tokio::test]
async fn test_write_before_accept_is_buffered() {
    let network = VirtualNetwork::new();
    let listener = network.listening_socket();

    let mut client = network.connected_socket(server_addr()).expect("connect");
    client.write_all(b"early bird").await.expect("write");
    client.flush().await.expect("flush");

    let mut server = listener.accept().await.expect("accept");
    let mut buf = [0u8; 10];
    server.read_exact(&mut buf).await.expect("read");
    assert_eq!(&buf, b"early bird");
}

#[tokio::test]
async fn test_writes_are_bounded_by_pipe_capacity() {
    let network = VirtualNetwork::with_buffer_size(8);
    let listener = network.listening_socket();

    let mut client = network.connected_socket(server_addr()).expect("connect");
    let mut server = listener.accept().await.expect("accept");

    // A single write only takes what fits.
    let written = client.write(&[7u8; 20]).await.expect("write");
    assert_eq!(written, 8);

    let mut writer = client.output_stream().expect("output");
    let blocked = tokio::spawn(async move {
        writer.write_all(&[9u8; 12]).await?;
        writer.shutdown().await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!blocked.is_finished(), "writer should wait for the reader");

    let mut received = Vec::new();
    server.read_to_end(&mut received).await.expect("read");
    blocked.await.expect("join").expect("blocked write");

    assert_eq!(received.len(), 20);
    assert!(received[..8].iter().all(|&b| b == 7));
    assert!(received[8..].iter().all(|&b| b == 9));
}

#[tokio::test]
async fn test_zero_buffer_size_is_raised_to_one() {
    let network = VirtualNetwork::with_buffer_size(0);
    assert_eq!(network.config().buffer_size, 1);

    let listener = network.listening_socket();
    let mut client = network.connected_socket(server_addr()).expect("connect");
    let mut server = listener.accept().await.expect("accept");

    assert_eq!(client.write(b"abc").await.expect("write"), 1);
    let mut buf = [0u8; 1];
    server.read_exact(&mut buf).await.expect("read");
    assert_eq!(&buf, b"a");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_single_byte_pipes_do_not_deadlock() {
    let network = VirtualNetwork::with_buffer_size(1);
    let listener = network.listening_socket();

    let client = network.connected_socket(server_addr()).expect("connect");
    let server = listener.accept().await.expect("accept");

    let echo = tokio::spawn(async move {
        let (mut reader, mut writer) = tokio::io::split(server);
        tokio::io::copy(&mut reader, &mut writer).await?;
        writer.shutdown().await
    });

    let payload: Vec<u8> = (0..2000u32).map(|i| (i % 251) as u8).collect();
    let mut writer = client.output_stream().expect("output");
    let mut reader = client.input_stream().expect("input");
    let sent = payload.clone();
    let send = tokio::spawn(async move {
        writer.write_all(&sent).await?;
        writer.shutdown().await
    });

    let mut echoed = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), reader.read_to_end(&mut echoed))
        .await
        .expect("echo should finish")
        .expect("read");

    send.await.expect("join").expect("send");
    echo.await.expect("join").expect("echo");
    assert_eq!(echoed, payload);
}

#[tokio::test]
async fn test_large_transfer_through_small_buffer() {
    let network = VirtualNetwork::with_buffer_size(4096);
    let listener = network.listening_socket();

    let mut client = network.connected_socket(server_addr()).expect("connect");
    let mut server = listener.accept().await.expect("accept");

    let payload: Vec<u8> = (0..1024 * 1024u32).map(|i| (i * 31 % 256) as u8).collect();
    let sent = payload.clone();
    let sender = tokio::spawn(async move {
        client.write_all(&sent).await?;
        client.shutdown().await
    });

    let mut received = Vec::with_capacity(payload.len());
    server.read_to_end(&mut received).await.expect("read");
    sender.await.expect("join").expect("send");
    assert_eq!(received, payload);
}

#[tokio::test]
async fn test_half_close_keeps_the_other_direction_open() {
    let network = VirtualNetwork::new();
    let listener = network.listening_socket();

    let mut client = network.connected_socket(server_addr()).expect("connect");
    let mut server = listener.accept().await.expect("accept");

    client.write_all(b"request").await.expect("write");
    client.shutdown().await.expect("shutdown");
    assert!(client.write_all(b"more").await.is_err());

    let mut request = Vec::new();
    server.read_to_end(&mut request).await.expect("read");
    assert_eq!(request, b"request");

    server.write_all(b"response").await.expect("server write");
    server.shutdown().await.expect("server shutdown");

    let mut response = Vec::new();
    client.read_to_end(&mut response).await.expect("client read");
    assert_eq!(response, b"response");
}

#[tokio::test]
async fn test_dropped_peer_reads_as_end_of_stream() {
    let network = VirtualNetwork::new();
    let listener = network.listening_socket();

    let mut client = network.connected_socket(server_addr()).expect("connect");
    let mut server = listener.accept().await.expect("accept");

    client.write_all(b"bye").await.expect("write");
    drop(client);

    let mut received = Vec::new();
    server.read_to_end(&mut received).await.expect("read");
    assert_eq!(received, b"bye");

    let err = server.write_all(b"anyone?").await.expect_err("peer is gone");
    assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    assert!(!SocketError::is_canceled(&err));
}

#[tokio::test]
async fn test_stream_views_outlive_the_socket() {
    let network = VirtualNetwork::new();
    let listener = network.listening_socket();

    let client = network.connected_socket(server_addr()).expect("connect");
    let mut reader = client.input_stream().expect("input");
    let mut writer = client.output_stream().expect("output");
    drop(client);

    let mut server = listener.accept().await.expect("accept");
    writer.write_all(b"still here").await.expect("write");
    let mut buf = [0u8; 10];
    server.read_exact(&mut buf).await.expect("server read");
    assert_eq!(&buf, b"still here");

    server.write_all(b"ack").await.expect("server write");
    let mut ack = [0u8; 3];
    reader.read_exact(&mut ack).await.expect("read");
    assert_eq!(&ack, b"ack");
}
