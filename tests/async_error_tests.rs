mod common;

use common::{EchoTransport, FailingTransport};
use framebench::benchmark::exit_code;
use framebench::frame;
use framebench::{Benchmark, Config, Error, Transport, UnmatchedPolicy};
use std::io;
use std::time::Duration;
use tokio::time::timeout;

#[tokio::test]
async fn test_send_error_is_fatal() {
    let benchmark = Benchmark::new(
        Config::new("mock0"),
        FailingTransport::failing_send_after(3),
    )
    .unwrap();

    let result = benchmark.run().await;

    match &result {
        Err(Error::Transport { operation, .. }) => assert_eq!(*operation, "send"),
        Err(e) => panic!("Expected a send error, got {}", e),
        Ok(_) => panic!("Expected a send error"),
    }
    assert_eq!(exit_code(&result), 1);
    assert_eq!(benchmark.stats().snapshot().tx_packets_total, 3);
}

#[tokio::test]
async fn test_receive_error_is_fatal() {
    let benchmark = Benchmark::new(Config::new("mock0"), FailingTransport::failing_receive()).unwrap();

    let result = timeout(Duration::from_secs(5), benchmark.run())
        .await
        .expect("a receive error should end the run at once");

    match &result {
        Err(Error::Transport { operation, .. }) => assert_eq!(*operation, "receive"),
        Err(e) => panic!("Expected a receive error, got {}", e),
        Ok(_) => panic!("Expected a receive error"),
    }
    assert_eq!(exit_code(&result), 1);
}

/// Claims to have received more bytes than the buffer holds
struct OverlongTransport;

impl Transport for OverlongTransport {
    async fn send_frame(&self, bytes: &[u8]) -> io::Result<usize> {
        Ok(bytes.len())
    }

    async fn recv_frame(&self, _buf: &mut [u8]) -> io::Result<usize> {
        Ok(5000)
    }
}

#[tokio::test]
async fn test_overlong_receive_length_is_a_receive_error() {
    let benchmark = Benchmark::new(Config::new("mock0"), OverlongTransport).unwrap();

    let result = benchmark.run().await;

    match &result {
        Err(Error::Transport { operation, source }) => {
            assert_eq!(*operation, "receive");
            assert_eq!(source.kind(), io::ErrorKind::InvalidData);
        }
        Err(e) => panic!("Expected a receive error, got {}", e),
        Ok(_) => panic!("Expected a receive error"),
    }
    assert_eq!(exit_code(&result), 1);
}

#[tokio::test]
async fn test_duplicate_aborts_by_default() {
    let benchmark = Benchmark::new(
        Config::new("mock0").with_sequence_limit(100),
        EchoTransport::new().duplicating([3]),
    )
    .unwrap();

    let result = benchmark.run().await;

    assert!(matches!(result, Err(Error::UnmatchedSequence(3))));
    assert_eq!(exit_code(&result), 1);
}

#[tokio::test]
async fn test_stray_frame_aborts_by_default() {
    let transport = EchoTransport::new();
    transport.inject(frame::encode(123_456));
    let benchmark = Benchmark::new(
        Config::new("mock0")
            .with_sequence_limit(10)
            .with_window(2)
            .with_unmatched_policy(UnmatchedPolicy::Abort),
        transport,
    )
    .unwrap();

    let result = benchmark.run().await;

    assert!(matches!(result, Err(Error::UnmatchedSequence(123_456))));
}

#[tokio::test]
async fn test_unwritable_stat_file_fails_before_sending() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("stats.csv");
    let benchmark = Benchmark::new(
        Config::new("mock0")
            .with_sequence_limit(10)
            .with_stat_file(path),
        EchoTransport::new(),
    )
    .unwrap();

    let result = benchmark.run().await;

    assert!(matches!(result, Err(Error::Io(_))));
    assert!(benchmark.transport().sent().is_empty());
}
