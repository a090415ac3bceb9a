//! Integration tests for sensorbridge.
//!
//! These tests drive the public API end to end with in-process fakes for
//! the serial sink and the remote control endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sensorbridge::backpressure::{FlowCoordinator, FlowSource};
use sensorbridge::bridge::{CommandPump, FramePump};
use sensorbridge::command::{spawn_dispatch_task, CommandTokenizer};
use sensorbridge::control::{
    BoxFuture, LifecycleConfig, LifecycleController, ListenerControl, NetworkTarget,
    RemoteControl, RemoteResponse, SessionState, Trigger, START_BARRIER,
};
use sensorbridge::protocol::{FrameBuffer, FRAME_SIZE, STOP_BYTE_OFFSET, SYNC_BYTE};
use sensorbridge::stats::BridgeStats;
use sensorbridge::transport::{FrameListener, SerialSink};
use sensorbridge::{BridgeError, Result};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;

/// One recorded remote call.
#[derive(Debug, Clone, PartialEq)]
struct Call {
    name: String,
    at: Instant,
}

/// Remote endpoint fake: records every call with its (paused) clock time.
///
/// The JSON command call for `slow` sleeps; for `fail` it errors.
#[derive(Default)]
struct FakeRemote {
    calls: Mutex<Vec<Call>>,
}

impl FakeRemote {
    fn record(&self, name: String) {
        self.calls.lock().unwrap().push(Call {
            name,
            at: Instant::now(),
        });
    }

    fn names(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|c| c.name.clone()).collect()
    }

    fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.name == name).count()
    }

    fn first(&self, name: &str) -> Option<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.at)
    }
}

fn ok() -> Result<RemoteResponse> {
    Ok(RemoteResponse::new(200, "OK"))
}

impl RemoteControl for FakeRemote {
    fn post_command_json<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<RemoteResponse>> {
        Box::pin(async move {
            self.record(format!("json-begin:{}", command));
            match command {
                "slow" => tokio::time::sleep(Duration::from_secs(2)).await,
                "fail" => {
                    self.record(format!("json-end:{}", command));
                    return Err(BridgeError::ChannelClosed);
                }
                _ => {}
            }
            self.record(format!("json-end:{}", command));
            ok()
        })
    }

    fn post_command_text<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<RemoteResponse>> {
        Box::pin(async move {
            self.record(format!("text:{}", command));
            Ok(RemoteResponse::new(500, "still no"))
        })
    }

    fn configure_target<'a>(
        &'a self,
        target: &'a NetworkTarget,
    ) -> BoxFuture<'a, Result<RemoteResponse>> {
        Box::pin(async move {
            self.record(format!("tcp:{}:{}", target.ip, target.port));
            ok()
        })
    }

    fn stream_start(&self) -> BoxFuture<'_, Result<RemoteResponse>> {
        Box::pin(async move {
            self.record("start".to_string());
            ok()
        })
    }

    fn stream_stop(&self) -> BoxFuture<'_, Result<RemoteResponse>> {
        Box::pin(async move {
            self.record("stop".to_string());
            ok()
        })
    }
}

#[derive(Default)]
struct FakeListener {
    active: AtomicBool,
}

impl ListenerControl for FakeListener {
    fn ensure_active(&self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move { Ok(!self.active.swap(true, Ordering::SeqCst)) })
    }
}

/// Serial sink fake that keeps everything written.
#[derive(Clone, Default)]
struct MemorySink {
    written: Arc<Mutex<Vec<u8>>>,
}

impl SerialSink for MemorySink {
    fn is_writable(&self) -> bool {
        true
    }

    fn write(&mut self, data: &[u8]) -> bool {
        self.written.lock().unwrap().extend_from_slice(data);
        false
    }

    fn is_saturated(&self) -> bool {
        false
    }
}

fn make_frame(fill: u8, stop: u8) -> Vec<u8> {
    let mut raw = vec![fill; FRAME_SIZE];
    raw[0] = SYNC_BYTE;
    raw[STOP_BYTE_OFFSET] = stop;
    raw
}

fn target() -> NetworkTarget {
    NetworkTarget::raw("10.0.0.2", 3000, 10_000)
}

// ============================================================================
// Frame reassembly
// ============================================================================

#[test]
fn test_split_stream_matches_whole_stream() {
    let mut stream = Vec::new();
    for fill in 1..=4u8 {
        stream.extend([0x10, 0x20]);
        stream.extend(make_frame(fill, 0xC0 | fill));
    }

    let whole = FrameBuffer::new().ingest(&stream, &BridgeStats::new());
    assert_eq!(whole.len(), 4);

    for split in [1, 17, 33, 34, 70, stream.len() - 1] {
        let stats = BridgeStats::new();
        let mut buffer = FrameBuffer::new();
        let mut frames = buffer.ingest(&stream[..split], &stats);
        frames.extend(buffer.ingest(&stream[split..], &stats));
        assert_eq!(frames, whole, "split at {}", split);
    }
}

#[test]
fn test_leading_noise_is_not_a_bad_frame() {
    for noise_len in [0usize, 1, 5, 32, 100] {
        let stats = BridgeStats::new();
        let mut data: Vec<u8> = (0..noise_len).map(|i| (i % 0x9F) as u8).collect();
        data.extend(make_frame(0x01, 0xC5));

        let frames = FrameBuffer::new().ingest(&data, &stats);

        assert_eq!(frames.len(), 1, "noise {}", noise_len);
        assert_eq!(stats.snapshot().bad_frames, 0, "noise {}", noise_len);
    }
}

#[test]
fn test_bad_stop_byte_counts_once_and_advances_one() {
    let stats = BridgeStats::new();
    let mut buffer = FrameBuffer::new();

    let frames = buffer.ingest(&make_frame(0x00, 0xB0), &stats);

    assert!(frames.is_empty());
    assert_eq!(stats.snapshot().bad_frames, 1);
    assert_eq!(buffer.len(), FRAME_SIZE - 1);
}

// ============================================================================
// Flow control
// ============================================================================

#[test]
fn test_saturated_sink_pauses_once_and_resumes_once() {
    /// Saturates on the first write and stays saturated until drained.
    struct FirstWriteSaturates {
        writes: usize,
        drained: bool,
    }

    impl SerialSink for FirstWriteSaturates {
        fn is_writable(&self) -> bool {
            true
        }

        fn write(&mut self, _data: &[u8]) -> bool {
            self.writes += 1;
            self.writes == 1
        }

        fn is_saturated(&self) -> bool {
            self.writes > 0 && !self.drained
        }
    }

    #[derive(Default)]
    struct Source {
        pauses: usize,
        resumes: usize,
    }

    impl FlowSource for Source {
        fn pause(&mut self) {
            self.pauses += 1;
        }

        fn resume(&mut self) {
            self.resumes += 1;
        }
    }

    let stats = BridgeStats::new();
    let mut coordinator = FlowCoordinator::new();
    let mut sink = FirstWriteSaturates {
        writes: 0,
        drained: false,
    };
    let mut source = Source::default();

    for byte in b"\x00X\x00Y\x00" {
        coordinator.forward(&[*byte], &mut sink, &mut source, &stats);
    }

    // Signal raised before the queue actually emptied.
    coordinator.on_drain(&sink, &mut source);
    assert_eq!(source.resumes, 0);

    sink.drained = true;
    coordinator.on_drain(&sink, &mut source);
    coordinator.on_drain(&sink, &mut source);

    assert_eq!(source.pauses, 1);
    assert_eq!(source.resumes, 1);
}

// ============================================================================
// Command tokenizer and dispatch
// ============================================================================

#[test]
fn test_tokenizer_samples() {
    let mut tokenizer = CommandTokenizer::new();
    assert_eq!(tokenizer.ingest(b"5"), vec!["5"]);

    let mut tokenizer = CommandTokenizer::new();
    let mut tokens = Vec::new();
    for byte in b"start34" {
        tokens.extend(tokenizer.ingest(&[*byte]));
    }
    assert!(tokens.is_empty());
    assert_eq!(tokenizer.ingest(b"X"), vec!["start34X"]);
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_order_survives_slow_and_failing_calls() {
    let remote = Arc::new(FakeRemote::default());
    let stats = Arc::new(BridgeStats::new());
    let (handle, task) = spawn_dispatch_task(remote.clone(), stats.clone());

    handle.enqueue("slow").unwrap();
    handle.enqueue("fail").unwrap();
    handle.enqueue("v").unwrap();
    drop(handle);
    task.await.unwrap();

    assert_eq!(
        remote.names(),
        vec![
            "json-begin:slow",
            "json-end:slow",
            "json-begin:fail",
            "json-end:fail",
            "text:fail",
            "json-begin:v",
            "json-end:v",
        ]
    );
    let snap = stats.snapshot();
    assert_eq!(snap.commands_dispatched, 3);
    assert_eq!(snap.command_failures, 1);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_begin_without_init_or_channel_commands() {
    let remote = Arc::new(FakeRemote::default());
    let lifecycle = LifecycleController::new(
        remote.clone(),
        Arc::new(FakeListener::default()),
        LifecycleConfig::new(target()),
    );

    let triggered = Instant::now();
    lifecycle.trigger(Trigger::Begin).await.unwrap();

    assert_eq!(remote.count("stop"), 1);
    assert_eq!(remote.count("start"), 1);
    assert!(remote.names().iter().all(|c| !c.starts_with("json")));
    assert!(remote.first("start").unwrap() - triggered >= START_BARRIER);
    assert_eq!(lifecycle.state(), SessionState::Streaming);
}

#[tokio::test(start_paused = true)]
async fn test_serial_b_runs_sequence_and_dispatches_token() {
    let remote = Arc::new(FakeRemote::default());
    let stats = Arc::new(BridgeStats::new());
    let config = LifecycleConfig::new(target())
        .with_channel_commands(vec!["x1060110X".to_string(), "x2060110X".to_string()]);
    let lifecycle = LifecycleController::new(
        remote.clone(),
        Arc::new(FakeListener::default()),
        config,
    );
    let mut states = lifecycle.subscribe();

    let (dispatch, _task) = spawn_dispatch_task(remote.clone(), stats.clone());
    let mut pump = CommandPump::new(dispatch, lifecycle.clone());

    pump.handle_chunk(b"b");

    tokio::time::timeout(Duration::from_secs(5), states.wait_for(|s| *s == SessionState::Streaming))
        .await
        .unwrap()
        .unwrap();

    let names = remote.names();
    assert_eq!(names.iter().filter(|c| c.starts_with("tcp:10.0.0.2")).count(), 1);
    assert_eq!(remote.count("json-begin:b"), 1);

    let channel_calls: Vec<_> = names
        .iter()
        .filter(|c| c.starts_with("json-begin:x"))
        .cloned()
        .collect();
    assert_eq!(channel_calls, vec!["json-begin:x1060110X", "json-begin:x2060110X"]);
}

#[tokio::test(start_paused = true)]
async fn test_stop_trigger() {
    let remote = Arc::new(FakeRemote::default());
    let lifecycle = LifecycleController::new(
        remote.clone(),
        Arc::new(FakeListener::default()),
        LifecycleConfig::new(target()),
    );

    lifecycle.trigger(Trigger::Stop).await.unwrap();

    assert_eq!(remote.names(), vec!["stop"]);
    assert_eq!(lifecycle.state(), SessionState::Stopped);
}

// ============================================================================
// Frame path over real TCP
// ============================================================================

#[tokio::test]
async fn test_listener_to_sink_end_to_end() {
    let (conn_tx, conn_rx) = mpsc::unbounded_channel();
    let (fatal_tx, _fatal_rx) = mpsc::unbounded_channel();
    let listener = FrameListener::new("127.0.0.1", 0, conn_tx, fatal_tx);
    assert!(listener.ensure_active().await.unwrap());
    let addr = listener.local_addr().await.unwrap();

    let sink = MemorySink::default();
    let stats = Arc::new(BridgeStats::new());
    tokio::spawn(FramePump::new(sink.clone(), Arc::new(Notify::new()), stats.clone(), conn_rx).run());

    let mut sensor = TcpStream::connect(addr).await.unwrap();
    let mut data = vec![0x01, 0x02, 0x03];
    data.extend(make_frame(0x11, 0xC1));
    data.extend(make_frame(0x22, 0x00));
    data.extend(make_frame(0x33, 0xC3));
    sensor.write_all(&data).await.unwrap();

    let mut expected = make_frame(0x11, 0xC1);
    expected.extend(make_frame(0x33, 0xC3));

    tokio::time::timeout(Duration::from_secs(5), async {
        while sink.written.lock().unwrap().len() < expected.len() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(*sink.written.lock().unwrap(), expected);
    let snap = stats.snapshot();
    assert_eq!(snap.good_frames, 2);
    assert_eq!(snap.bad_frames, 1);
    assert_eq!(snap.bytes_received, data.len() as u64);
}
