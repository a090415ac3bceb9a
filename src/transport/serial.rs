//! Serial port transport.
//!
//! The `serialport` API is blocking, so the port is serviced by two
//! dedicated threads:
//! - writer: drains a queue of outbound frames into the port
//! - reader: forwards inbound command bytes to the async side
//!
//! The async side sees the writer only through [`SerialPortSink`], which
//! tracks queued-but-unwritten bytes and signals a drain `Notify` when the
//! queue empties.
//!
//! # Example
//!
//! ```ignore
//! use sensorbridge::transport::{SerialLink, SerialSink};
//!
//! let SerialLink { mut sink, drain, mut inbound } = SerialLink::open("/dev/ttyUSB0")?;
//! let saturated = sink.write(&frame_bytes);
//! ```

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tokio::sync::{mpsc, Notify};

use crate::error::Result;

/// Fixed serial baud rate (8N1).
pub const BAUD_RATE: u32 = 115_200;

/// Queued bytes at or above which the sink reports saturation.
pub const HIGH_WATER_MARK: usize = 16 * 1024;

/// Read timeout so the reader thread notices a closed channel.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// A flow-controlled byte sink.
pub trait SerialSink {
    /// Whether the underlying transport can currently accept writes.
    fn is_writable(&self) -> bool;

    /// Queue bytes for writing.
    ///
    /// Returns `true` when the sink is now above its water mark and the
    /// producer should pause until the drain signal.
    fn write(&mut self, data: &[u8]) -> bool;

    /// Whether queued bytes are still at or above the water mark.
    ///
    /// A drain signal that arrives while this holds is stale.
    fn is_saturated(&self) -> bool;
}

/// State shared between [`SerialPortSink`] and the writer thread.
#[derive(Debug)]
struct SinkShared {
    pending: AtomicUsize,
    open: AtomicBool,
    drain: Arc<Notify>,
}

impl SinkShared {
    /// Account for `len` bytes leaving the queue; signal drain at empty.
    fn complete_write(&self, len: usize) {
        let before = self.pending.fetch_sub(len, Ordering::AcqRel);
        if before == len {
            self.drain.notify_one();
        }
    }

    /// Mark the port unwritable and release a paused producer.
    fn fail(&self) {
        self.open.store(false, Ordering::Release);
        self.pending.store(0, Ordering::Release);
        self.drain.notify_one();
    }
}

/// Async-side handle to the serial writer thread.
pub struct SerialPortSink {
    tx: std_mpsc::Sender<Bytes>,
    shared: Arc<SinkShared>,
    high_water: usize,
}

impl SerialPortSink {
    /// Bytes queued but not yet written to the port.
    #[inline]
    pub fn pending_bytes(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }
}

impl SerialSink for SerialPortSink {
    fn is_writable(&self) -> bool {
        self.shared.open.load(Ordering::Acquire)
    }

    fn write(&mut self, data: &[u8]) -> bool {
        let queued = self.shared.pending.fetch_add(data.len(), Ordering::AcqRel) + data.len();

        if self.tx.send(Bytes::copy_from_slice(data)).is_err() {
            self.shared.pending.fetch_sub(data.len(), Ordering::AcqRel);
            self.shared.open.store(false, Ordering::Release);
            return false;
        }

        queued >= self.high_water
    }

    fn is_saturated(&self) -> bool {
        self.pending_bytes() >= self.high_water
    }
}

/// An open serial port split into its async-facing halves.
pub struct SerialLink {
    /// Outbound frame sink.
    pub sink: SerialPortSink,
    /// Signalled whenever the outbound queue empties.
    pub drain: Arc<Notify>,
    /// Inbound command bytes, in arrival order.
    pub inbound: mpsc::UnboundedReceiver<Bytes>,
}

impl SerialLink {
    /// Open a serial port at the fixed baud rate, 8N1, no flow control.
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyUSB0")
    pub fn open(path: &str) -> Result<Self> {
        let port = serialport::new(path, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()?;
        let reader = port.try_clone()?;

        tracing::info!("Opened serial port: {} at {} baud", path, BAUD_RATE);

        let drain = Arc::new(Notify::new());
        let shared = Arc::new(SinkShared {
            pending: AtomicUsize::new(0),
            open: AtomicBool::new(true),
            drain: drain.clone(),
        });

        let (out_tx, out_rx) = std_mpsc::channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        let writer_shared = shared.clone();
        thread::Builder::new()
            .name("serial-writer".to_string())
            .spawn(move || writer_loop(port, out_rx, writer_shared))?;

        thread::Builder::new()
            .name("serial-reader".to_string())
            .spawn(move || reader_loop(reader, in_tx))?;

        Ok(Self {
            sink: SerialPortSink {
                tx: out_tx,
                shared,
                high_water: HIGH_WATER_MARK,
            },
            drain,
            inbound: in_rx,
        })
    }
}

/// Writes queued frames until the sink is dropped or the port fails.
fn writer_loop(
    mut port: Box<dyn SerialPort>,
    rx: std_mpsc::Receiver<Bytes>,
    shared: Arc<SinkShared>,
) {
    while let Ok(chunk) = rx.recv() {
        if let Err(e) = port.write_all(&chunk).and_then(|()| port.flush()) {
            tracing::error!("Serial write failed, dropping further frames: {}", e);
            shared.fail();
            return;
        }

        shared.complete_write(chunk.len());
    }
}

/// Forwards inbound bytes until the receiver is dropped or the port fails.
fn reader_loop(mut port: Box<dyn SerialPort>, tx: mpsc::UnboundedSender<Bytes>) {
    let mut buf = [0u8; 1024];

    loop {
        match port.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                if tx.send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                    return;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                if tx.is_closed() {
                    return;
                }
            }
            Err(e) => {
                tracing::error!("Serial read failed: {}", e);
                return;
            }
        }
    }
}
