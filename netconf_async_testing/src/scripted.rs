//! Byte channel driven entirely by the test.
//!
//! Writes land in a capture buffer, reads are served from segments the test
//! pushes, and faults or per-window write delays can be queued up front. The
//! channel honours the same contract as the stream channel: one processor per
//! direction, bytes left over by one read carried into the next.

use std::{
    collections::VecDeque,
    io,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use bytes::{Bytes, BytesMut};
use netconf_async::{
    BufferProcessor,
    ByteChannel,
    Progress,
    TransferError,
    codec::{Framing, NetconfCodec},
};
use tokio::{runtime::Handle, sync::mpsc};
use tokio_util::{codec::Encoder, sync::CancellationToken};

#[derive(Default)]
struct Faults {
    writes: VecDeque<io::ErrorKind>,
    reads: VecDeque<io::ErrorKind>,
    write_delay: Option<Duration>,
}

struct Inbound {
    rx: mpsc::UnboundedReceiver<Bytes>,
    buffer: BytesMut,
}

struct Script {
    written: Mutex<Vec<u8>>,
    write_rounds: AtomicUsize,
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    inbound: tokio::sync::Mutex<Inbound>,
    faults: Mutex<Faults>,
    shutdown: CancellationToken,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Script {
    async fn drive_write(
        &self,
        processor: &mut dyn BufferProcessor,
        window: usize,
    ) -> Result<(), TransferError> {
        let (fault, delay) = {
            let mut faults = lock(&self.faults);
            (faults.writes.pop_front(), faults.write_delay)
        };
        if let Some(kind) = fault {
            return Err(io::Error::new(kind, "scripted write fault").into());
        }
        let mut buffer = BytesMut::with_capacity(window);
        loop {
            buffer.clear();
            let progress = processor.process(&mut buffer)?;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            lock(&self.written).extend_from_slice(&buffer);
            self.write_rounds.fetch_add(1, Ordering::AcqRel);
            if progress == Progress::Done {
                return Ok(());
            }
        }
    }

    async fn drive_read(&self, processor: &mut dyn BufferProcessor) -> Result<(), TransferError> {
        let fault = lock(&self.faults).reads.pop_front();
        if let Some(kind) = fault {
            return Err(io::Error::new(kind, "scripted read fault").into());
        }
        let mut inbound = self.inbound.lock().await;
        let Inbound { rx, buffer } = &mut *inbound;
        loop {
            if !buffer.is_empty() {
                match processor.process(buffer) {
                    Ok(Progress::Done) => return Ok(()),
                    Ok(Progress::More) => {}
                    Err(err) => {
                        buffer.clear();
                        return Err(err.into());
                    }
                }
            }
            match rx.recv().await {
                Some(segment) => buffer.extend_from_slice(&segment),
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "scripted input exhausted",
                    )
                    .into());
                }
            }
        }
    }
}

fn finish(processor: Box<dyn BufferProcessor>, result: Result<(), TransferError>) {
    match result {
        Ok(()) => processor.completed(),
        Err(err) => processor.failed(err),
    }
}

/// A [`ByteChannel`] scripted by its paired [`ScriptHandle`].
pub struct ScriptedChannel {
    script: Arc<Script>,
    runtime: Handle,
    window: usize,
}

/// Test-side control of a [`ScriptedChannel`].
#[derive(Clone)]
pub struct ScriptHandle {
    script: Arc<Script>,
}

impl ScriptedChannel {
    /// Create a channel that runs its I/O on `runtime`, handing writers
    /// `window` bytes per round.
    #[must_use]
    pub fn new(runtime: Handle, window: usize) -> (Self, ScriptHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let script = Arc::new(Script {
            written: Mutex::new(Vec::new()),
            write_rounds: AtomicUsize::new(0),
            inbound_tx: Mutex::new(Some(tx)),
            inbound: tokio::sync::Mutex::new(Inbound {
                rx,
                buffer: BytesMut::new(),
            }),
            faults: Mutex::new(Faults::default()),
            shutdown: CancellationToken::new(),
        });
        let handle = ScriptHandle {
            script: Arc::clone(&script),
        };
        (
            Self {
                script,
                runtime,
                window: window.max(1),
            },
            handle,
        )
    }
}

impl ByteChannel for ScriptedChannel {
    fn write(&self, mut processor: Box<dyn BufferProcessor>) {
        let script = Arc::clone(&self.script);
        let window = self.window;
        self.runtime.spawn(async move {
            let result = tokio::select! {
                biased;

                () = script.shutdown.cancelled() => Err(TransferError::Closed),
                result = script.drive_write(processor.as_mut(), window) => result,
            };
            finish(processor, result);
        });
    }

    fn read(&self, mut processor: Box<dyn BufferProcessor>) {
        let script = Arc::clone(&self.script);
        self.runtime.spawn(async move {
            let result = tokio::select! {
                biased;

                () = script.shutdown.cancelled() => Err(TransferError::Closed),
                result = script.drive_read(processor.as_mut()) => result,
            };
            finish(processor, result);
        });
    }

    fn shutdown(&self) { self.script.shutdown.cancel(); }
}

impl ScriptHandle {
    /// Queue raw bytes for the read side.
    pub fn push_raw(&self, bytes: impl Into<Bytes>) {
        if let Some(tx) = lock(&self.script.inbound_tx).as_ref() {
            // A closed receiver means the channel is gone; the bytes are moot.
            let _ = tx.send(bytes.into());
        }
    }

    /// Frame `text` with `framing` and queue it for the read side.
    ///
    /// # Errors
    ///
    /// Returns an error if `text` exceeds the codec's message limit.
    pub fn push_message(&self, framing: Framing, text: &str) -> io::Result<()> {
        let mut codec = NetconfCodec::default();
        if framing == Framing::Chunked {
            codec.upgrade();
        }
        let mut framed = BytesMut::new();
        codec.encode(text, &mut framed)?;
        self.push_raw(framed.freeze());
        Ok(())
    }

    /// Signal end of input; a pending read fails with
    /// [`io::ErrorKind::UnexpectedEof`] once the queued bytes run out.
    pub fn close_inbound(&self) { lock(&self.script.inbound_tx).take(); }

    /// Fail the next write before it sends anything.
    pub fn fail_next_write(&self, kind: io::ErrorKind) {
        lock(&self.script.faults).writes.push_back(kind);
    }

    /// Fail the next read before it consumes anything.
    pub fn fail_next_read(&self, kind: io::ErrorKind) {
        lock(&self.script.faults).reads.push_back(kind);
    }

    /// Sleep `delay` before every write window from now on.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        lock(&self.script.faults).write_delay = delay;
    }

    /// Every byte written so far.
    #[must_use]
    pub fn written(&self) -> Vec<u8> { lock(&self.script.written).clone() }

    /// Written bytes as text, lossily decoded.
    #[must_use]
    pub fn written_text(&self) -> String { String::from_utf8_lossy(&self.written()).into_owned() }

    /// Number of write windows handed to the capture buffer.
    #[must_use]
    pub fn write_rounds(&self) -> usize { self.script.write_rounds.load(Ordering::Acquire) }

    /// Whether the session shut the channel down.
    #[must_use]
    pub fn is_shut_down(&self) -> bool { self.script.shutdown.is_cancelled() }
}
