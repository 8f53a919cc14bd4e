//! [`ByteChannel`] over any Tokio byte stream.

use std::{io, sync::Arc};

use bytes::BytesMut;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
    runtime::Handle,
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;

use super::{BufferProcessor, ByteChannel, Progress};
use crate::{codec::clamp_buffer_length, error::TransferError};

struct ReadState<S> {
    reader: ReadHalf<S>,
    /// Received bytes not yet claimed by a processor.
    buffer: BytesMut,
}

/// Channel driving the read and write halves of a stream as runtime tasks.
///
/// Bytes that arrive after the end of one message stay buffered for the next
/// read processor.
pub struct StreamChannel<S> {
    reader: Arc<Mutex<ReadState<S>>>,
    writer: Arc<Mutex<WriteHalf<S>>>,
    runtime: Handle,
    shutdown: CancellationToken,
    write_window: usize,
    read_chunk: usize,
}

impl<S> std::fmt::Debug for StreamChannel<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamChannel")
            .field("write_window", &self.write_window)
            .field("read_chunk", &self.read_chunk)
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<S> StreamChannel<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap `stream`, spawning I/O on `runtime`.
    ///
    /// `write_window` bounds the bytes handed to one write call and
    /// `read_chunk` the bytes requested per read; both are clamped to the
    /// supported buffer range.
    #[must_use]
    pub fn new(stream: S, runtime: Handle, write_window: usize, read_chunk: usize) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        let read_chunk = clamp_buffer_length(read_chunk);
        Self {
            reader: Arc::new(Mutex::new(ReadState {
                reader,
                buffer: BytesMut::with_capacity(read_chunk),
            })),
            writer: Arc::new(Mutex::new(writer)),
            runtime,
            shutdown: CancellationToken::new(),
            write_window: clamp_buffer_length(write_window),
            read_chunk,
        }
    }
}

async fn drive_write<W>(
    writer: &mut W,
    processor: &mut dyn BufferProcessor,
    window: usize,
) -> Result<(), TransferError>
where
    W: AsyncWrite + Unpin,
{
    let mut buffer = BytesMut::with_capacity(window);
    loop {
        buffer.clear();
        let progress = processor.process(&mut buffer)?;
        writer.write_all(&buffer).await?;
        if progress == Progress::Done {
            writer.flush().await?;
            return Ok(());
        }
    }
}

async fn drive_read<R>(
    state: &mut ReadState<R>,
    processor: &mut dyn BufferProcessor,
    chunk: usize,
) -> Result<(), TransferError>
where
    R: AsyncRead,
{
    loop {
        if !state.buffer.is_empty() {
            match processor.process(&mut state.buffer) {
                Ok(Progress::Done) => return Ok(()),
                Ok(Progress::More) => {}
                Err(err) => {
                    // The stream position is unknown after a framing error.
                    state.buffer.clear();
                    return Err(err.into());
                }
            }
        }
        state.buffer.reserve(chunk);
        if state.reader.read_buf(&mut state.buffer).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "peer closed the stream mid-message",
            )
            .into());
        }
    }
}

fn finish(processor: Box<dyn BufferProcessor>, result: Result<(), TransferError>) {
    match result {
        Ok(()) => processor.completed(),
        Err(err) => {
            tracing::warn!(error = %err, "channel transfer failed");
            processor.failed(err);
        }
    }
}

impl<S> ByteChannel for StreamChannel<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    fn write(&self, mut processor: Box<dyn BufferProcessor>) {
        let writer = Arc::clone(&self.writer);
        let shutdown = self.shutdown.clone();
        let window = self.write_window;
        self.runtime.spawn(async move {
            let result = tokio::select! {
                biased;

                () = shutdown.cancelled() => Err(TransferError::Closed),
                result = async {
                    let mut writer = writer.lock().await;
                    drive_write(&mut *writer, processor.as_mut(), window).await
                } => result,
            };
            finish(processor, result);
        });
    }

    fn read(&self, mut processor: Box<dyn BufferProcessor>) {
        let reader = Arc::clone(&self.reader);
        let shutdown = self.shutdown.clone();
        let chunk = self.read_chunk;
        self.runtime.spawn(async move {
            let result = tokio::select! {
                biased;

                () = shutdown.cancelled() => Err(TransferError::Closed),
                result = async {
                    let mut state = reader.lock().await;
                    drive_read(&mut *state, processor.as_mut(), chunk).await
                } => result,
            };
            finish(processor, result);
        });
    }

    fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        let writer = Arc::clone(&self.writer);
        self.runtime.spawn(async move {
            if let Err(err) = writer.lock().await.shutdown().await {
                tracing::debug!(error = %err, "stream shutdown failed");
            }
        });
    }
}
