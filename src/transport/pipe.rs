//! Duplex stream transport.
//!
//! Carries delimiter-terminated JSON frames over a pair of byte streams
//! (one written by the client, one read by it), as exposed by an embedded
//! browser process.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::{Transport, TransportKind, TransportSink, TransportSource};

// ============================================================================
// Constants
// ============================================================================

/// Default frame delimiter.
pub const DEFAULT_DELIMITER: u8 = b'\n';

// ============================================================================
// Types
// ============================================================================

/// Boxed readable stream.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed writable stream.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

// ============================================================================
// Constructor
// ============================================================================

/// Wraps an outbound writer and an inbound reader into a transport.
#[must_use]
pub fn from_streams(writer: BoxedWriter, reader: BoxedReader, delimiter: u8) -> Transport {
    Transport::new(
        TransportKind::Pipe,
        Box::new(PipeSink {
            writer,
            delimiter,
            closed: false,
        }),
        Box::new(PipeSource {
            reader: BufReader::new(reader),
            buffer: Vec::new(),
            delimiter,
        }),
    )
}

// ============================================================================
// PipeSink
// ============================================================================

struct PipeSink {
    writer: BoxedWriter,
    delimiter: u8,
    closed: bool,
}

#[async_trait]
impl TransportSink for PipeSink {
    async fn send(&mut self, text: String) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }

        let mut frame = text.into_bytes();
        frame.push(self.delimiter);
        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Err(e) = self.writer.shutdown().await {
            debug!(error = %e, "Pipe shutdown failed");
        }
        Ok(())
    }
}

// ============================================================================
// PipeSource
// ============================================================================

/// Read half. Partial frames stay in `buffer` across cancelled reads.
struct PipeSource {
    reader: BufReader<BoxedReader>,
    buffer: Vec<u8>,
    delimiter: u8,
}

#[async_trait]
impl TransportSource for PipeSource {
    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            match self.reader.read_until(self.delimiter, &mut self.buffer).await {
                Ok(0) => {
                    if !self.buffer.is_empty() {
                        warn!(len = self.buffer.len(), "Discarding unterminated frame at end of stream");
                        self.buffer.clear();
                    }
                    debug!("Pipe stream ended");
                    return None;
                }

                Ok(_) => {
                    // No delimiter means EOF mid-frame; the next read returns 0.
                    if self.buffer.last() != Some(&self.delimiter) {
                        continue;
                    }
                    self.buffer.pop();

                    let frame = std::mem::take(&mut self.buffer);
                    if frame.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }

                    match String::from_utf8(frame) {
                        Ok(text) => return Some(Ok(text)),
                        Err(e) => warn!(error = %e, "Dropping non UTF-8 frame"),
                    }
                }

                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
