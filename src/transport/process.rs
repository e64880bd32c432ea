//! Embedded process stream table.
//!
//! A browser launched with a pipe-based debugging channel exposes it as two
//! extra process-level streams: index 3 is read by the browser (the client
//! writes commands into it), index 4 is written by the browser (the client
//! reads replies and events from it).
//!
//! # Example
//!
//! ```ignore
//! use devtools_client::{EmbeddedProcess, Session};
//!
//! let process = EmbeddedProcess::from_pipes(to_browser, from_browser).with_delimiter(b'\0');
//! let session = Session::builder().process(process).protocol(descriptor).connect().await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::error::{Error, Result};

use super::Transport;
use super::pipe::{self, BoxedReader, BoxedWriter, DEFAULT_DELIMITER};

// ============================================================================
// Constants
// ============================================================================

/// Index of the stream the client writes commands into.
pub const OUTBOUND_STREAM_INDEX: usize = 3;

/// Index of the stream the client reads replies and events from.
pub const INBOUND_STREAM_INDEX: usize = 4;

// ============================================================================
// ProcessStream
// ============================================================================

/// One entry of the process stream table.
pub enum ProcessStream {
    /// A stream the client can read from.
    Readable(BoxedReader),
    /// A stream the client can write to.
    Writable(BoxedWriter),
}

impl ProcessStream {
    /// Wraps a readable stream.
    pub fn readable(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self::Readable(Box::new(reader))
    }

    /// Wraps a writable stream.
    pub fn writable(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self::Writable(Box::new(writer))
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Readable(_) => "readable",
            Self::Writable(_) => "writable",
        }
    }
}

impl fmt::Debug for ProcessStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

// ============================================================================
// EmbeddedProcess
// ============================================================================

/// Handle to an embedded browser process, addressed by stream index.
pub struct EmbeddedProcess {
    streams: Vec<Option<ProcessStream>>,
    delimiter: u8,
}

impl fmt::Debug for EmbeddedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedProcess")
            .field("streams", &self.streams)
            .field("delimiter", &self.delimiter)
            .finish()
    }
}

impl Default for EmbeddedProcess {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddedProcess {
    /// Creates a handle with an empty stream table.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            streams: Vec::new(),
            delimiter: DEFAULT_DELIMITER,
        }
    }

    /// Creates a handle with the conventional outbound/inbound pair installed.
    #[must_use]
    pub fn from_pipes(
        writer: impl AsyncWrite + Send + Unpin + 'static,
        reader: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self::new()
            .with_stream(OUTBOUND_STREAM_INDEX, ProcessStream::writable(writer))
            .with_stream(INBOUND_STREAM_INDEX, ProcessStream::readable(reader))
    }

    /// Installs a stream at `index`, replacing any previous one.
    #[must_use]
    pub fn with_stream(mut self, index: usize, stream: ProcessStream) -> Self {
        if self.streams.len() <= index {
            self.streams.resize_with(index + 1, || None);
        }
        self.streams[index] = Some(stream);
        self
    }

    /// Sets the frame delimiter (`b'\0'` for browser debugging pipes).
    #[inline]
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Returns the frame delimiter.
    #[inline]
    #[must_use]
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Builds the duplex-stream transport from streams 3 and 4.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if either stream is missing or has the
    /// wrong direction.
    pub fn into_transport(mut self) -> Result<Transport> {
        let writer = match self.take(OUTBOUND_STREAM_INDEX)? {
            ProcessStream::Writable(writer) => writer,
            other => {
                return Err(Error::transport(format!(
                    "process stream {OUTBOUND_STREAM_INDEX} must be writable, found {}",
                    other.kind()
                )));
            }
        };

        let reader = match self.take(INBOUND_STREAM_INDEX)? {
            ProcessStream::Readable(reader) => reader,
            other => {
                return Err(Error::transport(format!(
                    "process stream {INBOUND_STREAM_INDEX} must be readable, found {}",
                    other.kind()
                )));
            }
        };

        debug!(delimiter = self.delimiter, "Using embedded process pipes");
        Ok(pipe::from_streams(writer, reader, self.delimiter))
    }

    fn take(&mut self, index: usize) -> Result<ProcessStream> {
        self.streams
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| Error::transport(format!("process stream {index} is not available")))
    }
}

// ============================================================================
// Tests
// ============================================================================
