//! Stream parsing for agent stdout and stderr.
//!
//! Reader tasks pull raw bytes off the subprocess pipes and push
//! [`ProcessOutput`] messages onto one bounded channel. The supervisor
//! consumes that channel in order and classifies each stdout line with
//! [`StreamParser::classify`].

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::Sender;

use crate::cli::{LineDecoder, StreamEvent, WireRecord};

/// Default buffer size for the output channel.
pub const DEFAULT_CHANNEL_BUFFER: usize = 64;

/// Default number of bytes requested per pipe read.
pub const DEFAULT_READ_CHUNK: usize = 8192;

/// Error type for stream operations.
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    #[error("Failed to parse line: {reason}")]
    ParseError { input: String, reason: String },
    #[error("Failed to read agent output: {0}")]
    Io(#[from] std::io::Error),
    #[error("Output channel closed")]
    ChannelClosed,
}

/// One message from a running agent process, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutput {
    /// A complete, non-blank stdout line.
    Line(String),
    /// A complete, non-blank stderr line.
    Stderr(String),
    /// A pipe could not be read.
    ReadFailed(String),
    /// The process exited. `None` when it was ended by a signal.
    Exited { code: Option<i32> },
    /// Waiting on the process failed.
    WaitFailed(String),
}

/// Parser for the agent's line protocol.
pub struct StreamParser;

impl StreamParser {
    /// Parse a single line into a wire record.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::ParseError` if the line is not a JSON object
    /// with a usable `type` field.
    pub fn parse_line(line: &str) -> Result<WireRecord, StreamError> {
        serde_json::from_str(line).map_err(|e| StreamError::ParseError {
            input: line.to_string(),
            reason: e.to_string(),
        })
    }

    /// Classify a line into exactly one stream event.
    ///
    /// Lines that do not parse, or that carry an unknown `type`, become a
    /// `Chunk` holding the raw line.
    #[must_use]
    pub fn classify(line: &str) -> StreamEvent {
        match Self::parse_line(line) {
            Ok(record) => record.into_event().unwrap_or_else(|| {
                tracing::debug!(line_len = line.len(), "Unknown record type, showing as text");
                StreamEvent::Chunk {
                    content: line.to_string(),
                }
            }),
            Err(e) => {
                tracing::debug!(error = %e, line_len = line.len(), "Unparseable line, showing as text");
                StreamEvent::Chunk {
                    content: line.to_string(),
                }
            }
        }
    }

    /// Read stdout to EOF, forwarding each complete non-blank line.
    ///
    /// A trailing line without a newline is flushed at EOF.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the receiver is gone.
    pub async fn read_lines<R>(
        reader: R,
        tx: Sender<ProcessOutput>,
        chunk_size: usize,
    ) -> Result<(), StreamError>
    where
        R: AsyncRead + Unpin,
    {
        forward_lines(reader, &tx, chunk_size, ProcessOutput::Line).await
    }

    /// Read stderr to EOF, forwarding each complete non-blank line.
    ///
    /// Buffered like stdout so a message split across reads arrives whole.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the receiver is gone.
    pub async fn read_stderr<R>(
        reader: R,
        tx: Sender<ProcessOutput>,
        chunk_size: usize,
    ) -> Result<(), StreamError>
    where
        R: AsyncRead + Unpin,
    {
        forward_lines(reader, &tx, chunk_size, ProcessOutput::Stderr).await
    }
}

async fn forward_lines<R>(
    mut reader: R,
    tx: &Sender<ProcessOutput>,
    chunk_size: usize,
    wrap: fn(String) -> ProcessOutput,
) -> Result<(), StreamError>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = LineDecoder::new();
    let mut buf = vec![0u8; chunk_size.max(1)];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        for line in decoder.push(&buf[..n]) {
            tx.send(wrap(line))
                .await
                .map_err(|_| StreamError::ChannelClosed)?;
        }
    }

    if let Some(line) = decoder.finish() {
        tx.send(wrap(line))
            .await
            .map_err(|_| StreamError::ChannelClosed)?;
    }
    Ok(())
}
