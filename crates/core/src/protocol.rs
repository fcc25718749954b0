//! Line Protocol
//!
//! Requests arrive as one JSON object per line. Each response unit is a
//! payload followed by [`SENTINEL`]; plain-text payloads are terminated
//! inline, JSON payloads on a line of their own.

use crate::request::Request;
use serde_json::Value;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::error;

/// Marks the end of every response unit on the output stream.
pub const SENTINEL: &str = "RESPONSE_COMPLETE";

/// Written in place of a JSON payload that could not be encoded.
const ENCODING_FALLBACK: &str = r#"{"success":false,"error":"response could not be encoded"}"#;

/// Per-line failures. None of them ends the session.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Invalid JSON request: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("Invalid JSON request: expected an object")]
    NotAnObject,
    #[error("Invalid request field: {0}")]
    InvalidField(#[source] serde_json::Error),
    #[error("Empty prompt and no audio data received")]
    EmptyInput,
    #[error("Error processing voice input: {0}")]
    Transcription(String),
}

/// Decodes one input line into a [`Request`].
pub fn decode_request(line: &str) -> Result<Request, FrameError> {
    let value: Value = serde_json::from_str(line).map_err(FrameError::Malformed)?;
    if !value.is_object() {
        return Err(FrameError::NotAnObject);
    }
    let request: Request = serde_json::from_value(value).map_err(FrameError::InvalidField)?;
    if request.is_empty() {
        return Err(FrameError::EmptyInput);
    }
    Ok(request)
}

/// Splits the input stream into non-blank lines.
pub struct LineFramer<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> LineFramer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    /// Returns the next non-blank line with surrounding whitespace trimmed, or
    /// `None` at end of input. Invalid UTF-8 is replaced rather than rejected.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
                return Ok(None);
            }
            let line = String::from_utf8_lossy(&self.buf);
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
    }
}

/// What a response unit carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(Value),
}

/// Where the sentinel goes relative to the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `<payload>RESPONSE_COMPLETE`
    Inline,
    /// `<payload>\nRESPONSE_COMPLETE`
    Line,
}

impl Payload {
    /// The payload as it appears on the wire.
    pub fn encode(&self) -> String {
        match self {
            Payload::Text(text) => text.clone(),
            Payload::Json(value) => serde_json::to_string(value).unwrap_or_else(|e| {
                error!(error = %e, "Failed to encode JSON payload");
                ENCODING_FALLBACK.to_string()
            }),
        }
    }
}

/// Writes framed response units and flushes after each one.
pub struct ResponseWriter<W> {
    out: W,
}

impl<W: AsyncWrite + Unpin> ResponseWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub async fn write(&mut self, payload: &Payload, framing: Framing) -> io::Result<()> {
        let mut unit = payload.encode();
        if framing == Framing::Line {
            unit.push('\n');
        }
        unit.push_str(SENTINEL);
        unit.push('\n');
        self.out.write_all(unit.as_bytes()).await?;
        self.out.flush().await
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
