//! Newline-delimited JSON decoding over a chunked byte stream.
//!
//! The decoder is lazy and finite: records are produced as chunks arrive and
//! the sequence ends when the transport does. A line that is not valid UTF-8
//! or not valid JSON is logged and skipped; it never ends the stream.

use std::collections::VecDeque;
use std::fmt::Display;
use std::marker::PhantomData;
use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{StreamError, StreamResult};
use crate::event::StreamEvent;
use crate::wire::StreamRecord;

/// Longest line excerpt included in a diagnostic.
const MAX_LOGGED_LINE: usize = 120;

/// Splits arbitrary byte chunks into complete lines.
///
/// Bytes are held until a `\n` arrives, so a multi-byte UTF-8 sequence split
/// across two chunks is only decoded once both halves are present.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes, without terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(line) = decode_line(&raw[..raw.len() - 1]) {
                lines.push(line);
            }
        }
        lines
    }

    /// Flush the unterminated remainder once the transport closed cleanly.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        decode_line(&raw)
    }

    /// Whether bytes are waiting for a line terminator.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    match std::str::from_utf8(raw) {
        Ok(text) => Some(text.to_string()),
        Err(e) => {
            warn!("Dropping stream line with invalid UTF-8: {}", e);
            None
        }
    }
}

fn excerpt(line: &str) -> &str {
    match line.char_indices().nth(MAX_LOGGED_LINE) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

/// Incremental NDJSON decoder producing one `T` per non-blank line.
#[derive(Debug)]
pub struct NdjsonDecoder<T> {
    lines: LineBuffer,
    dropped: usize,
    _record: PhantomData<fn() -> T>,
}

impl<T> Default for NdjsonDecoder<T> {
    fn default() -> Self {
        Self {
            lines: LineBuffer::new(),
            dropped: 0,
            _record: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> NdjsonDecoder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every record completed by `chunk`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<T> {
        self.lines
            .push(chunk)
            .into_iter()
            .filter_map(|line| self.parse(&line))
            .collect()
    }

    /// Decode the trailing unterminated line, if any.
    pub fn finish(&mut self) -> Option<T> {
        let line = self.lines.finish()?;
        self.parse(&line)
    }

    /// Number of non-blank lines skipped as malformed so far.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn parse(&mut self, line: &str) -> Option<T> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        match serde_json::from_str(trimmed) {
            Ok(record) => Some(record),
            Err(e) => {
                self.dropped += 1;
                warn!(error = %e, line = excerpt(trimmed), "Skipping malformed stream record");
                None
            }
        }
    }
}

struct DecodeState<S, T> {
    body: Pin<Box<S>>,
    decoder: NdjsonDecoder<T>,
    ready: VecDeque<T>,
    done: bool,
}

/// Lazily decode a chunked body into NDJSON records.
///
/// A transport error yields a single `Err(StreamError::Transport)` and ends
/// the sequence.
pub fn decode_records<T, S, B, E>(body: S) -> impl Stream<Item = StreamResult<T>>
where
    T: DeserializeOwned,
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let state = DecodeState {
        body: Box::pin(body),
        decoder: NdjsonDecoder::new(),
        ready: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(record) = st.ready.pop_front() {
                return Some((Ok(record), st));
            }
            if st.done {
                return None;
            }
            match st.body.next().await {
                Some(Ok(chunk)) => {
                    let records = st.decoder.push(chunk.as_ref());
                    st.ready.extend(records);
                }
                Some(Err(e)) => {
                    st.done = true;
                    warn!("Generation stream aborted by transport: {}", e);
                    return Some((Err(StreamError::Transport(e.to_string())), st));
                }
                None => {
                    st.done = true;
                    st.ready.extend(st.decoder.finish());
                    debug!(dropped = st.decoder.dropped(), "Generation stream closed");
                }
            }
        }
    })
}

/// Decode a generation response body straight into stream events.
pub fn decode_events<S, B, E>(body: S) -> impl Stream<Item = StreamResult<StreamEvent>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    decode_records::<StreamRecord, _, _, _>(body).filter_map(|item| async move {
        match item {
            Ok(record) => record.into_event().map(Ok),
            Err(e) => Some(Err(e)),
        }
    })
}
