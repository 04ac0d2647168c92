//! # genview_protocol
//!
//! Shared wire contract between the genview generation endpoint and its
//! clients.
//!
//! # Features
//!
//! - **Wire Types**: `GenerateRequest`, chat `Message`s and NDJSON `StreamRecord`s
//! - **Stream Decoding**: lazy NDJSON decoding over any chunked byte stream,
//!   tolerant of malformed lines and of UTF-8 sequences split across chunks
//! - **Code Accumulation**: folds fragment events into the current-best
//!   source buffer, honoring the terminal cleaned-code event
//!
//! # Example
//!
//! ```rust
//! use genview_protocol::{CodeAccumulator, StreamEvent};
//!
//! let mut acc = CodeAccumulator::new();
//! acc.apply(StreamEvent::Fragment("import React".to_string()));
//! acc.apply(StreamEvent::Fragment(" from 'react';".to_string()));
//! assert_eq!(acc.code(), "import React from 'react';");
//! ```

pub mod accumulator;
pub mod decoder;
pub mod error;
pub mod event;
pub mod message;
pub mod toolkit;
pub mod wire;

pub use accumulator::{Applied, CodeAccumulator};
pub use decoder::{decode_events, decode_records, LineBuffer, NdjsonDecoder};
pub use error::{StreamError, StreamResult};
pub use event::StreamEvent;
pub use message::{Message, MessageRole};
pub use toolkit::{Toolkit, BASE_TOOLKIT};
pub use wire::{GenerateRequest, GenerationMode, StreamChoice, StreamRecord, NDJSON_CONTENT_TYPE};
