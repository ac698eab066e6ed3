//! Incremental segmentation of streamed LLM output.
//!
//! Fragments of a model response go in; typed segment lifecycle events come
//! out as soon as they are decided: plain text, tool calls, file writes and
//! patches. Markers may be split across fragments, and several marker
//! syntaxes may compete in one response.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  StreamingParser                                            │
//! │  - feed() / finalize() / reset()                            │
//! │  - Accumulates events and tool invocations                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┼───────────────┐
//!              ▼               ▼               ▼
//!       ┌──────────┐    ┌────────────┐   ┌────────────┐
//!       │ Strategy │    │ParserState │   │ Invocation │
//!       │ Registry │    │ + Context  │   │  Adapter   │
//!       └──────────┘    └────────────┘   └────────────┘
//!                              │
//!                              ▼
//!                       ┌────────────┐
//!                       │JsonProfile │
//!                       └────────────┘
//! ```
//!
//! # Core Components
//!
//! - [`StreamingParser`]: The facade owning one stream
//! - [`SegmentEvent`]: START / CONTENT / END lifecycle events
//! - [`StrategyRegistry`]: Marker scanners for the enabled grammars
//! - [`JsonProfile`]: Vendor shapes for raw JSON tool calls
//! - [`InvocationAdapter`]: Turns completed tool calls into [`ToolInvocation`]s

pub mod config;
pub mod context;
pub mod error;
pub mod invocation;
pub mod parser;
pub mod profile;
pub mod segment;
pub mod state;
pub mod strategy;

// Re-export core types
pub use config::{ParserConfig, SentinelSpec};
pub use error::{Result, SegmentError};
pub use parser::StreamingParser;
pub use segment::{Metadata, Segment, SegmentEvent, SegmentKind, assemble_segments};

// Re-export grammar and profile types
pub use profile::{JsonProfile, ToolCallData, TriggerMatch};
pub use segstream_config::GrammarName;
pub use state::xml::XmlTag;
pub use strategy::{Marker, MarkerMatch, Strategy, StrategyRegistry};

// Re-export invocation types
pub use invocation::{InvocationAdapter, ToolInvocation, TurnId, generate_invocation_id};
