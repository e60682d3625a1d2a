//! Streaming translation: Anthropic Messages events in, `OpenAI`
//! chat-completion chunks out.
pub mod delta;
pub mod metrics;
pub mod sse;
pub mod transcoder;

pub use delta::{ToolCallAccumulator, ToolCallTable};
pub use metrics::ExchangeMetrics;
pub use sse::{encode_outgoing_sse, translated_sse_stream, LineBuffer, DONE_FRAME};
pub use transcoder::{OutgoingEvent, StreamTranslator};
