//! Per-session orchestration: protocol events, stream relay, and the
//! turn pipeline.

pub mod events;
pub mod orchestrator;
pub mod relay;

pub use events::{EventSink, InboundFrame, OutboundEvent, SessionError};
pub use orchestrator::{ChatSessionOrchestrator, SessionState};
pub use relay::StreamRelay;
