//! MoodChat: a conversational backend whose UI theme follows the mood of
//! the conversation.
//!
//! Each user turn streams an assistant response over a WebSocket while a
//! concurrent task derives a visual theme from the same history. Both
//! outcomes are persisted to `SQLite`, so a conversation reopens with its
//! full transcript and its last theme intact.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Process configuration resolved from the environment.
pub mod config;
/// Text-generation clients (Ollama).
pub mod llm;
/// HTTP server and API routes.
pub mod server;
/// Per-session orchestration and the event protocol.
pub mod session;
/// Conversation, message, and theme storage.
pub mod store;
/// Theme derivation from conversation history.
pub mod theme;

/// Entry helpers to start the server.
pub mod startup;
