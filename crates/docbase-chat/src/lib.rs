//! docbase-chat: generation client and RAG chat turns.

pub mod generation;
pub mod service;

pub use generation::{GenerationOutput, Generator, RemoteGenerator};
pub use service::{ChatService, TurnOutcome};
