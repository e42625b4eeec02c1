//! Conversation turn engine
//!
//! Three phases per turn:
//! - transcript: render ordered history as `"<speaker>: <content>"` lines
//! - scheduler: pick the next speaker and turn number
//! - committer: call the generator, persist the reply, advance the conversation

mod committer;
mod error;
mod locks;
mod scheduler;
mod traits;
mod transcript;

#[cfg(test)]
mod proptests;
#[cfg(test)]
pub mod testing;

pub use committer::{EngineConfig, TurnEngine, TurnOutcome, TurnRequest};
pub use error::EngineError;
pub use traits::{
    CatalogStore, ConversationStore, DatabaseStorage, Generator, ReplyPayload, ReplyRequest, Store,
};
