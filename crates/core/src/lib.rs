//! # Recollect Core
//!
//! Domain types, storage traits, and error definitions for the Recollect
//! memory retrieval engine. This crate has **zero framework dependencies**;
//! it defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every storage collaborator is defined as a trait here. Implementations
//! live in `recollect-memory`. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod fact;
pub mod message;
pub mod query;
pub mod store;
pub mod text;
pub mod topic;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result, StoreError, ValidationError};
pub use fact::{normalize_value, Fact, FactCategory};
pub use message::{ConversationId, Message, OwnerId, Role};
pub use query::{MemoryQueryKind, QueryAnalysis};
pub use store::{FactStore, MessageStore, TopicStore};
pub use topic::{MessageTopic, Topic, TopicTag, TopicUsage};
