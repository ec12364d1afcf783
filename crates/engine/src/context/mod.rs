//! Memory context assembly and rendering.

pub mod assembler;
pub mod format;
pub mod token;

pub use assembler::{MemoryContext, MemoryContextAssembler, Tier, TierFailure, TopicMemory};
pub use format::{ContextBudget, format_memory_context};
