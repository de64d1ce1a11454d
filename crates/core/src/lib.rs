//! # Chimera Core
//!
//! Domain types, traits, and error definitions for the Chimera agent loop.
//! This crate has **no I/O of its own**. It defines the domain model that
//! the provider, tool and memory crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted providers and stub tools
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod memory;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{ConversationHistory, Message, Role, SessionId};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use tool::{
    DispatchOutcome, OperationSpec, ParamSpec, Tool, ToolArgs, ToolRegistry, ToolResult, ToolSpec,
    FINISH_FALLBACK, FINISH_TOOL,
};
pub use memory::{MemoryBackend, MemoryEntry, MemoryQuery};
