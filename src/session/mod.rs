/// Session management module - Gateway

mod context;
mod manager;
mod store;

pub use context::{Context, ContextRecord, ContextSummary};
pub use manager::{Ack, ContextManager, ManagerOptions, PromptReply};
pub use store::ContextStore;

#[cfg(test)]
pub(crate) use manager::test_support;
