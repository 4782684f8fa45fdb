//! Workflow execution engine
//!
//! The engine module provides the `WorkflowExecutor` which drives workflow
//! state machines through event replay and action processing.

mod derived_id;
mod executor;
mod registry;
mod signal_sink;

pub use derived_id::{DerivedIdIndex, DerivedIdResolver, InMemoryDerivedIdIndex};
pub use executor::{ExecutorConfig, ExecutorError, ProcessResult, WorkflowExecutor};
pub use registry::{AnyWorkflow, RegistryError, WorkflowFactory, WorkflowRegistry};
pub use signal_sink::SignalSink;
