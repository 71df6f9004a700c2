//! Multi-language sandboxed execution engine for an online code playground.
//!
//! A submission flows through a fixed sequence of components:
//!
//! - **Workspace staging**: a unique scratch directory per request holding the source
//!   and the stdin payload
//! - **Pipeline selection**: a pure mapping from language to compile/run steps and the
//!   container image used by the containerized backend
//! - **Isolated execution**: native subprocesses or Docker containers behind the
//!   `CodeExecutor` trait, bounded by one wall-clock deadline
//! - **Normalization**: per-step outcomes folded into an `ExecutionResult`
//! - **Complexity advice**: an optional chat-completion call estimating time and space
//!   complexity once the result is final

pub mod advisor;
pub mod assistant;
pub mod config;
pub mod engine;
pub mod errors;
pub mod executors;
pub mod language;
pub mod llm;
pub mod normalizer;
pub mod pipeline;
pub mod workspace;

pub use advisor::{ComplexityAdvisor, ComplexityEstimate};
pub use assistant::{AssistTask, CodeAssistant};
pub use config::*;
pub use engine::{ExecutionEngine, ExecutionRequest, RunReport};
pub use errors::{AdvisorError, EngineError};
pub use executors::{CodeExecutor, DockerExecutor, NativeExecutor};
pub use language::{extract_public_class, Language};
pub use normalizer::{normalize, ExecutionResult, ExecutionStatus};
pub use pipeline::{Pipeline, Step, StepKind};
pub use workspace::{Workspace, WorkspaceStager};

#[cfg(test)]
pub mod test_utils;
