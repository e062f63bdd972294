//! toolplan
//!
//! Tool-call orchestration: a remote language model writes a plan of
//! function calls, the crate runs it against locally registered capabilities.
//!
//! # Features
//!
//! - **Capability Registry**: explicit registration with declarative schemas
//! - **Completion Client**: shaped output (text, JSON, dict) with bounded retry
//! - **Plan Parser**: `[{id, type: "function", function: {name, arguments}}]`
//! - **Dependency Resolver**: `$<id>` references with a safe expression sublanguage
//! - **Execution Engine**: in-order execution with per-action failure isolation
//!
//! # Architecture
//!
//! ```text
//! request ──► CompletionClient ──► plan ──► parse_plan ──► execute_plan ──► ExecutionState
//!                  │                                           │
//!                  ├── CompletionTransport (OpenRouter)        ├── DependencyResolver
//!                  └── RetryPolicy                             └── CapabilityRegistry
//! ```

pub mod agent;
pub mod builtin;
pub mod capability;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod expr;
pub mod message;
pub mod plan;
pub mod resolver;
pub mod retry;
pub mod state;
pub mod transport;

pub use agent::Agent;
pub use capability::{Capability, CapabilityRegistry, CapabilitySchema, ParamSpec, ParamType};
pub use client::{CompletionClient, RemoteReply, ToolMode};
pub use config::{AgentConfig, ToolModeSetting};
pub use engine::execute_plan;
pub use error::{AgentError, AgentResult};
pub use message::{Content, Message, ResponseShape, Role};
pub use plan::{parse_plan, Action};
pub use resolver::{DependencyResolver, ResolveError};
pub use retry::RetryPolicy;
pub use state::{ActionRecord, ActionStatus, ExecutionState};
pub use transport::{CompletionRequest, CompletionTransport, ModelInfo, OpenRouterTransport};
