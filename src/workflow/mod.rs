//! 工作流：Agent 图、分派策略与执行器

pub mod engine;
pub mod events;
pub mod graph;
pub mod router;
pub mod types;

pub use engine::{GraphConfig, GraphExecutor, RunRequest};
pub use events::GraphEvent;
pub use graph::{AgentGraph, GraphNode};
pub use router::{DispatchPolicy, FixedPolicy, KeywordPolicy};
pub use types::*;
