//! 核心层：状态存储、错误与恢复、会话

pub mod error;
pub mod recovery;
pub mod session;
pub mod state;

pub use error::{AgentError, PipelineError, RecoveryAction};
pub use recovery::RecoveryEngine;
pub use session::{SessionLease, SessionStore};
pub use state::{GraphState, HistoryEntry, Speaker, StateUpdate, Verdict};
