//! 错误类型与恢复动作
//!
//! AgentError 是单个 Agent 调用的失败；PipelineError 是一次运行终止时携带的错误。
//! RecoveryEngine 根据 AgentError 决定 Retry / Annotate / Abort。

use thiserror::Error;

use crate::workflow::AgentName;

/// 单个 Agent 调用可能出现的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// 外部检索 / API 暂不可用（可重试）
    #[error("Tool unavailable: {0}")]
    ToolUnavailable(String),

    /// 附件缺失或无法读取
    #[error("Data format error: {0}")]
    DataFormat(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Verification error: {0}")]
    Verification(String),

    #[error("LLM error: {0}")]
    Llm(String),
}

/// 一次运行的终止错误（TERMINATED(failed) 携带）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// 无法分类，未执行任何 Agent
    #[error("Routing error: {0}")]
    Routing(String),

    #[error("Data format error: {0}")]
    DataFormat(String),

    /// strict 模式下工具重试耗尽
    #[error("Pipeline failure in {agent}: {reason}")]
    PipelineFailure { agent: AgentName, reason: String },

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Verification error: {0}")]
    Verification(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// 同一 session 已有运行中的 Executor
    #[error("Session busy: {0}")]
    SessionBusy(String),

    #[error("Cancelled")]
    Cancelled,
}

impl PipelineError {
    /// 错误类别名（日志与报告用）
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Routing(_) => "RoutingError",
            PipelineError::DataFormat(_) => "DataFormatError",
            PipelineError::PipelineFailure { .. } => "PipelineFailure",
            PipelineError::Generation(_) => "GenerationError",
            PipelineError::Verification(_) => "VerificationError",
            PipelineError::Timeout(_) => "TimeoutError",
            PipelineError::InvalidState(_) => "InvalidStateError",
            PipelineError::SessionBusy(_) => "SessionBusy",
            PipelineError::Cancelled => "Cancelled",
        }
    }

    /// 将不可恢复的 AgentError 提升为运行级错误
    pub fn from_agent(agent: AgentName, err: AgentError) -> Self {
        match err {
            AgentError::DataFormat(msg) => PipelineError::DataFormat(msg),
            AgentError::Generation(msg) => PipelineError::Generation(msg),
            AgentError::Verification(msg) => PipelineError::Verification(msg),
            AgentError::ToolUnavailable(reason) | AgentError::Llm(reason) => match agent {
                AgentName::Generator => PipelineError::Generation(reason),
                AgentName::Verifier => PipelineError::Verification(reason),
                _ => PipelineError::PipelineFailure { agent, reason },
            },
        }
    }
}

/// 恢复引擎给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 再调用一次同一节点
    Retry,
    /// 记录缺口后继续（降级）
    Annotate(String),
    /// 终止当前运行
    Abort(PipelineError),
}
