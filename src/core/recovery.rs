//! 错误恢复引擎
//!
//! 根据 AgentError、已重试次数与 strict 开关返回 RecoveryAction：
//! 仅 Researcher / Reasoner 的 ToolUnavailable 可重试或降级，其余一律终止。

use crate::core::{AgentError, PipelineError, RecoveryAction};
use crate::workflow::AgentName;

/// 将单节点失败映射为执行器动作
#[derive(Debug, Clone)]
pub struct RecoveryEngine {
    max_retries: u32,
    strict: bool,
}

impl RecoveryEngine {
    pub fn new(max_retries: u32, strict: bool) -> Self {
        Self { max_retries, strict }
    }

    /// attempt 从 0 开始计数（0 表示首次调用失败）
    pub fn handle(&self, agent: AgentName, err: &AgentError, attempt: u32) -> RecoveryAction {
        let transient = matches!(err, AgentError::ToolUnavailable(_))
            && matches!(agent, AgentName::Researcher | AgentName::Reasoner);

        if !transient {
            return RecoveryAction::Abort(PipelineError::from_agent(agent, err.clone()));
        }
        if attempt < self.max_retries {
            return RecoveryAction::Retry;
        }
        if self.strict {
            return RecoveryAction::Abort(PipelineError::PipelineFailure {
                agent,
                reason: err.to_string(),
            });
        }
        RecoveryAction::Annotate(format!("[gap] {} unavailable: {}", agent, err))
    }
}

impl Default for RecoveryEngine {
    fn default() -> Self {
        Self::new(1, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_failure_retried_first() {
        let engine = RecoveryEngine::new(1, false);
        let err = AgentError::ToolUnavailable("search down".to_string());
        assert_eq!(engine.handle(AgentName::Researcher, &err, 0), RecoveryAction::Retry);
    }

    #[test]
    fn test_tool_failure_degrades_after_retries() {
        let engine = RecoveryEngine::new(1, false);
        let err = AgentError::ToolUnavailable("search down".to_string());
        match engine.handle(AgentName::Researcher, &err, 1) {
            RecoveryAction::Annotate(note) => {
                assert!(note.starts_with("[gap] researcher"));
                assert!(note.contains("search down"));
            }
            other => panic!("Expected Annotate, got {:?}", other),
        }
    }

    #[test]
    fn test_tool_failure_strict_aborts() {
        let engine = RecoveryEngine::new(1, true);
        let err = AgentError::ToolUnavailable("timeout".to_string());
        let action = engine.handle(AgentName::Reasoner, &err, 1);
        assert!(matches!(
            action,
            RecoveryAction::Abort(PipelineError::PipelineFailure { agent: AgentName::Reasoner, .. })
        ));
    }

    #[test]
    fn test_data_format_is_fatal() {
        let engine = RecoveryEngine::default();
        let err = AgentError::DataFormat("missing".to_string());
        let action = engine.handle(AgentName::DataAnalyst, &err, 0);
        assert_eq!(
            action,
            RecoveryAction::Abort(PipelineError::DataFormat("missing".to_string()))
        );
    }

    #[test]
    fn test_tool_failure_in_generator_is_fatal() {
        let engine = RecoveryEngine::default();
        let err = AgentError::ToolUnavailable("llm down".to_string());
        let action = engine.handle(AgentName::Generator, &err, 0);
        assert!(matches!(action, RecoveryAction::Abort(PipelineError::Generation(_))));
    }
}
