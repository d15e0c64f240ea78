//! 执行器过程事件：供 CLI / 观察者流式展示每个节点的进展

use serde::Serialize;

use crate::workflow::{AgentName, ExecutorPhase, Route};

/// 单次运行中的事件（可序列化为 JSON）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphEvent {
    /// 状态机阶段切换
    Phase { run_id: String, phase: ExecutorPhase },
    /// Router 给出的路线
    Routed { run_id: String, route: Route },
    NodeStarted {
        run_id: String,
        agent: AgentName,
        attempt: u32,
    },
    NodeFinished {
        run_id: String,
        agent: AgentName,
        elapsed_ms: u64,
    },
    /// 瞬时失败后重试
    Retry {
        run_id: String,
        agent: AgentName,
        attempt: u32,
        reason: String,
    },
    /// 重试耗尽，降级继续
    Gap {
        run_id: String,
        agent: AgentName,
        reason: String,
    },
    /// 进入第 iteration 轮修订
    Revising {
        run_id: String,
        iteration: u32,
        feedback: String,
    },
    Terminated {
        run_id: String,
        status: String,
        answer: Option<String>,
    },
}

impl GraphEvent {
    pub fn run_id(&self) -> &str {
        match self {
            GraphEvent::Phase { run_id, .. }
            | GraphEvent::Routed { run_id, .. }
            | GraphEvent::NodeStarted { run_id, .. }
            | GraphEvent::NodeFinished { run_id, .. }
            | GraphEvent::Retry { run_id, .. }
            | GraphEvent::Gap { run_id, .. }
            | GraphEvent::Revising { run_id, .. }
            | GraphEvent::Terminated { run_id, .. } => run_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = GraphEvent::NodeStarted {
            run_id: "r1".to_string(),
            agent: AgentName::DataAnalyst,
            attempt: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "node_started");
        assert_eq!(json["agent"], "data_analyst");
        assert_eq!(event.run_id(), "r1");
    }

    #[test]
    fn test_phase_event_json() {
        let event = GraphEvent::Phase {
            run_id: "r1".to_string(),
            phase: ExecutorPhase::Executing(AgentName::Generator),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["phase"]["phase"], "executing");
        assert_eq!(json["phase"]["node"], "generator");
    }
}
