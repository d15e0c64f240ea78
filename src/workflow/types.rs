//! 工作流类型定义
//!
//! Agent 名称、路由（封闭枚举，每个变体对应固定的 Agent 序列）、执行器阶段与运行结果。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{GraphState, PipelineError};

/// 图中的 Agent 节点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentName {
    Router,
    Researcher,
    Reasoner,
    DataAnalyst,
    Generator,
    Verifier,
}

impl AgentName {
    pub const ALL: [AgentName; 6] = [
        AgentName::Router,
        AgentName::Researcher,
        AgentName::Reasoner,
        AgentName::DataAnalyst,
        AgentName::Generator,
        AgentName::Verifier,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentName::Router => "router",
            AgentName::Researcher => "researcher",
            AgentName::Reasoner => "reasoner",
            AgentName::DataAnalyst => "data_analyst",
            AgentName::Generator => "generator",
            AgentName::Verifier => "verifier",
        }
    }

    /// 历史记录中的展示名
    pub fn display_name(&self) -> &'static str {
        match self {
            AgentName::Router => "Router",
            AgentName::Researcher => "Researcher",
            AgentName::Reasoner => "Reasoner",
            AgentName::DataAnalyst => "Data analyst",
            AgentName::Generator => "Generator",
            AgentName::Verifier => "Verifier",
        }
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 路由：问题分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// 表格 / 文件数据
    StructuredData,
    /// 多跳事实检索 + 推理
    FactualMultiHop,
    /// 逻辑 / 数学
    LogicalMath,
}

impl Route {
    pub const ALL: [Route; 3] = [Route::StructuredData, Route::FactualMultiHop, Route::LogicalMath];

    /// 生成阶段之前的实质 Agent
    pub fn substantive_agents(&self) -> &'static [AgentName] {
        match self {
            Route::StructuredData => &[AgentName::DataAnalyst],
            Route::FactualMultiHop => &[AgentName::Researcher, AgentName::Reasoner],
            Route::LogicalMath => &[AgentName::Reasoner],
        }
    }

    /// 首轮即通过时的完整序列（不含 Router）
    pub fn sequence(&self) -> Vec<AgentName> {
        let mut seq = self.substantive_agents().to_vec();
        seq.extend([AgentName::Generator, AgentName::Verifier, AgentName::Generator]);
        seq
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Route::StructuredData => "structured_data",
            Route::FactualMultiHop => "factual_multi_hop",
            Route::LogicalMath => "logical_math",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Route {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "structured_data" | "structured" | "data" => Ok(Route::StructuredData),
            "factual_multi_hop" | "factual" | "research" => Ok(Route::FactualMultiHop),
            "logical_math" | "logic" | "math" => Ok(Route::LogicalMath),
            other => Err(format!("unknown route: {other}")),
        }
    }
}

/// 执行器状态机阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "node", rename_all = "snake_case")]
pub enum ExecutorPhase {
    Routing,
    Executing(AgentName),
    Verifying,
    Revising,
    Accepted,
    Terminated,
}

/// 运行终态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Verifier 通过
    Accepted,
    /// 迭代耗尽仍未通过，按最佳结果返回
    ForcedAccepted,
    Failed(PipelineError),
}

/// 一次运行的结果
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub status: RunStatus,
    /// 最后一次 Generator 输出
    pub answer: Option<String>,
    /// 路由前即失败（无法分类、会话占用）时为 None
    pub state: Option<GraphState>,
    /// 依次调用过的 Agent（含 Router）
    pub trace: Vec<AgentName>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self.status, RunStatus::Failed(_))
    }

    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    pub fn iteration_count(&self) -> u32 {
        self.state.as_ref().map(|s| s.iteration_count).unwrap_or(0)
    }

    /// 失败时返回 Err，便于 `?` 传播
    pub fn into_answer(self) -> Result<String, PipelineError> {
        match self.status {
            RunStatus::Failed(e) => Err(e),
            _ => self
                .answer
                .ok_or_else(|| PipelineError::Generation("no answer produced".to_string())),
        }
    }

    /// 不含 Router 的 Agent 序列
    pub fn agent_sequence(&self) -> &[AgentName] {
        match self.trace.first() {
            Some(AgentName::Router) => &self.trace[1..],
            _ => &self.trace,
        }
    }
}

/// 图结构 / 执行器装配错误
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Cyclic dependency detected")]
    CyclicDependency,
    #[error("Missing edge {from} -> {to}")]
    MissingEdge { from: String, to: String },
    #[error("No agent registered for {0}")]
    MissingAgent(AgentName),
    #[error("Invalid workflow configuration: {0}")]
    InvalidConfiguration(String),
}
