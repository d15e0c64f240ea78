//! Agent 单元：图中每个节点的统一契约
//!
//! AgentUnit 只读 GraphState，返回 AgentOutput；由执行器校验输出种类并写回状态。

pub mod generator;
pub mod prompts;
pub mod specialists;
pub mod verifier;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{AgentError, GraphState, Verdict};
use crate::llm::LlmClient;
use crate::tools::ToolExecutor;
use crate::workflow::{AgentName, WorkflowError};

pub use generator::GeneratorAgent;
pub use specialists::{DataAnalystAgent, ReasonerAgent, ResearcherAgent};
pub use verifier::{parse_verdict, VerifierAgent};

/// Agent 输出
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutput {
    /// 追加到历史的中间结果（检索、推理、分析）
    Note(String),
    /// Generator 的答案草稿
    Draft(String),
    /// Verifier 的判定
    Verdict(Verdict),
}

/// Agent 单元 trait
#[async_trait]
pub trait AgentUnit: Send + Sync {
    fn name(&self) -> AgentName;

    async fn invoke(&self, state: &GraphState) -> Result<AgentOutput, AgentError>;
}

/// 执行器使用的一组 Agent（Router 由 DispatchPolicy 承担，不在此列）
#[derive(Clone)]
pub struct AgentSet {
    pub researcher: Arc<dyn AgentUnit>,
    pub reasoner: Arc<dyn AgentUnit>,
    pub data_analyst: Arc<dyn AgentUnit>,
    pub generator: Arc<dyn AgentUnit>,
    pub verifier: Arc<dyn AgentUnit>,
}

impl AgentSet {
    /// 以同一个 LLM 构建全部默认 Agent
    pub fn from_llm(llm: Arc<dyn LlmClient>, tools: Arc<ToolExecutor>) -> Self {
        Self {
            researcher: Arc::new(ResearcherAgent::new(llm.clone(), tools)),
            reasoner: Arc::new(ReasonerAgent::new(llm.clone())),
            data_analyst: Arc::new(DataAnalystAgent::new(llm.clone())),
            generator: Arc::new(GeneratorAgent::new(llm.clone())),
            verifier: Arc::new(VerifierAgent::new(llm)),
        }
    }

    pub fn get(&self, name: AgentName) -> Result<&Arc<dyn AgentUnit>, WorkflowError> {
        match name {
            AgentName::Researcher => Ok(&self.researcher),
            AgentName::Reasoner => Ok(&self.reasoner),
            AgentName::DataAnalyst => Ok(&self.data_analyst),
            AgentName::Generator => Ok(&self.generator),
            AgentName::Verifier => Ok(&self.verifier),
            AgentName::Router => Err(WorkflowError::MissingAgent(AgentName::Router)),
        }
    }

    /// 校验每个槽位上的 Agent 自报名称一致
    pub fn validate(&self) -> Result<(), WorkflowError> {
        for name in AgentName::ALL.into_iter().filter(|n| *n != AgentName::Router) {
            let agent = self.get(name)?;
            if agent.name() != name {
                return Err(WorkflowError::InvalidConfiguration(format!(
                    "agent in {} slot reports itself as {}",
                    name,
                    agent.name()
                )));
            }
        }
        Ok(())
    }
}
