//! Hive - 多智能体问答编排引擎
//!
//! 模块划分：
//! - **agents**: Researcher / Reasoner / Data Analyst / Generator / Verifier
//! - **attachment**: 附件识别、预览与问题预处理
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 图状态、错误、恢复策略、会话存储
//! - **dataset**: 题目集与批量作答
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **observability**: 日志初始化
//! - **submission**: 评分服务客户端
//! - **tools**: 工具注册、带超时的执行器、Wikipedia / arXiv / Tavily 检索
//! - **workflow**: Agent 图、分派策略、图执行器

pub mod agents;
pub mod attachment;
pub mod config;
pub mod core;
pub mod dataset;
pub mod llm;
pub mod observability;
pub mod submission;
pub mod tools;
pub mod workflow;

use std::sync::Arc;

use crate::agents::AgentSet;
use crate::config::AppConfig;
use crate::llm::LlmClient;
use crate::tools::{research_registry, TavilySearchTool, ToolExecutor};
use crate::workflow::{DispatchPolicy, GraphConfig, GraphExecutor, WorkflowError};

/// 按配置装配默认执行器（检索工具 + 共用同一 LLM 的全部 Agent）
pub fn build_executor(
    cfg: &AppConfig,
    llm: Arc<dyn LlmClient>,
    policy: Arc<dyn DispatchPolicy>,
) -> Result<GraphExecutor, WorkflowError> {
    let registry = research_registry(&cfg.tools, TavilySearchTool::api_key_from_env());
    let tools = Arc::new(ToolExecutor::new(registry, cfg.tools.tool_timeout_secs));

    GraphExecutor::new(
        AgentSet::from_llm(llm, tools),
        policy,
        GraphConfig::from(&cfg.graph),
    )
}
