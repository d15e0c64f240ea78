//! 实质 Agent：Researcher / Reasoner / Data Analyst
//!
//! 三者都产出一条追加到历史的 Note。外部检索或模型调用失败映射为 ToolUnavailable（可重试）；
//! Data Analyst 缺少或读不了附件时返回 DataFormat（本次运行致命）。
//! Reasoner 遇到图片附件时把图片随问题一起发给模型。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::agents::prompts::{self, render};
use crate::agents::{AgentOutput, AgentUnit};
use crate::attachment::AttachmentKind;
use crate::core::{AgentError, GraphState};
use crate::llm::{LlmClient, Message};
use crate::tools::ToolExecutor;
use crate::workflow::AgentName;

/// 调用 LLM；失败视为外部依赖暂不可用
async fn ask(llm: &dyn LlmClient, system: String, question: &str) -> Result<String, AgentError> {
    ask_with(llm, system, Message::user(question)).await
}

async fn ask_with(llm: &dyn LlmClient, system: String, user: Message) -> Result<String, AgentError> {
    let messages = [Message::system(system), user];
    let reply = llm
        .complete(&messages)
        .await
        .map_err(|e| AgentError::ToolUnavailable(e.to_string()))?;
    Ok(reply.trim().to_string())
}

/// Researcher：Wikipedia / arXiv / Web 检索 + LLM 归纳
pub struct ResearcherAgent {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolExecutor>,
}

impl ResearcherAgent {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolExecutor>) -> Self {
        Self { llm, tools }
    }

    /// 依次调用全部检索工具；单个工具失败只跳过，全部失败才算不可用
    async fn gather(&self, question: &str) -> Result<String, AgentError> {
        let mut material = String::new();
        let mut last_error = None;
        for tool in self.tools.tool_names() {
            match self.tools.execute(&tool, json!({ "query": question })).await {
                Ok(result) => material.push_str(&format!("### {tool}\n{result}\n\n")),
                Err(e) => {
                    tracing::warn!(tool = %tool, error = %e, "Research tool failed, skipping");
                    last_error = Some(e);
                }
            }
        }
        if material.is_empty() {
            return Err(last_error.unwrap_or_else(|| {
                AgentError::ToolUnavailable("no research tools registered".to_string())
            }));
        }
        Ok(material)
    }
}

#[async_trait]
impl AgentUnit for ResearcherAgent {
    fn name(&self) -> AgentName {
        AgentName::Researcher
    }

    async fn invoke(&self, state: &GraphState) -> Result<AgentOutput, AgentError> {
        let material = self.gather(state.question()).await?;
        let history = state.history_transcript();
        let system = render(
            prompts::RESEARCHER,
            &[("tools", material.as_str()), ("history", history.as_str())],
        );
        let summary = ask(self.llm.as_ref(), system, state.question()).await?;
        Ok(AgentOutput::Note(summary))
    }
}

/// Reasoner：逐步推理
pub struct ReasonerAgent {
    llm: Arc<dyn LlmClient>,
}

impl ReasonerAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl AgentUnit for ReasonerAgent {
    fn name(&self) -> AgentName {
        AgentName::Reasoner
    }

    async fn invoke(&self, state: &GraphState) -> Result<AgentOutput, AgentError> {
        let history = state.history_transcript();
        let system = render(
            prompts::REASONER,
            &[("question", state.question()), ("history", history.as_str())],
        );
        let user = match state.attachment() {
            Some(a) if a.kind == AttachmentKind::Image => {
                let image = a.image_data_url().await?;
                tracing::debug!(file = %a.file_name(), "Sending image to reasoner");
                Message::user_with_images(state.question(), vec![image])
            }
            _ => Message::user(state.question()),
        };
        let trace = ask_with(self.llm.as_ref(), system, user).await?;
        Ok(AgentOutput::Note(trace))
    }
}

/// Data Analyst：读取附件预览后交给 LLM 分析
pub struct DataAnalystAgent {
    llm: Arc<dyn LlmClient>,
}

impl DataAnalystAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl AgentUnit for DataAnalystAgent {
    fn name(&self) -> AgentName {
        AgentName::DataAnalyst
    }

    async fn invoke(&self, state: &GraphState) -> Result<AgentOutput, AgentError> {
        let attachment = state.attachment().ok_or_else(|| {
            AgentError::DataFormat("structured data route requires an attachment".to_string())
        })?;
        let table = attachment.load_preview().await?;
        tracing::debug!(file = %attachment.file_name(), chars = table.len(), "Loaded attachment preview");

        let history = state.history_transcript();
        let system = render(
            prompts::DATA_ANALYST,
            &[
                ("question", state.question()),
                ("table", table.as_str()),
                ("history", history.as_str()),
            ],
        );
        let analysis = ask(self.llm.as_ref(), system, state.question()).await?;
        Ok(AgentOutput::Note(analysis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::Attachment;
    use crate::llm::{LlmError, ScriptedLlmClient};
    use crate::tools::{Tool, ToolRegistry};
    use std::io::Write;

    #[tokio::test]
    async fn test_reasoner_returns_note() {
        let llm = Arc::new(ScriptedLlmClient::new(["  4  "]));
        let agent = ReasonerAgent::new(llm);
        let state = GraphState::create("2+2?", None).unwrap();
        assert_eq!(
            agent.invoke(&state).await.unwrap(),
            AgentOutput::Note("4".to_string())
        );
    }

    #[tokio::test]
    async fn test_reasoner_llm_failure_is_transient() {
        let llm = Arc::new(ScriptedLlmClient::new(Vec::<String>::new()));
        llm.push_error(LlmError::Timeout(60));
        let agent = ReasonerAgent::new(llm);
        let state = GraphState::create("2+2?", None).unwrap();
        assert!(matches!(
            agent.invoke(&state).await,
            Err(AgentError::ToolUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_reasoner_sends_image() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(&[0x89, b'P', b'N', b'G']).unwrap();
        let llm = Arc::new(ScriptedLlmClient::new(["Qh4#"]));
        let agent = ReasonerAgent::new(llm.clone());
        let state =
            GraphState::create("Which move mates?", Some(Attachment::new(file.path()))).unwrap();

        assert_eq!(
            agent.invoke(&state).await.unwrap(),
            AgentOutput::Note("Qh4#".to_string())
        );
        assert_eq!(
            llm.seen_images(),
            vec![vec!["data:image/png;base64,iVBORw==".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_reasoner_text_only_without_image() {
        let llm = Arc::new(ScriptedLlmClient::new(["4"]));
        let agent = ReasonerAgent::new(llm.clone());
        let state = GraphState::create("2+2?", None).unwrap();
        agent.invoke(&state).await.unwrap();
        assert_eq!(llm.seen_images(), vec![Vec::<String>::new()]);
    }

    #[tokio::test]
    async fn test_data_analyst_without_attachment() {
        let agent = DataAnalystAgent::new(Arc::new(ScriptedLlmClient::new(["unused"])));
        let state = GraphState::create("total sales?", None).unwrap();
        assert!(matches!(
            agent.invoke(&state).await,
            Err(AgentError::DataFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_data_analyst_missing_file() {
        let agent = DataAnalystAgent::new(Arc::new(ScriptedLlmClient::new(["unused"])));
        let state =
            GraphState::create("total sales?", Some(Attachment::new("/missing/sales.csv"))).unwrap();
        assert!(matches!(
            agent.invoke(&state).await,
            Err(AgentError::DataFormat(_))
        ));
    }

    struct FixedTool {
        name: &'static str,
        reply: Result<&'static str, &'static str>,
    }

    #[async_trait]
    impl Tool for FixedTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "fixed"
        }

        async fn execute(&self, _args: serde_json::Value) -> Result<String, String> {
            self.reply.map(str::to_string).map_err(str::to_string)
        }
    }

    #[tokio::test]
    async fn test_researcher_skips_failed_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(FixedTool { name: "arxiv_search", reply: Err("HTTP 503") });
        registry.register(FixedTool { name: "wikipedia_search", reply: Ok("Paris is the capital") });
        let tools = Arc::new(ToolExecutor::new(registry, 5));
        let llm = Arc::new(ScriptedLlmClient::new(["Capital: Paris"]));
        let agent = ResearcherAgent::new(llm, tools);

        let material = agent.gather("capital of France").await.unwrap();
        assert!(material.contains("### wikipedia_search\nParis is the capital"));
        assert!(!material.contains("arxiv_search"));
    }

    #[tokio::test]
    async fn test_researcher_all_tools_failed() {
        let mut registry = ToolRegistry::new();
        registry.register(FixedTool { name: "wikipedia_search", reply: Err("HTTP 503") });
        let tools = Arc::new(ToolExecutor::new(registry, 5));
        let agent = ResearcherAgent::new(Arc::new(ScriptedLlmClient::new(["unused"])), tools);
        let state = GraphState::create("who?", None).unwrap();
        assert!(matches!(
            agent.invoke(&state).await,
            Err(AgentError::ToolUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_researcher_without_tools() {
        let tools = Arc::new(ToolExecutor::new(ToolRegistry::new(), 5));
        let agent = ResearcherAgent::new(Arc::new(ScriptedLlmClient::new(["unused"])), tools);
        let state = GraphState::create("who?", None).unwrap();
        assert!(matches!(
            agent.invoke(&state).await,
            Err(AgentError::ToolUnavailable(_))
        ));
    }
}
