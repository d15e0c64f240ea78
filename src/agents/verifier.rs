//! Verifier：审查当前草稿
//!
//! 优先解析 JSON `{"passed": bool, "feedback": str}`（允许包在代码块里）；
//! 否则接受以 PASS/OK 或 FAIL/REVISE 开头的纯文本。其余回复视为 VerificationError。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::agents::prompts::{self, render};
use crate::agents::{AgentOutput, AgentUnit};
use crate::core::{AgentError, GraphState, Verdict};
use crate::llm::{LlmClient, Message};
use crate::workflow::AgentName;

#[derive(Debug, Deserialize)]
struct RawVerdict {
    passed: bool,
    #[serde(default)]
    feedback: String,
}

/// 把模型回复解析为 Verdict
pub fn parse_verdict(reply: &str) -> Result<Verdict, AgentError> {
    let text = reply.trim();
    if text.is_empty() {
        return Err(AgentError::Verification("verifier returned an empty reply".to_string()));
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Ok(raw) = serde_json::from_str::<RawVerdict>(&text[start..=end]) {
                return Ok(Verdict {
                    passed: raw.passed,
                    feedback: raw.feedback.trim().to_string(),
                });
            }
        }
    }

    for prefix in ["PASS", "OK"] {
        if let Some(rest) = strip_keyword(text, prefix) {
            return Ok(Verdict::pass(rest));
        }
    }
    for prefix in ["FAIL", "REVISE"] {
        if let Some(rest) = strip_keyword(text, prefix) {
            return Ok(Verdict::fail(rest));
        }
    }

    Err(AgentError::Verification(format!(
        "unrecognised verifier reply: {}",
        text.chars().take(120).collect::<String>()
    )))
}

/// 大小写不敏感地匹配开头关键词，返回其后的反馈文本
fn strip_keyword(text: &str, keyword: &str) -> Option<String> {
    let head = text.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    Some(
        text[keyword.len()..]
            .trim_start_matches(|c: char| c == ':' || c == '-' || c == '.' || c.is_whitespace())
            .trim()
            .to_string(),
    )
}

pub struct VerifierAgent {
    llm: Arc<dyn LlmClient>,
}

impl VerifierAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl AgentUnit for VerifierAgent {
    fn name(&self) -> AgentName {
        AgentName::Verifier
    }

    async fn invoke(&self, state: &GraphState) -> Result<AgentOutput, AgentError> {
        let draft = state
            .draft_answer
            .as_deref()
            .ok_or_else(|| AgentError::Verification("no draft answer to verify".to_string()))?;
        let history = state.history_transcript();
        let system = render(prompts::VERIFIER, &[("draft", draft), ("history", history.as_str())]);

        let messages = [Message::system(system), Message::user(state.question())];
        let reply = self
            .llm
            .complete(&messages)
            .await
            .map_err(|e| AgentError::Verification(e.to_string()))?;
        Ok(AgentOutput::Verdict(parse_verdict(&reply)?))
    }
}
