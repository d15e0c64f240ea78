//! Generator：两种用法
//!
//! 无 verification 时按历史起草答案；有 verification 时结合上次草稿与反馈改写。
//! 输出为空即 GenerationError。

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::prompts::{self, render};
use crate::agents::{AgentOutput, AgentUnit};
use crate::core::{AgentError, GraphState};
use crate::llm::{LlmClient, Message};
use crate::workflow::AgentName;

pub struct GeneratorAgent {
    llm: Arc<dyn LlmClient>,
}

impl GeneratorAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn prompt(state: &GraphState) -> String {
        let history = state.history_transcript();
        match (&state.verification, state.draft_answer.as_deref()) {
            (Some(verdict), Some(draft)) => {
                let feedback = if verdict.feedback.trim().is_empty() {
                    "No issues reported; keep the answer and tighten its format."
                } else {
                    verdict.feedback.as_str()
                };
                render(
                    prompts::GENERATOR_REVISE,
                    &[("draft", draft), ("feedback", feedback), ("history", history.as_str())],
                )
            }
            _ => render(prompts::GENERATOR_DRAFT, &[("history", history.as_str())]),
        }
    }
}

/// 去掉模型常见的 "FINAL ANSWER:" 前缀
pub fn clean_answer(raw: &str) -> String {
    const PREFIX: &str = "FINAL ANSWER:";
    let trimmed = raw.trim();
    let stripped = match trimmed.get(..PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(PREFIX) => &trimmed[PREFIX.len()..],
        _ => trimmed,
    };
    stripped.trim().to_string()
}

#[async_trait]
impl AgentUnit for GeneratorAgent {
    fn name(&self) -> AgentName {
        AgentName::Generator
    }

    async fn invoke(&self, state: &GraphState) -> Result<AgentOutput, AgentError> {
        let messages = [Message::system(Self::prompt(state)), Message::user(state.question())];
        let reply = self
            .llm
            .complete(&messages)
            .await
            .map_err(|e| AgentError::Generation(e.to_string()))?;

        let answer = clean_answer(&reply);
        if answer.is_empty() {
            return Err(AgentError::Generation("generator returned an empty answer".to_string()));
        }
        Ok(AgentOutput::Draft(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Verdict;
    use crate::llm::ScriptedLlmClient;

    #[test]
    fn test_clean_answer() {
        assert_eq!(clean_answer("FINAL ANSWER: Paris"), "Paris");
        assert_eq!(clean_answer("final answer:  3 "), "3");
        assert_eq!(clean_answer("Rome"), "Rome");
    }

    #[test]
    fn test_clean_answer_non_ascii() {
        // "ﬁ" 大写后为 "FI"，字节长度改变
        assert_eq!(clean_answer("ﬁnal answer: 42"), "ﬁnal answer: 42");
        assert_eq!(clean_answer("東京"), "東京");
        assert_eq!(clean_answer("Final Answer: São Paulo"), "São Paulo");
    }

    #[test]
    fn test_prompt_switches_on_feedback() {
        let mut state = GraphState::create("q", None).unwrap();
        assert!(GeneratorAgent::prompt(&state).contains("write the exact"));
        state.draft_answer = Some("41".to_string());
        state.verification = Some(Verdict::fail("off by one"));
        let prompt = GeneratorAgent::prompt(&state);
        assert!(prompt.contains("## Previous answer:\n41"));
        assert!(prompt.contains("off by one"));
    }

    #[tokio::test]
    async fn test_empty_reply_is_generation_error() {
        let agent = GeneratorAgent::new(Arc::new(ScriptedLlmClient::new(["FINAL ANSWER:  "])));
        let state = GraphState::create("q", None).unwrap();
        assert!(matches!(
            agent.invoke(&state).await,
            Err(AgentError::Generation(_))
        ));
    }
}
