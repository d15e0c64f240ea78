//! 状态存储：一次运行中在各 Agent 之间传递的唯一可变记录
//!
//! 只暴露两类变更：history 追加与字段覆盖（route 仅可设置一次）。
//! Agent 只读 GraphState，返回 StateUpdate，由执行器统一应用。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attachment::Attachment;
use crate::core::PipelineError;
use crate::workflow::{AgentName, Route};

/// history 中的发言者
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Human,
    Agent(AgentName),
    /// 执行器写入的注记（重试、缺口）
    System,
}

impl Speaker {
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::Human => "human",
            Speaker::Agent(name) => name.as_str(),
            Speaker::System => "system",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 单条历史记录
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub speaker: Speaker,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Verifier 的判定
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub feedback: String,
}

impl Verdict {
    pub fn pass(feedback: impl Into<String>) -> Self {
        Self {
            passed: true,
            feedback: feedback.into(),
        }
    }

    pub fn fail(feedback: impl Into<String>) -> Self {
        Self {
            passed: false,
            feedback: feedback.into(),
        }
    }
}

/// Agent 返回的部分更新：一条历史消息，外加可选的字段覆盖
#[derive(Clone, Debug)]
pub struct StateUpdate {
    pub speaker: Speaker,
    pub message: String,
    pub draft_answer: Option<String>,
    pub verification: Option<Verdict>,
}

impl StateUpdate {
    pub fn note(speaker: Speaker, message: impl Into<String>) -> Self {
        Self {
            speaker,
            message: message.into(),
            draft_answer: None,
            verification: None,
        }
    }

    pub fn with_draft(mut self, draft: impl Into<String>) -> Self {
        self.draft_answer = Some(draft.into());
        self
    }

    pub fn with_verification(mut self, verdict: Verdict) -> Self {
        self.verification = Some(verdict);
        self
    }
}

/// 图状态
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphState {
    question: String,
    history: Vec<HistoryEntry>,
    route: Option<Route>,
    pub draft_answer: Option<String>,
    pub verification: Option<Verdict>,
    pub iteration_count: u32,
    attachment: Option<Attachment>,
}

impl GraphState {
    /// 新建运行状态：空历史、无路由、无草稿、iteration_count = 0
    pub fn create(
        question: impl Into<String>,
        attachment: Option<Attachment>,
    ) -> Result<Self, PipelineError> {
        let question = question.into();
        if question.trim().is_empty() {
            return Err(PipelineError::InvalidState("question is empty".to_string()));
        }
        Ok(Self {
            question,
            history: Vec::new(),
            route: None,
            draft_answer: None,
            verification: None,
            iteration_count: 0,
            attachment,
        })
    }

    /// 以既有会话历史为前缀创建状态
    pub fn resume(
        question: impl Into<String>,
        attachment: Option<Attachment>,
        prior: Vec<HistoryEntry>,
    ) -> Result<Self, PipelineError> {
        let mut state = Self::create(question, attachment)?;
        state.history = prior;
        Ok(state)
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn route(&self) -> Option<Route> {
        self.route
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    /// 追加一条历史；speaker 标签或 message 为空时报 InvalidState
    pub fn append_history(
        &mut self,
        speaker: Speaker,
        message: impl Into<String>,
    ) -> Result<(), PipelineError> {
        let message = message.into();
        if speaker.label().is_empty() {
            return Err(PipelineError::InvalidState("speaker is empty".to_string()));
        }
        if message.trim().is_empty() {
            return Err(PipelineError::InvalidState(format!(
                "empty message from {}",
                speaker
            )));
        }
        self.history.push(HistoryEntry {
            speaker,
            message,
            at: Utc::now(),
        });
        Ok(())
    }

    /// 路由只允许设置一次
    pub fn set_route(&mut self, route: Route) -> Result<(), PipelineError> {
        if let Some(existing) = self.route {
            return Err(PipelineError::InvalidState(format!(
                "route already set to {}",
                existing
            )));
        }
        self.route = Some(route);
        Ok(())
    }

    /// 应用 Agent 的部分更新：先追加历史，再覆盖字段
    pub fn apply(&mut self, update: StateUpdate) -> Result<(), PipelineError> {
        self.append_history(update.speaker, update.message)?;
        if let Some(draft) = update.draft_answer {
            self.draft_answer = Some(draft);
        }
        if let Some(verdict) = update.verification {
            self.verification = Some(verdict);
        }
        Ok(())
    }

    /// 当前 Verifier 反馈（未通过或有建议时）
    pub fn feedback(&self) -> Option<&str> {
        self.verification
            .as_ref()
            .map(|v| v.feedback.as_str())
            .filter(|f| !f.trim().is_empty())
    }

    /// 渲染为 Agent 可读的对话记录
    pub fn history_transcript(&self) -> String {
        let mut out = String::new();
        for entry in &self.history {
            match entry.speaker {
                Speaker::Human => {
                    out.push_str(&format!("**Human** query: {}\n\n", entry.message))
                }
                Speaker::Agent(name) => out.push_str(&format!(
                    "**{} agent**: {}\n\n",
                    name.display_name(),
                    entry.message
                )),
                Speaker::System => out.push_str(&format!("_note_: {}\n\n", entry.message)),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_fresh_state() {
        let state = GraphState::create("What is 2+2?", None).unwrap();
        assert_eq!(state.question(), "What is 2+2?");
        assert!(state.history().is_empty());
        assert!(state.route().is_none());
        assert!(state.draft_answer.is_none());
        assert_eq!(state.iteration_count, 0);
    }

    #[test]
    fn test_create_rejects_blank_question() {
        let err = GraphState::create("   ", None).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidState(_)));
    }

    #[test]
    fn test_append_history_keeps_order() {
        let mut state = GraphState::create("q", None).unwrap();
        state.append_history(Speaker::Human, "q").unwrap();
        state
            .append_history(Speaker::Agent(AgentName::Reasoner), "thinking")
            .unwrap();
        let speakers: Vec<_> = state.history().iter().map(|e| e.speaker).collect();
        assert_eq!(
            speakers,
            vec![Speaker::Human, Speaker::Agent(AgentName::Reasoner)]
        );
    }

    #[test]
    fn test_append_history_rejects_empty_message() {
        let mut state = GraphState::create("q", None).unwrap();
        let err = state
            .append_history(Speaker::Agent(AgentName::Generator), "  ")
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidState(_)));
        assert!(state.history().is_empty());
    }

    #[test]
    fn test_route_set_once() {
        let mut state = GraphState::create("q", None).unwrap();
        state.set_route(Route::LogicalMath).unwrap();
        assert!(state.set_route(Route::FactualMultiHop).is_err());
        assert_eq!(state.route(), Some(Route::LogicalMath));
    }

    #[test]
    fn test_apply_overwrites_draft() {
        let mut state = GraphState::create("q", None).unwrap();
        let gen = Speaker::Agent(AgentName::Generator);
        state.apply(StateUpdate::note(gen, "a").with_draft("a")).unwrap();
        state.apply(StateUpdate::note(gen, "b").with_draft("b")).unwrap();
        assert_eq!(state.draft_answer.as_deref(), Some("b"));
        assert_eq!(state.history().len(), 2);
    }

    #[test]
    fn test_transcript_format() {
        let mut state = GraphState::create("capital of France?", None).unwrap();
        state.append_history(Speaker::Human, "capital of France?").unwrap();
        state
            .append_history(Speaker::Agent(AgentName::Researcher), "Paris")
            .unwrap();
        let transcript = state.history_transcript();
        assert!(transcript.starts_with("**Human** query: capital of France?"));
        assert!(transcript.contains("**Researcher agent**: Paris"));
    }
}
