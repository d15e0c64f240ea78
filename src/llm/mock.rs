//! 无需 API 的 LLM 客户端
//!
//! MockLlmClient 根据 system prompt 中的角色标记给出确定性回复，便于本地跑通整条流水线；
//! ScriptedLlmClient 按队列依次返回预设回复，供测试使用。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, Message, Role};

/// Mock 客户端：按角色回显
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let system = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .unwrap_or("");
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        if system.contains("[role:verifier]") {
            return Ok(r#"{"passed": true, "feedback": "Mock verifier found no issues."}"#.to_string());
        }
        if system.contains("[role:generator]") {
            return Ok(format!("FINAL ANSWER: Mock answer to: {}", last_user));
        }
        Ok(format!("Mock notes on: {}", last_user))
    }
}

/// 按顺序返回预设回复；队列耗尽后返回 EmptyResponse
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    /// 收到的请求（最后一条 user 消息），供断言
    seen: Mutex<Vec<String>>,
    /// 每次请求最后一条 user 消息携带的图片
    seen_images: Mutex<Vec<Vec<String>>>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            seen: Mutex::new(Vec::new()),
            seen_images: Mutex::new(Vec::new()),
        }
    }

    pub fn push_error(&self, err: LlmError) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(Err(err));
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn seen_images(&self) -> Vec<Vec<String>> {
        self.seen_images.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        if let Some(last) = messages.iter().rev().find(|m| m.role == Role::User) {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(last.content.clone());
            }
            if let Ok(mut images) = self.seen_images.lock() {
                images.push(last.images.clone());
            }
        }
        self.replies
            .lock()
            .map_err(|e| LlmError::ApiError(e.to_string()))?
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse))
    }
}
