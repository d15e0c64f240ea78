//! 评分服务客户端：拉取题目、下载附件、提交答案

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::config::SubmissionSection;
use crate::dataset::{AnswerRecord, Question};

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Scoring API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing environment variable {0}")]
    MissingCredential(&'static str),
}

/// 提交凭据（来自环境变量 HF_USERNAME / HF_AGENT_CODE）
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub agent_code: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self, SubmissionError> {
        let username =
            std::env::var("HF_USERNAME").map_err(|_| SubmissionError::MissingCredential("HF_USERNAME"))?;
        let agent_code = std::env::var("HF_AGENT_CODE")
            .map_err(|_| SubmissionError::MissingCredential("HF_AGENT_CODE"))?;
        Ok(Self { username, agent_code })
    }
}

#[derive(Serialize)]
struct SubmitPayload<'a> {
    username: &'a str,
    agent_code: &'a str,
    answers: &'a [AnswerRecord],
}

pub struct ScoringClient {
    client: reqwest::Client,
    base_url: String,
}

impl ScoringClient {
    pub fn new(section: &SubmissionSection) -> Result<Self, SubmissionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(section.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: section.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn get_questions(&self) -> Result<Vec<Question>, SubmissionError> {
        let url = format!("{}/questions", self.base_url);
        let resp = check(self.client.get(&url).send().await?).await?;
        let questions: Vec<Question> = resp.json().await?;
        tracing::info!(count = questions.len(), "Retrieved questions");
        Ok(questions)
    }

    /// 下载附件到 `<dir>/<task_id>/<file_name>`；已存在且未要求覆盖时跳过
    pub async fn download_file(
        &self,
        question: &Question,
        dir: &Path,
        overwrite: bool,
    ) -> Result<Option<PathBuf>, SubmissionError> {
        let Some(file_name) = question.file_name.as_deref().filter(|_| question.has_file()) else {
            return Ok(None);
        };
        let task_dir = dir.join(&question.task_id);
        let path = task_dir.join(file_name);
        if path.exists() && !overwrite {
            tracing::info!(path = %path.display(), "Skipping download, file exists");
            return Ok(Some(path));
        }

        let url = format!("{}/files/{}", self.base_url, question.task_id);
        let resp = check(self.client.get(&url).send().await?).await?;
        let bytes = resp.bytes().await?;
        tokio::fs::create_dir_all(&task_dir).await?;
        tokio::fs::write(&path, &bytes).await?;
        tracing::info!(task_id = %question.task_id, path = %path.display(), size = bytes.len(), "Downloaded file");
        Ok(Some(path))
    }

    /// 拉取题目并下载全部附件，file_path 指向本地副本
    pub async fn fetch_all(&self, dir: &Path) -> Result<Vec<Question>, SubmissionError> {
        let mut questions = self.get_questions().await?;
        for question in questions.iter_mut() {
            question.file_path = self.download_file(question, dir, false).await?;
        }
        Ok(questions)
    }

    /// 提交答案，返回评分服务的 JSON 报告
    pub async fn submit(
        &self,
        credentials: &Credentials,
        answers: &[AnswerRecord],
    ) -> Result<serde_json::Value, SubmissionError> {
        let url = format!("{}/submit", self.base_url);
        let payload = SubmitPayload {
            username: &credentials.username,
            agent_code: &credentials.agent_code,
            answers,
        };
        let resp = check(self.client.post(&url).json(&payload).send().await?).await?;
        Ok(resp.json().await?)
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, SubmissionError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SubmissionError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let answers = vec![AnswerRecord {
            task_id: "t1".to_string(),
            submitted_answer: "Paris".to_string(),
        }];
        let payload = SubmitPayload {
            username: "alice",
            agent_code: "https://example.org/code",
            answers: &answers,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["username"], "alice");
        assert_eq!(json["answers"][0]["submitted_answer"], "Paris");
    }

    #[tokio::test]
    async fn test_download_skips_without_file_name() {
        let client = ScoringClient::new(&SubmissionSection::default()).unwrap();
        let question = Question {
            task_id: "t1".to_string(),
            question: "q".to_string(),
            level: None,
            file_name: None,
            file_path: None,
        };
        let dir = tempfile::tempdir().unwrap();
        assert!(client.download_file(&question, dir.path(), false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_download_skips_existing_file() {
        let client = ScoringClient::new(&SubmissionSection::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("t1")).unwrap();
        std::fs::write(dir.path().join("t1/data.csv"), "a,b\n1,2\n").unwrap();
        let question = Question {
            task_id: "t1".to_string(),
            question: "q".to_string(),
            level: None,
            file_name: Some("data.csv".to_string()),
            file_path: None,
        };
        let path = client.download_file(&question, dir.path(), false).await.unwrap();
        assert_eq!(path, Some(dir.path().join("t1/data.csv")));
    }
}
