//! 问题集与批量作答
//!
//! 每道题独立建状态、独立运行；并发上限由 Semaphore 控制，结果保持输入顺序。
//! 单题失败只记录空答案，不影响其余题目。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::attachment::prepare_question;
use crate::workflow::{GraphExecutor, RunRequest};

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Attachment {file_name} for task {task_id} has not been downloaded")]
    MissingFile { task_id: String, file_name: String },
}

/// 评测题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub task_id: String,
    pub question: String,
    #[serde(default, alias = "Level", skip_serializing_if = "Option::is_none")]
    pub level: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// 本地下载后的附件路径
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

impl Question {
    pub fn has_file(&self) -> bool {
        self.file_name.as_deref().is_some_and(|f| !f.trim().is_empty())
    }

    /// 本地附件路径；声明了附件却没有下载时报错，避免把题目当纯文本作答
    pub fn local_file(&self) -> Result<Option<&Path>, DatasetError> {
        match (&self.file_path, &self.file_name) {
            (Some(path), _) => Ok(Some(path.as_path())),
            (None, Some(name)) if self.has_file() => Err(DatasetError::MissingFile {
                task_id: self.task_id.clone(),
                file_name: name.clone(),
            }),
            (None, _) => Ok(None),
        }
    }
}

/// 提交格式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub task_id: String,
    pub submitted_answer: String,
}

pub async fn load_questions(path: &Path) -> Result<Vec<Question>, DatasetError> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

pub async fn save_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let body = serde_json::to_string_pretty(data)?;
    tokio::fs::write(path, body).await?;
    Ok(())
}

pub async fn load_answers(path: &Path) -> Result<Vec<AnswerRecord>, DatasetError> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

/// 批量执行器
pub struct BatchRunner {
    executor: Arc<GraphExecutor>,
    limit: Arc<Semaphore>,
}

impl BatchRunner {
    pub fn new(executor: Arc<GraphExecutor>, concurrency: usize) -> Self {
        Self {
            executor,
            limit: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    pub async fn run(&self, questions: &[Question]) -> Vec<AnswerRecord> {
        info!(count = questions.len(), "Starting batch");
        let runs = questions.iter().map(|q| self.answer_one(q));
        let answers = join_all(runs).await;
        let answered = answers.iter().filter(|a| !a.submitted_answer.is_empty()).count();
        info!(answered, total = answers.len(), "Batch finished");
        answers
    }

    async fn answer_one(&self, question: &Question) -> AnswerRecord {
        let empty = AnswerRecord {
            task_id: question.task_id.clone(),
            submitted_answer: String::new(),
        };
        let Ok(_permit) = self.limit.acquire().await else {
            return empty;
        };

        let file = match question.local_file() {
            Ok(file) => file,
            Err(e) => {
                error!(task_id = %question.task_id, error = %e, "Question skipped");
                return empty;
            }
        };
        let (text, attachment) = match prepare_question(&question.question, file).await {
            Ok(prepared) => prepared,
            Err(e) => {
                error!(task_id = %question.task_id, error = %e, "Failed to prepare question");
                return empty;
            }
        };

        let mut request = RunRequest::new(text);
        request.attachment = attachment;
        let outcome = self.executor.run(request).await;
        match outcome.into_answer() {
            Ok(answer) => AnswerRecord {
                task_id: question.task_id.clone(),
                submitted_answer: answer,
            },
            Err(e) => {
                error!(task_id = %question.task_id, kind = e.kind(), error = %e, "Question failed");
                empty
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_accepts_api_shape() {
        let raw = r#"{"task_id": "t1", "question": "q?", "Level": "1", "file_name": ""}"#;
        let q: Question = serde_json::from_str(raw).unwrap();
        assert_eq!(q.task_id, "t1");
        assert!(q.level.is_some());
        assert!(!q.has_file());
        assert!(q.file_path.is_none());
    }

    #[test]
    fn test_local_file_requires_download() {
        let raw = r#"{"task_id": "t2", "question": "Total sales?", "file_name": "sales.xlsx"}"#;
        let mut q: Question = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            q.local_file(),
            Err(DatasetError::MissingFile { ref file_name, .. }) if file_name == "sales.xlsx"
        ));

        q.file_path = Some(PathBuf::from("data/t2/sales.xlsx"));
        assert_eq!(q.local_file().unwrap(), Some(Path::new("data/t2/sales.xlsx")));
    }

    #[test]
    fn test_local_file_without_attachment() {
        let raw = r#"{"task_id": "t3", "question": "q?", "file_name": ""}"#;
        let q: Question = serde_json::from_str(raw).unwrap();
        assert_eq!(q.local_file().unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_and_load_answers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/answers.json");
        let answers = vec![AnswerRecord {
            task_id: "t1".to_string(),
            submitted_answer: "42".to_string(),
        }];
        save_json(&path, &answers).await.unwrap();
        assert_eq!(load_answers(&path).await.unwrap(), answers);
    }
}
