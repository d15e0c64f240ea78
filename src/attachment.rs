//! 附件：问题附带的外部文件引用
//!
//! 按扩展名识别类型；表格类（csv / tsv / json / xlsx）供 Data Analyst 读取预览，
//! 代码 / 文本类在预处理时直接内联进问题。

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::core::AgentError;

/// 预览最多展示的数据行
const PREVIEW_ROWS: usize = 20;
/// 文本预览最大字符数
const PREVIEW_CHARS: usize = 8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    /// 分隔符表格
    Delimited { separator: char },
    Json,
    /// 二进制表格（xlsx 等），只能按路径引用
    Spreadsheet,
    Code,
    Text,
    Image,
    Audio,
    Other,
}

impl AttachmentKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => AttachmentKind::Delimited { separator: ',' },
            "tsv" => AttachmentKind::Delimited { separator: '\t' },
            "json" | "jsonl" => AttachmentKind::Json,
            "xlsx" | "xls" | "ods" => AttachmentKind::Spreadsheet,
            "py" | "rs" | "js" | "ts" | "sh" | "sql" => AttachmentKind::Code,
            "txt" | "md" => AttachmentKind::Text,
            "png" | "jpg" | "jpeg" | "gif" | "webp" => AttachmentKind::Image,
            "mp3" | "wav" | "m4a" => AttachmentKind::Audio,
            _ => AttachmentKind::Other,
        }
    }

    /// 是否为 Data Analyst 处理的结构化数据
    pub fn is_tabular(&self) -> bool {
        matches!(
            self,
            AttachmentKind::Delimited { .. } | AttachmentKind::Json | AttachmentKind::Spreadsheet
        )
    }
}

/// 附件引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub path: PathBuf,
    pub kind: AttachmentKind,
}

impl Attachment {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = AttachmentKind::from_path(&path);
        Self { path, kind }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// 读取并生成供 LLM 阅读的预览；文件缺失、为空或无法解析时返回 DataFormat
    pub async fn load_preview(&self) -> Result<String, AgentError> {
        let meta = tokio::fs::metadata(&self.path).await.map_err(|e| {
            AgentError::DataFormat(format!("{}: {}", self.path.display(), e))
        })?;
        if !meta.is_file() || meta.len() == 0 {
            return Err(AgentError::DataFormat(format!(
                "{} is empty or not a file",
                self.path.display()
            )));
        }

        match self.kind {
            AttachmentKind::Spreadsheet => Ok(format!(
                "Spreadsheet file `{}` ({} bytes) at path {}",
                self.file_name(),
                meta.len(),
                self.path.display()
            )),
            AttachmentKind::Image | AttachmentKind::Audio | AttachmentKind::Other => {
                Err(AgentError::DataFormat(format!(
                    "{} is not a structured data file",
                    self.file_name()
                )))
            }
            _ => {
                let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
                    AgentError::DataFormat(format!("{}: {}", self.path.display(), e))
                })?;
                self.preview_text(&raw)
            }
        }
    }

    /// 图片编码为 `data:<mime>;base64,...`，供多模态消息携带
    pub async fn image_data_url(&self) -> Result<String, AgentError> {
        let mime = match self.kind {
            AttachmentKind::Image => self.image_mime(),
            _ => {
                return Err(AgentError::DataFormat(format!(
                    "{} is not an image",
                    self.file_name()
                )))
            }
        };
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            AgentError::DataFormat(format!("{}: {}", self.path.display(), e))
        })?;
        if bytes.is_empty() {
            return Err(AgentError::DataFormat(format!(
                "{} is empty",
                self.path.display()
            )));
        }
        Ok(format!("data:{mime};base64,{}", STANDARD.encode(&bytes)))
    }

    fn image_mime(&self) -> &'static str {
        let ext = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            _ => "image/png",
        }
    }

    fn preview_text(&self, raw: &str) -> Result<String, AgentError> {
        match self.kind {
            AttachmentKind::Delimited { separator } => preview_delimited(raw, separator),
            AttachmentKind::Json => {
                let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
                    AgentError::DataFormat(format!("{}: invalid JSON: {}", self.file_name(), e))
                })?;
                let pretty = serde_json::to_string_pretty(&value)
                    .map_err(|e| AgentError::DataFormat(e.to_string()))?;
                Ok(truncate(&pretty, PREVIEW_CHARS))
            }
            _ => Ok(truncate(raw, PREVIEW_CHARS)),
        }
    }
}

/// 表头 + 前若干行，列数不一致视为格式错误
fn preview_delimited(raw: &str, separator: char) -> Result<String, AgentError> {
    let delimiter = separator as u8;
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(raw.as_bytes());
    let header = reader.headers().map_err(table_error)?.clone();
    if header.iter().all(|h| h.trim().is_empty()) {
        return Err(AgentError::DataFormat("table has no header".to_string()));
    }

    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    let mut total = 0usize;
    for record in reader.records() {
        let record = record.map_err(table_error)?;
        total += 1;
        if total <= PREVIEW_ROWS {
            writer.write_record(&record).map_err(table_error)?;
        }
    }
    let rows = writer
        .into_inner()
        .map_err(|e| AgentError::DataFormat(e.to_string()))?;

    let columns: Vec<&str> = header.iter().collect();
    let mut out = format!(
        "Columns ({}): {}\nRows: {}\n",
        columns.len(),
        columns.join(", "),
        total
    );
    out.push_str(&String::from_utf8_lossy(&rows));
    if total > PREVIEW_ROWS {
        out.push_str(&format!("... {} more rows\n", total - PREVIEW_ROWS));
    }
    Ok(out)
}

fn table_error(e: csv::Error) -> AgentError {
    AgentError::DataFormat(format!("invalid table: {e}"))
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...[truncated]", s.chars().take(max_chars).collect::<String>())
    } else {
        s.to_string()
    }
}

/// 问题预处理：代码 / 文本附件内联进问题，表格与图片随运行携带，其他附件以路径引用；
/// 返回（改写后的问题, 仍需随运行携带的附件）
pub async fn prepare_question(
    question: &str,
    file_path: Option<&Path>,
) -> Result<(String, Option<Attachment>), AgentError> {
    let Some(path) = file_path else {
        return Ok((question.to_string(), None));
    };
    let attachment = Attachment::new(path);
    match attachment.kind {
        kind if kind.is_tabular() => Ok((question.to_string(), Some(attachment))),
        AttachmentKind::Image => {
            tracing::info!(file = %attachment.file_name(), "Attaching image to question");
            Ok((question.to_string(), Some(attachment)))
        }
        AttachmentKind::Code | AttachmentKind::Text => {
            let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                AgentError::DataFormat(format!("{}: {}", path.display(), e))
            })?;
            tracing::info!(file = %attachment.file_name(), "Inlining attachment into question");
            Ok((format!("{question}\n### Code:\n{content}"), None))
        }
        _ => Ok((
            format!("{question}\n### File path:\n{}", path.display()),
            None,
        )),
    }
}
