//! 分派策略（Router）
//!
//! 每次运行只根据问题文本与附件分类一次：
//! - 有表格附件，或问题提到附件 / 表格文件：结构化数据路线，优先级最高
//! - 图片附件：推理路线（Reasoner 直接看图）
//! - 明确的逻辑 / 数学题：推理路线
//! - 其余默认多跳事实路线

use std::sync::OnceLock;

use regex::Regex;

use crate::attachment::{Attachment, AttachmentKind};
use crate::core::PipelineError;
use crate::workflow::Route;

/// 分派策略 trait
pub trait DispatchPolicy: Send + Sync {
    fn classify(&self, question: &str, attachment: Option<&Attachment>)
        -> Result<Route, PipelineError>;
}

/// 关键词分类器
#[derive(Debug, Default, Clone)]
pub struct KeywordPolicy;

fn arithmetic_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d+(\.\d+)?\s*[-+*/^×÷%]\s*\d+").expect("valid arithmetic regex")
    })
}

fn attachment_reference_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\battach(ed|ment)\b|\b(spreadsheet|excel|worksheet)\b|\b(csv|tsv|json|xlsx?) file\b|\bthe (provided |given |following )?(file|table|sheet)\b|\.(csv|tsv|xlsx?)\b",
        )
        .expect("valid attachment regex")
    })
}

impl KeywordPolicy {
    /// 问题提到附件或表格文件；代码 / 路径已内联进问题时不算
    fn references_attachment(content: &str) -> bool {
        if content.contains("### code:") || content.contains("### file path:") {
            return false;
        }
        attachment_reference_pattern().is_match(content)
    }

    fn contains_logic_keywords(content: &str) -> bool {
        let keywords = [
            "calculate", "compute", "solve", "equation", "prove", "proof", "logic",
            "puzzle", "commutative", "associative", "counter-example", "counterexample",
            "probability", "how many ways", "sum of", "product of", "integer", "prime",
            "riddle", "deduce", "if and only if", "truth table", "table defining",
        ];
        keywords.iter().any(|k| content.contains(k))
    }

    /// 需要外部知识的信号（人名、时间、出处等）
    fn contains_research_keywords(content: &str) -> bool {
        let keywords = [
            "who ", "when ", "where ", "wikipedia", "published", "album", "paper",
            "arxiv", "according to", "website", "article", "olympics", "born",
            "author", "museum", "released", "award",
        ];
        keywords.iter().any(|k| content.contains(k))
    }

    /// 倒序书写的句子（如 ".rewsna eht sa ..."）
    fn looks_reversed(content: &str) -> bool {
        let trimmed = content.trim();
        trimmed.starts_with('.') && trimmed.split_whitespace().any(|w| w == "eht")
    }
}

impl DispatchPolicy for KeywordPolicy {
    fn classify(
        &self,
        question: &str,
        attachment: Option<&Attachment>,
    ) -> Result<Route, PipelineError> {
        let content = question.trim().to_lowercase();
        if content.is_empty() {
            return Err(PipelineError::Routing("question is empty".to_string()));
        }

        match attachment {
            Some(a) if a.kind == AttachmentKind::Image => return Ok(Route::LogicalMath),
            Some(_) => return Ok(Route::StructuredData),
            None if Self::references_attachment(&content) => return Ok(Route::StructuredData),
            None => {}
        }

        let logic = Self::looks_reversed(&content)
            || arithmetic_pattern().is_match(&content)
            || Self::contains_logic_keywords(&content);
        if logic && !Self::contains_research_keywords(&content) {
            return Ok(Route::LogicalMath);
        }

        Ok(Route::FactualMultiHop)
    }
}

/// 固定路由（测试、CLI 指定）
#[derive(Debug, Clone, Copy)]
pub struct FixedPolicy(pub Route);

impl DispatchPolicy for FixedPolicy {
    fn classify(
        &self,
        question: &str,
        _attachment: Option<&Attachment>,
    ) -> Result<Route, PipelineError> {
        if question.trim().is_empty() {
            return Err(PipelineError::Routing("question is empty".to_string()));
        }
        Ok(self.0)
    }
}
