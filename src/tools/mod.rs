//! 工具层：注册表、带超时的执行器与 Researcher 的检索工具

pub mod arxiv;
pub mod executor;
pub mod registry;
pub mod tavily;
pub mod wikipedia;

pub use arxiv::ArxivTool;
pub use executor::ToolExecutor;
pub use registry::{Tool, ToolRegistry};
pub use tavily::TavilySearchTool;
pub use wikipedia::WikipediaTool;

use crate::config::ToolsSection;

/// 按配置注册 Researcher 的检索工具；没有 Tavily Key 时跳过网页检索
pub fn research_registry(section: &ToolsSection, tavily_api_key: Option<String>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(WikipediaTool::new(
        section.wikipedia_base_url.clone(),
        section.wikipedia_results,
        section.tool_timeout_secs,
        section.max_result_chars,
    ));
    registry.register(ArxivTool::new(
        section.arxiv_base_url.clone(),
        section.arxiv_results,
        section.tool_timeout_secs,
        section.max_result_chars,
    ));
    match tavily_api_key {
        Some(key) => registry.register(TavilySearchTool::new(
            section.tavily_base_url.clone(),
            key,
            section.tavily_results,
            section.tool_timeout_secs,
            section.max_result_chars,
        )),
        None => tracing::warn!("TAVILY_API_KEY not set, web search disabled"),
    }
    registry
}

/// 超过 max_chars 时截断并追加 ...[truncated]
pub(crate) fn truncate_result(s: String, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...[truncated]", s.chars().take(max_chars).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_research_registry_without_tavily_key() {
        let registry = research_registry(&ToolsSection::default(), None);
        assert_eq!(registry.tool_names(), vec!["arxiv_search", "wikipedia_search"]);
    }

    #[test]
    fn test_research_registry_with_tavily_key() {
        let registry = research_registry(&ToolsSection::default(), Some("tvly-test".to_string()));
        assert_eq!(
            registry.tool_names(),
            vec!["arxiv_search", "tavily_search", "wikipedia_search"]
        );
    }

    #[test]
    fn test_truncate_result() {
        assert_eq!(truncate_result("abcdef".to_string(), 3), "abc...[truncated]");
        assert_eq!(truncate_result("abc".to_string(), 3), "abc");
    }
}
