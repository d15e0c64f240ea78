//! arXiv 检索工具
//!
//! 调用 arXiv export API（Atom feed），取前 N 篇论文的发布日期、标题、作者与摘要。

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;

use crate::tools::{truncate_result, Tool};

/// 单篇论文
#[derive(Debug, Clone, PartialEq, Eq)]
struct Paper {
    published: String,
    title: String,
    authors: Vec<String>,
    summary: String,
}

/// arXiv 工具：args 为 {"query": "..."}
pub struct ArxivTool {
    client: Client,
    base_url: String,
    results: usize,
    max_result_chars: usize,
}

impl ArxivTool {
    pub fn new(base_url: impl Into<String>, results: usize, timeout_secs: u64, max_result_chars: usize) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(concat!("hive/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            results: results.max(1),
            max_result_chars,
        }
    }

    async fn query(&self, query: &str) -> Result<String, String> {
        let url = format!("{}/api/query", self.base_url);
        let search = format!("all:{query}");
        let limit = self.results.to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("search_query", search.as_str()),
                ("start", "0"),
                ("max_results", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        resp.text()
            .await
            .map_err(|e| format!("Read body: {}", e))
    }
}

fn entry_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<entry>(.*?)</entry>").expect("valid entry regex"))
}

fn author_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<author>\s*<name>(.*?)</name>").expect("valid author regex")
    })
}

/// 取 `<tag>...</tag>` 的文本，折叠空白并还原 XML 实体
fn element_text(entry: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let start = entry.find(&open)?;
    let body_start = start + entry[start..].find('>')? + 1;
    let body_end = body_start + entry[body_start..].find(&close)?;
    Some(clean_text(&entry[body_start..body_end]))
}

fn clean_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn parse_feed(feed: &str) -> Vec<Paper> {
    entry_pattern()
        .captures_iter(feed)
        .filter_map(|cap| {
            let entry = cap.get(1)?.as_str();
            let title = element_text(entry, "title")?;
            Some(Paper {
                published: element_text(entry, "published")
                    .map(|d| d.chars().take(10).collect())
                    .unwrap_or_default(),
                title,
                authors: author_pattern()
                    .captures_iter(entry)
                    .filter_map(|a| a.get(1).map(|m| clean_text(m.as_str())))
                    .collect(),
                summary: element_text(entry, "summary").unwrap_or_default(),
            })
        })
        .collect()
}

fn format_papers(papers: &[Paper]) -> String {
    papers
        .iter()
        .map(|p| {
            format!(
                "Published: {}\nTitle: {}\nAuthors: {}\nSummary: {}",
                p.published,
                p.title,
                p.authors.join(", "),
                p.summary
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl Tool for ArxivTool {
    fn name(&self) -> &str {
        "arxiv_search"
    }

    fn description(&self) -> &str {
        "Search arXiv for academic papers and return the results. Args: {\"query\": \"...\"}"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| "Missing 'query' argument".to_string())?;

        let feed = self.query(query).await?;
        let papers = parse_feed(&feed);
        if papers.is_empty() {
            return Ok("No good arXiv result was found.".to_string());
        }
        Ok(truncate_result(format_papers(&papers), self.max_result_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=all:attention</title>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
      You Need</title>
    <summary>  The dominant sequence transduction models &amp; more.
    </summary>
    <author>
      <name>Ashish Vaswani</name>
    </author>
    <author>
      <name>Noam Shazeer</name>
    </author>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_feed() {
        let papers = parse_feed(FEED);
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "Attention Is All You Need");
        assert_eq!(papers[0].published, "2017-06-12");
        assert_eq!(papers[0].authors, vec!["Ashish Vaswani", "Noam Shazeer"]);
        assert_eq!(papers[0].summary, "The dominant sequence transduction models & more.");
    }

    #[test]
    fn test_feed_title_is_not_a_paper() {
        let feed = r#"<feed><title>ArXiv Query</title></feed>"#;
        assert!(parse_feed(feed).is_empty());
    }

    #[test]
    fn test_format_papers() {
        let text = format_papers(&parse_feed(FEED));
        assert!(text.starts_with("Published: 2017-06-12\nTitle: Attention Is All You Need"));
        assert!(text.contains("Authors: Ashish Vaswani, Noam Shazeer"));
    }

    #[tokio::test]
    async fn test_missing_query_arg() {
        let tool = ArxivTool::new("http://127.0.0.1:9", 1, 1, 100);
        let err = tool.execute(json!({"query": "  "})).await.unwrap_err();
        assert!(err.contains("query"));
    }
}
