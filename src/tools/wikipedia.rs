//! Wikipedia 检索工具
//!
//! 先调用 MediaWiki search API 取前 N 个条目，再取各条目纯文本摘要；
//! 结果超过 max_result_chars 时截断并追加 ...[truncated]。

use async_trait::async_trait;
use html2text::from_read;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::{truncate_result, Tool};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
    #[serde(default)]
    snippet: String,
}

/// Wikipedia 工具：args 为 {"query": "..."}
pub struct WikipediaTool {
    client: Client,
    base_url: String,
    results: usize,
    max_result_chars: usize,
}

impl WikipediaTool {
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

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, String> {
        let url = format!("{}/w/api.php", self.base_url);
        let limit = self.results.to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("format", "json"),
                ("srlimit", limit.as_str()),
                ("srsearch", query),
            ])
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| format!("Invalid search response: {}", e))?;
        Ok(body.query.map(|q| q.search).unwrap_or_default())
    }

    async fn extract(&self, title: &str) -> Result<String, String> {
        let url = format!("{}/w/api.php", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("explaintext", "1"),
                ("format", "json"),
                ("titles", title),
            ])
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| format!("Invalid extract response: {}", e))?;
        Ok(parse_extract(&body).unwrap_or_default())
    }
}

/// 从 extracts 响应中取第一页的纯文本
fn parse_extract(body: &Value) -> Option<String> {
    body.get("query")?
        .get("pages")?
        .as_object()?
        .values()
        .find_map(|page| page.get("extract").and_then(Value::as_str))
        .map(str::to_string)
}

/// 去除 search snippet 中的高亮标签
fn snippet_text(snippet: &str) -> String {
    match from_read(snippet.as_bytes(), 200) {
        Ok(text) => text.split_whitespace().collect::<Vec<_>>().join(" "),
        Err(_) => snippet.to_string(),
    }
}

#[async_trait]
impl Tool for WikipediaTool {
    fn name(&self) -> &str {
        "wikipedia_search"
    }

    fn description(&self) -> &str {
        "Search Wikipedia for the query and return the top articles. Args: {\"query\": \"...\"}"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| "Missing 'query' argument".to_string())?;

        let hits = self.search(query).await?;
        if hits.is_empty() {
            return Ok("No results found on Wikipedia for that query.".to_string());
        }

        let mut out = String::from("Top Wikipedia articles related to query:\n");
        for hit in hits {
            let body = match self.extract(&hit.title).await {
                Ok(text) if !text.trim().is_empty() => text,
                Ok(_) | Err(_) => snippet_text(&hit.snippet),
            };
            out.push_str(&format!("## {}\n{}\n\n", hit.title, body));
        }
        Ok(truncate_result(out, self.max_result_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_extract() {
        let body = json!({
            "query": {"pages": {"736": {"title": "Albert Einstein", "extract": "Albert Einstein was a physicist."}}}
        });
        assert_eq!(
            parse_extract(&body).as_deref(),
            Some("Albert Einstein was a physicist.")
        );
        assert!(parse_extract(&json!({"query": {}})).is_none());
    }

    #[test]
    fn test_snippet_strips_markup() {
        let text = snippet_text(r#"The <span class="searchmatch">Eiffel</span> Tower"#);
        assert_eq!(text, "The Eiffel Tower");
    }

    #[tokio::test]
    async fn test_missing_query_arg() {
        let tool = WikipediaTool::new("http://127.0.0.1:9", 1, 1, 100);
        let err = tool.execute(json!({})).await.unwrap_err();
        assert!(err.contains("query"));
    }
}
