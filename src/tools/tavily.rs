//! Tavily 网页检索工具
//!
//! POST {base_url}/search，Bearer 认证；API Key 来自环境变量 TAVILY_API_KEY，
//! 未设置时不注册该工具。

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::{truncate_result, Tool};

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// Tavily 工具：args 为 {"query": "..."}
pub struct TavilySearchTool {
    client: Client,
    base_url: String,
    api_key: String,
    results: usize,
    max_result_chars: usize,
}

impl TavilySearchTool {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        results: usize,
        timeout_secs: u64,
        max_result_chars: usize,
    ) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            results: results.max(1),
            max_result_chars,
        }
    }

    /// 从环境变量读取 Key；未设置或为空时返回 None
    pub fn api_key_from_env() -> Option<String> {
        std::env::var("TAVILY_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

fn format_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| format!("## {}\n{}\n{}", r.title, r.url, r.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl Tool for TavilySearchTool {
    fn name(&self) -> &str {
        "tavily_search"
    }

    fn description(&self) -> &str {
        "Search the web using Tavily and return the results. Args: {\"query\": \"...\"}"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| "Missing 'query' argument".to_string())?;

        let url = format!("{}/search", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&SearchRequest {
                query,
                max_results: self.results,
                search_depth: "basic",
            })
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
        if body.results.is_empty() {
            return Ok("No web results found for that query.".to_string());
        }
        Ok(truncate_result(format_results(&body.results), self.max_result_chars))
    }
}
