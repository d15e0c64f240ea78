//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__GRAPH__MAX_ITERATIONS=2`）。
//! 进程启动时加载一次，运行中不再重读。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub graph: GraphSection,
    pub tools: ToolsSection,
    pub batch: BatchSection,
    pub submission: SubmissionSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// openai / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            request_timeout_secs: 60,
        }
    }
}

/// [graph] 段：执行器参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphSection {
    /// Verifier -> Generator 修订轮数上限
    pub max_iterations: u32,
    pub node_timeout_secs: u64,
    pub run_timeout_secs: u64,
    /// 工具类失败的重试次数
    pub tool_retries: u32,
    /// true 时重试耗尽即终止运行，false 时记录缺口继续
    pub strict_tools: bool,
}

impl Default for GraphSection {
    fn default() -> Self {
        Self {
            max_iterations: 1,
            node_timeout_secs: 120,
            run_timeout_secs: 600,
            tool_retries: 1,
            strict_tools: false,
        }
    }
}

/// [tools] 段：Researcher 使用的检索工具
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    pub tool_timeout_secs: u64,
    pub wikipedia_base_url: String,
    /// 单次检索取回的条目数
    pub wikipedia_results: usize,
    pub arxiv_base_url: String,
    pub arxiv_results: usize,
    /// Key 从环境变量 TAVILY_API_KEY 读取
    pub tavily_base_url: String,
    pub tavily_results: usize,
    pub max_result_chars: usize,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            wikipedia_base_url: "https://en.wikipedia.org".to_string(),
            wikipedia_results: 3,
            arxiv_base_url: "https://export.arxiv.org".to_string(),
            arxiv_results: 3,
            tavily_base_url: "https://api.tavily.com".to_string(),
            tavily_results: 5,
            max_result_chars: 8000,
        }
    }
}

/// [batch] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    /// 同时运行的问题数
    pub concurrency: usize,
    /// 附件下载目录
    pub data_dir: PathBuf,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            concurrency: 4,
            data_dir: PathBuf::from("data"),
        }
    }
}

/// [submission] 段：评分服务
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubmissionSection {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for SubmissionSection {
    fn default() -> Self {
        Self {
            base_url: "https://agents-course-unit4-scoring.hf.space".to_string(),
            timeout_secs: 60,
        }
    }
}

impl GraphSection {
    pub fn node_timeout(&self) -> Duration {
        Duration::from_secs(self.node_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        if std::path::Path::new(&format!("{}.toml", name)).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
