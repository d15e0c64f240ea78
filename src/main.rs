//! Hive 命令行入口
//!
//! - `hive ask <question> [--file PATH]`：回答单个问题
//! - `hive batch <questions.json> [--out answers.json]`：批量作答
//! - `hive fetch [DIR]`：从评分服务拉取题目与附件
//! - `hive submit <answers.json>`：提交答案并打印评分报告

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use hive::attachment::prepare_question;
use hive::config::load_config;
use hive::llm::{create_llm_from_config, LlmClient};
use hive::dataset::{load_answers, load_questions, save_json, BatchRunner};
use hive::submission::{Credentials, ScoringClient};
use hive::workflow::{DispatchPolicy, FixedPolicy, KeywordPolicy, Route, RunRequest, RunStatus};
use hive::{build_executor, observability};

#[derive(Parser, Debug)]
#[command(name = "hive", version, about = "Multi-agent question answering")]
struct Cli {
    /// 额外的 TOML 配置文件
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 跳过 Router，强制路线（structured_data / factual_multi_hop / logical_math）
    #[arg(long, global = true)]
    route: Option<Route>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a single question
    Ask {
        question: String,
        /// Attached file (table, code, text)
        #[arg(long)]
        file: Option<PathBuf>,
        /// Print executor events as JSON lines on stderr
        #[arg(long)]
        events: bool,
    },
    /// Answer every question in a JSON file
    Batch {
        questions: PathBuf,
        #[arg(long, default_value = "answers.json")]
        out: PathBuf,
    },
    /// Download questions and attachments from the scoring service
    Fetch { dir: Option<PathBuf> },
    /// Submit answers to the scoring service
    Submit { answers: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.clone()).context("Failed to load configuration")?;
    let policy: Arc<dyn DispatchPolicy> = match cli.route {
        Some(route) => Arc::new(FixedPolicy(route)),
        None => Arc::new(KeywordPolicy),
    };

    let llm = create_llm_from_config(&cfg);

    match cli.command {
        Command::Ask {
            question,
            file,
            events,
        } => {
            let mut executor = build_executor(&cfg, llm.clone(), policy).context("Failed to build executor")?;
            let printer = if events {
                let (tx, mut rx) = mpsc::unbounded_channel();
                executor = executor.with_events(tx);
                Some(tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        if let Ok(line) = serde_json::to_string(&event) {
                            eprintln!("{line}");
                        }
                    }
                }))
            } else {
                None
            };

            let (text, attachment) = prepare_question(&question, file.as_deref())
                .await
                .context("Failed to prepare question")?;
            let mut request = RunRequest::new(text);
            request.attachment = attachment;

            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.cancel();
                }
            });

            let outcome = executor.run_with_cancel(request, cancel).await;
            drop(executor);
            if let Some(printer) = printer {
                let _ = printer.await;
            }

            if outcome.status == RunStatus::ForcedAccepted {
                tracing::warn!("Answer was not confirmed by the verifier");
            }
            log_usage(llm.as_ref());
            let answer = outcome.into_answer().context("Run failed")?;
            println!("{answer}");
        }
        Command::Batch { questions, out } => {
            let questions = load_questions(&questions)
                .await
                .with_context(|| format!("Failed to read {}", questions.display()))?;
            let executor = build_executor(&cfg, llm.clone(), policy).context("Failed to build executor")?;
            let runner = BatchRunner::new(Arc::new(executor), cfg.batch.concurrency);
            let answers = runner.run(&questions).await;
            log_usage(llm.as_ref());
            save_json(&out, &answers)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("Wrote {} answers to {}", answers.len(), out.display());
        }
        Command::Fetch { dir } => {
            let dir = dir.unwrap_or_else(|| cfg.batch.data_dir.clone());
            let client = ScoringClient::new(&cfg.submission)?;
            let questions = client
                .fetch_all(&dir)
                .await
                .context("Failed to fetch questions")?;
            let path = dir.join("questions.json");
            save_json(&path, &questions).await?;
            println!("Saved {} questions to {}", questions.len(), path.display());
        }
        Command::Submit { answers } => {
            let answers = load_answers(&answers)
                .await
                .with_context(|| format!("Failed to read {}", answers.display()))?;
            let credentials = Credentials::from_env()?;
            let client = ScoringClient::new(&cfg.submission)?;
            let report = client
                .submit(&credentials, &answers)
                .await
                .context("Submission failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn log_usage(llm: &dyn LlmClient) {
    let (prompt, completion, total) = llm.token_usage();
    if total > 0 {
        tracing::info!(prompt, completion, total, "Token usage");
    }
}
