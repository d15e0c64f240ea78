//! 图执行器
//!
//! 状态机：ROUTING → EXECUTING(node)* → VERIFYING → {ACCEPTED | REVISING → EXECUTING(generator) → VERIFYING} → TERMINATED。
//!
//! - Agent 严格串行执行，GraphState 在运行期间只归执行器所有
//! - Verifier → Generator 是唯一的环，由 max_iterations 约束
//! - 验证结束后（通过或强制接受）再跑一次 Generator 产出最终答案
//! - 单节点超时、整次运行超时、取消都以 TERMINATED(failed) 结束，不会挂起

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agents::{AgentOutput, AgentSet};
use crate::attachment::Attachment;
use crate::config::GraphSection;
use crate::core::{
    GraphState, PipelineError, RecoveryAction, RecoveryEngine, SessionStore, Speaker, StateUpdate,
};
use crate::workflow::{
    AgentGraph, AgentName, DispatchPolicy, ExecutorPhase, GraphEvent, Route, RunOutcome,
    RunStatus, WorkflowError,
};

/// 执行器配置，构造后不可变
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Verifier → Generator 修订轮数上限
    pub max_iterations: u32,
    pub node_timeout: Duration,
    pub run_timeout: Duration,
    /// 瞬时工具失败的重试次数
    pub tool_retries: u32,
    /// true：重试耗尽即失败；false：记录缺口后继续
    pub strict_tools: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self::from(&GraphSection::default())
    }
}

impl From<&GraphSection> for GraphConfig {
    fn from(section: &GraphSection) -> Self {
        Self {
            max_iterations: section.max_iterations,
            node_timeout: section.node_timeout(),
            run_timeout: section.run_timeout(),
            tool_retries: section.tool_retries,
            strict_tools: section.strict_tools,
        }
    }
}

/// 一次运行的输入
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub question: String,
    pub attachment: Option<Attachment>,
    /// 提供时沿用该会话历史，并保证同一会话同时只有一个执行器
    pub session_id: Option<String>,
}

impl RunRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            attachment: None,
            session_id: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// 图执行器
pub struct GraphExecutor {
    agents: AgentSet,
    policy: Arc<dyn DispatchPolicy>,
    config: GraphConfig,
    recovery: RecoveryEngine,
    sessions: Option<Arc<SessionStore>>,
    events: Option<mpsc::UnboundedSender<GraphEvent>>,
}

impl GraphExecutor {
    /// 校验 Agent 装配与图结构后创建执行器
    pub fn new(
        agents: AgentSet,
        policy: Arc<dyn DispatchPolicy>,
        config: GraphConfig,
    ) -> Result<Self, WorkflowError> {
        agents.validate()?;
        let graph = AgentGraph::standard();
        graph.validate()?;
        for route in Route::ALL {
            graph.check_path(route)?;
        }
        let reachable = graph.reachable_agents();
        if let Some(orphan) = AgentName::ALL.into_iter().find(|a| !reachable.contains(a)) {
            return Err(WorkflowError::InvalidConfiguration(format!(
                "{} is unreachable from start",
                orphan
            )));
        }

        let recovery = RecoveryEngine::new(config.tool_retries, config.strict_tools);
        Ok(Self {
            agents,
            policy,
            config,
            recovery,
            sessions: None,
            events: None,
        })
    }

    pub fn with_sessions(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn with_events(mut self, tx: mpsc::UnboundedSender<GraphEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub async fn run(&self, request: RunRequest) -> RunOutcome {
        self.run_with_cancel(request, CancellationToken::new()).await
    }

    /// 执行一次问答；所有失败都体现在 RunOutcome.status 中
    pub async fn run_with_cancel(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> RunOutcome {
        let run_id = Uuid::new_v4().to_string();
        let mut trace = Vec::new();

        let mut lease = match (&self.sessions, &request.session_id) {
            (Some(store), Some(id)) => match store.acquire(id).await {
                Ok(lease) => Some(lease),
                Err(e) => return self.terminate(run_id, RunStatus::Failed(e), None, trace),
            },
            _ => None,
        };

        if cancel.is_cancelled() {
            return self.terminate(run_id, RunStatus::Failed(PipelineError::Cancelled), None, trace);
        }

        self.transition(&run_id, ExecutorPhase::Routing);
        trace.push(AgentName::Router);
        let route = match self
            .policy
            .classify(&request.question, request.attachment.as_ref())
        {
            Ok(route) => route,
            Err(e) => return self.terminate(run_id, RunStatus::Failed(e), None, trace),
        };
        info!(run_id = %run_id, route = %route, "Question routed");
        self.emit(GraphEvent::Routed {
            run_id: run_id.clone(),
            route,
        });

        let prior = lease.as_ref().map(|l| l.history().to_vec()).unwrap_or_default();
        let mut state = match self.seed_state(&request, route, prior) {
            Ok(state) => state,
            Err(e) => return self.terminate(run_id, RunStatus::Failed(e), None, trace),
        };

        let status = {
            let drive = self.drive(&run_id, route, &mut state, &mut trace);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(PipelineError::Cancelled),
                res = tokio::time::timeout(self.config.run_timeout, drive) => match res {
                    Ok(res) => res,
                    Err(_) => Err(PipelineError::Timeout(format!(
                        "run exceeded {}s",
                        self.config.run_timeout.as_secs_f64()
                    ))),
                },
            }
        };
        let status = status.unwrap_or_else(RunStatus::Failed);

        if let Some(lease) = lease.as_mut() {
            lease.commit(&state);
        }
        let answer = match status {
            RunStatus::Failed(_) => None,
            _ => state.draft_answer.clone(),
        };
        self.terminate_with_state(run_id, status, answer, state, trace)
    }

    /// 建立本次运行的初始状态：会话前缀、人类提问、Router 记录
    fn seed_state(
        &self,
        request: &RunRequest,
        route: Route,
        prior: Vec<crate::core::HistoryEntry>,
    ) -> Result<GraphState, PipelineError> {
        let mut state = GraphState::resume(&request.question, request.attachment.clone(), prior)?;
        state.append_history(Speaker::Human, request.question.clone())?;
        state.set_route(route)?;
        let first = route
            .substantive_agents()
            .first()
            .copied()
            .ok_or_else(|| PipelineError::Routing(format!("route {} has no agents", route)))?;
        state.append_history(
            Speaker::Agent(AgentName::Router),
            format!("Route to {} agent with input {}", first, request.question),
        )?;
        Ok(state)
    }

    /// 路由之后的全部节点
    async fn drive(
        &self,
        run_id: &str,
        route: Route,
        state: &mut GraphState,
        trace: &mut Vec<AgentName>,
    ) -> Result<RunStatus, PipelineError> {
        for &agent in route.substantive_agents() {
            self.step(run_id, agent, state, trace).await?;
        }

        self.step(run_id, AgentName::Generator, state, trace).await?;

        let status = loop {
            self.transition(run_id, ExecutorPhase::Verifying);
            self.step(run_id, AgentName::Verifier, state, trace).await?;
            let verdict = state.verification.clone().ok_or_else(|| {
                PipelineError::Verification("verifier produced no verdict".to_string())
            })?;

            if verdict.passed {
                self.transition(run_id, ExecutorPhase::Accepted);
                break RunStatus::Accepted;
            }
            if state.iteration_count >= self.config.max_iterations {
                warn!(
                    run_id = %run_id,
                    iterations = state.iteration_count,
                    "Verification still failing after max iterations, accepting best draft"
                );
                self.transition(run_id, ExecutorPhase::Accepted);
                break RunStatus::ForcedAccepted;
            }

            state.iteration_count += 1;
            info!(run_id = %run_id, iteration = state.iteration_count, "Revising draft");
            self.transition(run_id, ExecutorPhase::Revising);
            self.emit(GraphEvent::Revising {
                run_id: run_id.to_string(),
                iteration: state.iteration_count,
                feedback: verdict.feedback.clone(),
            });
            self.step(run_id, AgentName::Generator, state, trace).await?;
        };

        // 最终答案：基于已验证草稿与反馈再生成一次
        self.step(run_id, AgentName::Generator, state, trace).await?;
        Ok(status)
    }

    /// 调用单个节点：超时、重试 / 降级，校验输出种类并写回状态
    async fn step(
        &self,
        run_id: &str,
        name: AgentName,
        state: &mut GraphState,
        trace: &mut Vec<AgentName>,
    ) -> Result<(), PipelineError> {
        let agent = self
            .agents
            .get(name)
            .map_err(|e| PipelineError::InvalidState(e.to_string()))?
            .clone();
        if name != AgentName::Verifier {
            self.transition(run_id, ExecutorPhase::Executing(name));
        }

        let mut attempt = 0;
        loop {
            trace.push(name);
            self.emit(GraphEvent::NodeStarted {
                run_id: run_id.to_string(),
                agent: name,
                attempt,
            });
            info!(run_id = %run_id, agent = %name, attempt, "Invoking agent");

            let started = Instant::now();
            let result = tokio::time::timeout(self.config.node_timeout, agent.invoke(&*state))
                .await
                .map_err(|_| {
                    PipelineError::Timeout(format!(
                        "{} exceeded {}s",
                        name,
                        self.config.node_timeout.as_secs_f64()
                    ))
                })?;

            let err = match result {
                Ok(output) => {
                    self.emit(GraphEvent::NodeFinished {
                        run_id: run_id.to_string(),
                        agent: name,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    });
                    return apply_output(state, name, output);
                }
                Err(err) => err,
            };

            match self.recovery.handle(name, &err, attempt) {
                RecoveryAction::Retry => {
                    attempt += 1;
                    warn!(run_id = %run_id, agent = %name, attempt, error = %err, "Retrying agent after tool failure");
                    state.append_history(
                        Speaker::System,
                        format!("retrying {} after tool failure: {}", name, err),
                    )?;
                    self.emit(GraphEvent::Retry {
                        run_id: run_id.to_string(),
                        agent: name,
                        attempt,
                        reason: err.to_string(),
                    });
                }
                RecoveryAction::Annotate(note) => {
                    warn!(run_id = %run_id, agent = %name, error = %err, "Continuing without agent output");
                    state.append_history(Speaker::System, note)?;
                    self.emit(GraphEvent::Gap {
                        run_id: run_id.to_string(),
                        agent: name,
                        reason: err.to_string(),
                    });
                    return Ok(());
                }
                RecoveryAction::Abort(fatal) => return Err(fatal),
            }
        }
    }

    fn transition(&self, run_id: &str, phase: ExecutorPhase) {
        tracing::debug!(run_id = %run_id, ?phase, "Phase transition");
        self.emit(GraphEvent::Phase {
            run_id: run_id.to_string(),
            phase,
        });
    }

    fn emit(&self, event: GraphEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn terminate(
        &self,
        run_id: String,
        status: RunStatus,
        answer: Option<String>,
        trace: Vec<AgentName>,
    ) -> RunOutcome {
        self.finish(RunOutcome {
            run_id,
            status,
            answer,
            state: None,
            trace,
        })
    }

    fn terminate_with_state(
        &self,
        run_id: String,
        status: RunStatus,
        answer: Option<String>,
        state: GraphState,
        trace: Vec<AgentName>,
    ) -> RunOutcome {
        self.finish(RunOutcome {
            run_id,
            status,
            answer,
            state: Some(state),
            trace,
        })
    }

    fn finish(&self, outcome: RunOutcome) -> RunOutcome {
        let status = match &outcome.status {
            RunStatus::Accepted => "accepted".to_string(),
            RunStatus::ForcedAccepted => "forced_accepted".to_string(),
            RunStatus::Failed(e) => {
                error!(run_id = %outcome.run_id, kind = e.kind(), error = %e, "Run failed");
                format!("failed: {}", e.kind())
            }
        };
        info!(
            run_id = %outcome.run_id,
            status = %status,
            invocations = outcome.trace.len(),
            iterations = outcome.iteration_count(),
            "Run terminated"
        );
        self.transition(&outcome.run_id, ExecutorPhase::Terminated);
        self.emit(GraphEvent::Terminated {
            run_id: outcome.run_id.clone(),
            status,
            answer: outcome.answer.clone(),
        });
        outcome
    }
}

/// 校验输出种类与角色匹配，并转成 StateUpdate 写回
fn apply_output(
    state: &mut GraphState,
    name: AgentName,
    output: AgentOutput,
) -> Result<(), PipelineError> {
    let speaker = Speaker::Agent(name);
    let update = match (name, output) {
        (AgentName::Generator, AgentOutput::Draft(draft)) => {
            if draft.trim().is_empty() {
                return Err(PipelineError::Generation("generator returned an empty draft".to_string()));
            }
            StateUpdate::note(speaker, draft.clone()).with_draft(draft)
        }
        (AgentName::Generator, _) => {
            return Err(PipelineError::Generation("generator did not return a draft".to_string()))
        }
        (AgentName::Verifier, AgentOutput::Verdict(verdict)) => {
            let head = if verdict.passed { "PASS" } else { "FAIL" };
            let message = if verdict.feedback.trim().is_empty() {
                head.to_string()
            } else {
                format!("{}: {}", head, verdict.feedback)
            };
            StateUpdate::note(speaker, message).with_verification(verdict)
        }
        (AgentName::Verifier, _) => {
            return Err(PipelineError::Verification("verifier did not return a verdict".to_string()))
        }
        (_, AgentOutput::Note(note)) => {
            if note.trim().is_empty() {
                return Err(PipelineError::InvalidState(format!("{} returned an empty note", name)));
            }
            StateUpdate::note(speaker, note)
        }
        (other, _) => {
            return Err(PipelineError::InvalidState(format!(
                "{} returned an output it does not own",
                other
            )))
        }
    };
    state.apply(update)
}
