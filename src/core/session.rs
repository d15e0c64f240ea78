//! 会话存储：按 session_id 保留历史，并保证同一会话同一时刻至多一个活跃执行器
//!
//! acquire 使用 try_lock：会话被占用时立即返回 SessionBusy，而不是排队等待。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::core::{GraphState, HistoryEntry, PipelineError};

/// 单个会话保留的数据
#[derive(Debug, Default)]
pub struct SessionSlot {
    history: Vec<HistoryEntry>,
    runs: usize,
}

/// 会话租约：持有期间该会话不可被其他运行获取
#[derive(Debug)]
pub struct SessionLease {
    id: String,
    slot: OwnedMutexGuard<SessionSlot>,
}

impl SessionLease {
    /// 之前各轮累积的历史
    pub fn history(&self) -> &[HistoryEntry] {
        &self.slot.history
    }

    pub fn runs(&self) -> usize {
        self.slot.runs
    }

    /// 运行结束后写回终态历史
    pub fn commit(&mut self, state: &GraphState) {
        self.slot.history = state.history().to_vec();
        self.slot.runs += 1;
        tracing::debug!(session = %self.id, runs = self.slot.runs, entries = self.slot.history.len(), "Session committed");
    }
}

/// 内存会话存储
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionSlot>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取会话租约；已有活跃执行器时返回 SessionBusy
    pub async fn acquire(&self, session_id: &str) -> Result<SessionLease, PipelineError> {
        let slot = {
            let mut sessions = self.sessions.write().await;
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(SessionSlot::default())))
                .clone()
        };
        let guard = slot
            .try_lock_owned()
            .map_err(|_| PipelineError::SessionBusy(session_id.to_string()))?;
        Ok(SessionLease {
            id: session_id.to_string(),
            slot: guard,
        })
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Speaker;

    #[tokio::test]
    async fn test_second_acquire_is_busy() {
        let store = SessionStore::new();
        let _lease = store.acquire("s1").await.unwrap();
        let err = store.acquire("s1").await.unwrap_err();
        assert_eq!(err, PipelineError::SessionBusy("s1".to_string()));
    }

    #[tokio::test]
    async fn test_release_allows_reacquire() {
        let store = SessionStore::new();
        {
            let _lease = store.acquire("s1").await.unwrap();
        }
        assert!(store.acquire("s1").await.is_ok());
    }

    #[tokio::test]
    async fn test_independent_sessions() {
        let store = SessionStore::new();
        let _a = store.acquire("a").await.unwrap();
        assert!(store.acquire("b").await.is_ok());
        assert_eq!(store.session_count().await, 2);
    }

    #[tokio::test]
    async fn test_commit_retains_history() {
        let store = SessionStore::new();
        let mut state = GraphState::create("q", None).unwrap();
        state.append_history(Speaker::Human, "q").unwrap();
        {
            let mut lease = store.acquire("s").await.unwrap();
            lease.commit(&state);
        }
        let lease = store.acquire("s").await.unwrap();
        assert_eq!(lease.history().len(), 1);
        assert_eq!(lease.runs(), 1);
    }
}
