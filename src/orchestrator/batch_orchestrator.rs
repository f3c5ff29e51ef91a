//! 单轮评分编排 - 编排层
//!
//! ## 状态机
//!
//! `Idle → LoadingCatalog → Dispatching → Completed`
//!
//! - 目录加载失败是唯一会中止本轮的情况，此时不会发起任何评分
//! - `Dispatching` 为每份作业启动一个任务，全部结束后才进入 `Completed`
//! - 没有整轮的 `Failed` 状态：单个学生、单份作业的失败都只记录在汇总里
//!
//! ## 重入
//!
//! 上一轮还在评分时可以开始新的一轮。各轮之间不共享状态、不相互协调、不相互取消。

use crate::error::AppResult;
use crate::models::{DispatchReport, StudentKey};
use crate::services::CatalogLoader;
use crate::utils::logging;
use crate::workflow::{GradingDispatcher, RunScope};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// 一轮评分所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    LoadingCatalog,
    Dispatching,
    Completed,
}

/// 一轮评分的汇总
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: u64,
    pub assignments_discovered: usize,
    pub dispatches: Vec<DispatchReport>,
    /// 异常退出的作业任务数
    pub aborted_dispatches: usize,
}

impl BatchReport {
    fn new(run_id: u64, assignments_discovered: usize) -> Self {
        Self {
            run_id,
            assignments_discovered,
            dispatches: Vec::with_capacity(assignments_discovered),
            aborted_dispatches: 0,
        }
    }

    pub fn archived_count(&self) -> usize {
        self.dispatches.iter().map(|d| d.archived_count()).sum()
    }

    pub fn failed_count(&self) -> usize {
        self.dispatches.iter().map(|d| d.failed_count()).sum()
    }

    pub fn skipped_count(&self) -> usize {
        self.dispatches.iter().map(|d| d.skipped).sum()
    }

    /// 本轮所有失败的 (作业, 学生)
    pub fn failed_keys(&self) -> impl Iterator<Item = &StudentKey> {
        self.dispatches
            .iter()
            .flat_map(|d| d.failures.iter().map(|(key, _)| key))
    }

    pub fn dispatch(&self, assignment: &str) -> Option<&DispatchReport> {
        self.dispatches.iter().find(|d| d.assignment == assignment)
    }
}

/// 单轮评分编排器
pub struct BatchOrchestrator {
    loader: CatalogLoader,
    dispatcher: Arc<GradingDispatcher>,
    max_concurrent_gradings: Option<usize>,
    next_run_id: AtomicU64,
}

impl BatchOrchestrator {
    pub fn new(
        loader: CatalogLoader,
        dispatcher: GradingDispatcher,
        max_concurrent_gradings: Option<usize>,
    ) -> Self {
        Self {
            loader,
            dispatcher: Arc::new(dispatcher),
            max_concurrent_gradings,
            next_run_id: AtomicU64::new(1),
        }
    }

    /// 运行一轮评分，评分所有学生
    pub async fn run_batch(&self) -> AppResult<BatchReport> {
        self.run_batch_skipping(Arc::new(HashSet::new())).await
    }

    /// 运行一轮评分，跳过名单中的学生
    pub async fn run_batch_skipping(
        &self,
        skip: Arc<HashSet<StudentKey>>,
    ) -> AppResult<BatchReport> {
        self.run_batch_as(self.allocate_run_id(), skip).await
    }

    /// 用调用方预先分配的轮次编号运行一轮
    pub(crate) async fn run_batch_as(
        &self,
        run_id: u64,
        skip: Arc<HashSet<StudentKey>>,
    ) -> AppResult<BatchReport> {
        let (state, _) = watch::channel(RunState::Idle);
        self.execute(run_id, skip, state).await
    }

    /// 在后台启动一轮评分，立即返回句柄
    pub fn spawn_run(self: &Arc<Self>, skip: Arc<HashSet<StudentKey>>) -> RunHandle {
        let run_id = self.allocate_run_id();
        let (state_tx, state_rx) = watch::channel(RunState::Idle);
        let orchestrator = Arc::clone(self);
        let handle = tokio::spawn(async move { orchestrator.execute(run_id, skip, state_tx).await });

        RunHandle {
            run_id,
            state: state_rx,
            handle,
        }
    }

    pub(crate) fn allocate_run_id(&self) -> u64 {
        self.next_run_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn execute(
        &self,
        run_id: u64,
        skip: Arc<HashSet<StudentKey>>,
        state: watch::Sender<RunState>,
    ) -> AppResult<BatchReport> {
        transition(&state, run_id, RunState::LoadingCatalog);

        let assignments = match self.loader.load_catalog().await {
            Ok(assignments) => assignments,
            Err(e) => {
                error!("[轮次#{}] ❌ 目录加载失败，本轮中止: {}", run_id, e);
                return Err(e.into());
            }
        };
        logging::log_assignments_discovered(run_id, assignments.len());

        transition(&state, run_id, RunState::Dispatching);

        let scope = RunScope::new(run_id, skip).with_max_concurrent(self.max_concurrent_gradings);
        let mut report = BatchReport::new(run_id, assignments.len());
        let mut handles = Vec::with_capacity(assignments.len());

        for assignment in assignments {
            let dispatcher = Arc::clone(&self.dispatcher);
            let scope = scope.clone();
            let name = assignment.name.clone();
            let handle =
                tokio::spawn(async move { dispatcher.dispatch(&assignment, &scope).await });
            handles.push((name, handle));
        }

        // 等待所有作业，不因单个失败提前结束
        for (name, handle) in handles {
            match handle.await {
                Ok(dispatch) => report.dispatches.push(dispatch),
                Err(e) => {
                    error!("[轮次#{}] 作业 {} 任务执行失败: {}", run_id, name, e);
                    report.aborted_dispatches += 1;
                }
            }
        }

        transition(&state, run_id, RunState::Completed);
        logging::log_run_complete(&report);

        Ok(report)
    }
}

fn transition(state: &watch::Sender<RunState>, run_id: u64, next: RunState) {
    let previous = state.send_replace(next);
    debug!("[轮次#{}] {:?} → {:?}", run_id, previous, next);
}

/// 后台评分轮次的句柄
pub struct RunHandle {
    pub run_id: u64,
    state: watch::Receiver<RunState>,
    handle: JoinHandle<AppResult<BatchReport>>,
}

impl RunHandle {
    /// 当前阶段
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// 等待进入指定阶段；本轮提前结束时返回 `false`
    pub async fn wait_for(&mut self, target: RunState) -> bool {
        loop {
            if *self.state.borrow_and_update() == target {
                return true;
            }
            if self.state.changed().await.is_err() {
                return *self.state.borrow() == target;
            }
        }
    }

    /// 等待本轮结束
    pub async fn join(self) -> AppResult<BatchReport> {
        self.handle.await?
    }
}
