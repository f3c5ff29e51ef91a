//! 触发层
//!
//! 定时器每隔固定间隔触发一轮评分，手动触发也开始一轮评分，二者走同一个入口。
//! 已经开始的轮次不会被新的触发取消或合并。

use crate::error::AppResult;
use crate::models::{FailurePolicy, StudentKey};
use crate::orchestrator::batch_orchestrator::{BatchOrchestrator, BatchReport};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

/// 定时器晚于计划时刻多久算"迟到"
const LATE_TICK_THRESHOLD: Duration = Duration::from_secs(5);

/// 触发来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Timer,
    Manual,
}

/// 手动触发句柄，可以克隆后交给任意调用方
#[derive(Debug, Clone)]
pub struct ManualTrigger {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualTrigger {
    /// 请求开始一轮新的评分；调度器已经停止时返回 `false`
    pub fn fire(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

/// 失败记录
///
/// `SkipPermanently` 策略下累积所有已结束轮次中失败的学生，
/// 新一轮开始时取一份不可变快照。
#[derive(Debug, Clone)]
pub struct FailureLedger {
    policy: FailurePolicy,
    failed: HashSet<StudentKey>,
}

impl FailureLedger {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            policy,
            failed: HashSet::new(),
        }
    }

    pub fn absorb(&mut self, report: &BatchReport) {
        if self.policy == FailurePolicy::SkipPermanently {
            self.failed.extend(report.failed_keys().cloned());
        }
    }

    pub fn snapshot(&self) -> Arc<HashSet<StudentKey>> {
        Arc::new(self.failed.clone())
    }

    pub fn len(&self) -> usize {
        self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 调度器退出时的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerSummary {
    pub runs_started: usize,
    /// 按触发顺序分配的轮次编号
    pub started_run_ids: Vec<u64>,
    /// 正常结束的轮次编号，按结束顺序
    pub completed_run_ids: Vec<u64>,
    pub runs_completed: usize,
    pub runs_failed: usize,
    pub skipped_students: usize,
}

/// 评分调度器
pub struct Scheduler {
    orchestrator: Arc<BatchOrchestrator>,
    interval: Duration,
    ledger: FailureLedger,
    manual_tx: mpsc::UnboundedSender<()>,
    manual_rx: mpsc::UnboundedReceiver<()>,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<BatchOrchestrator>, interval: Duration, policy: FailurePolicy) -> Self {
        let (manual_tx, manual_rx) = mpsc::unbounded_channel();
        Self {
            orchestrator,
            interval,
            ledger: FailureLedger::new(policy),
            manual_tx,
            manual_rx,
        }
    }

    pub fn manual_trigger(&self) -> ManualTrigger {
        ManualTrigger {
            tx: self.manual_tx.clone(),
        }
    }

    /// 运行调度循环直到 `shutdown` 完成
    ///
    /// 第一次定时触发立即发生。停止后不再开始新的轮次，但会等待进行中的轮次结束。
    pub async fn run<F>(mut self, shutdown: F) -> SchedulerSummary
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut runs: JoinSet<AppResult<BatchReport>> = JoinSet::new();
        let mut summary = SchedulerSummary::default();
        tokio::pin!(shutdown);

        info!("⏰ 调度器启动，评分间隔 {:?}", self.interval);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("🛑 收到停止信号，不再开始新的评分");
                    break;
                }
                scheduled = ticker.tick() => {
                    if let Some(lateness) = late_by(scheduled, Instant::now()) {
                        warn!("⚠️ 定时器迟到了 {:?}", lateness);
                    }
                    self.start_run(&mut runs, &mut summary, Trigger::Timer);
                }
                Some(()) = self.manual_rx.recv() => {
                    self.start_run(&mut runs, &mut summary, Trigger::Manual);
                }
                Some(joined) = runs.join_next(), if !runs.is_empty() => {
                    self.absorb(joined, &mut summary);
                }
            }
        }

        if !runs.is_empty() {
            info!("⏳ 等待 {} 轮进行中的评分结束...", runs.len());
        }
        while let Some(joined) = runs.join_next().await {
            self.absorb(joined, &mut summary);
        }

        summary.skipped_students = self.ledger.len();
        info!(
            "✓ 调度器退出: 开始 {} 轮, 完成 {} 轮, 失败 {} 轮",
            summary.runs_started, summary.runs_completed, summary.runs_failed
        );
        summary
    }

    fn start_run(
        &self,
        runs: &mut JoinSet<AppResult<BatchReport>>,
        summary: &mut SchedulerSummary,
        trigger: Trigger,
    ) {
        let orchestrator = Arc::clone(&self.orchestrator);
        let skip = self.ledger.snapshot();
        let run_id = orchestrator.allocate_run_id();
        runs.spawn(async move { orchestrator.run_batch_as(run_id, skip).await });

        summary.runs_started += 1;
        summary.started_run_ids.push(run_id);
        info!(
            "[轮次#{}] ▶️ {:?} 触发，开始新一轮评分 (进行中 {} 轮)",
            run_id,
            trigger,
            runs.len()
        );
    }

    fn absorb(
        &mut self,
        joined: Result<AppResult<BatchReport>, JoinError>,
        summary: &mut SchedulerSummary,
    ) {
        match joined {
            Ok(Ok(report)) => {
                self.ledger.absorb(&report);
                summary.runs_completed += 1;
                summary.completed_run_ids.push(report.run_id);
            }
            Ok(Err(e)) => {
                error!("❌ 本轮评分失败: {}", e);
                summary.runs_failed += 1;
            }
            Err(e) => {
                error!("❌ 评分任务执行失败: {}", e);
                summary.runs_failed += 1;
            }
        }
    }
}

/// 定时触发晚于计划时刻超过阈值时返回迟到的时长
fn late_by(scheduled: Instant, now: Instant) -> Option<Duration> {
    let lateness = now.saturating_duration_since(scheduled);
    (lateness > LATE_TICK_THRESHOLD).then_some(lateness)
}
