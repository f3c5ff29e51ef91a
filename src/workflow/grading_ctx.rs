//! 评分上下文
//!
//! `RunScope` 是一轮评分内所有作业共享的只读上下文；
//! `GradingCtx` 封装"我正在为哪一轮、哪份作业、哪位学生评分"，用于日志关联。

use crate::models::StudentKey;
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// 一轮评分的上下文
///
/// 每轮独立创建，轮次之间不共享任何可变状态。
#[derive(Debug, Clone)]
pub struct RunScope {
    /// 轮次编号（仅用于日志）
    pub run_id: u64,
    /// 本轮开始时的跳过名单快照
    skip: Arc<HashSet<StudentKey>>,
    /// 本轮同时进行的评分请求上限，`None` 表示不限制
    permits: Option<Arc<Semaphore>>,
}

impl RunScope {
    /// 不限并发的轮次上下文，每个学生的评分都立即开始
    pub fn new(run_id: u64, skip: Arc<HashSet<StudentKey>>) -> Self {
        Self {
            run_id,
            skip,
            permits: None,
        }
    }

    /// 为整轮评分设置并发上限（所有作业共用）
    pub fn with_max_concurrent(mut self, max_concurrent: Option<usize>) -> Self {
        self.permits = max_concurrent.map(|n| Arc::new(Semaphore::new(n.max(1))));
        self
    }

    pub fn is_skipped(&self, key: &StudentKey) -> bool {
        self.skip.contains(key)
    }

    /// 取得一个评分许可；不限并发时立即返回 `None`
    pub async fn acquire(&self) -> Option<SemaphorePermit<'_>> {
        match &self.permits {
            Some(permits) => permits.acquire().await.ok(),
            None => None,
        }
    }
}

/// 单个学生的评分上下文
#[derive(Debug, Clone)]
pub struct GradingCtx {
    pub run_id: u64,
    pub assignment: String,
    pub student: String,
}

impl GradingCtx {
    pub fn new(run_id: u64, assignment: impl Into<String>, student: impl Into<String>) -> Self {
        Self {
            run_id,
            assignment: assignment.into(),
            student: student.into(),
        }
    }
}

impl Display for GradingCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[轮次#{} 作业#{} 学生#{}]",
            self.run_id, self.assignment, self.student
        )
    }
}
