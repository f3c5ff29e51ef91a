//! 评分结果
//!
//! 每个学生的评分结果通过 `GradingOutcome` 显式传递，调度器据此决定"归档"还是"跳过"。

use crate::error::{GradingError, StorageError};
use crate::models::assignment::StudentKey;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// 失败类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// 评分调用失败（网络、超时、非 2xx、响应体不可读）
    GradingCallFailed,
    /// 归档写入失败
    StorageUnavailable,
}

/// 单个学生的失败原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradingFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl fmt::Display for GradingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.detail)
    }
}

impl From<GradingError> for GradingFailure {
    fn from(err: GradingError) -> Self {
        Self {
            kind: FailureKind::GradingCallFailed,
            detail: err.to_string(),
        }
    }
}

impl From<StorageError> for GradingFailure {
    fn from(err: StorageError) -> Self {
        Self {
            kind: FailureKind::StorageUnavailable,
            detail: err.to_string(),
        }
    }
}

/// 一次评分调用的结果：报告正文或失败原因，二者必居其一
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradingOutcome {
    pub assignment: String,
    pub student: String,
    pub result: Result<String, GradingFailure>,
}

impl GradingOutcome {
    pub fn key(&self) -> StudentKey {
        StudentKey::new(&self.assignment, &self.student)
    }
}

/// 已归档的评分报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivedResult {
    /// `{作业}/{学生}/{yyyy}/{MM}/{dd}/{HH}/{mm}/TestResult.xml`
    pub key: String,
    #[serde(skip)]
    pub body: String,
    pub content_type: String,
}

/// 单个学生在本轮中的最终去向
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentDisposition {
    Archived(ArchivedResult),
    Failed(GradingFailure),
    /// 按失败策略跳过，未发起请求
    Skipped,
}

/// 单个作业的调度汇总
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub assignment: String,
    pub attempted: usize,
    pub archived: Vec<String>,
    pub failures: Vec<(StudentKey, GradingFailure)>,
    pub skipped: usize,
}

impl DispatchReport {
    pub fn new(assignment: impl Into<String>) -> Self {
        Self {
            assignment: assignment.into(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, key: StudentKey, disposition: StudentDisposition) {
        match disposition {
            StudentDisposition::Archived(archived) => {
                self.attempted += 1;
                self.archived.push(archived.key);
            }
            StudentDisposition::Failed(failure) => {
                self.attempted += 1;
                self.failures.push((key, failure));
            }
            StudentDisposition::Skipped => self.skipped += 1,
        }
    }

    pub fn archived_count(&self) -> usize {
        self.archived.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }
}

/// 评分失败后下一轮如何处理该学生
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FailurePolicy {
    /// 每一轮都重新评分所有学生
    #[default]
    RegradeNextRun,
    /// 失败过的学生在后续轮次中不再评分
    SkipPermanently,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regrade" | "regrade_next_run" => Ok(FailurePolicy::RegradeNextRun),
            "skip" | "skip_permanently" => Ok(FailurePolicy::SkipPermanently),
            other => Err(format!("未知的失败策略: {}", other)),
        }
    }
}
