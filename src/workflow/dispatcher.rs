//! 评分调度 - 流程层
//!
//! 核心职责：为一份作业的所有学生并发发起评分，并把每个学生的失败隔离在该学生内部。
//!
//! 单个学生的流程：
//! 1. 调用评分服务 → `GradingOutcome`
//! 2. 成功 → 归档；失败 → 记录日志，不重试、不向上传播
//!
//! 整份作业只有在每个学生都有结果之后才完成，任何一个学生失败都不会提前结束。

use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clients::Grader;
use crate::models::{
    Assignment, DispatchReport, GradingFailure, GradingOutcome, StudentDisposition, StudentKey,
    StudentRecord,
};
use crate::services::{ResultArchiver, RESULT_CONTENT_TYPE};
use crate::workflow::grading_ctx::{GradingCtx, RunScope};

/// 评分调度器
///
/// - 不持有任何轮次状态，可以被多轮评分同时使用
/// - 只依赖评分客户端与归档器
pub struct GradingDispatcher {
    grader: Arc<dyn Grader>,
    archiver: ResultArchiver,
}

impl GradingDispatcher {
    pub fn new(grader: Arc<dyn Grader>, archiver: ResultArchiver) -> Self {
        Self { grader, archiver }
    }

    /// 为一份作业的所有学生评分
    ///
    /// 对调用方永不失败：每个学生的错误都被记录在返回的汇总中。
    pub async fn dispatch(&self, assignment: &Assignment, scope: &RunScope) -> DispatchReport {
        let mut report = DispatchReport::new(&assignment.name);

        if assignment.students.is_empty() {
            info!(
                "[轮次#{}] 作业 {} 没有学生，跳过",
                scope.run_id, assignment.name
            );
            return report;
        }

        info!(
            "[轮次#{}] 📦 开始评分作业 {}: {} 名学生",
            scope.run_id,
            assignment.name,
            assignment.students.len()
        );

        let legs = assignment
            .students
            .iter()
            .map(|student| self.run_student(assignment, student, scope));

        for (key, disposition) in join_all(legs).await {
            report.record(key, disposition);
        }

        info!(
            "[轮次#{}] ✓ 作业 {} 完成: 归档 {}, 失败 {}, 跳过 {}",
            scope.run_id,
            assignment.name,
            report.archived_count(),
            report.failed_count(),
            report.skipped
        );

        report
    }

    /// 调用评分服务，结果通过 `GradingOutcome` 返回而不是直接打印
    pub async fn grade(
        &self,
        assignment: &Assignment,
        student: &StudentRecord,
        scope: &RunScope,
    ) -> GradingOutcome {
        // 信号量从不关闭，取不到许可时照常评分
        let _permit = scope.acquire().await;

        let result = self
            .grader
            .grade(&assignment.grader_url, &student.credentials)
            .await
            .map_err(GradingFailure::from);

        GradingOutcome {
            assignment: assignment.name.clone(),
            student: student.email.clone(),
            result,
        }
    }

    async fn run_student(
        &self,
        assignment: &Assignment,
        student: &StudentRecord,
        scope: &RunScope,
    ) -> (StudentKey, StudentDisposition) {
        let key = StudentKey::new(&assignment.name, &student.email);
        let ctx = GradingCtx::new(scope.run_id, &assignment.name, &student.email);

        if scope.is_skipped(&key) {
            warn!("{} ⏭️ 曾经评分失败，按策略跳过", ctx);
            return (key, StudentDisposition::Skipped);
        }

        let outcome = self.grade(assignment, student, scope).await;

        let disposition = match outcome.result {
            Ok(report) => match self
                .archiver
                .archive(&outcome.assignment, &outcome.student, report, RESULT_CONTENT_TYPE)
                .await
            {
                Ok(archived) => {
                    info!("{} ✓ 已归档: {}", ctx, archived.key);
                    StudentDisposition::Archived(archived)
                }
                Err(e) => {
                    error!("{} ❌ 归档失败: {}", ctx, e);
                    StudentDisposition::Failed(e.into())
                }
            },
            Err(failure) => {
                error!("{} ❌ 评分失败: {}", ctx, failure);
                StudentDisposition::Failed(failure)
            }
        };

        (key, disposition)
    }
}
