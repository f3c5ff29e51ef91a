//! 评分结果归档 - 业务能力层
//!
//! 路径键按归档时刻分区到分钟：
//! `{作业}/{学生}/{yyyy}/{MM}/{dd}/{HH}/{mm}/TestResult.xml`
//!
//! 不同分钟的归档互不覆盖；同一分钟内的第二次归档覆盖第一次。

use crate::error::StorageError;
use crate::infrastructure::ArtifactStore;
use crate::models::ArchivedResult;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

pub const RESULT_FILE_NAME: &str = "TestResult.xml";
pub const RESULT_CONTENT_TYPE: &str = "application/xml";

/// 归档时刻的来源
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// 计算归档路径键
pub fn archive_key(assignment: &str, student: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}/{}/{}{}",
        assignment,
        student,
        at.format("%Y/%m/%d/%H/%M/"),
        RESULT_FILE_NAME
    )
}

/// 评分结果归档器
#[derive(Clone)]
pub struct ResultArchiver {
    store: Arc<dyn ArtifactStore>,
    clock: Clock,
}

impl ResultArchiver {
    /// 使用系统时钟（UTC）
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self::with_clock(store, Arc::new(Utc::now))
    }

    pub fn with_clock(store: Arc<dyn ArtifactStore>, clock: Clock) -> Self {
        Self { store, clock }
    }

    /// 归档一份评分报告
    ///
    /// # 参数
    /// - `assignment`: 作业标识
    /// - `student`: 学生邮箱
    /// - `report`: 报告正文，原样写入
    /// - `content_type`: 内容类型
    ///
    /// # 返回
    /// 写入成功时返回归档记录；存储不可达时返回 `StorageError`
    pub async fn archive(
        &self,
        assignment: &str,
        student: &str,
        report: String,
        content_type: &str,
    ) -> Result<ArchivedResult, StorageError> {
        let key = archive_key(assignment, student, (self.clock)());
        self.store
            .put(&key, report.as_bytes(), content_type)
            .await?;

        debug!("归档完成: {}", key);

        Ok(ArchivedResult {
            key,
            body: report,
            content_type: content_type.to_string(),
        })
    }
}
