//! 作业目录加载 - 业务能力层
//!
//! 只负责"读出本轮要评分的作业"，不关心评分流程。
//!
//! 作业表和每个作业分区下的凭据表都要把所有分页读完再做关联，
//! 中途停下会悄悄丢掉学生。

use crate::error::CatalogError;
use crate::infrastructure::CatalogStore;
use crate::models::{Assignment, AssignmentRow, CredentialRow, Page, StudentRecord};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 作业目录加载器
///
/// 每次调用都重新读取存储，不在轮次之间缓存任何结果。
#[derive(Clone)]
pub struct CatalogLoader {
    store: Arc<dyn CatalogStore>,
}

impl CatalogLoader {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// 读取全部作业及其学生凭据
    ///
    /// # 返回
    /// 作业列表（顺序不保证）；存储不可达或查询失败时返回 `CatalogError`
    pub async fn load_catalog(&self) -> Result<Vec<Assignment>, CatalogError> {
        let store = self.store.as_ref();

        let rows = drain_pages(move |token| store.list_assignments(token)).await?;
        debug!("作业表共 {} 行", rows.len());

        let mut seen = HashSet::new();
        let mut assignments = Vec::with_capacity(rows.len());
        for row in rows {
            if !seen.insert(row.partition_key.clone()) {
                warn!("⚠️ 作业 {} 重复出现，忽略后续记录", row.partition_key);
                continue;
            }
            assignments.push(self.load_assignment(row).await?);
        }

        let student_total: usize = assignments.iter().map(|a| a.students.len()).sum();
        info!(
            "✓ 目录加载完成: {} 个作业, {} 名学生",
            assignments.len(),
            student_total
        );
        Ok(assignments)
    }

    async fn load_assignment(&self, row: AssignmentRow) -> Result<Assignment, CatalogError> {
        let store = self.store.as_ref();
        let partition = row.partition_key.as_str();

        let credentials =
            drain_pages(move |token| store.list_credentials(partition, token)).await?;

        let students: Vec<StudentRecord> = credentials
            .into_iter()
            .filter_map(|c| to_student(partition, c))
            .collect();

        debug!("作业 {}: {} 名学生", partition, students.len());

        Ok(Assignment {
            name: row.partition_key,
            grader_url: row.grader_url,
            students,
        })
    }
}

/// 把凭据行转换为学生记录，空凭据不满足约束，直接丢弃
fn to_student(assignment: &str, row: CredentialRow) -> Option<StudentRecord> {
    if row.credentials.is_empty() {
        warn!(
            "⚠️ 作业 {} 的学生 {} 凭据为空，跳过",
            assignment, row.row_key
        );
        return None;
    }
    Some(StudentRecord::new(row.row_key, row.credentials))
}

/// 循环读取续传令牌直到耗尽，返回所有页的行
///
/// 令牌重复出现（原地不动或绕回之前的页）时报错，避免无限循环。
async fn drain_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, CatalogError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, CatalogError>>,
{
    let mut rows = Vec::new();
    let mut continuation: Option<String> = None;
    let mut seen_tokens = HashSet::new();

    loop {
        let page = fetch(continuation.take()).await?;
        rows.extend(page.items);

        match page.continuation {
            Some(next) if !seen_tokens.insert(next.clone()) => {
                return Err(CatalogError::query_failed(
                    "pagination",
                    format!("续传令牌重复出现: {}", next),
                ));
            }
            Some(next) => continuation = Some(next),
            None => break,
        }
    }

    Ok(rows)
}
