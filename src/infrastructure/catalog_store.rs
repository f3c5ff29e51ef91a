//! 目录存储 - 基础设施层
//!
//! 两张逻辑表：
//! - `assignments`：按作业标识为键，含 `GraderUrl`
//! - `credentials`：按作业标识分区，按学生邮箱为行键，含 `Credentials`
//!
//! 两种查询都是分页的，调用方必须循环续传令牌直到耗尽。

use crate::error::CatalogError;
use crate::models::{load_catalog_file, AssignmentRow, CredentialRow, Page};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tokio::fs;
use tracing::debug;

pub const ASSIGNMENTS_TABLE: &str = "assignments";
pub const CREDENTIALS_TABLE: &str = "credentials";

/// 默认每页行数
const DEFAULT_PAGE_SIZE: usize = 1000;

/// 目录存储接口
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// 列出作业表的一页
    async fn list_assignments(
        &self,
        continuation: Option<String>,
    ) -> Result<Page<AssignmentRow>, CatalogError>;

    /// 列出某个作业分区下凭据表的一页
    async fn list_credentials(
        &self,
        assignment: &str,
        continuation: Option<String>,
    ) -> Result<Page<CredentialRow>, CatalogError>;
}

/// 内存中的目录存储
#[derive(Debug, Clone)]
pub struct InMemoryCatalogStore {
    assignments: Vec<AssignmentRow>,
    credentials: Vec<CredentialRow>,
    page_size: usize,
}

impl InMemoryCatalogStore {
    pub fn new(assignments: Vec<AssignmentRow>, credentials: Vec<CredentialRow>) -> Self {
        Self {
            assignments,
            credentials,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn list_assignments(
        &self,
        continuation: Option<String>,
    ) -> Result<Page<AssignmentRow>, CatalogError> {
        paginate(&self.assignments, continuation, self.page_size, ASSIGNMENTS_TABLE)
    }

    async fn list_credentials(
        &self,
        assignment: &str,
        continuation: Option<String>,
    ) -> Result<Page<CredentialRow>, CatalogError> {
        let partition: Vec<CredentialRow> = self
            .credentials
            .iter()
            .filter(|row| row.partition_key == assignment)
            .cloned()
            .collect();
        paginate(&partition, continuation, self.page_size, CREDENTIALS_TABLE)
    }
}

/// 基于 TOML 文件的目录存储
///
/// 文件解析结果按版本缓存：文件修改时间或长度变化后才重新解析，
/// 因此每一轮评分看到的都是最新内容。续传令牌带有版本号，
/// 分页途中文件被替换时，旧版本的令牌会被拒绝而不是套用到新内容上。
#[derive(Debug)]
pub struct TomlCatalogStore {
    path: PathBuf,
    page_size: usize,
    cache: Mutex<Option<Snapshot>>,
}

/// 文件的版本标记
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

#[derive(Debug, Clone)]
struct Snapshot {
    stamp: FileStamp,
    generation: u64,
    rows: Arc<InMemoryCatalogStore>,
}

impl TomlCatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            page_size: DEFAULT_PAGE_SIZE,
            cache: Mutex::new(None),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// 当前缓存的版本号，从 1 开始，每次重新解析加一
    pub fn generation(&self) -> Option<u64> {
        self.lock().as_ref().map(|s| s.generation)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Snapshot>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn snapshot(&self) -> Result<Snapshot, CatalogError> {
        let metadata = fs::metadata(&self.path)
            .await
            .map_err(|e| CatalogError::unavailable(self.path.display().to_string(), e))?;
        let stamp = FileStamp {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        };

        let cached = self.lock().as_ref().filter(|s| s.stamp == stamp).cloned();
        if let Some(cached) = cached {
            return Ok(cached);
        }

        let file = load_catalog_file(&self.path).await?;
        let rows = Arc::new(
            InMemoryCatalogStore::new(file.assignments, file.credentials)
                .with_page_size(self.page_size),
        );

        let mut cache = self.lock();
        let generation = cache.as_ref().map_or(1, |s| s.generation + 1);
        debug!("目录文件 {} 已重新解析，版本 {}", self.path.display(), generation);
        let snapshot = Snapshot {
            stamp,
            generation,
            rows,
        };
        *cache = Some(snapshot.clone());
        Ok(snapshot)
    }
}

impl Snapshot {
    /// 令牌格式为 `<版本>:<偏移>`，版本不符时拒绝
    fn offset_token(
        &self,
        continuation: Option<String>,
        table: &str,
    ) -> Result<Option<String>, CatalogError> {
        let Some(token) = continuation else {
            return Ok(None);
        };
        match token.split_once(':') {
            Some((generation, offset)) if generation == self.generation.to_string() => {
                Ok(Some(offset.to_string()))
            }
            _ => Err(CatalogError::InvalidContinuation {
                table: table.to_string(),
                token,
            }),
        }
    }

    fn tag<T>(&self, page: Page<T>) -> Page<T> {
        Page {
            items: page.items,
            continuation: page
                .continuation
                .map(|offset| format!("{}:{}", self.generation, offset)),
        }
    }
}

#[async_trait]
impl CatalogStore for TomlCatalogStore {
    async fn list_assignments(
        &self,
        continuation: Option<String>,
    ) -> Result<Page<AssignmentRow>, CatalogError> {
        let snapshot = self.snapshot().await?;
        let offset = snapshot.offset_token(continuation, ASSIGNMENTS_TABLE)?;
        let page = snapshot.rows.list_assignments(offset).await?;
        Ok(snapshot.tag(page))
    }

    async fn list_credentials(
        &self,
        assignment: &str,
        continuation: Option<String>,
    ) -> Result<Page<CredentialRow>, CatalogError> {
        let snapshot = self.snapshot().await?;
        let offset = snapshot.offset_token(continuation, CREDENTIALS_TABLE)?;
        let page = snapshot.rows.list_credentials(assignment, offset).await?;
        Ok(snapshot.tag(page))
    }
}

/// 续传令牌为下一页的起始偏移量
fn paginate<T: Clone>(
    rows: &[T],
    continuation: Option<String>,
    page_size: usize,
    table: &str,
) -> Result<Page<T>, CatalogError> {
    let start = match continuation {
        None => 0,
        Some(token) => match token.parse::<usize>() {
            Ok(offset) if offset <= rows.len() => offset,
            _ => {
                return Err(CatalogError::InvalidContinuation {
                    table: table.to_string(),
                    token,
                })
            }
        },
    };

    let end = (start + page_size).min(rows.len());
    let continuation = (end < rows.len()).then(|| end.to_string());

    Ok(Page {
        items: rows[start..end].to_vec(),
        continuation,
    })
}
