#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use schedule_grader::clients::Grader;
use schedule_grader::error::{CatalogError, GradingError, StorageError};
use schedule_grader::infrastructure::{
    ArtifactStore, CatalogStore, InMemoryCatalogStore, MemoryArtifactStore,
};
use schedule_grader::models::{AssignmentRow, CredentialRow, Page};
use schedule_grader::services::{CatalogLoader, ResultArchiver};
use schedule_grader::{BatchOrchestrator, GradingDispatcher};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

pub fn assignment_row(name: &str, url: &str) -> AssignmentRow {
    AssignmentRow {
        partition_key: name.to_string(),
        grader_url: url.to_string(),
    }
}

pub fn credential_row(assignment: &str, email: &str, token: &str) -> CredentialRow {
    CredentialRow {
        partition_key: assignment.to_string(),
        row_key: email.to_string(),
        credentials: token.to_string(),
    }
}

/// 评分服务的预设响应
#[derive(Debug, Clone)]
pub enum Scripted {
    Pass(String),
    Timeout,
    Status(u16),
    /// 等到卡顿闸门放行后才返回
    Stalled(String),
}

/// 按凭据返回预设结果的评分服务；未预设的凭据返回网络错误
#[derive(Default)]
pub struct ScriptedGrader {
    responses: HashMap<String, Scripted>,
    calls: Mutex<HashMap<String, usize>>,
    started: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
    stall_gate: Option<Arc<Semaphore>>,
}

impl ScriptedGrader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, credentials: &str, response: Scripted) -> Self {
        self.responses.insert(credentials.to_string(), response);
        self
    }

    /// 每次调用都要先从闸门取得许可
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// 只有 `Scripted::Stalled` 的凭据需要从这个闸门取得许可
    pub fn stalling(mut self, gate: Arc<Semaphore>) -> Self {
        self.stall_gate = Some(gate);
        self
    }

    pub fn calls_for(&self, credentials: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(credentials)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub async fn wait_until_started(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.started() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("grader calls never started");
    }
}

#[async_trait]
impl Grader for ScriptedGrader {
    async fn grade(&self, grader_url: &str, credentials: &str) -> Result<String, GradingError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        *self
            .calls
            .lock()
            .unwrap()
            .entry(credentials.to_string())
            .or_insert(0) += 1;

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.expect("gate closed");
        }

        match self.responses.get(credentials) {
            Some(Scripted::Pass(body)) => Ok(body.clone()),
            Some(Scripted::Stalled(body)) => {
                if let Some(gate) = &self.stall_gate {
                    let _permit = gate.acquire().await.expect("stall gate closed");
                }
                Ok(body.clone())
            }
            Some(Scripted::Timeout) => Err(GradingError::Timeout {
                endpoint: grader_url.to_string(),
            }),
            Some(Scripted::Status(status)) => Err(GradingError::BadStatus {
                endpoint: grader_url.to_string(),
                status: *status,
            }),
            None => Err(GradingError::RequestFailed {
                endpoint: grader_url.to_string(),
                message: "connection refused".to_string(),
            }),
        }
    }
}

/// 键中包含指定片段时写入失败的归档存储
pub struct FlakyArtifactStore {
    pub inner: MemoryArtifactStore,
    fail_when_contains: String,
}

impl FlakyArtifactStore {
    pub fn failing_on(fragment: &str) -> Self {
        Self {
            inner: MemoryArtifactStore::new(),
            fail_when_contains: fragment.to_string(),
        }
    }
}

#[async_trait]
impl ArtifactStore for FlakyArtifactStore {
    async fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), StorageError> {
        if key.contains(&self.fail_when_contains) {
            return Err(StorageError::unavailable(
                key,
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "blob store down"),
            ));
        }
        self.inner.put(key, body, content_type).await
    }
}

/// 始终不可达的目录存储
pub struct UnreachableCatalog;

#[async_trait]
impl CatalogStore for UnreachableCatalog {
    async fn list_assignments(
        &self,
        _continuation: Option<String>,
    ) -> Result<Page<AssignmentRow>, CatalogError> {
        Err(CatalogError::unavailable(
            "assignments",
            std::io::Error::new(std::io::ErrorKind::TimedOut, "table service unreachable"),
        ))
    }

    async fn list_credentials(
        &self,
        _assignment: &str,
        _continuation: Option<String>,
    ) -> Result<Page<CredentialRow>, CatalogError> {
        Err(CatalogError::query_failed("credentials", "unreachable"))
    }
}

/// 固定时刻
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap()
}

/// 每次调用前进一分钟的时钟，保证每次归档的键都不同
pub fn ticking_clock() -> Arc<dyn Fn() -> DateTime<Utc> + Send + Sync> {
    let minutes = Arc::new(AtomicI64::new(0));
    Arc::new(move || fixed_time() + ChronoDuration::minutes(minutes.fetch_add(1, Ordering::SeqCst)))
}

pub fn archiver(
    store: Arc<dyn ArtifactStore>,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
) -> ResultArchiver {
    ResultArchiver::with_clock(store, clock)
}

pub fn dispatcher(grader: Arc<dyn Grader>, store: Arc<dyn ArtifactStore>) -> GradingDispatcher {
    GradingDispatcher::new(grader, archiver(store, Arc::new(fixed_time)))
}

pub fn orchestrator(
    catalog: Arc<dyn CatalogStore>,
    grader: Arc<dyn Grader>,
    store: Arc<dyn ArtifactStore>,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
) -> Arc<BatchOrchestrator> {
    let dispatcher = GradingDispatcher::new(grader, archiver(store, clock));
    Arc::new(BatchOrchestrator::new(
        CatalogLoader::new(catalog),
        dispatcher,
        None,
    ))
}

/// 一个作业、若干学生的内存目录
pub fn single_assignment_catalog(name: &str, students: &[(&str, &str)]) -> Arc<InMemoryCatalogStore> {
    let credentials = students
        .iter()
        .map(|(email, token)| credential_row(name, email, token))
        .collect();
    Arc::new(InMemoryCatalogStore::new(
        vec![assignment_row(name, "http://g/")],
        credentials,
    ))
}
