use crate::clients::{Grader, HttpGrader};
use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{ArtifactStore, CatalogStore, FsArtifactStore, TomlCatalogStore};
use crate::orchestrator::{BatchOrchestrator, BatchReport, ManualTrigger, Scheduler};
use crate::services::{CatalogLoader, ResultArchiver};
use crate::utils::logging::log_startup;
use crate::workflow::GradingDispatcher;
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    orchestrator: Arc<BatchOrchestrator>,
}

impl App {
    /// 按配置创建文件目录、文件归档与 HTTP 评分客户端
    pub fn initialize(config: Config) -> AppResult<Self> {
        log_startup(&config);

        let catalog = Arc::new(TomlCatalogStore::new(&config.catalog_path));
        let artifacts = Arc::new(FsArtifactStore::new(&config.artifact_root));
        let grader = Arc::new(HttpGrader::new(config.grader_timeout())?);

        Ok(Self::from_parts(config, catalog, artifacts, grader))
    }

    /// 使用给定的外部组件组装应用
    pub fn from_parts(
        config: Config,
        catalog: Arc<dyn CatalogStore>,
        artifacts: Arc<dyn ArtifactStore>,
        grader: Arc<dyn Grader>,
    ) -> Self {
        let loader = CatalogLoader::new(catalog);
        let dispatcher = GradingDispatcher::new(grader, ResultArchiver::new(artifacts));
        let orchestrator = Arc::new(BatchOrchestrator::new(
            loader,
            dispatcher,
            config.max_concurrent_gradings,
        ));

        Self {
            config,
            orchestrator,
        }
    }

    pub fn orchestrator(&self) -> Arc<BatchOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    /// 只运行一轮
    pub async fn run_once(&self) -> AppResult<BatchReport> {
        self.orchestrator.run_batch().await
    }

    /// 运行应用主逻辑
    ///
    /// `run_once` 时运行一轮后退出，否则进入定时调度，Ctrl-C 停止。
    pub async fn run(self) -> Result<()> {
        if self.config.run_once {
            let report = self.run_once().await?;
            info!(
                "✓ 单轮评分结束: {} 个作业, 归档 {}",
                report.assignments_discovered,
                report.archived_count()
            );
            return Ok(());
        }

        let scheduler = Scheduler::new(
            self.orchestrator(),
            self.config.schedule_interval(),
            self.config.failure_policy,
        );
        forward_manual_signal(scheduler.manual_trigger());

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("⚠️ 无法监听 Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        scheduler.run(shutdown).await;
        Ok(())
    }
}

/// SIGUSR1 映射为手动触发
#[cfg(unix)]
fn forward_manual_signal(trigger: ManualTrigger) {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::user_defined1()) {
        Ok(mut stream) => {
            info!("💡 发送 SIGUSR1 可手动触发一轮评分");
            tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    if !trigger.fire() {
                        break;
                    }
                }
            });
        }
        Err(e) => warn!("⚠️ 无法监听 SIGUSR1，手动触发不可用: {}", e),
    }
}

#[cfg(not(unix))]
fn forward_manual_signal(_trigger: ManualTrigger) {
    warn!("⚠️ 当前平台不支持信号触发，只使用定时触发");
}
