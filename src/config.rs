use crate::error::ConfigError;
use crate::models::FailurePolicy;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 作业目录文件（TOML）
    pub catalog_path: String,
    /// 评分结果归档根目录
    pub artifact_root: String,
    /// 定时评分间隔（秒）
    pub schedule_interval_secs: u64,
    /// 单次评分请求超时（秒）
    pub grader_timeout_secs: u64,
    /// 每轮评分同时进行的请求上限，`None` 表示不限制
    pub max_concurrent_gradings: Option<usize>,
    /// 评分失败后的处理策略
    pub failure_policy: FailurePolicy,
    /// 只运行一轮后退出
    pub run_once: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: "catalog.toml".to_string(),
            artifact_root: "testresult".to_string(),
            schedule_interval_secs: 15 * 60,
            grader_timeout_secs: 100,
            max_concurrent_gradings: None,
            failure_policy: FailurePolicy::RegradeNextRun,
            run_once: false,
            verbose_logging: false,
        }
    }
}

/// 配置文件中允许出现的字段，缺省项沿用默认值
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    catalog_path: Option<String>,
    artifact_root: Option<String>,
    schedule_interval_secs: Option<u64>,
    grader_timeout_secs: Option<u64>,
    max_concurrent_gradings: Option<usize>,
    failure_policy: Option<String>,
    run_once: Option<bool>,
    verbose_logging: Option<bool>,
}

impl Config {
    /// 加载配置：先读 `GRADER_CONFIG` 指向的文件（如有），再叠加环境变量
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var("GRADER_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 配置文件读取
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::file_load_failed(path.display(), e))?;
        let file: ConfigFile = toml::from_str(&content)
            .map_err(|e| ConfigError::file_load_failed(path.display(), e))?;
        Self::default().merge(file)
    }

    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_secs.max(1))
    }

    pub fn grader_timeout(&self) -> Duration {
        Duration::from_secs(self.grader_timeout_secs.max(1))
    }

    fn merge(self, file: ConfigFile) -> Result<Self, ConfigError> {
        let failure_policy = match file.failure_policy {
            Some(raw) => raw.parse::<FailurePolicy>().map_err(|_| ConfigError::InvalidValue {
                name: "failure_policy".to_string(),
                value: raw,
                expected: "regrade | skip".to_string(),
            })?,
            None => self.failure_policy,
        };
        Ok(Self {
            catalog_path: file.catalog_path.unwrap_or(self.catalog_path),
            artifact_root: file.artifact_root.unwrap_or(self.artifact_root),
            schedule_interval_secs: file
                .schedule_interval_secs
                .unwrap_or(self.schedule_interval_secs),
            grader_timeout_secs: file.grader_timeout_secs.unwrap_or(self.grader_timeout_secs),
            max_concurrent_gradings: file
                .max_concurrent_gradings
                .map(concurrency_limit)
                .unwrap_or(self.max_concurrent_gradings),
            failure_policy,
            run_once: file.run_once.unwrap_or(self.run_once),
            verbose_logging: file.verbose_logging.unwrap_or(self.verbose_logging),
        })
    }

    fn with_env_overrides(self) -> Self {
        Self {
            catalog_path: std::env::var("CATALOG_PATH").unwrap_or(self.catalog_path),
            artifact_root: std::env::var("ARTIFACT_ROOT").unwrap_or(self.artifact_root),
            schedule_interval_secs: env_parse("SCHEDULE_INTERVAL_SECS").unwrap_or(self.schedule_interval_secs),
            grader_timeout_secs: env_parse("GRADER_TIMEOUT_SECS").unwrap_or(self.grader_timeout_secs),
            max_concurrent_gradings: env_parse("MAX_CONCURRENT_GRADINGS")
                .map(concurrency_limit)
                .unwrap_or(self.max_concurrent_gradings),
            failure_policy: env_parse("FAILURE_POLICY").unwrap_or(self.failure_policy),
            run_once: env_parse("RUN_ONCE").unwrap_or(self.run_once),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
        }
    }
}

/// 0 表示不限制
fn concurrency_limit(raw: usize) -> Option<usize> {
    (raw > 0).then_some(raw)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("⚠️ 环境变量 {} 的值 '{}' 无法解析，使用默认值", name, raw);
            None
        }
    }
}
