use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 目录存储错误（唯一会中止整轮评分的错误）
    #[error("目录存储错误: {0}")]
    Catalog(#[from] CatalogError),
    /// 评分调用错误
    #[error("评分调用错误: {0}")]
    Grading(#[from] GradingError),
    /// 归档存储错误
    #[error("归档存储错误: {0}")]
    Storage(#[from] StorageError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 后台任务异常退出
    #[error("任务执行失败: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// 目录存储错误
#[derive(Debug, Error)]
pub enum CatalogError {
    /// 存储不可达
    #[error("无法访问表 {table}: {source}")]
    Unavailable {
        table: String,
        #[source]
        source: BoxError,
    },
    /// 查询失败
    #[error("查询表 {table} 失败: {message}")]
    QueryFailed { table: String, message: String },
    /// 续传令牌无效
    #[error("表 {table} 的续传令牌无效: {token}")]
    InvalidContinuation { table: String, token: String },
}

/// 单次评分调用错误
#[derive(Debug, Error)]
pub enum GradingError {
    /// 评分地址无法解析
    #[error("评分地址无效 ({url}): {reason}")]
    InvalidEndpoint { url: String, reason: String },
    /// 网络请求失败
    #[error("请求失败 ({endpoint}): {message}")]
    RequestFailed { endpoint: String, message: String },
    /// 请求超时
    #[error("请求超时 ({endpoint})")]
    Timeout { endpoint: String },
    /// 非 2xx 响应
    #[error("评分服务返回错误状态 ({endpoint}): {status}")]
    BadStatus { endpoint: String, status: u16 },
    /// 响应体读取失败
    #[error("响应体无法读取 ({endpoint}): {message}")]
    MalformedBody { endpoint: String, message: String },
}

/// 归档存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 存储不可达或写入失败
    #[error("写入 {key} 失败: {source}")]
    Unavailable {
        key: String,
        #[source]
        source: BoxError,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置值无法解析
    #[error("配置项 {name} 解析失败: 值 '{value}' 无法转换为 {expected}")]
    InvalidValue {
        name: String,
        value: String,
        expected: String,
    },
    /// 配置文件读取或解析失败
    #[error("配置文件 {path} 无法加载: {source}")]
    FileLoadFailed {
        path: String,
        #[source]
        source: BoxError,
    },
}

// ========== 便捷构造函数 ==========

impl CatalogError {
    /// 创建存储不可达错误
    pub fn unavailable(
        table: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        CatalogError::Unavailable {
            table: table.into(),
            source: Box::new(source),
        }
    }

    /// 创建查询失败错误
    pub fn query_failed(table: impl Into<String>, message: impl Into<String>) -> Self {
        CatalogError::QueryFailed {
            table: table.into(),
            message: message.into(),
        }
    }
}

impl StorageError {
    /// 创建存储写入失败错误
    pub fn unavailable(
        key: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StorageError::Unavailable {
            key: key.into(),
            source: Box::new(source),
        }
    }
}

impl ConfigError {
    /// 创建配置文件加载错误
    pub fn file_load_failed(
        path: impl std::fmt::Display,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConfigError::FileLoadFailed {
            path: path.to_string(),
            source: Box::new(source),
        }
    }
}

impl GradingError {
    /// 从 reqwest 错误归类
    pub fn from_reqwest(endpoint: impl Into<String>, err: &reqwest::Error) -> Self {
        let endpoint = endpoint.into();
        if err.is_timeout() {
            GradingError::Timeout { endpoint }
        } else if let Some(status) = err.status() {
            GradingError::BadStatus {
                endpoint,
                status: status.as_u16(),
            }
        } else {
            GradingError::RequestFailed {
                endpoint,
                message: err.to_string(),
            }
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
