/// 评分服务客户端
///
/// 向评分地址发起 GET 请求，凭据作为唯一的 `credentials` 查询参数（URL 编码）。
use crate::error::GradingError;
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

/// 查询参数名
pub const CREDENTIALS_PARAM: &str = "credentials";

/// 评分服务接口
#[async_trait]
pub trait Grader: Send + Sync {
    /// 调用评分服务并返回完整的报告正文
    async fn grade(&self, grader_url: &str, credentials: &str) -> Result<String, GradingError>;
}

/// 基于 reqwest 的评分客户端
///
/// 内部 `Client` 带连接池，可以在并发请求之间共享，不保存任何请求相关状态。
#[derive(Debug, Clone)]
pub struct HttpGrader {
    client: Client,
}

impl HttpGrader {
    /// 创建带超时的评分客户端
    pub fn new(timeout: Duration) -> Result<Self, GradingError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GradingError::RequestFailed {
                endpoint: String::new(),
                message: format!("无法创建 HTTP 客户端: {}", e),
            })?;
        Ok(Self { client })
    }

    /// 使用已有的 reqwest 客户端
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// 构建评分请求地址
    pub fn request_url(grader_url: &str, credentials: &str) -> Result<Url, GradingError> {
        let mut url = Url::parse(grader_url).map_err(|e| GradingError::InvalidEndpoint {
            url: grader_url.to_string(),
            reason: e.to_string(),
        })?;
        url.query_pairs_mut()
            .append_pair(CREDENTIALS_PARAM, credentials);
        Ok(url)
    }
}

#[async_trait]
impl Grader for HttpGrader {
    async fn grade(&self, grader_url: &str, credentials: &str) -> Result<String, GradingError> {
        let url = Self::request_url(grader_url, credentials)?;
        // 凭据只出现在查询串里，日志中只记录评分地址
        debug!("调用评分服务: {}", grader_url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GradingError::from_reqwest(grader_url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GradingError::BadStatus {
                endpoint: grader_url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                GradingError::Timeout {
                    endpoint: grader_url.to_string(),
                }
            } else {
                GradingError::MalformedBody {
                    endpoint: grader_url.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }
}
