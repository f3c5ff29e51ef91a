use crate::error::CatalogError;
use crate::models::assignment::{AssignmentRow, CredentialRow};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// 目录文件的内容：作业表与凭据表
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogFile {
    pub assignments: Vec<AssignmentRow>,
    pub credentials: Vec<CredentialRow>,
}

/// 从 TOML 文件读取作业表与凭据表
///
/// 文件不存在或无法解析都视为目录存储不可用。
pub async fn load_catalog_file(path: &Path) -> Result<CatalogFile, CatalogError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| CatalogError::unavailable(path.display().to_string(), e))?;

    let catalog: CatalogFile = toml::from_str(&content).map_err(|e| {
        CatalogError::query_failed(path.display().to_string(), format!("无法解析TOML: {}", e))
    })?;

    tracing::debug!(
        "已读取目录文件 {}: {} 个作业, {} 条凭据",
        path.display(),
        catalog.assignments.len(),
        catalog.credentials.len()
    );

    Ok(catalog)
}
