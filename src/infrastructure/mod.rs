//! 基础设施层：外部存储的接口与实现
//!
//! 只暴露"读目录"与"写归档"的能力，不认识作业流程。

pub mod artifact_store;
pub mod catalog_store;

pub use artifact_store::{ArtifactStore, FsArtifactStore, MemoryArtifactStore, StoredArtifact};
pub use catalog_store::{
    CatalogStore, InMemoryCatalogStore, TomlCatalogStore, ASSIGNMENTS_TABLE, CREDENTIALS_TABLE,
};
