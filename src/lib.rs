//! # Schedule Grader
//!
//! 定时为所有作业的所有学生调用远程评分服务，并归档每一份评分报告。
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure / Clients）
//! - `infrastructure/` - 目录存储（分页读取）与归档存储（只写）
//! - `clients/` - 评分服务客户端（reqwest，带超时）
//!
//! ### ② 业务能力层（Services）
//! - `CatalogLoader` - 读出本轮的作业与学生凭据
//! - `ResultArchiver` - 按时间分区写入评分报告
//!
//! ### ③ 流程层（Workflow）
//! - `GradingDispatcher` - 一份作业内所有学生并发评分，失败按学生隔离
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_orchestrator` - 一轮评分：加载目录 → 各作业并发调度 → 汇总
//! - `orchestrator/scheduler` - 定时与手动触发，每次触发一轮独立的评分
//!
//! ## 模块结构

pub mod app;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{Assignment, FailurePolicy, StudentKey, StudentRecord};
pub use orchestrator::{BatchOrchestrator, BatchReport, RunState, Scheduler};
pub use workflow::{GradingDispatcher, RunScope};
