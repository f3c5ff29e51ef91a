//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `batch_orchestrator` - 单轮评分编排
//! - 加载作业目录（每轮一次）
//! - 每份作业启动一个并发调度任务
//! - 等待所有作业完成后汇总
//!
//! ### `scheduler` - 触发层
//! - 定时触发与手动触发，每次触发开始一轮新的、独立的评分
//! - 回收结束的轮次，按失败策略维护跳过名单
//!
//! ## 层次关系
//!
//! ```text
//! scheduler (定时 / 手动触发)
//!     ↓
//! batch_orchestrator (处理 Vec<Assignment>)
//!     ↓
//! workflow::GradingDispatcher (处理 Vec<StudentRecord>)
//!     ↓
//! services (能力层：catalog_loader / result_archiver)
//!     ↓
//! clients + infrastructure (评分服务、目录存储、归档存储)
//! ```

pub mod batch_orchestrator;
pub mod scheduler;

pub use batch_orchestrator::{BatchOrchestrator, BatchReport, RunHandle, RunState};
pub use scheduler::{FailureLedger, ManualTrigger, Scheduler, SchedulerSummary};
