/// 日志工具模块
///
/// 提供启动横幅与每轮汇总的输出
use crate::config::Config;
use crate::orchestrator::BatchReport;
use tracing::{debug, info, warn};

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 定时作业评分");
    info!("📁 作业目录: {}", config.catalog_path);
    info!("🗄️ 归档目录: {}", config.artifact_root);
    match config.max_concurrent_gradings {
        Some(limit) => info!("📊 每轮最大并发评分数: {}", limit),
        None => info!("📊 每轮并发评分数: 不限制"),
    }
    info!("🔁 失败策略: {:?}", config.failure_policy);
    info!("{}", "=".repeat(60));
}

/// 记录本轮发现的作业数
pub fn log_assignments_discovered(run_id: u64, total: usize) {
    if total == 0 {
        warn!("[轮次#{}] ⚠️ 没有找到任何作业", run_id);
    } else {
        info!("[轮次#{}] ✓ 找到 {} 个作业", run_id, total);
    }
}

/// 打印一轮评分的汇总
pub fn log_run_complete(report: &BatchReport) {
    info!("\n{}", "─".repeat(60));
    info!(
        "[轮次#{}] 📊 评分完成: {} 个作业",
        report.run_id, report.assignments_discovered
    );
    info!(
        "[轮次#{}] ✅ 归档: {}  ❌ 失败: {}  ⏭️ 跳过: {}",
        report.run_id,
        report.archived_count(),
        report.failed_count(),
        report.skipped_count()
    );
    if report.aborted_dispatches > 0 {
        warn!(
            "[轮次#{}] ⚠️ {} 个作业任务异常退出",
            report.run_id, report.aborted_dispatches
        );
    }
    info!(
        "[轮次#{}] 完成时间: {}",
        report.run_id,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "─".repeat(60));

    match serde_json::to_string(report) {
        Ok(json) => debug!("[轮次#{}] 汇总: {}", report.run_id, json),
        Err(e) => debug!("[轮次#{}] 汇总无法序列化: {}", report.run_id, e),
    }
}
