/// 日志工具模块
///
/// 提供日志初始化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::Survey;

/// 初始化日志
///
/// `RUST_LOG` 优先；未设置时使用配置中的过滤规则，
/// 打开详细日志时默认级别提升到 debug。重复初始化会被忽略。
///
/// # 参数
/// - `config`: 程序配置
pub fn init(config: &Config) {
    let default_filter = if config.verbose_logging {
        "debug"
    } else {
        config.log_filter.as_str()
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `config`: 程序配置
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 问卷编辑同步启动");
    info!("🌐 后端地址: {}", config.api_base_url);
    info!("⏱️ 请求超时: {} 秒", config.request_timeout_secs);
    info!(
        "{} 评估结束时要求明确状态",
        if config.require_evaluation_status {
            "✓"
        } else {
            "✗"
        }
    );
    info!("{}", "=".repeat(60));
}

/// 打印问卷大纲
///
/// # 参数
/// - `survey`: 问卷
pub fn log_survey_outline(survey: &Survey) {
    info!("\n{}", "─".repeat(60));
    info!("📋 {} ({})", survey.title, survey.id);

    for section in &survey.sections {
        info!(
            "  {}. {} - {} 道题",
            section.order,
            truncate_text(&section.title, 30),
            section.questions.len()
        );
        for question in &section.questions {
            info!(
                "      {}. [{}] {}",
                question.order,
                question.id,
                truncate_text(&question.text, 40)
            );
        }
    }
    for question in &survey.questions {
        info!(
            "  {}. [{}] {}",
            question.order,
            question.id,
            truncate_text(&question.text, 40)
        );
    }

    match survey.score.snapshot() {
        Some(snapshot) => info!(
            "🏅 综合评分: {:.2} ({})",
            snapshot.weighted_score, snapshot.grade
        ),
        None => info!("🏅 尚未评估"),
    }
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
