use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::{BackendGateway, HttpGateway};
use crate::config::Config;
use crate::models::AnnotationKind;
use crate::sync::SurveySession;
use crate::utils::logging::{log_startup, log_survey_outline};

/// 应用主结构
pub struct App {
    config: Config,
    gateway: Arc<dyn BackendGateway>,
}

impl App {
    /// 初始化应用（连接 HTTP 后端）
    pub fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let gateway = HttpGateway::new(&config)?;

        Ok(Self::with_gateway(config, Arc::new(gateway)))
    }

    /// 使用指定的后端网关
    pub fn with_gateway(config: Config, gateway: Arc<dyn BackendGateway>) -> Self {
        Self { config, gateway }
    }

    /// 打开问卷会话
    pub async fn open(&self, survey_id: &str) -> Result<SurveySession> {
        let session =
            SurveySession::open(survey_id, Arc::clone(&self.gateway), &self.config).await?;
        Ok(session)
    }

    /// 运行应用主逻辑：加载问卷并打印大纲、评分和批注概况
    pub async fn run(&self, survey_id: &str) -> Result<()> {
        let session = self.open(survey_id).await?;

        let survey = session.survey().await;
        log_survey_outline(&survey);

        let overlay = session.overlay().await;
        info!(
            "📝 批注: 题目 {} 条, 章节 {} 条, 问卷级 {} 条",
            overlay.count(AnnotationKind::Question),
            overlay.count(AnnotationKind::Section),
            overlay.count(AnnotationKind::Survey)
        );

        let orphans = session.orphaned_annotations().await;
        if !orphans.is_empty() {
            warn!("⚠️ {} 条批注引用的实体已不存在:", orphans.len());
            for entity in &orphans {
                warn!("   - {}", entity);
            }
        }

        session.close().await;
        Ok(())
    }
}
