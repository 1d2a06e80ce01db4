//! 后端网关接口
//!
//! 同步层只依赖这个 trait；HTTP 实现见 `http_gateway`，测试使用内存实现。

use async_trait::async_trait;

use crate::annotations::AnnotationOverlay;
use crate::error::GatewayResult;
use crate::models::{
    PillarScoreSnapshot, Question, QuestionPatch, QuestionScope, Section, SectionId,
    SectionPatch, Survey,
};

/// 后端网关
#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// 获取整份问卷
    async fn fetch_survey(&self, survey_id: &str) -> GatewayResult<Survey>;

    /// 按 ID 部分更新一道题，返回更新后的题目
    async fn update_question(
        &self,
        survey_id: &str,
        question_id: &str,
        patch: &QuestionPatch,
    ) -> GatewayResult<Question>;

    /// 按 ID 部分更新章节（可携带完整题目数组），返回更新后的章节
    async fn update_section(
        &self,
        survey_id: &str,
        section_id: SectionId,
        patch: &SectionPatch,
    ) -> GatewayResult<Section>;

    /// 新建章节，返回后端确认的章节（含最终 ID）
    async fn create_section(&self, survey_id: &str, section: &Section) -> GatewayResult<Section>;

    async fn delete_section(&self, survey_id: &str, section_id: SectionId) -> GatewayResult<()>;

    /// 覆盖式设置章节顺序（幂等）
    async fn set_section_order(&self, survey_id: &str, section_ids: &[SectionId])
        -> GatewayResult<()>;

    /// 覆盖式设置某个范围内的题目顺序（幂等）
    async fn set_question_order(
        &self,
        survey_id: &str,
        scope: QuestionScope,
        question_ids: &[String],
    ) -> GatewayResult<()>;

    /// 获取整个批注覆盖层；不存在时返回空覆盖层
    async fn fetch_annotations(&self, survey_id: &str) -> GatewayResult<AnnotationOverlay>;

    /// 整体保存批注覆盖层
    async fn save_annotations(
        &self,
        survey_id: &str,
        overlay: &AnnotationOverlay,
    ) -> GatewayResult<()>;

    /// 触发质量评估（发出即返回）
    async fn trigger_evaluation(&self, survey_id: &str) -> GatewayResult<()>;

    /// 获取评分快照；没有评分时返回 `None`
    async fn fetch_pillar_scores(&self, survey_id: &str)
        -> GatewayResult<Option<PillarScoreSnapshot>>;
}
