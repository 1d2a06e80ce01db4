//! 同步事件
//!
//! 每次持久化失败都会广播一条事件，并写明失败的具体操作。

use chrono::{DateTime, Local};
use std::fmt;

use crate::models::{EvaluationStatus, QuestionScope, SectionId};

/// 发往后端的操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOperation {
    LoadSurvey,
    LoadAnnotations,
    CreateSection { section_id: SectionId },
    DeleteSection { section_id: SectionId },
    UpdateSection { section_id: SectionId },
    UpdateSectionQuestions { scope: QuestionScope },
    UpdateQuestion { question_id: String },
    SetSectionOrder,
    SetQuestionOrder { scope: QuestionScope },
    SaveAnnotations,
    TriggerEvaluation,
    FetchPillarScores,
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOperation::LoadSurvey => write!(f, "加载问卷"),
            SyncOperation::LoadAnnotations => write!(f, "加载批注"),
            SyncOperation::CreateSection { section_id } => write!(f, "新建章节 #{}", section_id),
            SyncOperation::DeleteSection { section_id } => write!(f, "删除章节 #{}", section_id),
            SyncOperation::UpdateSection { section_id } => write!(f, "更新章节 #{}", section_id),
            SyncOperation::UpdateSectionQuestions { scope } => write!(f, "更新{}的题目", scope),
            SyncOperation::UpdateQuestion { question_id } => write!(f, "更新题目 {}", question_id),
            SyncOperation::SetSectionOrder => write!(f, "保存章节顺序"),
            SyncOperation::SetQuestionOrder { scope } => write!(f, "保存{}的题目顺序", scope),
            SyncOperation::SaveAnnotations => write!(f, "保存批注"),
            SyncOperation::TriggerEvaluation => write!(f, "触发质量评估"),
            SyncOperation::FetchPillarScores => write!(f, "获取评分"),
        }
    }
}

/// 同步事件种类
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEventKind {
    /// 已保存
    Saved { operation: SyncOperation },
    /// 保存失败；`superseded` 表示同一对象已有更新的写入
    PersistFailed {
        operation: SyncOperation,
        message: String,
        superseded: bool,
    },
    /// 乱序到达的旧响应被丢弃
    StaleResponseDiscarded { operation: SyncOperation },
    /// 评估结算
    EvaluationSettled {
        survey_id: String,
        status: EvaluationStatus,
    },
}

/// 同步事件
#[derive(Debug, Clone, PartialEq)]
pub struct SyncEvent {
    pub survey_id: String,
    pub kind: SyncEventKind,
    pub at: DateTime<Local>,
}

impl SyncEvent {
    pub fn new(survey_id: impl Into<String>, kind: SyncEventKind) -> Self {
        Self {
            survey_id: survey_id.into(),
            kind,
            at: Local::now(),
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = self.at.format("%H:%M:%S");
        match &self.kind {
            SyncEventKind::Saved { operation } => {
                write!(f, "[{}] ✓ {} 已保存", at, operation)
            }
            SyncEventKind::PersistFailed {
                operation,
                message,
                superseded,
            } => {
                if *superseded {
                    write!(f, "[{}] ⚠️ {} 失败（已被后续修改覆盖）: {}", at, operation, message)
                } else {
                    write!(f, "[{}] ❌ {} 失败，修改尚未保存: {}", at, operation, message)
                }
            }
            SyncEventKind::StaleResponseDiscarded { operation } => {
                write!(f, "[{}] {} 的旧响应已丢弃", at, operation)
            }
            SyncEventKind::EvaluationSettled { survey_id, status } => {
                write!(f, "[{}] 问卷 {} 评估{}", at, survey_id, status)
            }
        }
    }
}
