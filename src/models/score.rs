use serde::{Deserialize, Serialize};

use crate::error::{EditorError, EditorResult};

/// 质量评估结果快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PillarScoreSnapshot {
    /// 加权总分
    pub weighted_score: f64,
    /// 字母等级
    pub grade: String,
    #[serde(default)]
    pub pillars: Vec<PillarBreakdown>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// 单个质量维度（pillar）的得分明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PillarBreakdown {
    pub name: String,
    pub score: f64,
    pub grade: String,
    #[serde(default)]
    pub criteria_met: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria_total: Option<u32>,
    pub weight: f64,
}

impl PillarScoreSnapshot {
    /// 入口校验：后端返回的评分必须是有限的非负数
    pub fn validate(&self) -> EditorResult<()> {
        if !self.weighted_score.is_finite() || self.weighted_score < 0.0 {
            return Err(EditorError::validation(format!(
                "加权总分无效: {}",
                self.weighted_score
            )));
        }

        for pillar in &self.pillars {
            if !pillar.score.is_finite() || pillar.score < 0.0 {
                return Err(EditorError::validation(format!(
                    "维度 {} 得分无效: {}",
                    pillar.name, pillar.score
                )));
            }
            if !pillar.weight.is_finite() || pillar.weight < 0.0 {
                return Err(EditorError::validation(format!(
                    "维度 {} 权重无效: {}",
                    pillar.name, pillar.weight
                )));
            }
            if let Some(total) = pillar.criteria_total {
                if pillar.criteria_met > total {
                    return Err(EditorError::validation(format!(
                        "维度 {} 达标项 {} 超过总数 {}",
                        pillar.name, pillar.criteria_met, total
                    )));
                }
            }
        }

        Ok(())
    }
}

/// 问卷上的评分字段
///
/// `NotEvaluated` 与零分不同：表示从未评估，或评估被跳过。
/// 传输格式为 `null` 或评分对象。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Option<PillarScoreSnapshot>", into = "Option<PillarScoreSnapshot>")]
pub enum ScoreState {
    #[default]
    NotEvaluated,
    Scored(PillarScoreSnapshot),
}

impl ScoreState {
    pub fn snapshot(&self) -> Option<&PillarScoreSnapshot> {
        match self {
            ScoreState::Scored(snapshot) => Some(snapshot),
            ScoreState::NotEvaluated => None,
        }
    }

    pub fn is_evaluated(&self) -> bool {
        matches!(self, ScoreState::Scored(_))
    }
}

impl From<Option<PillarScoreSnapshot>> for ScoreState {
    fn from(value: Option<PillarScoreSnapshot>) -> Self {
        match value {
            Some(snapshot) => ScoreState::Scored(snapshot),
            None => ScoreState::NotEvaluated,
        }
    }
}

impl From<ScoreState> for Option<PillarScoreSnapshot> {
    fn from(value: ScoreState) -> Self {
        match value {
            ScoreState::Scored(snapshot) => Some(snapshot),
            ScoreState::NotEvaluated => None,
        }
    }
}

/// 评估任务状态
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EvaluationStatus {
    #[default]
    Idle,
    Evaluating,
    Completed,
    Failed { reason: String },
    /// 评估结束但没有结果（被跳过或被禁用）
    Skipped,
}

impl EvaluationStatus {
    pub fn is_evaluating(&self) -> bool {
        matches!(self, EvaluationStatus::Evaluating)
    }
}

impl std::fmt::Display for EvaluationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluationStatus::Idle => write!(f, "未开始"),
            EvaluationStatus::Evaluating => write!(f, "评估中"),
            EvaluationStatus::Completed => write!(f, "已完成"),
            EvaluationStatus::Failed { reason } => write!(f, "失败: {}", reason),
            EvaluationStatus::Skipped => write!(f, "已跳过"),
        }
    }
}

/// 后端明确报告的评估结果
#[derive(Debug, Clone, PartialEq)]
pub enum ReportedOutcome {
    Succeeded,
    Failed { reason: String },
    Skipped,
}
