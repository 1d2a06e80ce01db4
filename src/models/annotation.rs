use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EditorError, EditorResult};
use crate::models::survey::SectionId;

/// 1–5 分评分
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> EditorResult<Self> {
        Self::try_from(value).map_err(|e| EditorError::validation(e.to_string()))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

/// 评分超出 1–5 范围
#[derive(Debug, thiserror::Error)]
#[error("评分 {0} 超出范围 [1, 5]")]
pub struct RatingOutOfRange(pub u8);

impl TryFrom<u8> for Rating {
    type Error = RatingOutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(RatingOutOfRange(value))
        }
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/5", self.0)
    }
}

/// 五个质量维度的子评分
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PillarScores {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methodological_rigor: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_validity: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respondent_experience: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytical_value: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_alignment: Option<Rating>,
}

/// 题目批注
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAnnotation {
    pub question_id: String,
    pub quality: Rating,
    pub relevance: Rating,
    #[serde(default)]
    pub pillars: PillarScores,
    #[serde(default)]
    pub comment: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_generated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_confidence: Option<f64>,

    /// 来源指针：题目被重新生成（换了 ID）之前的原始题目 ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_question_id: Option<String>,
}

impl QuestionAnnotation {
    pub fn new(question_id: impl Into<String>, quality: Rating, relevance: Rating) -> Self {
        Self {
            question_id: question_id.into(),
            quality,
            relevance,
            pillars: PillarScores::default(),
            comment: String::new(),
            ai_generated: None,
            ai_confidence: None,
            original_question_id: None,
        }
    }

    pub fn validate(&self) -> EditorResult<()> {
        if self.question_id.trim().is_empty() {
            return Err(EditorError::validation("题目批注缺少 question_id"));
        }
        validate_confidence(self.ai_confidence)
    }
}

/// 章节批注
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionAnnotation {
    pub section_id: SectionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Rating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<Rating>,
    #[serde(default)]
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_generated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_confidence: Option<f64>,
}

impl SectionAnnotation {
    pub fn new(section_id: SectionId, comment: impl Into<String>) -> Self {
        Self {
            section_id,
            quality: None,
            relevance: None,
            comment: comment.into(),
            ai_generated: None,
            ai_confidence: None,
        }
    }

    pub fn validate(&self) -> EditorResult<()> {
        validate_confidence(self.ai_confidence)
    }
}

/// 问卷级批注（每份问卷至多一条）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyLevelAnnotation {
    #[serde(default)]
    pub overall_comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance: Option<ComplianceReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detected_labels: Vec<String>,
}

/// 合规检查结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub status: ComplianceStatus,
    #[serde(default)]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    NeedsReview,
    NonCompliant,
}

fn validate_confidence(confidence: Option<f64>) -> EditorResult<()> {
    match confidence {
        Some(c) if !(0.0..=1.0).contains(&c) => Err(EditorError::validation(format!(
            "AI 置信度 {} 超出范围 [0, 1]",
            c
        ))),
        _ => Ok(()),
    }
}

/// 批注种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationKind {
    Question,
    Section,
    Survey,
}

/// 被批注的实体引用
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityRef {
    Question(String),
    Section(SectionId),
    Survey,
}

impl EntityRef {
    pub fn question(id: impl Into<String>) -> Self {
        EntityRef::Question(id.into())
    }

    pub fn kind(&self) -> AnnotationKind {
        match self {
            EntityRef::Question(_) => AnnotationKind::Question,
            EntityRef::Section(_) => AnnotationKind::Section,
            EntityRef::Survey => AnnotationKind::Survey,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Question(id) => write!(f, "题目 {}", id),
            EntityRef::Section(id) => write!(f, "章节 #{}", id),
            EntityRef::Survey => write!(f, "问卷"),
        }
    }
}

/// 按实体查到的批注
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnnotationRef<'a> {
    Question(&'a QuestionAnnotation),
    Section(&'a SectionAnnotation),
    Survey(&'a SurveyLevelAnnotation),
}

impl AnnotationRef<'_> {
    pub fn cloned(self) -> Annotation {
        match self {
            AnnotationRef::Question(a) => Annotation::Question(a.clone()),
            AnnotationRef::Section(a) => Annotation::Section(a.clone()),
            AnnotationRef::Survey(a) => Annotation::Survey(a.clone()),
        }
    }
}

/// 批注（持有所有权）
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Question(QuestionAnnotation),
    Section(SectionAnnotation),
    Survey(SurveyLevelAnnotation),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_range() {
        assert!(Rating::new(1).is_ok());
        assert!(Rating::new(5).is_ok());
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
    }

    #[test]
    fn test_rating_validated_on_ingress() {
        let ok = r#"{"question_id": "q1", "quality": 4, "relevance": 5}"#;
        let parsed: QuestionAnnotation = serde_json::from_str(ok).unwrap();
        assert_eq!(parsed.quality.value(), 4);
        assert!(parsed.original_question_id.is_none());

        let bad = r#"{"question_id": "q1", "quality": 9, "relevance": 5}"#;
        assert!(serde_json::from_str::<QuestionAnnotation>(bad).is_err());
    }

    #[test]
    fn test_confidence_validation() {
        let mut annotation =
            QuestionAnnotation::new("q1", Rating::new(3).unwrap(), Rating::new(3).unwrap());
        annotation.ai_confidence = Some(0.7);
        assert!(annotation.validate().is_ok());

        annotation.ai_confidence = Some(1.4);
        assert!(annotation.validate().is_err());
    }
}
