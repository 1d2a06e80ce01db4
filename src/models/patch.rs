//! 部分更新（patch）载荷
//!
//! patch 不能修改实体 ID 和排序字段。

use serde::{Deserialize, Serialize};

use crate::models::survey::{Question, QuestionType};

/// 题目部分更新
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub question_type: Option<QuestionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methodology: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

impl QuestionPatch {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// 将 patch 应用到题目上
    pub fn apply_to(&self, question: &mut Question) {
        if let Some(text) = &self.text {
            question.text = text.clone();
        }
        if let Some(question_type) = self.question_type {
            question.question_type = question_type;
        }
        if let Some(options) = &self.options {
            question.options = options.clone();
        }
        if let Some(category) = &self.category {
            question.category = category.clone();
        }
        if let Some(methodology) = &self.methodology {
            question.methodology = Some(methodology.clone());
        }
        if let Some(labels) = &self.labels {
            question.labels = labels.clone();
        }
    }
}

/// 章节元数据（标题、描述）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SectionMetadata {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: None,
        }
    }
}

/// 章节部分更新，可携带完整题目数组
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionPatch {
    #[serde(flatten)]
    pub metadata: SectionMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<Question>>,
}

impl SectionPatch {
    pub fn metadata(metadata: SectionMetadata) -> Self {
        Self {
            metadata,
            questions: None,
        }
    }

    pub fn questions(questions: Vec<Question>) -> Self {
        Self {
            metadata: SectionMetadata::default(),
            questions: Some(questions),
        }
    }
}

/// 新建章节的草稿
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionDraft {
    pub title: String,
    pub description: String,
}

impl SectionDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
        }
    }
}
