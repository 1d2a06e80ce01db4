use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{EditorError, EditorResult};
use crate::models::score::ScoreState;

/// 章节 ID（问卷内唯一）
pub type SectionId = u32;

/// 问卷：文档模型的根聚合
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    pub id: String,
    pub title: String,

    #[serde(default)]
    pub sections: Vec<Section>,

    /// 旧版扁平题目列表（无章节模式）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<Question>,

    /// 质量评分快照，`null` 表示尚未评估
    #[serde(default, rename = "pillar_scores")]
    pub score: ScoreState,

    /// 导入来源文档
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceDocument>,
}

/// 问卷结构模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurveyLayout {
    /// 章节 → 题目
    Sectioned,
    /// 旧版扁平题目列表
    Flat,
}

impl Survey {
    /// 创建空问卷
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            sections: Vec::new(),
            questions: Vec::new(),
            score: ScoreState::NotEvaluated,
            source: None,
        }
    }

    /// 检测问卷使用章节模式还是扁平模式
    ///
    /// 没有章节、但存在扁平题目时为扁平模式；空问卷视为章节模式。
    pub fn layout(&self) -> SurveyLayout {
        if self.sections.is_empty() && !self.questions.is_empty() {
            SurveyLayout::Flat
        } else {
            SurveyLayout::Sectioned
        }
    }

    pub fn section(&self, section_id: SectionId) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == section_id)
    }

    pub fn section_ids(&self) -> Vec<SectionId> {
        self.sections.iter().map(|s| s.id).collect()
    }

    /// 遍历问卷中的所有题目（所有章节 + 扁平列表）
    pub fn all_questions(&self) -> impl Iterator<Item = &Question> {
        self.sections
            .iter()
            .flat_map(|s| s.questions.iter())
            .chain(self.questions.iter())
    }

    pub fn contains_question(&self, question_id: &str) -> bool {
        self.all_questions().any(|q| q.id == question_id)
    }

    pub fn question_count(&self) -> usize {
        self.all_questions().count()
    }

    /// 下一个可用的章节 ID
    pub fn next_section_id(&self) -> SectionId {
        self.sections.iter().map(|s| s.id).max().unwrap_or(0) + 1
    }

    /// 入口校验：章节 ID、题目 ID 在问卷内唯一，评分有效
    pub fn validate(&self) -> EditorResult<()> {
        let mut section_ids = HashSet::new();
        for section in &self.sections {
            if !section_ids.insert(section.id) {
                return Err(EditorError::validation(format!(
                    "问卷 {} 中章节 ID {} 重复",
                    self.id, section.id
                )));
            }
        }

        let mut question_ids = HashSet::new();
        for question in self.all_questions() {
            if !question_ids.insert(question.id.as_str()) {
                return Err(EditorError::validation(format!(
                    "问卷 {} 中题目 ID {} 重复",
                    self.id, question.id
                )));
            }
        }

        match self.score.snapshot() {
            Some(snapshot) => snapshot.validate(),
            None => Ok(()),
        }
    }
}

/// 问卷导入来源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// 章节
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    pub order: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro_text: Option<TextBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closing_text: Option<TextBlock>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_blocks: Vec<TextBlock>,

    /// 抽样方案，原样透传
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_plan: Option<serde_json::Value>,
}

impl Section {
    pub fn new(id: SectionId, title: impl Into<String>, order: u32) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            questions: Vec::new(),
            order,
            intro_text: None,
            closing_text: None,
            text_blocks: Vec::new(),
            sample_plan: None,
        }
    }

    pub fn question_ids(&self) -> Vec<String> {
        self.questions.iter().map(|q| q.id.clone()).collect()
    }
}

/// 独立文本块（引导语、结束语、说明）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
}

/// 题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,

    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub order: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methodology: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
}

impl Question {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        question_type: QuestionType,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            question_type,
            options: Vec::new(),
            category: String::new(),
            order: 0,
            methodology: None,
            labels: Vec::new(),
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

/// 题型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// 单选
    MultipleChoice,
    /// 多选
    MultipleSelect,
    /// 量表 / 李克特
    #[serde(alias = "likert")]
    Scale,
    /// 矩阵量表
    MatrixLikert,
    /// 常量和
    ConstantSum,
    /// Gabor-Granger 价格阶梯
    GaborGranger,
    /// 数值开放题
    NumericOpen,
    /// 数值网格
    NumericGrid,
    /// 排序
    Ranking,
    /// 说明（不作答）
    Instruction,
    /// 文本开放题
    OpenText,
    /// 未识别的题型标签
    #[serde(other)]
    Other,
}

/// 题目所在范围：某个章节，或旧版扁平列表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QuestionScope {
    Section(SectionId),
    Flat,
}

impl QuestionScope {
    pub fn section_id(self) -> Option<SectionId> {
        match self {
            QuestionScope::Section(id) => Some(id),
            QuestionScope::Flat => None,
        }
    }
}

impl std::fmt::Display for QuestionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuestionScope::Section(id) => write!(f, "章节 #{}", id),
            QuestionScope::Flat => write!(f, "扁平题目列表"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_detection() {
        let mut survey = Survey::new("s1", "测试问卷");
        assert_eq!(survey.layout(), SurveyLayout::Sectioned);

        survey
            .questions
            .push(Question::new("q1", "你多大了？", QuestionType::NumericOpen));
        assert_eq!(survey.layout(), SurveyLayout::Flat);

        survey.sections.push(Section::new(1, "基本信息", 1));
        assert_eq!(survey.layout(), SurveyLayout::Sectioned);
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let mut survey = Survey::new("s1", "测试问卷");
        let mut first = Section::new(1, "基本信息", 1);
        first
            .questions
            .push(Question::new("q1", "你多大了？", QuestionType::NumericOpen));
        survey.sections.push(first);
        assert!(survey.validate().is_ok());

        let mut second = Section::new(2, "饮水习惯", 2);
        second
            .questions
            .push(Question::new("q1", "每天喝几杯水？", QuestionType::NumericOpen));
        survey.sections.push(second);
        assert!(survey.validate().is_err());

        survey.sections[1].questions[0].id = "q2".to_string();
        survey.sections[1].id = 1;
        assert!(survey.validate().is_err());
    }

    #[test]
    fn test_question_type_wire_tags() {
        let parsed: QuestionType = serde_json::from_str("\"gabor_granger\"").unwrap();
        assert_eq!(parsed, QuestionType::GaborGranger);

        let alias: QuestionType = serde_json::from_str("\"likert\"").unwrap();
        assert_eq!(alias, QuestionType::Scale);

        let unknown: QuestionType = serde_json::from_str("\"heatmap\"").unwrap();
        assert_eq!(unknown, QuestionType::Other);
    }

    #[test]
    fn test_survey_deserializes_without_scores() {
        let json = r#"{
            "id": "s1",
            "title": "品牌认知",
            "sections": [{
                "id": 1,
                "title": "筛选",
                "order": 1,
                "questions": [{"id": "q1", "text": "性别", "type": "multiple_choice", "options": ["男", "女"], "order": 1}]
            }],
            "pillar_scores": null
        }"#;

        let survey: Survey = serde_json::from_str(json).unwrap();
        assert_eq!(survey.sections[0].questions[0].options.len(), 2);
        assert_eq!(survey.score, ScoreState::NotEvaluated);
        assert_eq!(survey.next_section_id(), 2);
    }
}
