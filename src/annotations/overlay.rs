//! 批注覆盖层
//!
//! 按实体 ID 存放质量批注，与文档结构相互独立：重排不会影响批注，
//! 删除实体后批注仍可查询。覆盖层只保存判断，不保存标题、选项、顺序等结构数据。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::error::{EditorError, EditorResult};
use crate::models::{
    AnnotationKind, AnnotationRef, EntityRef, QuestionAnnotation, SectionAnnotation,
    SectionId, Survey, SurveyLevelAnnotation,
};

/// upsert 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

/// 一份问卷的批注覆盖层，作为整体读取和保存
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationOverlay {
    #[serde(default)]
    pub question_annotations: Vec<QuestionAnnotation>,
    #[serde(default)]
    pub section_annotations: Vec<SectionAnnotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_annotation: Option<SurveyLevelAnnotation>,

    /// 来源边：新题目 ID → 原始题目 ID
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provenance: BTreeMap<String, String>,
}

impl AnnotationOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入题目批注
    ///
    /// 已存在同一题目的批注时原位替换；`original_question_id` 是来源指针，
    /// 新批注未显式提供时沿用旧值。新条目未提供时，从已记录的来源边补齐。
    pub fn upsert_question(&mut self, annotation: QuestionAnnotation) -> Upsert {
        let mut annotation = annotation;

        match self
            .question_annotations
            .iter_mut()
            .find(|a| a.question_id == annotation.question_id)
        {
            Some(existing) => {
                if annotation.original_question_id.is_none() {
                    annotation.original_question_id = existing.original_question_id.take();
                }
                *existing = annotation;
                Upsert::Replaced
            }
            None => {
                if annotation.original_question_id.is_none() {
                    annotation.original_question_id =
                        self.provenance.get(&annotation.question_id).cloned();
                }
                self.question_annotations.push(annotation);
                Upsert::Inserted
            }
        }
    }

    /// 写入章节批注
    pub fn upsert_section(&mut self, annotation: SectionAnnotation) -> Upsert {
        match self
            .section_annotations
            .iter_mut()
            .find(|a| a.section_id == annotation.section_id)
        {
            Some(existing) => {
                *existing = annotation;
                Upsert::Replaced
            }
            None => {
                self.section_annotations.push(annotation);
                Upsert::Inserted
            }
        }
    }

    /// 写入问卷级批注
    pub fn upsert_survey_level(&mut self, annotation: SurveyLevelAnnotation) -> Upsert {
        match self.survey_annotation.replace(annotation) {
            Some(_) => Upsert::Replaced,
            None => Upsert::Inserted,
        }
    }

    /// 按实体查找批注
    pub fn find(&self, entity: &EntityRef) -> Option<AnnotationRef<'_>> {
        match entity {
            EntityRef::Question(id) => self
                .question_annotations
                .iter()
                .find(|a| &a.question_id == id)
                .map(AnnotationRef::Question),
            EntityRef::Section(id) => self
                .section_annotations
                .iter()
                .find(|a| a.section_id == *id)
                .map(AnnotationRef::Section),
            EntityRef::Survey => self.survey_annotation.as_ref().map(AnnotationRef::Survey),
        }
    }

    pub fn question(&self, question_id: &str) -> Option<&QuestionAnnotation> {
        match self.find(&EntityRef::question(question_id)) {
            Some(AnnotationRef::Question(a)) => Some(a),
            _ => None,
        }
    }

    pub fn section(&self, section_id: SectionId) -> Option<&SectionAnnotation> {
        match self.find(&EntityRef::Section(section_id)) {
            Some(AnnotationRef::Section(a)) => Some(a),
            _ => None,
        }
    }

    /// 章节 ID 被后端改写后，把挂在临时 ID 上的章节批注迁过去
    pub fn rekey_section(&mut self, from: SectionId, to: SectionId) -> bool {
        match self
            .section_annotations
            .iter_mut()
            .find(|a| a.section_id == from)
        {
            Some(annotation) => {
                annotation.section_id = to;
                true
            }
            None => false,
        }
    }

    /// 记录题目重新生成的来源边（旧 ID → 新 ID）
    ///
    /// 如果旧题目本身也是重新生成的，来源指向最初的那道题。
    pub fn record_provenance(&mut self, old_id: &str, new_id: &str) {
        if old_id == new_id {
            return;
        }
        let root = self
            .provenance
            .get(old_id)
            .cloned()
            .unwrap_or_else(|| old_id.to_string());

        debug!("记录来源: {} → {} (原始: {})", old_id, new_id, root);
        self.provenance.insert(new_id.to_string(), root);
    }

    pub fn provenance_of(&self, question_id: &str) -> Option<&str> {
        self.provenance.get(question_id).map(String::as_str)
    }

    /// 引用的实体已不在文档中的批注
    ///
    /// 这类批注会被保留，只是不再挂在任何结构上。
    pub fn orphans(&self, survey: &Survey) -> Vec<EntityRef> {
        let question_ids: HashSet<&str> = survey.all_questions().map(|q| q.id.as_str()).collect();
        let section_ids: HashSet<SectionId> = survey.sections.iter().map(|s| s.id).collect();

        let questions = self
            .question_annotations
            .iter()
            .filter(|a| !question_ids.contains(a.question_id.as_str()))
            .map(|a| EntityRef::question(&a.question_id));

        let sections = self
            .section_annotations
            .iter()
            .filter(|a| !section_ids.contains(&a.section_id))
            .map(|a| EntityRef::Section(a.section_id));

        questions.chain(sections).collect()
    }

    /// 入口校验：每个实体至多一条批注，置信度在范围内
    pub fn validate(&self) -> EditorResult<()> {
        let mut question_ids = HashSet::new();
        for annotation in &self.question_annotations {
            if !question_ids.insert(annotation.question_id.as_str()) {
                return Err(EditorError::validation(format!(
                    "题目 {} 有多条批注",
                    annotation.question_id
                )));
            }
            annotation.validate()?;
        }

        let mut section_ids = HashSet::new();
        for annotation in &self.section_annotations {
            if !section_ids.insert(annotation.section_id) {
                return Err(EditorError::validation(format!(
                    "章节 {} 有多条批注",
                    annotation.section_id
                )));
            }
            annotation.validate()?;
        }

        Ok(())
    }

    pub fn count(&self, kind: AnnotationKind) -> usize {
        match kind {
            AnnotationKind::Question => self.question_annotations.len(),
            AnnotationKind::Section => self.section_annotations.len(),
            AnnotationKind::Survey => usize::from(self.survey_annotation.is_some()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.question_annotations.is_empty()
            && self.section_annotations.is_empty()
            && self.survey_annotation.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Question, QuestionType, Rating, Section};

    fn rating(value: u8) -> Rating {
        Rating::new(value).unwrap()
    }

    fn annotation(question_id: &str, quality: u8) -> QuestionAnnotation {
        QuestionAnnotation::new(question_id, rating(quality), rating(4))
    }

    #[test]
    fn test_validate_rejects_duplicate_entries() {
        let mut overlay = AnnotationOverlay::new();
        overlay.upsert_question(annotation("q1", 3));
        assert!(overlay.validate().is_ok());

        overlay.question_annotations.push(annotation("q1", 2));
        assert!(matches!(
            overlay.validate(),
            Err(EditorError::Validation { .. })
        ));
    }

    #[test]
    fn test_validate_checks_confidence() {
        let mut overlay = AnnotationOverlay::new();
        let mut section = SectionAnnotation::new(1, "过长");
        section.ai_confidence = Some(1.5);
        overlay.upsert_section(section);

        assert!(overlay.validate().is_err());
    }

    #[test]
    fn test_second_save_replaces_and_keeps_provenance() {
        let mut overlay = AnnotationOverlay::new();

        let mut first = annotation("q7", 2);
        first.original_question_id = Some("q3".to_string());
        assert_eq!(overlay.upsert_question(first), Upsert::Inserted);

        let second = annotation("q7", 5);
        assert_eq!(overlay.upsert_question(second), Upsert::Replaced);

        assert_eq!(overlay.question_annotations.len(), 1);
        let stored = overlay.question("q7").unwrap();
        assert_eq!(stored.quality.value(), 5);
        assert_eq!(stored.original_question_id.as_deref(), Some("q3"));
    }

    #[test]
    fn test_explicit_original_id_overrides() {
        let mut overlay = AnnotationOverlay::new();

        let mut first = annotation("q7", 2);
        first.original_question_id = Some("q3".to_string());
        overlay.upsert_question(first);

        let mut second = annotation("q7", 3);
        second.original_question_id = Some("q1".to_string());
        overlay.upsert_question(second);

        assert_eq!(
            overlay.question("q7").unwrap().original_question_id.as_deref(),
            Some("q1")
        );
    }

    #[test]
    fn test_provenance_edge_fills_new_entry() {
        let mut overlay = AnnotationOverlay::new();
        overlay.record_provenance("q1", "q1-v2");
        overlay.record_provenance("q1-v2", "q1-v3");

        assert_eq!(overlay.provenance_of("q1-v3"), Some("q1"));

        overlay.upsert_question(annotation("q1-v3", 4));
        assert_eq!(
            overlay.question("q1-v3").unwrap().original_question_id.as_deref(),
            Some("q1")
        );
    }

    #[test]
    fn test_section_and_survey_upsert() {
        let mut overlay = AnnotationOverlay::new();

        assert_eq!(overlay.upsert_section(SectionAnnotation::new(1, "太长")), Upsert::Inserted);
        assert_eq!(overlay.upsert_section(SectionAnnotation::new(1, "已缩短")), Upsert::Replaced);
        assert_eq!(overlay.count(AnnotationKind::Section), 1);
        assert_eq!(overlay.section(1).unwrap().comment, "已缩短");

        let survey_level = SurveyLevelAnnotation {
            overall_comment: "结构清晰".to_string(),
            ..Default::default()
        };
        assert_eq!(overlay.upsert_survey_level(survey_level.clone()), Upsert::Inserted);
        assert_eq!(overlay.upsert_survey_level(survey_level), Upsert::Replaced);
        assert!(matches!(
            overlay.find(&EntityRef::Survey),
            Some(AnnotationRef::Survey(_))
        ));
    }

    #[test]
    fn test_orphans_are_retained_and_reported() {
        let mut survey = Survey::new("s1", "问卷");
        let mut section = Section::new(1, "A", 1);
        section
            .questions
            .push(Question::new("q1", "题目", QuestionType::OpenText));
        survey.sections.push(section);

        let mut overlay = AnnotationOverlay::new();
        overlay.upsert_question(annotation("q1", 3));
        overlay.upsert_question(annotation("q-deleted", 3));
        overlay.upsert_section(SectionAnnotation::new(9, "旧章节"));

        let orphans = overlay.orphans(&survey);
        assert_eq!(
            orphans,
            vec![EntityRef::question("q-deleted"), EntityRef::Section(9)]
        );
        assert!(overlay.find(&EntityRef::question("q-deleted")).is_some());
    }

    #[test]
    fn test_overlay_roundtrips_as_one_aggregate() {
        let mut overlay = AnnotationOverlay::new();
        overlay.upsert_question(annotation("q1", 3));
        overlay.record_provenance("q0", "q1");

        let json = serde_json::to_string(&overlay).unwrap();
        let parsed: AnnotationOverlay = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, overlay);

        let empty: AnnotationOverlay = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }
}
