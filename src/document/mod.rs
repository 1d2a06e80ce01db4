//! 文档模型 - 结构操作
//!
//! 所有操作都接收 `&Survey` 并返回新的 `Survey` 值，
//! 便于同步层比较修改前后的状态。失败的操作不会留下部分修改。

pub mod reorder;

use tracing::debug;

use crate::error::{EditorError, EditorResult};
use crate::models::{
    EntityRef, Question, QuestionPatch, QuestionScope, ScoreState, Section, SectionDraft,
    SectionId, SectionMetadata, Survey, SurveyLayout,
};

pub use reorder::{Direction, QuestionMove, Reordered};

/// 规范化从后端加载的问卷：章节与题目按 `order` 稳定排序后重新编号为 1..n
pub fn normalize(survey: Survey) -> Survey {
    let mut next = survey;

    next.sections.sort_by_key(|s| s.order);
    reorder::renumber(&mut next.sections);
    for section in &mut next.sections {
        section.questions.sort_by_key(|q| q.order);
        reorder::renumber(&mut section.questions);
    }
    next.questions.sort_by_key(|q| q.order);
    reorder::renumber(&mut next.questions);

    next
}

/// 追加一个新章节
///
/// 扁平模式的问卷会在此时转换为章节模式：已有题目按原顺序迁入新章节，
/// 扁平列表被清空。
pub fn add_section(survey: &Survey, draft: SectionDraft) -> (Survey, Section) {
    let mut next = survey.clone();

    let mut section = Section::new(
        next.next_section_id(),
        draft.title,
        next.sections.len() as u32 + 1,
    );
    section.description = draft.description;

    if next.layout() == SurveyLayout::Flat {
        debug!(
            "问卷 {} 从扁平模式转换为章节模式，迁移 {} 道题",
            next.id,
            next.questions.len()
        );
        section.questions = std::mem::take(&mut next.questions);
        reorder::renumber(&mut section.questions);
    }

    next.sections.push(section);
    reorder::renumber(&mut next.sections);

    let created = next.sections[next.sections.len() - 1].clone();

    (next, created)
}

/// 删除章节，剩余章节重新编号
///
/// 不会级联删除批注。
pub fn delete_section(survey: &Survey, section_id: SectionId) -> EditorResult<Survey> {
    let index = section_index(survey, section_id)?;

    let mut next = survey.clone();
    next.sections.remove(index);
    reorder::renumber(&mut next.sections);

    Ok(next)
}

/// 向章节末尾添加题目
pub fn add_question_to_section(
    survey: &Survey,
    section_id: SectionId,
    question: Question,
) -> EditorResult<(Survey, Question)> {
    let index = section_index(survey, section_id)?;

    if survey.contains_question(&question.id) {
        return Err(EditorError::validation(format!(
            "题目 ID {} 在问卷中已存在",
            question.id
        )));
    }

    let mut next = survey.clone();
    let questions = &mut next.sections[index].questions;

    let mut question = question;
    question.order = questions.len() as u32 + 1;
    questions.push(question.clone());

    Ok((next, question))
}

/// 更新题目（跨所有章节或扁平列表查找）
pub fn update_question(
    survey: &Survey,
    question_id: &str,
    patch: &QuestionPatch,
) -> EditorResult<(Survey, Question)> {
    let mut next = survey.clone();

    let question = find_question_mut(&mut next, question_id)
        .ok_or_else(|| EditorError::not_found(EntityRef::question(question_id)))?;
    patch.apply_to(question);
    let updated = question.clone();

    Ok((next, updated))
}

/// 只更新章节标题和描述，不影响题目顺序
pub fn update_section_metadata(
    survey: &Survey,
    section_id: SectionId,
    metadata: &SectionMetadata,
) -> EditorResult<Survey> {
    let index = section_index(survey, section_id)?;

    let mut next = survey.clone();
    let section = &mut next.sections[index];
    if let Some(title) = &metadata.title {
        section.title = title.clone();
    }
    if let Some(description) = &metadata.description {
        section.description = description.clone();
    }

    Ok(next)
}

/// 用新 ID 的题目替换旧题目（重新生成），位置与顺序保持不变
///
/// 旧 ID → 新 ID 的来源关系由调用方记录到批注层。
pub fn replace_question(
    survey: &Survey,
    old_id: &str,
    replacement: Question,
) -> EditorResult<(Survey, QuestionScope)> {
    if replacement.id != old_id && survey.contains_question(&replacement.id) {
        return Err(EditorError::validation(format!(
            "题目 ID {} 在问卷中已存在",
            replacement.id
        )));
    }

    let mut next = survey.clone();
    let scope = find_question(survey, old_id)
        .map(|(scope, _)| scope)
        .ok_or_else(|| EditorError::not_found(EntityRef::question(old_id)))?;

    let slot = find_question_mut(&mut next, old_id)
        .ok_or_else(|| EditorError::not_found(EntityRef::question(old_id)))?;
    let order = slot.order;
    *slot = replacement;
    slot.order = order;

    Ok((next, scope))
}

/// 合并评分，结构内容保持不变
pub fn merge_score(survey: &Survey, score: ScoreState) -> Survey {
    Survey {
        score,
        ..survey.clone()
    }
}

/// 查找题目及其所在范围
pub fn find_question<'a>(
    survey: &'a Survey,
    question_id: &str,
) -> Option<(QuestionScope, &'a Question)> {
    survey
        .sections
        .iter()
        .find_map(|s| {
            s.questions
                .iter()
                .find(|q| q.id == question_id)
                .map(|q| (QuestionScope::Section(s.id), q))
        })
        .or_else(|| {
            survey
                .questions
                .iter()
                .find(|q| q.id == question_id)
                .map(|q| (QuestionScope::Flat, q))
        })
}

/// 某个范围内的题目列表
pub fn questions_in_scope(survey: &Survey, scope: QuestionScope) -> EditorResult<&[Question]> {
    match scope {
        QuestionScope::Section(section_id) => survey
            .section(section_id)
            .map(|s| s.questions.as_slice())
            .ok_or_else(|| EditorError::not_found(EntityRef::Section(section_id))),
        QuestionScope::Flat => Ok(&survey.questions),
    }
}

/// 用新列表替换某个范围内的题目
pub fn set_questions_in_scope(
    survey: &Survey,
    scope: QuestionScope,
    questions: Vec<Question>,
) -> EditorResult<Survey> {
    let mut next = survey.clone();
    match scope {
        QuestionScope::Section(section_id) => {
            let index = section_index(survey, section_id)?;
            next.sections[index].questions = questions;
        }
        QuestionScope::Flat => next.questions = questions,
    }
    Ok(next)
}

fn section_index(survey: &Survey, section_id: SectionId) -> EditorResult<usize> {
    survey
        .sections
        .iter()
        .position(|s| s.id == section_id)
        .ok_or_else(|| EditorError::not_found(EntityRef::Section(section_id)))
}

fn find_question_mut<'a>(survey: &'a mut Survey, question_id: &str) -> Option<&'a mut Question> {
    survey
        .sections
        .iter_mut()
        .flat_map(|s| s.questions.iter_mut())
        .chain(survey.questions.iter_mut())
        .find(|q| q.id == question_id)
}
