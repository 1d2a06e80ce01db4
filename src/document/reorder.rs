//! 排序引擎
//!
//! 纯函数：根据一次移动计算新的排列，并重新编号 `order` 字段，
//! 保证每次调用后顺序值都是从 1 开始的连续序列。实体 ID 永远不变。

use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;

use crate::error::{EditorError, EditorResult};
use crate::models::{EntityRef, Question, QuestionScope, Section, SectionId, Survey};

/// 移动方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}

/// 带位置字段的实体
pub trait Positioned {
    type Id: PartialEq + Eq + Hash + Clone + Display;

    fn position_id(&self) -> &Self::Id;
    fn set_order(&mut self, order: u32);
}

impl Positioned for Section {
    type Id = SectionId;

    fn position_id(&self) -> &SectionId {
        &self.id
    }

    fn set_order(&mut self, order: u32) {
        self.order = order;
    }
}

impl Positioned for Question {
    type Id = String;

    fn position_id(&self) -> &String {
        &self.id
    }

    fn set_order(&mut self, order: u32) {
        self.order = order;
    }
}

/// 一次移动的结果
///
/// 越界移动（第一个上移、最后一个下移）是合法的空操作：
/// `changed == false`，列表原样返回。
#[derive(Debug, Clone, PartialEq)]
pub struct Reordered<T> {
    pub items: Vec<T>,
    pub changed: bool,
}

/// 题目移动的结果，附带所在范围
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionMove {
    pub scope: QuestionScope,
    pub questions: Vec<Question>,
    pub changed: bool,
}

impl QuestionMove {
    pub fn question_ids(&self) -> Vec<String> {
        self.questions.iter().map(|q| q.id.clone()).collect()
    }
}

/// 按当前下标重新编号（从 1 开始）
pub fn renumber<T: Positioned>(items: &mut [T]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.set_order(index as u32 + 1);
    }
}

/// 与相邻项交换位置；找不到 ID 时返回 `None`
pub fn move_item<T: Positioned + Clone>(
    items: &[T],
    id: &T::Id,
    direction: Direction,
) -> Option<Reordered<T>> {
    let index = items.iter().position(|item| item.position_id() == id)?;

    let target = match direction {
        Direction::Up => index.checked_sub(1),
        Direction::Down => Some(index + 1).filter(|t| *t < items.len()),
    };

    let Some(target) = target else {
        return Some(Reordered {
            items: items.to_vec(),
            changed: false,
        });
    };

    let mut reordered = items.to_vec();
    reordered.swap(index, target);
    renumber(&mut reordered);

    Some(Reordered {
        items: reordered,
        changed: true,
    })
}

/// 上移 / 下移一个章节
pub fn move_section(
    survey: &Survey,
    section_id: SectionId,
    direction: Direction,
) -> EditorResult<Reordered<Section>> {
    move_item(&survey.sections, &section_id, direction)
        .ok_or_else(|| EditorError::not_found(EntityRef::Section(section_id)))
}

/// 在所属章节（或扁平列表）内上移 / 下移一道题；不支持跨章节移动
pub fn move_question(
    survey: &Survey,
    question_id: &str,
    direction: Direction,
) -> EditorResult<QuestionMove> {
    let id = question_id.to_string();

    for section in &survey.sections {
        if let Some(moved) = move_item(&section.questions, &id, direction) {
            return Ok(QuestionMove {
                scope: QuestionScope::Section(section.id),
                questions: moved.items,
                changed: moved.changed,
            });
        }
    }

    move_item(&survey.questions, &id, direction)
        .map(|moved| QuestionMove {
            scope: QuestionScope::Flat,
            questions: moved.items,
            changed: moved.changed,
        })
        .ok_or_else(|| EditorError::not_found(EntityRef::Question(id)))
}

/// 按完整 ID 列表重排章节（例如拖拽结果）
pub fn apply_section_order(survey: &Survey, ids: &[SectionId]) -> EditorResult<Vec<Section>> {
    apply_order(&survey.sections, ids)
}

/// 按完整 ID 列表重排某个范围内的题目
pub fn apply_question_order(
    survey: &Survey,
    scope: QuestionScope,
    ids: &[String],
) -> EditorResult<Vec<Question>> {
    let current = match scope {
        QuestionScope::Section(section_id) => {
            &survey
                .section(section_id)
                .ok_or_else(|| EditorError::not_found(EntityRef::Section(section_id)))?
                .questions
        }
        QuestionScope::Flat => &survey.questions,
    };

    apply_order(current, ids)
}

fn apply_order<T: Positioned + Clone>(items: &[T], ids: &[T::Id]) -> EditorResult<Vec<T>> {
    let current: Vec<T::Id> = items.iter().map(|i| i.position_id().clone()).collect();
    check_order_list(&current, ids)?;

    let mut reordered: Vec<T> = ids
        .iter()
        .filter_map(|id| items.iter().find(|i| i.position_id() == id).cloned())
        .collect();
    renumber(&mut reordered);

    Ok(reordered)
}

/// 校验排序列表是当前 ID 集合的一个排列
pub fn check_order_list<Id>(current: &[Id], proposed: &[Id]) -> EditorResult<()>
where
    Id: Eq + Hash + Display,
{
    if current.len() != proposed.len() {
        return Err(EditorError::validation(format!(
            "排序列表长度不匹配: 期望 {}，实际 {}",
            current.len(),
            proposed.len()
        )));
    }

    let known: HashSet<&Id> = current.iter().collect();
    let mut seen = HashSet::with_capacity(proposed.len());

    for id in proposed {
        if !known.contains(id) {
            return Err(EditorError::validation(format!("排序列表包含未知 ID: {}", id)));
        }
        if !seen.insert(id) {
            return Err(EditorError::validation(format!("排序列表包含重复 ID: {}", id)));
        }
    }

    Ok(())
}
