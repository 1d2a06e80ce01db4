//! 操作序号
//!
//! 每个发往后端的修改都带一个会话内单调递增的序号，按同步键记录最新序号。
//! 响应回来时，只有序号仍是该键最新的那次才会被采用，
//! 以此丢弃乱序到达的旧响应。

use std::collections::HashMap;

use crate::models::{QuestionScope, SectionId};

/// 同步键：同一个键上的写入互相覆盖
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SyncKey {
    /// 章节的创建 / 删除
    Section(SectionId),
    /// 章节标题、描述
    SectionMetadata(SectionId),
    /// 章节顺序
    SectionOrder,
    /// 某个范围内的题目列表（增删、排序、整体替换）
    QuestionList(QuestionScope),
    /// 单道题的内容
    Question(String),
    /// 批注覆盖层
    Annotations,
}

/// 一次已发出的写入
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub key: SyncKey,
    pub seq: u64,
}

/// 序号分配器
#[derive(Debug, Default)]
pub struct SequenceTracker {
    next: u64,
    latest: HashMap<SyncKey, u64>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为某个键分配新序号
    pub fn issue(&mut self, key: SyncKey) -> Ticket {
        self.next += 1;
        self.latest.insert(key.clone(), self.next);
        Ticket { key, seq: self.next }
    }

    /// 该凭证是否仍是其键上最新的写入
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.latest.get(&ticket.key) == Some(&ticket.seq)
    }

    /// 作废所有未完成的写入（取消编辑时使用）
    pub fn invalidate_all(&mut self) {
        self.latest.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_later_ticket_supersedes_same_key() {
        let mut tracker = SequenceTracker::new();

        let first = tracker.issue(SyncKey::SectionOrder);
        let other = tracker.issue(SyncKey::Question("q1".to_string()));
        let second = tracker.issue(SyncKey::SectionOrder);

        assert!(!tracker.is_current(&first));
        assert!(tracker.is_current(&second));
        assert!(tracker.is_current(&other));
        assert!(second.seq > first.seq);
    }

    #[test]
    fn test_invalidate_all_makes_everything_stale() {
        let mut tracker = SequenceTracker::new();
        let ticket = tracker.issue(SyncKey::Annotations);

        tracker.invalidate_all();

        assert!(!tracker.is_current(&ticket));
        let next = tracker.issue(SyncKey::Annotations);
        assert!(next.seq > ticket.seq);
    }
}
