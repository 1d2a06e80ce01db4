//! 进度通道消息
//!
//! 长时间任务通过消息报告进度：`progress` / `completed` / `error`。
//! 消息在入口处解析并校验，之后只以强类型使用。

use serde::{Deserialize, Serialize};

use crate::error::{EditorError, EditorResult};
use crate::models::ReportedOutcome;

/// 进度事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress {
        survey_id: String,
        /// 0–100
        percent: u8,
        #[serde(default)]
        message: String,
    },
    Completed {
        survey_id: String,
        /// 后端可选地报告是否被跳过
        #[serde(default)]
        skipped: bool,
    },
    Error {
        survey_id: String,
        message: String,
    },
}

impl ProgressEvent {
    /// 解析并校验一条原始消息
    pub fn parse(raw: &str) -> EditorResult<Self> {
        let event: ProgressEvent = serde_json::from_str(raw)
            .map_err(|e| EditorError::validation(format!("无法解析进度消息: {}", e)))?;
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> EditorResult<()> {
        if self.survey_id().trim().is_empty() {
            return Err(EditorError::validation("进度消息缺少 survey_id"));
        }
        if let ProgressEvent::Progress { percent, .. } = self {
            if *percent > 100 {
                return Err(EditorError::validation(format!(
                    "进度百分比 {} 超出范围",
                    percent
                )));
            }
        }
        Ok(())
    }

    pub fn survey_id(&self) -> &str {
        match self {
            ProgressEvent::Progress { survey_id, .. }
            | ProgressEvent::Completed { survey_id, .. }
            | ProgressEvent::Error { survey_id, .. } => survey_id,
        }
    }

    /// 该事件对应的"评估中"标记
    pub fn evaluating(&self) -> bool {
        matches!(self, ProgressEvent::Progress { .. })
    }

    /// 结束事件携带的明确结果
    pub fn outcome(&self) -> Option<ReportedOutcome> {
        match self {
            ProgressEvent::Progress { .. } => None,
            ProgressEvent::Completed { skipped: true, .. } => Some(ReportedOutcome::Skipped),
            ProgressEvent::Completed { .. } => Some(ReportedOutcome::Succeeded),
            ProgressEvent::Error { message, .. } => Some(ReportedOutcome::Failed {
                reason: message.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_events() {
        let progress =
            ProgressEvent::parse(r#"{"type": "progress", "survey_id": "S1", "percent": 40}"#)
                .unwrap();
        assert!(progress.evaluating());
        assert_eq!(progress.outcome(), None);

        let done = ProgressEvent::parse(r#"{"type": "completed", "survey_id": "S1"}"#).unwrap();
        assert_eq!(done.outcome(), Some(ReportedOutcome::Succeeded));

        let failed =
            ProgressEvent::parse(r#"{"type": "error", "survey_id": "S1", "message": "超时"}"#)
                .unwrap();
        assert!(matches!(failed.outcome(), Some(ReportedOutcome::Failed { .. })));
    }

    #[test]
    fn test_parse_rejects_invalid_events() {
        let overflow = r#"{"type": "progress", "survey_id": "S1", "percent": 140}"#;
        assert!(ProgressEvent::parse(overflow).is_err());
        assert!(ProgressEvent::parse(r#"{"type": "completed", "survey_id": " "}"#).is_err());
        assert!(ProgressEvent::parse(r#"{"type": "paused", "survey_id": "S1"}"#).is_err());
    }
}
