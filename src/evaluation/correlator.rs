//! 评估关联器
//!
//! 按问卷 ID 跟踪异步质量评估任务。关联器本身不轮询任务状态，
//! 只观察外部报告的"评估中"标记从 true 变为 false 的那一刻，
//! 再由会话拉取最新评分并合并进文档。

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::{EditorError, EditorResult};
use crate::models::{EvaluationStatus, PillarScoreSnapshot, ReportedOutcome, ScoreState};

/// true → false 边沿产生的结算凭证
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleTicket {
    pub survey_id: String,
    cycle: u64,
}

impl SettleTicket {
    pub fn cycle(&self) -> u64 {
        self.cycle
    }
}

/// 结算结果：终态以及要合并进文档的评分
///
/// `score` 为 `None` 时保留文档中原有的评分（评估失败不会抹掉上一轮结果）。
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub status: EvaluationStatus,
    pub score: Option<ScoreState>,
}

#[derive(Debug, Clone, Default)]
struct EvaluationJob {
    status: EvaluationStatus,
    /// 每次进入评估中状态加一，用来识别过期的结算
    cycle: u64,
}

/// 评估关联器
#[derive(Debug, Default)]
pub struct EvaluationCorrelator {
    jobs: HashMap<String, EvaluationJob>,
    /// 后端未提供明确状态时是否报错
    require_status: bool,
}

impl EvaluationCorrelator {
    pub fn new(require_status: bool) -> Self {
        Self {
            jobs: HashMap::new(),
            require_status,
        }
    }

    /// 进入评估中状态，返回本轮编号
    pub fn trigger(&mut self, survey_id: &str) -> u64 {
        let job = self.jobs.entry(survey_id.to_string()).or_default();
        job.status = EvaluationStatus::Evaluating;
        job.cycle += 1;
        info!("🧪 问卷 {} 开始质量评估 (第 {} 轮)", survey_id, job.cycle);
        job.cycle
    }

    /// 观察外部报告的评估标记
    ///
    /// 只有 true → false 的边沿返回结算凭证；
    /// false → true（例如在别处触发的评估）进入评估中状态。
    pub fn observe(&mut self, survey_id: &str, evaluating: bool) -> Option<SettleTicket> {
        let was_evaluating = self.is_evaluating(survey_id);

        match (was_evaluating, evaluating) {
            (true, false) => {
                let job = self.jobs.get(survey_id)?;
                debug!("问卷 {} 评估标记已清除，准备结算", survey_id);
                Some(SettleTicket {
                    survey_id: survey_id.to_string(),
                    cycle: job.cycle,
                })
            }
            (false, true) => {
                self.trigger(survey_id);
                None
            }
            _ => None,
        }
    }

    /// 结算一次评估
    ///
    /// 有明确状态时直接采用；否则有评分视为完成，无评分视为跳过
    /// （`require_status` 打开时返回 `AmbiguousEvaluationOutcome`）。
    /// 过期凭证（期间又触发了新一轮评估）返回 `Ok(None)`。
    pub fn resolve(
        &mut self,
        ticket: &SettleTicket,
        reported: Option<ReportedOutcome>,
        snapshot: Option<PillarScoreSnapshot>,
    ) -> EditorResult<Option<Resolution>> {
        let Some(job) = self.jobs.get_mut(&ticket.survey_id) else {
            return Ok(None);
        };

        if job.cycle != ticket.cycle || !job.status.is_evaluating() {
            debug!(
                "问卷 {} 的结算凭证已过期 (凭证第 {} 轮, 当前第 {} 轮)",
                ticket.survey_id, ticket.cycle, job.cycle
            );
            return Ok(None);
        }

        if let Some(snapshot) = &snapshot {
            if let Err(e) = snapshot.validate() {
                warn!("❌ 问卷 {} 的评分未通过校验: {}", ticket.survey_id, e);
                job.status = EvaluationStatus::Failed {
                    reason: e.to_string(),
                };
                return Err(e);
            }
        }

        let resolution = match (reported, snapshot) {
            (Some(ReportedOutcome::Failed { reason }), _) => Resolution {
                status: EvaluationStatus::Failed { reason },
                score: None,
            },
            (Some(ReportedOutcome::Skipped), _) => Resolution {
                status: EvaluationStatus::Skipped,
                score: Some(ScoreState::NotEvaluated),
            },
            (Some(ReportedOutcome::Succeeded) | None, Some(snapshot)) => Resolution {
                status: EvaluationStatus::Completed,
                score: Some(ScoreState::Scored(snapshot)),
            },
            (Some(ReportedOutcome::Succeeded), None) => Resolution {
                status: EvaluationStatus::Failed {
                    reason: "评估报告成功但没有评分".to_string(),
                },
                score: None,
            },
            (None, None) => {
                if self.require_status {
                    job.status = EvaluationStatus::Idle;
                    return Err(EditorError::AmbiguousEvaluationOutcome {
                        survey_id: ticket.survey_id.clone(),
                    });
                }
                warn!(
                    "⚠️ 问卷 {} 评估结束但没有评分，也没有状态，按跳过处理",
                    ticket.survey_id
                );
                Resolution {
                    status: EvaluationStatus::Skipped,
                    score: Some(ScoreState::NotEvaluated),
                }
            }
        };

        job.status = resolution.status.clone();
        info!("✓ 问卷 {} 评估结算: {}", ticket.survey_id, job.status);

        Ok(Some(resolution))
    }

    /// 把第 `cycle` 轮评估结束为失败
    ///
    /// 只作用于仍在评估中的当前轮；旧一轮的失败不影响之后触发的评估。
    pub fn fail(&mut self, survey_id: &str, cycle: u64, reason: impl Into<String>) -> bool {
        let Some(job) = self.jobs.get_mut(survey_id) else {
            return false;
        };
        if job.cycle != cycle || !job.status.is_evaluating() {
            debug!(
                "问卷 {} 第 {} 轮的失败已过期 (当前第 {} 轮)",
                survey_id, cycle, job.cycle
            );
            return false;
        }
        job.status = EvaluationStatus::Failed {
            reason: reason.into(),
        };
        true
    }

    pub fn status(&self, survey_id: &str) -> EvaluationStatus {
        self.jobs
            .get(survey_id)
            .map(|j| j.status.clone())
            .unwrap_or_default()
    }

    pub fn is_evaluating(&self, survey_id: &str) -> bool {
        self.jobs
            .get(survey_id)
            .map(|j| j.status.is_evaluating())
            .unwrap_or(false)
    }

    /// 每份问卷是否正在评估
    pub fn flags(&self) -> HashMap<String, bool> {
        self.jobs
            .iter()
            .map(|(id, job)| (id.clone(), job.status.is_evaluating()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(score: f64) -> PillarScoreSnapshot {
        PillarScoreSnapshot {
            weighted_score: score,
            grade: "B".to_string(),
            pillars: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    #[test]
    fn test_only_falling_edge_settles() {
        let mut correlator = EvaluationCorrelator::new(false);

        assert!(correlator.observe("S1", false).is_none());

        correlator.trigger("S1");
        assert_eq!(correlator.flags().get("S1"), Some(&true));
        assert!(correlator.observe("S1", true).is_none());

        let ticket = correlator.observe("S1", false).unwrap();
        assert_eq!(ticket.survey_id, "S1");
    }

    #[test]
    fn test_snapshot_without_status_completes() {
        let mut correlator = EvaluationCorrelator::new(false);
        correlator.trigger("S1");
        let ticket = correlator.observe("S1", false).unwrap();

        let resolution = correlator
            .resolve(&ticket, None, Some(snapshot(0.82)))
            .unwrap()
            .unwrap();

        assert_eq!(resolution.status, EvaluationStatus::Completed);
        assert_eq!(resolution.score, Some(ScoreState::Scored(snapshot(0.82))));
        assert_eq!(correlator.flags().get("S1"), Some(&false));
    }

    #[test]
    fn test_missing_snapshot_is_skipped_not_zero() {
        let mut correlator = EvaluationCorrelator::new(false);
        correlator.trigger("S1");
        let ticket = correlator.observe("S1", false).unwrap();

        let resolution = correlator.resolve(&ticket, None, None).unwrap().unwrap();
        assert_eq!(resolution.status, EvaluationStatus::Skipped);
        assert_eq!(resolution.score, Some(ScoreState::NotEvaluated));
    }

    #[test]
    fn test_strict_mode_reports_ambiguity() {
        let mut correlator = EvaluationCorrelator::new(true);
        correlator.trigger("S1");
        let ticket = correlator.observe("S1", false).unwrap();

        let err = correlator.resolve(&ticket, None, None).unwrap_err();
        assert!(matches!(err, EditorError::AmbiguousEvaluationOutcome { .. }));
        assert!(!correlator.is_evaluating("S1"));
    }

    #[test]
    fn test_explicit_failure_wins() {
        let mut correlator = EvaluationCorrelator::new(false);
        correlator.trigger("S1");
        let ticket = correlator.observe("S1", false).unwrap();

        let resolution = correlator
            .resolve(
                &ticket,
                Some(ReportedOutcome::Failed {
                    reason: "模型超时".to_string(),
                }),
                Some(snapshot(0.4)),
            )
            .unwrap()
            .unwrap();

        assert!(matches!(resolution.status, EvaluationStatus::Failed { .. }));
        assert_eq!(resolution.score, None);
    }

    #[test]
    fn test_retrigger_makes_ticket_stale() {
        let mut correlator = EvaluationCorrelator::new(false);
        correlator.trigger("S1");
        let ticket = correlator.observe("S1", false).unwrap();

        correlator.trigger("S1");

        let resolution = correlator.resolve(&ticket, None, Some(snapshot(0.5))).unwrap();
        assert!(resolution.is_none());
        assert!(correlator.is_evaluating("S1"));
    }

    #[test]
    fn test_failure_of_earlier_cycle_is_ignored() {
        let mut correlator = EvaluationCorrelator::new(false);
        let first = correlator.trigger("S1");
        let second = correlator.trigger("S1");

        assert!(!correlator.fail("S1", first, "网络错误"));
        assert!(correlator.is_evaluating("S1"));

        assert!(correlator.fail("S1", second, "网络错误"));
        assert!(matches!(
            correlator.status("S1"),
            EvaluationStatus::Failed { .. }
        ));
    }

    #[test]
    fn test_invalid_snapshot_ends_the_cycle() {
        let mut correlator = EvaluationCorrelator::new(false);
        correlator.trigger("S1");
        let ticket = correlator.observe("S1", false).unwrap();

        let err = correlator
            .resolve(&ticket, None, Some(snapshot(f64::NAN)))
            .unwrap_err();

        assert!(matches!(err, EditorError::Validation { .. }));
        assert_eq!(correlator.flags().get("S1"), Some(&false));
        assert!(matches!(
            correlator.status("S1"),
            EvaluationStatus::Failed { .. }
        ));
    }
}
