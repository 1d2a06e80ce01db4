//! 测试用的内存后端
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use survey_editor_sync::annotations::AnnotationOverlay;
use survey_editor_sync::document::{self, reorder};
use survey_editor_sync::models::{
    PillarBreakdown, PillarScoreSnapshot, Question, QuestionPatch, QuestionScope, QuestionType,
    Section, SectionId, SectionPatch, Survey,
};
use survey_editor_sync::{BackendGateway, Config, GatewayError, GatewayResult, SurveySession};

/// 被挂起的一次调用：`entered` 在调用到达后端时触发，
/// 向 `release` 发送 `true` 让这次调用失败，`false` 让它成功
pub struct HeldCall {
    pub entered: oneshot::Receiver<()>,
    pub release: oneshot::Sender<bool>,
}

struct Hold {
    entered: oneshot::Sender<()>,
    release: oneshot::Receiver<bool>,
}

struct MockState {
    survey: Survey,
    overlay: AnnotationOverlay,
    scores: Option<PillarScoreSnapshot>,
    failing: HashSet<&'static str>,
    holds: HashMap<&'static str, Hold>,
    calls: Vec<&'static str>,
    next_assigned_section_id: Option<SectionId>,
}

/// 内存后端：保存一份"服务器端"问卷，可注入失败、挂起调用、记录调用
pub struct MockGateway {
    state: Mutex<MockState>,
}

impl MockGateway {
    pub fn new(survey: Survey) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                survey,
                overlay: AnnotationOverlay::new(),
                scores: None,
                failing: HashSet::new(),
                holds: HashMap::new(),
                calls: Vec::new(),
                next_assigned_section_id: None,
            }),
        })
    }

    /// 让某个方法持续失败
    pub fn fail(&self, method: &'static str) {
        self.state.lock().unwrap().failing.insert(method);
    }

    pub fn recover(&self, method: &'static str) {
        self.state.lock().unwrap().failing.remove(method);
    }

    /// 挂起某个方法的下一次调用
    pub fn hold_next(&self, method: &'static str) -> HeldCall {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.state.lock().unwrap().holds.insert(
            method,
            Hold {
                entered: entered_tx,
                release: release_rx,
            },
        );
        HeldCall {
            entered: entered_rx,
            release: release_tx,
        }
    }

    pub fn set_overlay(&self, overlay: AnnotationOverlay) {
        self.state.lock().unwrap().overlay = overlay;
    }

    pub fn set_scores(&self, snapshot: PillarScoreSnapshot) {
        self.state.lock().unwrap().scores = Some(snapshot);
    }

    /// 新建章节时由"服务器"分配从 `first` 开始的 ID
    pub fn assign_section_ids_from(&self, first: SectionId) {
        self.state.lock().unwrap().next_assigned_section_id = Some(first);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls().iter().filter(|c| **c == method).count()
    }

    pub fn server_survey(&self) -> Survey {
        self.state.lock().unwrap().survey.clone()
    }

    pub fn server_overlay(&self) -> AnnotationOverlay {
        self.state.lock().unwrap().overlay.clone()
    }

    fn take_hold(&self, method: &'static str) -> Option<Hold> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(method);
        state.holds.remove(method)
    }

    fn is_failing(&self, method: &'static str) -> bool {
        self.state.lock().unwrap().failing.contains(method)
    }

    /// 记录调用；按挂起 / 失败设置决定本次调用是否成功
    async fn gate(&self, method: &'static str) -> GatewayResult<()> {
        let should_fail = match self.take_hold(method) {
            Some(hold) => {
                let _ = hold.entered.send(());
                hold.release.await.unwrap_or(false)
            }
            None => self.is_failing(method),
        };

        if should_fail {
            Err(GatewayError::unavailable(format!("{} 注入失败", method)))
        } else {
            Ok(())
        }
    }

    fn with_survey<T>(&self, f: impl FnOnce(&mut Survey) -> T) -> T {
        f(&mut self.state.lock().unwrap().survey)
    }
}

fn rejected(message: impl std::fmt::Display) -> GatewayError {
    GatewayError::BadResponse {
        endpoint: "mock".to_string(),
        status: 422,
        body: message.to_string(),
    }
}

#[async_trait]
impl BackendGateway for MockGateway {
    async fn fetch_survey(&self, _survey_id: &str) -> GatewayResult<Survey> {
        self.gate("fetch_survey").await?;
        Ok(self.server_survey())
    }

    async fn update_question(
        &self,
        _survey_id: &str,
        question_id: &str,
        patch: &QuestionPatch,
    ) -> GatewayResult<Question> {
        self.gate("update_question").await?;
        self.with_survey(|survey| -> GatewayResult<Question> {
            let (next, updated) =
                document::update_question(survey, question_id, patch).map_err(rejected)?;
            *survey = next;
            Ok(updated)
        })
    }

    async fn update_section(
        &self,
        _survey_id: &str,
        section_id: SectionId,
        patch: &SectionPatch,
    ) -> GatewayResult<Section> {
        self.gate("update_section").await?;
        self.with_survey(|survey| -> GatewayResult<Section> {
            let mut next = document::update_section_metadata(survey, section_id, &patch.metadata)
                .map_err(rejected)?;
            if let Some(questions) = &patch.questions {
                next = document::set_questions_in_scope(
                    &next,
                    QuestionScope::Section(section_id),
                    questions.clone(),
                )
                .map_err(rejected)?;
            }
            *survey = next;
            survey
                .section(section_id)
                .cloned()
                .ok_or_else(|| rejected("章节不存在"))
        })
    }

    async fn create_section(&self, _survey_id: &str, section: &Section) -> GatewayResult<Section> {
        self.gate("create_section").await?;
        let mut state = self.state.lock().unwrap();

        let mut created = section.clone();
        if let Some(next_id) = state.next_assigned_section_id {
            created.id = next_id;
            state.next_assigned_section_id = Some(next_id + 1);
        }
        if state.survey.sections.is_empty() {
            state.survey.questions.clear();
        }
        state.survey.sections.push(created.clone());
        Ok(created)
    }

    async fn delete_section(&self, _survey_id: &str, section_id: SectionId) -> GatewayResult<()> {
        self.gate("delete_section").await?;
        self.with_survey(|survey| -> GatewayResult<()> {
            *survey = document::delete_section(survey, section_id).map_err(rejected)?;
            Ok(())
        })
    }

    async fn set_section_order(
        &self,
        _survey_id: &str,
        section_ids: &[SectionId],
    ) -> GatewayResult<()> {
        self.gate("set_section_order").await?;
        self.with_survey(|survey| -> GatewayResult<()> {
            survey.sections = reorder::apply_section_order(survey, section_ids).map_err(rejected)?;
            Ok(())
        })
    }

    async fn set_question_order(
        &self,
        _survey_id: &str,
        scope: QuestionScope,
        question_ids: &[String],
    ) -> GatewayResult<()> {
        self.gate("set_question_order").await?;
        self.with_survey(|survey| -> GatewayResult<()> {
            let questions =
                reorder::apply_question_order(survey, scope, question_ids).map_err(rejected)?;
            *survey = document::set_questions_in_scope(survey, scope, questions).map_err(rejected)?;
            Ok(())
        })
    }

    async fn fetch_annotations(&self, _survey_id: &str) -> GatewayResult<AnnotationOverlay> {
        self.gate("fetch_annotations").await?;
        Ok(self.server_overlay())
    }

    async fn save_annotations(
        &self,
        _survey_id: &str,
        overlay: &AnnotationOverlay,
    ) -> GatewayResult<()> {
        self.gate("save_annotations").await?;
        self.state.lock().unwrap().overlay = overlay.clone();
        Ok(())
    }

    async fn trigger_evaluation(&self, _survey_id: &str) -> GatewayResult<()> {
        self.gate("trigger_evaluation").await
    }

    async fn fetch_pillar_scores(
        &self,
        _survey_id: &str,
    ) -> GatewayResult<Option<PillarScoreSnapshot>> {
        self.gate("fetch_pillar_scores").await?;
        Ok(self.state.lock().unwrap().scores.clone())
    }
}

// ========== 测试数据 ==========

pub fn question(id: &str, text: &str) -> Question {
    Question::new(id, text, QuestionType::MultipleChoice).with_options(["是", "否"])
}

/// 三个章节、每章两道题的问卷
pub fn sectioned_survey() -> Survey {
    let mut survey = Survey::new("S1", "家庭饮水习惯调查");
    let titles = ["筛选题", "饮水习惯", "人口统计"];

    for (index, title) in titles.iter().enumerate() {
        let id = index as SectionId + 1;
        let mut section = Section::new(id, *title, id);
        for n in 1..=2u32 {
            let qid = format!("q{}", index as u32 * 2 + n);
            let mut q = question(&qid, &format!("{} 第 {} 题", title, n));
            q.order = n;
            section.questions.push(q);
        }
        survey.sections.push(section);
    }

    survey
}

/// 旧版扁平问卷
pub fn flat_survey() -> Survey {
    let mut survey = Survey::new("S1", "旧版问卷");
    for n in 1..=3u32 {
        let mut q = question(&format!("q{}", n), &format!("第 {} 题", n));
        q.order = n;
        survey.questions.push(q);
    }
    survey
}

pub fn snapshot(weighted_score: f64) -> PillarScoreSnapshot {
    PillarScoreSnapshot {
        weighted_score,
        grade: "B".to_string(),
        pillars: vec![PillarBreakdown {
            name: "methodological_rigor".to_string(),
            score: weighted_score,
            grade: "B".to_string(),
            criteria_met: 4,
            criteria_total: Some(5),
            weight: 0.25,
        }],
        recommendations: vec!["合并重复的筛选题".to_string()],
    }
}

pub async fn open_session(gateway: Arc<MockGateway>) -> SurveySession {
    open_with_config(gateway, Config::default()).await
}

pub async fn open_with_config(gateway: Arc<MockGateway>, config: Config) -> SurveySession {
    SurveySession::open("S1", gateway, &config)
        .await
        .expect("打开会话失败")
}
