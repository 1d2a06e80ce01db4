//! 编辑会话 - 乐观同步
//!
//! `SurveySession` 持有一份问卷的本地副本和批注覆盖层。每次修改都遵循同一流程：
//!
//! 1. 在本地副本上生效，并为对应的同步键分配序号
//! 2. 释放锁后调用后端
//! 3. 成功：若仍是该键最新的写入，合并后端返回的规范数据
//! 4. 失败：本地修改保留，标记为未保存，并广播写明失败操作的事件
//!
//! 同一键上乱序到达的旧响应会被丢弃；会话关闭后到达的响应直接忽略。

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::annotations::{AnnotationOverlay, Upsert};
use crate::clients::BackendGateway;
use crate::config::Config;
use crate::document::{self, reorder, Direction};
use crate::error::{EditorError, EditorResult, GatewayResult};
use crate::evaluation::{EvaluationCorrelator, ProgressEvent};
use crate::models::{
    Annotation, AnnotationRef, EntityRef, EvaluationStatus, Question, QuestionAnnotation,
    QuestionPatch, QuestionScope, ReportedOutcome, Section, SectionAnnotation, SectionDraft,
    SectionId, SectionMetadata, SectionPatch, Survey, SurveyLevelAnnotation,
};
use crate::sync::events::{SyncEvent, SyncEventKind, SyncOperation};
use crate::sync::sequence::{SequenceTracker, SyncKey, Ticket};

/// 会话内部状态，只在短暂持锁期间修改，从不跨越后端调用持锁
struct EditorState {
    survey: Survey,
    overlay: AnnotationOverlay,
    sequences: SequenceTracker,
    /// 最近一次写入失败、尚未保存的同步键
    unsaved: BTreeMap<SyncKey, SyncOperation>,
    correlator: EvaluationCorrelator,
    closed: bool,
}

impl EditorState {
    /// 为一次写入分配序号；该键上旧的未保存标记由这次写入接管
    fn stage(&mut self, key: SyncKey) -> Ticket {
        self.unsaved.remove(&key);
        self.sequences.issue(key)
    }

    /// 后端为新章节分配了不同的 ID 时，把本地临时章节改成后端的 ID
    fn adopt_section_id(&mut self, provisional: SectionId, assigned: SectionId) {
        if provisional == assigned {
            return;
        }
        if self.survey.section(assigned).is_some() {
            warn!(
                "⚠️ 后端分配的章节 ID #{} 与本地章节冲突，保留临时 ID #{}",
                assigned, provisional
            );
            return;
        }

        if let Some(section) = self
            .survey
            .sections
            .iter_mut()
            .find(|s| s.id == provisional)
        {
            info!("章节 #{} 由后端分配为 #{}", provisional, assigned);
            section.id = assigned;
            self.overlay.rekey_section(provisional, assigned);
        }
    }

    /// 合并后端返回的题目，顺序以本地为准
    fn merge_question_echo(&mut self, echoed: Question) -> Option<Question> {
        let slot = self
            .survey
            .sections
            .iter_mut()
            .flat_map(|s| s.questions.iter_mut())
            .chain(self.survey.questions.iter_mut())
            .find(|q| q.id == echoed.id)?;

        let order = slot.order;
        *slot = echoed;
        slot.order = order;
        Some(slot.clone())
    }

    /// 合并后端返回的章节标题和描述
    fn merge_section_echo(&mut self, echoed: Section) {
        if let Some(section) = self.survey.sections.iter_mut().find(|s| s.id == echoed.id) {
            section.title = echoed.title;
            section.description = echoed.description;
        }
    }
}

/// 一份问卷的编辑会话
#[derive(Clone)]
pub struct SurveySession {
    survey_id: String,
    gateway: Arc<dyn BackendGateway>,
    state: Arc<Mutex<EditorState>>,
    events: broadcast::Sender<SyncEvent>,
    verbose: bool,
}

impl SurveySession {
    /// 打开会话：并发加载问卷和批注覆盖层
    pub async fn open(
        survey_id: impl Into<String>,
        gateway: Arc<dyn BackendGateway>,
        config: &Config,
    ) -> EditorResult<Self> {
        let survey_id = survey_id.into();
        info!("📂 打开问卷 {}", survey_id);

        let (survey, overlay) = load(gateway.as_ref(), &survey_id).await?;
        info!(
            "✓ 问卷加载完成: {} 个章节, {} 道题, {} 条题目批注",
            survey.sections.len(),
            survey.question_count(),
            overlay.question_annotations.len()
        );

        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let state = EditorState {
            survey,
            overlay,
            sequences: SequenceTracker::new(),
            unsaved: BTreeMap::new(),
            correlator: EvaluationCorrelator::new(config.require_evaluation_status),
            closed: false,
        };

        Ok(Self {
            survey_id,
            gateway,
            state: Arc::new(Mutex::new(state)),
            events,
            verbose: config.verbose_logging,
        })
    }

    pub fn survey_id(&self) -> &str {
        &self.survey_id
    }

    /// 订阅同步事件
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// 当前本地副本
    pub async fn survey(&self) -> Survey {
        self.state.lock().await.survey.clone()
    }

    /// 当前批注覆盖层
    pub async fn overlay(&self) -> AnnotationOverlay {
        self.state.lock().await.overlay.clone()
    }

    /// 是否存在未保存的修改
    pub async fn is_dirty(&self) -> bool {
        !self.state.lock().await.unsaved.is_empty()
    }

    /// 未保存的操作列表
    pub async fn unsaved_operations(&self) -> Vec<SyncOperation> {
        self.state.lock().await.unsaved.values().cloned().collect()
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    // ========== 结构修改 ==========

    /// 新建章节
    ///
    /// 扁平模式的问卷会转换为章节模式，已有题目随新章节一起保存。
    /// 返回的章节带有最终 ID（后端另行分配时以后端为准）。
    pub async fn add_section(&self, draft: SectionDraft) -> EditorResult<Section> {
        let (ticket, section) = {
            let mut state = self.lock_open().await?;
            let (survey, section) = document::add_section(&state.survey, draft);
            state.survey = survey;
            (state.stage(SyncKey::Section(section.id)), section)
        };
        info!("➕ 新建章节 #{} \"{}\"", section.id, section.title);

        let provisional = section.id;
        let mut assigned = provisional;
        self.persist(
            ticket,
            SyncOperation::CreateSection {
                section_id: provisional,
            },
            self.gateway.create_section(&self.survey_id, &section),
            |state, created: Section| {
                state.adopt_section_id(provisional, created.id);
                if state.survey.section(created.id).is_some() {
                    assigned = created.id;
                }
            },
        )
        .await?;

        Ok(Section {
            id: assigned,
            ..section
        })
    }

    /// 删除章节（批注不级联删除，成为孤立批注）
    pub async fn delete_section(&self, section_id: SectionId) -> EditorResult<()> {
        let ticket = {
            let mut state = self.lock_open().await?;
            state.survey = document::delete_section(&state.survey, section_id)?;
            state.stage(SyncKey::Section(section_id))
        };
        info!("🗑️ 删除章节 #{}", section_id);

        self.persist(
            ticket,
            SyncOperation::DeleteSection { section_id },
            self.gateway.delete_section(&self.survey_id, section_id),
            |_, _| {},
        )
        .await
    }

    /// 向章节末尾添加题目，保存时提交整个题目列表
    pub async fn add_question(
        &self,
        section_id: SectionId,
        question: Question,
    ) -> EditorResult<Question> {
        let scope = QuestionScope::Section(section_id);

        let (ticket, added, questions) = {
            let mut state = self.lock_open().await?;
            let (survey, added) =
                document::add_question_to_section(&state.survey, section_id, question)?;
            state.survey = survey;
            let questions = document::questions_in_scope(&state.survey, scope)?.to_vec();
            (state.stage(SyncKey::QuestionList(scope)), added, questions)
        };
        info!("➕ 向章节 #{} 添加题目 {}", section_id, added.id);

        let patch = SectionPatch::questions(questions);
        self.persist(
            ticket,
            SyncOperation::UpdateSectionQuestions { scope },
            self.gateway
                .update_section(&self.survey_id, section_id, &patch),
            |_, _| {},
        )
        .await?;

        Ok(added)
    }

    /// 修改题目内容，ID 与顺序不变
    pub async fn update_question(
        &self,
        question_id: &str,
        patch: QuestionPatch,
    ) -> EditorResult<Question> {
        let (ticket, updated) = {
            let mut state = self.lock_open().await?;

            if patch.is_empty() {
                debug!("题目 {} 的修改为空，跳过保存", question_id);
                return document::find_question(&state.survey, question_id)
                    .map(|(_, q)| q.clone())
                    .ok_or_else(|| EditorError::not_found(EntityRef::question(question_id)));
            }

            let (survey, updated) = document::update_question(&state.survey, question_id, &patch)?;
            state.survey = survey;
            (state.stage(SyncKey::Question(question_id.to_string())), updated)
        };
        debug!("✏️ 修改题目 {}", question_id);

        let mut result = updated;
        self.persist(
            ticket,
            SyncOperation::UpdateQuestion {
                question_id: question_id.to_string(),
            },
            self.gateway
                .update_question(&self.survey_id, question_id, &patch),
            |state, echoed: Question| {
                if let Some(merged) = state.merge_question_echo(echoed) {
                    result = merged;
                }
            },
        )
        .await?;

        Ok(result)
    }

    /// 修改章节标题或描述
    pub async fn update_section_metadata(
        &self,
        section_id: SectionId,
        metadata: SectionMetadata,
    ) -> EditorResult<()> {
        let ticket = {
            let mut state = self.lock_open().await?;
            state.survey = document::update_section_metadata(&state.survey, section_id, &metadata)?;
            state.stage(SyncKey::SectionMetadata(section_id))
        };
        debug!("✏️ 修改章节 #{} 的标题/描述", section_id);

        let patch = SectionPatch::metadata(metadata);
        self.persist(
            ticket,
            SyncOperation::UpdateSection { section_id },
            self.gateway
                .update_section(&self.survey_id, section_id, &patch),
            |state, echoed: Section| state.merge_section_echo(echoed),
        )
        .await
    }

    /// 用重新生成的题目（新 ID）替换旧题目
    ///
    /// 位置保持不变；旧 ID → 新 ID 的来源边写入批注层，题目列表和批注层一起保存。
    pub async fn regenerate_question(
        &self,
        old_id: &str,
        replacement: Question,
    ) -> EditorResult<Question> {
        let new_id = replacement.id.clone();

        let (list_ticket, overlay_ticket, scope, section_id, questions, overlay, replaced) = {
            let mut state = self.lock_open().await?;

            let scope = document::find_question(&state.survey, old_id)
                .map(|(scope, _)| scope)
                .ok_or_else(|| EditorError::not_found(EntityRef::question(old_id)))?;
            let QuestionScope::Section(section_id) = scope else {
                return Err(EditorError::validation(
                    "扁平题目列表不支持重新生成题目，请先添加章节",
                ));
            };

            let (survey, _) = document::replace_question(&state.survey, old_id, replacement)?;
            state.survey = survey;
            state.overlay.record_provenance(old_id, &new_id);

            let questions = document::questions_in_scope(&state.survey, scope)?.to_vec();
            let replaced = questions
                .iter()
                .find(|q| q.id == new_id)
                .cloned()
                .ok_or_else(|| EditorError::not_found(EntityRef::question(&new_id)))?;
            let overlay = state.overlay.clone();

            (
                state.stage(SyncKey::QuestionList(scope)),
                state.stage(SyncKey::Annotations),
                scope,
                section_id,
                questions,
                overlay,
                replaced,
            )
        };
        info!("🔄 题目 {} 重新生成为 {}", old_id, new_id);

        let patch = SectionPatch::questions(questions);
        let (list, annotations) = futures::join!(
            self.persist(
                list_ticket,
                SyncOperation::UpdateSectionQuestions { scope },
                self.gateway
                    .update_section(&self.survey_id, section_id, &patch),
                |_, _| {},
            ),
            self.persist(
                overlay_ticket,
                SyncOperation::SaveAnnotations,
                self.gateway.save_annotations(&self.survey_id, &overlay),
                |_, _| {},
            ),
        );
        list.and(annotations)?;

        Ok(replaced)
    }

    // ========== 排序 ==========

    /// 上移 / 下移章节；已在边界时什么也不做，返回 `false`
    pub async fn move_section(
        &self,
        section_id: SectionId,
        direction: Direction,
    ) -> EditorResult<bool> {
        let (ticket, ids) = {
            let mut state = self.lock_open().await?;
            let moved = reorder::move_section(&state.survey, section_id, direction)?;
            if !moved.changed {
                debug!("章节 #{} 已在边界，无需移动", section_id);
                return Ok(false);
            }
            state.survey.sections = moved.items;
            let ids = state.survey.section_ids();
            (state.stage(SyncKey::SectionOrder), ids)
        };

        self.save_section_order(ticket, ids).await?;
        Ok(true)
    }

    /// 在所属范围内上移 / 下移题目；已在边界时返回 `false`
    pub async fn move_question(
        &self,
        question_id: &str,
        direction: Direction,
    ) -> EditorResult<bool> {
        let (ticket, scope, ids) = {
            let mut state = self.lock_open().await?;
            let moved = reorder::move_question(&state.survey, question_id, direction)?;
            if !moved.changed {
                debug!("题目 {} 已在边界，无需移动", question_id);
                return Ok(false);
            }
            let ids = moved.question_ids();
            state.survey =
                document::set_questions_in_scope(&state.survey, moved.scope, moved.questions)?;
            (state.stage(SyncKey::QuestionList(moved.scope)), moved.scope, ids)
        };

        self.save_question_order(ticket, scope, ids).await?;
        Ok(true)
    }

    /// 按完整 ID 列表重排章节；顺序未变化时返回 `false`
    pub async fn apply_section_order(&self, section_ids: &[SectionId]) -> EditorResult<bool> {
        let (ticket, ids) = {
            let mut state = self.lock_open().await?;
            let sections = reorder::apply_section_order(&state.survey, section_ids)?;
            if state.survey.section_ids() == section_ids {
                debug!("章节顺序未变化");
                return Ok(false);
            }
            state.survey.sections = sections;
            (state.stage(SyncKey::SectionOrder), section_ids.to_vec())
        };

        self.save_section_order(ticket, ids).await?;
        Ok(true)
    }

    /// 按完整 ID 列表重排某个范围内的题目；顺序未变化时返回 `false`
    pub async fn apply_question_order(
        &self,
        scope: QuestionScope,
        question_ids: &[String],
    ) -> EditorResult<bool> {
        let ticket = {
            let mut state = self.lock_open().await?;
            let questions = reorder::apply_question_order(&state.survey, scope, question_ids)?;
            let unchanged = document::questions_in_scope(&state.survey, scope)?
                .iter()
                .map(|q| &q.id)
                .eq(question_ids.iter());
            if unchanged {
                debug!("{}的题目顺序未变化", scope);
                return Ok(false);
            }
            state.survey = document::set_questions_in_scope(&state.survey, scope, questions)?;
            state.stage(SyncKey::QuestionList(scope))
        };

        self.save_question_order(ticket, scope, question_ids.to_vec())
            .await?;
        Ok(true)
    }

    async fn save_section_order(&self, ticket: Ticket, ids: Vec<SectionId>) -> EditorResult<()> {
        if self.verbose {
            info!("↕️ 保存章节顺序: {:?}", ids);
        }
        self.persist(
            ticket,
            SyncOperation::SetSectionOrder,
            self.gateway.set_section_order(&self.survey_id, &ids),
            |_, _| {},
        )
        .await
    }

    async fn save_question_order(
        &self,
        ticket: Ticket,
        scope: QuestionScope,
        ids: Vec<String>,
    ) -> EditorResult<()> {
        if self.verbose {
            info!("↕️ 保存{}的题目顺序: {:?}", scope, ids);
        }
        self.persist(
            ticket,
            SyncOperation::SetQuestionOrder { scope },
            self.gateway
                .set_question_order(&self.survey_id, scope, &ids),
            |_, _| {},
        )
        .await
    }

    // ========== 批注 ==========

    /// 写入题目批注并保存整个覆盖层
    pub async fn save_question_annotation(
        &self,
        annotation: QuestionAnnotation,
    ) -> EditorResult<Upsert> {
        annotation.validate()?;
        debug!("📝 保存题目 {} 的批注", annotation.question_id);
        self.save_overlay(move |overlay| overlay.upsert_question(annotation))
            .await
    }

    /// 写入章节批注并保存整个覆盖层
    pub async fn save_section_annotation(
        &self,
        annotation: SectionAnnotation,
    ) -> EditorResult<Upsert> {
        annotation.validate()?;
        debug!("📝 保存章节 #{} 的批注", annotation.section_id);
        self.save_overlay(move |overlay| overlay.upsert_section(annotation))
            .await
    }

    /// 写入问卷级批注并保存整个覆盖层
    pub async fn save_survey_annotation(
        &self,
        annotation: SurveyLevelAnnotation,
    ) -> EditorResult<Upsert> {
        debug!("📝 保存问卷级批注");
        self.save_overlay(move |overlay| overlay.upsert_survey_level(annotation))
            .await
    }

    async fn save_overlay<F>(&self, upsert: F) -> EditorResult<Upsert>
    where
        F: FnOnce(&mut AnnotationOverlay) -> Upsert,
    {
        let (ticket, outcome, snapshot) = {
            let mut state = self.lock_open().await?;
            let outcome = upsert(&mut state.overlay);
            let snapshot = state.overlay.clone();
            (state.stage(SyncKey::Annotations), outcome, snapshot)
        };

        self.persist(
            ticket,
            SyncOperation::SaveAnnotations,
            self.gateway.save_annotations(&self.survey_id, &snapshot),
            |_, _| {},
        )
        .await?;

        Ok(outcome)
    }

    /// 按实体查找批注（包括孤立批注）
    pub async fn find_annotation(&self, entity: &EntityRef) -> Option<Annotation> {
        self.state
            .lock()
            .await
            .overlay
            .find(entity)
            .map(AnnotationRef::cloned)
    }

    /// 实体已不在文档中的批注
    pub async fn orphaned_annotations(&self) -> Vec<EntityRef> {
        let state = self.state.lock().await;
        state.overlay.orphans(&state.survey)
    }

    // ========== 质量评估 ==========

    /// 触发质量评估
    ///
    /// 立即进入评估中状态，触发请求在后台发出。
    /// 请求失败时本轮评估直接结束为失败，并广播事件；
    /// 若期间已触发了新一轮，旧请求的失败只广播为已覆盖。
    pub async fn trigger_evaluation(&self) -> EditorResult<JoinHandle<()>> {
        let cycle = {
            let mut state = self.lock_open().await?;
            state.correlator.trigger(&self.survey_id)
        };

        let session = self.clone();
        Ok(tokio::spawn(async move {
            let outcome = session.gateway.trigger_evaluation(&session.survey_id).await;

            let mut state = session.state.lock().await;
            if state.closed {
                debug!("会话已关闭，忽略评估触发结果");
                return;
            }

            match outcome {
                Ok(()) => {
                    debug!("✓ 问卷 {} 的评估已提交", session.survey_id);
                    session.emit(SyncEventKind::Saved {
                        operation: SyncOperation::TriggerEvaluation,
                    });
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!("❌ 触发质量评估失败 (第 {} 轮): {}", cycle, message);
                    let current = state.correlator.fail(&session.survey_id, cycle, message.clone());
                    session.emit(SyncEventKind::PersistFailed {
                        operation: SyncOperation::TriggerEvaluation,
                        message,
                        superseded: !current,
                    });
                }
            }
        }))
    }

    /// 观察外部报告的评估标记
    ///
    /// 标记从 true 变为 false 时拉取最新评分并合并进本地副本，
    /// 文档结构保持不变。返回本次结算的终态；没有结算时返回 `None`。
    pub async fn observe_evaluation(
        &self,
        evaluating: bool,
        reported: Option<ReportedOutcome>,
    ) -> EditorResult<Option<EvaluationStatus>> {
        let ticket = {
            let mut state = self.lock_open().await?;
            state.correlator.observe(&self.survey_id, evaluating)
        };
        let Some(ticket) = ticket else {
            return Ok(None);
        };

        let needs_snapshot = !matches!(
            reported,
            Some(ReportedOutcome::Failed { .. }) | Some(ReportedOutcome::Skipped)
        );
        let snapshot = if needs_snapshot {
            match self.gateway.fetch_pillar_scores(&self.survey_id).await {
                Ok(snapshot) => snapshot,
                Err(source) => {
                    let mut state = self.state.lock().await;
                    if state.closed {
                        return Ok(None);
                    }
                    let message = source.to_string();
                    warn!("❌ 获取问卷 {} 的评分失败: {}", self.survey_id, message);
                    let current = state
                        .correlator
                        .fail(&self.survey_id, ticket.cycle(), message.clone());
                    self.emit(SyncEventKind::PersistFailed {
                        operation: SyncOperation::FetchPillarScores,
                        message,
                        superseded: !current,
                    });
                    return Err(EditorError::persistence(
                        SyncOperation::FetchPillarScores,
                        source,
                    ));
                }
            }
        } else {
            None
        };

        let mut state = self.state.lock().await;
        if state.closed {
            return Ok(None);
        }

        let Some(resolution) = state.correlator.resolve(&ticket, reported, snapshot)? else {
            return Ok(None);
        };
        if let Some(score) = resolution.score {
            state.survey = document::merge_score(&state.survey, score);
        }

        self.emit(SyncEventKind::EvaluationSettled {
            survey_id: self.survey_id.clone(),
            status: resolution.status.clone(),
        });
        Ok(Some(resolution.status))
    }

    /// 跟随进度流，直到通道关闭或会话关闭
    ///
    /// 其他问卷的事件被忽略；可恢复的错误只记录日志。
    pub async fn follow_progress(
        &self,
        mut progress: mpsc::Receiver<ProgressEvent>,
    ) -> EditorResult<()> {
        while let Some(event) = progress.recv().await {
            if event.survey_id() != self.survey_id {
                debug!("忽略其他问卷的进度事件: {}", event.survey_id());
                continue;
            }
            if let ProgressEvent::Progress {
                percent, message, ..
            } = &event
            {
                debug!("⏳ 评估进度 {}%: {}", percent, message);
            }

            match self
                .observe_evaluation(event.evaluating(), event.outcome())
                .await
            {
                Ok(Some(status)) => info!("问卷 {} 评估{}", self.survey_id, status),
                Ok(None) => {}
                Err(EditorError::SessionClosed { .. }) => return Ok(()),
                Err(e) if e.is_recoverable() => warn!("⚠️ {}", e),
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    pub async fn evaluation_status(&self) -> EvaluationStatus {
        self.state.lock().await.correlator.status(&self.survey_id)
    }

    /// 每份问卷是否正在评估
    pub async fn evaluation_flags(&self) -> HashMap<String, bool> {
        self.state.lock().await.correlator.flags()
    }

    // ========== 会话生命周期 ==========

    /// 放弃未保存的修改：重新加载问卷和批注，未完成的写入全部作废
    pub async fn cancel(&self) -> EditorResult<()> {
        drop(self.lock_open().await?);
        info!("↩️ 放弃未保存的修改，重新加载问卷 {}", self.survey_id);

        let (survey, overlay) = load(self.gateway.as_ref(), &self.survey_id).await?;

        let mut state = self.lock_open().await?;
        state.survey = survey;
        state.overlay = overlay;
        state.unsaved.clear();
        state.sequences.invalidate_all();

        Ok(())
    }

    /// 关闭会话，之后到达的响应都会被忽略
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if !state.closed {
            state.closed = true;
            if !state.unsaved.is_empty() {
                warn!(
                    "⚠️ 问卷 {} 关闭时仍有 {} 项修改未保存",
                    self.survey_id,
                    state.unsaved.len()
                );
            }
            info!("📕 关闭问卷 {}", self.survey_id);
        }
    }

    // ========== 内部 ==========

    async fn lock_open(&self) -> EditorResult<MutexGuard<'_, EditorState>> {
        let state = self.state.lock().await;
        if state.closed {
            return Err(EditorError::SessionClosed {
                survey_id: self.survey_id.clone(),
            });
        }
        Ok(state)
    }

    /// 发出后端调用并结算响应
    async fn persist<T, F, M>(
        &self,
        ticket: Ticket,
        operation: SyncOperation,
        call: F,
        merge: M,
    ) -> EditorResult<()>
    where
        F: Future<Output = GatewayResult<T>>,
        M: FnOnce(&mut EditorState, T),
    {
        if self.verbose {
            info!("📤 {} (seq={})", operation, ticket.seq);
        } else {
            debug!("📤 {} (seq={})", operation, ticket.seq);
        }

        let outcome = call.await;

        let mut state = self.state.lock().await;
        if state.closed {
            debug!("会话已关闭，忽略 {} 的响应", operation);
            return Ok(());
        }
        let current = state.sequences.is_current(&ticket);

        match outcome {
            Ok(value) if current => {
                merge(&mut *state, value);
                debug!("✓ {} 已保存", operation);
                self.emit(SyncEventKind::Saved { operation });
                Ok(())
            }
            Ok(_) => {
                debug!("丢弃 {} 的旧响应 (seq={})", operation, ticket.seq);
                self.emit(SyncEventKind::StaleResponseDiscarded { operation });
                Ok(())
            }
            Err(source) => {
                let message = source.to_string();
                self.emit(SyncEventKind::PersistFailed {
                    operation: operation.clone(),
                    message: message.clone(),
                    superseded: !current,
                });

                if current {
                    warn!("❌ {} 失败，修改保留在本地: {}", operation, message);
                    state.unsaved.insert(ticket.key, operation.clone());
                    Err(EditorError::persistence(operation, source))
                } else {
                    warn!("⚠️ {} 失败，但已被后续修改覆盖: {}", operation, message);
                    Ok(())
                }
            }
        }
    }

    fn emit(&self, kind: SyncEventKind) {
        // 没有订阅者时发送会失败，忽略即可
        let _ = self.events.send(SyncEvent::new(&self.survey_id, kind));
    }
}

/// 并发加载问卷和批注覆盖层
async fn load(
    gateway: &dyn BackendGateway,
    survey_id: &str,
) -> EditorResult<(Survey, AnnotationOverlay)> {
    let survey = async {
        gateway
            .fetch_survey(survey_id)
            .await
            .map_err(|e| EditorError::persistence(SyncOperation::LoadSurvey, e))
    };
    let overlay = async {
        gateway
            .fetch_annotations(survey_id)
            .await
            .map_err(|e| EditorError::persistence(SyncOperation::LoadAnnotations, e))
    };

    let (survey, overlay) = futures::try_join!(survey, overlay)?;

    if survey.id != survey_id {
        return Err(EditorError::validation(format!(
            "后端返回的问卷 ID 不匹配: 期望 {}，实际 {}",
            survey_id, survey.id
        )));
    }

    survey.validate()?;
    overlay.validate()?;

    Ok((document::normalize(survey), overlay))
}
