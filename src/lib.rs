//! # Survey Editor Sync
//!
//! 问卷编辑器的客户端同步核心
//!
//! ## 架构设计
//!
//! 本系统分为四层：
//!
//! ### ① 数据层（Models / Document）
//! - `models/` - 问卷、章节、题目、批注、评分的数据结构
//! - `document/` - 纯函数式的结构操作：增删章节、题目修改、上移下移、整体重排
//!
//! ### ② 批注层（Annotations）
//! - `AnnotationOverlay` - 按实体 ID 存放质量批注，与结构相互独立
//! - 记录题目重新生成的来源边，删除实体后批注仍可查询
//!
//! ### ③ 后端层（Clients）
//! - `BackendGateway` - 后端能力接口
//! - `HttpGateway` - 基于 reqwest 的 HTTP 实现
//!
//! ### ④ 同步层（Sync / Evaluation）
//! - `SurveySession` - 乐观同步：本地先生效，后端失败时保留修改并标记未保存
//! - `EvaluationCorrelator` - 观察评估标记的下降沿，结算后合并评分
//!
//! ## 模块结构

pub mod annotations;
pub mod app;
pub mod clients;
pub mod config;
pub mod document;
pub mod error;
pub mod evaluation;
pub mod models;
pub mod sync;
pub mod utils;

// 重新导出常用类型
pub use annotations::{AnnotationOverlay, Upsert};
pub use app::App;
pub use clients::{BackendGateway, HttpGateway};
pub use config::Config;
pub use document::Direction;
pub use error::{ConfigError, EditorError, EditorResult, GatewayError, GatewayResult};
pub use evaluation::{EvaluationCorrelator, ProgressEvent};
pub use models::{Question, Section, Survey};
pub use sync::{SurveySession, SyncEvent, SyncEventKind, SyncOperation};
