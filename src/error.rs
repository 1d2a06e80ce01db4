use thiserror::Error;

use crate::models::EntityRef;
use crate::sync::SyncOperation;

/// 编辑器错误类型
#[derive(Debug, Error)]
pub enum EditorError {
    /// 引用的实体不存在（结构性操作，整个操作中止）
    #[error("实体不存在: {entity}")]
    NotFound { entity: EntityRef },

    /// 远程调用失败：本地修改保留，标记为未保存
    #[error("{operation} 失败: {source}")]
    Persistence {
        operation: SyncOperation,
        #[source]
        source: GatewayError,
    },

    /// 数据校验失败
    #[error("校验失败: {message}")]
    Validation { message: String },

    /// 评估标记已清除，但无法区分成功还是失败
    #[error("问卷 {survey_id} 的评估结果不明确：后端未提供状态，也没有评分")]
    AmbiguousEvaluationOutcome { survey_id: String },

    /// 会话已关闭
    #[error("问卷 {survey_id} 的编辑会话已关闭")]
    SessionClosed { survey_id: String },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 后端网关错误
#[derive(Debug, Error)]
pub enum GatewayError {
    /// 网络请求失败
    #[error("请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// 后端返回错误状态码
    #[error("后端返回错误响应 ({endpoint}): status={status}, body={body}")]
    BadResponse {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// 响应 JSON 解析失败
    #[error("JSON解析失败 ({endpoint}): {source}")]
    DecodeFailed {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// 服务不可用（离线、被测试注入等）
    #[error("服务不可用: {0}")]
    Unavailable(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// 配置值无效
    #[error("配置项 {key} 无效: {reason}")]
    InvalidValue { key: String, reason: String },
}

// ========== 便捷构造函数 ==========

impl EditorError {
    /// 创建实体不存在错误
    pub fn not_found(entity: EntityRef) -> Self {
        EditorError::NotFound { entity }
    }

    /// 创建校验错误
    pub fn validation(message: impl Into<String>) -> Self {
        EditorError::Validation {
            message: message.into(),
        }
    }

    /// 创建远程持久化错误
    pub fn persistence(operation: SyncOperation, source: GatewayError) -> Self {
        EditorError::Persistence { operation, source }
    }

    /// 是否可由用户重试 / 放弃修改来恢复
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EditorError::Persistence { .. })
    }
}

impl GatewayError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        GatewayError::Unavailable(message.into())
    }

    /// 是否为 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::BadResponse { status: 404, .. })
    }
}

// ========== Result 类型别名 ==========

/// 编辑器结果类型
pub type EditorResult<T> = Result<T, EditorError>;

/// 网关结果类型
pub type GatewayResult<T> = Result<T, GatewayError>;
