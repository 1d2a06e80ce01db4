use serde::Deserialize;
use std::path::Path;

use crate::error::{ConfigError, EditorResult};

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 问卷后端地址
    pub api_base_url: String,
    /// 后端访问令牌（为空则不发送）
    pub api_token: String,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 评估结束时是否要求后端给出明确状态
    pub require_evaluation_status: bool,
    /// 同步事件广播缓冲区大小
    pub event_buffer: usize,
    /// 默认日志过滤规则
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            api_token: String::new(),
            request_timeout_secs: 30,
            verbose_logging: false,
            require_evaluation_status: false,
            event_buffer: 64,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// 从环境变量加载，未设置或无法解析的项使用默认值
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，缺省项使用默认值
    pub fn from_toml_file(path: &Path) -> EditorResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_toml_str(&content, &path.display().to_string())
    }

    fn from_toml_str(content: &str, origin: &str) -> EditorResult<Self> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::TomlParseFailed {
            path: origin.to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 默认值 < 配置文件 < 环境变量
    pub fn load(path: Option<&Path>) -> EditorResult<Self> {
        let base = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn with_env_overrides(self) -> Self {
        Self {
            api_base_url: std::env::var("SURVEY_API_BASE_URL").unwrap_or(self.api_base_url),
            api_token: std::env::var("SURVEY_API_TOKEN").unwrap_or(self.api_token),
            request_timeout_secs: std::env::var("SURVEY_REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.request_timeout_secs),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(self.verbose_logging),
            require_evaluation_status: std::env::var("REQUIRE_EVALUATION_STATUS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.require_evaluation_status),
            event_buffer: std::env::var("SYNC_EVENT_BUFFER").ok().and_then(|v| v.parse().ok()).unwrap_or(self.event_buffer),
            log_filter: std::env::var("RUST_LOG").unwrap_or(self.log_filter),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "api_base_url".to_string(),
                reason: "不能为空".to_string(),
            });
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                key: "event_buffer".to_string(),
                reason: "必须大于 0".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout_secs".to_string(),
                reason: "必须大于 0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EditorError;

    #[test]
    fn test_toml_fills_missing_fields_with_defaults() {
        let config = Config::from_toml_str(
            r#"
            api_base_url = "https://surveys.example.com"
            require_evaluation_status = true
            "#,
            "inline",
        )
        .unwrap();

        assert_eq!(config.api_base_url, "https://surveys.example.com");
        assert!(config.require_evaluation_status);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.event_buffer, 64);
    }

    #[test]
    fn test_toml_rejects_invalid_values() {
        let err = Config::from_toml_str("event_buffer = 0", "inline").unwrap_err();
        assert!(matches!(err, EditorError::Config(ConfigError::InvalidValue { .. })));

        let err = Config::from_toml_str("api_base_url = [", "inline").unwrap_err();
        assert!(matches!(err, EditorError::Config(ConfigError::TomlParseFailed { .. })));
    }
}
