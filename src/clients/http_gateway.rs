/// 问卷后端 HTTP 客户端
///
/// 封装所有与问卷后端 REST API 相关的调用逻辑
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::annotations::AnnotationOverlay;
use crate::clients::BackendGateway;
use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::models::{
    PillarScoreSnapshot, Question, QuestionPatch, QuestionScope, Section, SectionId,
    SectionPatch, Survey,
};

/// 问卷后端 HTTP 客户端
pub struct HttpGateway {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpGateway {
    /// 创建新的后端客户端
    pub fn new(config: &Config) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GatewayError::RequestFailed {
                endpoint: config.api_base_url.clone(),
                source: e,
            })?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
        })
    }

    /// 问卷资源路径
    fn survey_url(&self, survey_id: &str, path: &str) -> String {
        format!("{}/api/surveys/{}{}", self.base_url, survey_id, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("Accept", "application/json");

        if self.token.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.token)
        }
    }

    /// 发送请求，检查状态码，返回响应体文本
    async fn send(&self, endpoint: &str, builder: RequestBuilder) -> GatewayResult<String> {
        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::RequestFailed {
                endpoint: endpoint.to_string(),
                source: e,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::RequestFailed {
                endpoint: endpoint.to_string(),
                source: e,
            })?;

        debug!("{} → {} ({} 字节)", endpoint, status, body.len());

        if !status.is_success() {
            return Err(GatewayError::BadResponse {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }

    fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> GatewayResult<T> {
        serde_json::from_str(body).map_err(|e| GatewayError::DecodeFailed {
            endpoint: endpoint.to_string(),
            source: e,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> GatewayResult<T> {
        let body = self.send(url, self.request(Method::GET, url)).await?;
        Self::decode(url, &body)
    }

    async fn send_json<B, T>(&self, method: Method, url: &str, payload: &B) -> GatewayResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self
            .send(url, self.request(method, url).json(payload))
            .await?;
        Self::decode(url, &body)
    }

    async fn send_no_content<B>(
        &self,
        method: Method,
        url: &str,
        payload: Option<&B>,
    ) -> GatewayResult<()>
    where
        B: Serialize + ?Sized,
    {
        let mut builder = self.request(method, url);
        if let Some(payload) = payload {
            builder = builder.json(payload);
        }
        self.send(url, builder).await?;
        Ok(())
    }
}

#[async_trait]
impl BackendGateway for HttpGateway {
    async fn fetch_survey(&self, survey_id: &str) -> GatewayResult<Survey> {
        self.get_json(&self.survey_url(survey_id, "")).await
    }

    async fn update_question(
        &self,
        survey_id: &str,
        question_id: &str,
        patch: &QuestionPatch,
    ) -> GatewayResult<Question> {
        let url = self.survey_url(survey_id, &format!("/questions/{}", question_id));
        self.send_json(Method::PATCH, &url, patch).await
    }

    async fn update_section(
        &self,
        survey_id: &str,
        section_id: SectionId,
        patch: &SectionPatch,
    ) -> GatewayResult<Section> {
        let url = self.survey_url(survey_id, &format!("/sections/{}", section_id));
        self.send_json(Method::PATCH, &url, patch).await
    }

    async fn create_section(&self, survey_id: &str, section: &Section) -> GatewayResult<Section> {
        let url = self.survey_url(survey_id, "/sections");
        self.send_json(Method::POST, &url, section).await
    }

    async fn delete_section(&self, survey_id: &str, section_id: SectionId) -> GatewayResult<()> {
        let url = self.survey_url(survey_id, &format!("/sections/{}", section_id));
        self.send_no_content::<()>(Method::DELETE, &url, None).await
    }

    async fn set_section_order(
        &self,
        survey_id: &str,
        section_ids: &[SectionId],
    ) -> GatewayResult<()> {
        let url = self.survey_url(survey_id, "/sections/order");
        let payload = json!({ "section_ids": section_ids });
        self.send_no_content(Method::PUT, &url, Some(&payload)).await
    }

    async fn set_question_order(
        &self,
        survey_id: &str,
        scope: QuestionScope,
        question_ids: &[String],
    ) -> GatewayResult<()> {
        let url = self.survey_url(survey_id, "/questions/order");
        let payload = json!({
            "section_id": scope.section_id(),
            "question_ids": question_ids,
        });
        self.send_no_content(Method::PUT, &url, Some(&payload)).await
    }

    async fn fetch_annotations(&self, survey_id: &str) -> GatewayResult<AnnotationOverlay> {
        let url = self.survey_url(survey_id, "/annotations");
        match self.get_json::<Option<AnnotationOverlay>>(&url).await {
            Ok(overlay) => Ok(overlay.unwrap_or_default()),
            Err(e) if e.is_not_found() => Ok(AnnotationOverlay::default()),
            Err(e) => Err(e),
        }
    }

    async fn save_annotations(
        &self,
        survey_id: &str,
        overlay: &AnnotationOverlay,
    ) -> GatewayResult<()> {
        let url = self.survey_url(survey_id, "/annotations");
        self.send_no_content(Method::PUT, &url, Some(overlay)).await
    }

    async fn trigger_evaluation(&self, survey_id: &str) -> GatewayResult<()> {
        let url = self.survey_url(survey_id, "/evaluate");
        self.send_no_content::<()>(Method::POST, &url, None).await
    }

    async fn fetch_pillar_scores(
        &self,
        survey_id: &str,
    ) -> GatewayResult<Option<PillarScoreSnapshot>> {
        let url = self.survey_url(survey_id, "/pillar-scores");
        match self.get_json::<Option<PillarScoreSnapshot>>(&url).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(base_url: &str) -> HttpGateway {
        let config = Config {
            api_base_url: base_url.to_string(),
            ..Config::default()
        };
        HttpGateway::new(&config).unwrap()
    }

    #[test]
    fn test_survey_url_trims_trailing_slash() {
        let gateway = gateway("http://localhost:8000/");
        assert_eq!(
            gateway.survey_url("S1", "/sections/order"),
            "http://localhost:8000/api/surveys/S1/sections/order"
        );
        assert_eq!(gateway.survey_url("S1", ""), "http://localhost:8000/api/surveys/S1");
    }

    #[test]
    fn test_decode_reports_endpoint() {
        let err = HttpGateway::decode::<Survey>("/api/surveys/S1", "{not json").unwrap_err();
        assert!(matches!(err, GatewayError::DecodeFailed { .. }));
        assert!(err.to_string().contains("/api/surveys/S1"));
    }
}
