//! Azure Translator (Text API v3) adapter.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use voxlate_core::config::ServiceCredentials;

use crate::error::truncate_body;
use crate::retry::{RetryPolicy, with_retry};
use crate::{ProviderError, TranslationResult, Translator};

pub const DEFAULT_ENDPOINT: &str = "https://api.cognitive.microsofttranslator.com";

pub struct AzureTranslatorClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    region: Option<String>,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateItem {
    #[serde(default)]
    detected_language: Option<DetectedLanguage>,
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct DetectedLanguage {
    language: String,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: u64,
    #[serde(default)]
    message: String,
}

impl AzureTranslatorClient {
    pub fn new(endpoint: &str, api_key: impl Into<String>, region: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            region: region.filter(|r| !r.trim().is_empty()),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_credentials(credentials: &ServiceCredentials) -> Self {
        Self::new(
            &credentials.translator_endpoint,
            credentials.translator_key.clone(),
            credentials.translator_region.clone(),
        )
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn translate_url(&self) -> String {
        format!("{}/translate", self.endpoint)
    }

    async fn translate_once(
        &self,
        text: &str,
        from: &str,
        to: &str,
    ) -> Result<TranslationResult, ProviderError> {
        let mut req = self
            .client
            .post(self.translate_url())
            .query(&[("api-version", "3.0"), ("from", from), ("to", to)])
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .json(&json!([{ "text": text }]));
        if let Some(region) = &self.region {
            req = req.header("Ocp-Apim-Subscription-Region", region);
        }

        let resp = req.send().await.map_err(ProviderError::from_transport)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(map_error(status, &body, from, to));
        }

        let items: Vec<TranslateItem> = resp.json().await.map_err(ProviderError::from_transport)?;
        let item = items
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("empty translation response".into()))?;
        let detected_language = item.detected_language.map(|d| d.language);
        let translation = item
            .translations
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("response carried no translations".into()))?;

        Ok(TranslationResult {
            text: translation.text,
            detected_language,
        })
    }
}

/// Map a Translator error response using its numeric error code when present.
fn map_error(status: reqwest::StatusCode, body: &str, from: &str, to: &str) -> ProviderError {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return ProviderError::from_status(status, body);
    };
    let ErrorDetail { code, message } = envelope.error;
    let detail = format!("{code}: {}", truncate_body(&message));
    match code {
        400035 | 400036 => ProviderError::UnsupportedLanguagePair {
            from: from.to_string(),
            to: to.to_string(),
        },
        401000..=401999 => ProviderError::Auth(detail),
        403000..=403999 | 429000..=429999 => ProviderError::QuotaExceeded(detail),
        500000..=599999 => ProviderError::ServiceUnavailable(detail),
        _ => ProviderError::from_status(status, &detail),
    }
}

#[async_trait]
impl Translator for AzureTranslatorClient {
    fn id(&self) -> &str {
        "azure-translator"
    }

    async fn translate(
        &self,
        text: &str,
        from: &str,
        to: &str,
    ) -> Result<TranslationResult, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyText);
        }
        debug!(from, to, chars = text.chars().count(), "Requesting translation");
        with_retry(&self.retry, "translate", || self.translate_once(text, from, to)).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use axum::Router;
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;

    use super::*;

    #[derive(Default)]
    struct Fake {
        calls: AtomicU32,
        error: Option<(u16, String)>,
        seen: Mutex<Vec<(HashMap<String, String>, HeaderMap, serde_json::Value)>>,
    }

    async fn fake_translate(
        State(fake): State<Arc<Fake>>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
        axum::Json(body): axum::Json<serde_json::Value>,
    ) -> (StatusCode, String) {
        fake.calls.fetch_add(1, Ordering::SeqCst);
        let to = query.get("to").cloned().unwrap_or_default();
        let text = body[0]["text"].as_str().unwrap_or_default().to_string();
        fake.seen.lock().unwrap().push((query, headers, body));
        if let Some((status, body)) = &fake.error {
            return (StatusCode::from_u16(*status).unwrap(), body.clone());
        }
        let reply = json!([{ "translations": [{ "text": format!("<{to}>{text}"), "to": to }] }]);
        (StatusCode::OK, reply.to_string())
    }

    async fn serve(fake: Arc<Fake>) -> String {
        let app = Router::new()
            .route("/translate", post(fake_translate))
            .with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn test_translate_success() {
        let fake = Arc::new(Fake::default());
        let base = serve(fake.clone()).await;
        let client = AzureTranslatorClient::new(&base, "secret", Some("westeurope".into()));
        let result = client.translate("Hello", "en", "fr").await.unwrap();
        assert_eq!(result.text, "<fr>Hello");
        assert_eq!(result.detected_language, None);

        let seen = fake.seen.lock().unwrap();
        let (query, headers, body) = &seen[0];
        assert_eq!(query.get("api-version").map(String::as_str), Some("3.0"));
        assert_eq!(query.get("from").map(String::as_str), Some("en"));
        assert_eq!(headers["ocp-apim-subscription-key"], "secret");
        assert_eq!(headers["ocp-apim-subscription-region"], "westeurope");
        assert_eq!(body[0]["text"], "Hello");
    }

    #[tokio::test]
    async fn test_region_header_omitted_when_blank() {
        let fake = Arc::new(Fake::default());
        let base = serve(fake.clone()).await;
        let client = AzureTranslatorClient::new(&base, "secret", Some("  ".into()));
        client.translate("Hello", "en", "de").await.unwrap();
        let seen = fake.seen.lock().unwrap();
        assert!(!seen[0].1.contains_key("ocp-apim-subscription-region"));
    }

    #[tokio::test]
    async fn test_unsupported_pair_code() {
        let fake = Arc::new(Fake {
            error: Some((
                400,
                r#"{"error":{"code":400036,"message":"The target language is not valid."}}"#.into(),
            )),
            ..Default::default()
        });
        let base = serve(fake).await;
        let client = AzureTranslatorClient::new(&base, "k", None);
        let err = client.translate("Hello", "en", "xx").await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::UnsupportedLanguagePair {
                from: "en".into(),
                to: "xx".into()
            }
        );
    }

    #[tokio::test]
    async fn test_auth_and_quota_codes() {
        let fake = Arc::new(Fake {
            error: Some((401, r#"{"error":{"code":401000,"message":"bad key"}}"#.into())),
            ..Default::default()
        });
        let base = serve(fake).await;
        let err = AzureTranslatorClient::new(&base, "k", None)
            .translate("Hello", "en", "fr")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Auth(_)));

        let fake = Arc::new(Fake {
            error: Some((403, r#"{"error":{"code":403001,"message":"quota"}}"#.into())),
            ..Default::default()
        });
        let base = serve(fake).await;
        let err = AzureTranslatorClient::new(&base, "k", None)
            .translate("Hello", "en", "fr")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::QuotaExceeded(_)));
    }

    #[tokio::test]
    async fn test_server_error_retried_then_reported() {
        let fake = Arc::new(Fake {
            error: Some((503, "unavailable".into())),
            ..Default::default()
        });
        let base = serve(fake.clone()).await;
        let client = AzureTranslatorClient::new(&base, "k", None).with_retry(RetryPolicy {
            max_retries: 1,
            initial_backoff: std::time::Duration::from_millis(1),
            max_backoff: std::time::Duration::from_millis(1),
        });
        let err = client.translate("Hello", "en", "fr").await.unwrap_err();
        assert!(matches!(err, ProviderError::ServiceUnavailable(_)));
        assert_eq!(fake.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_text_makes_no_call() {
        let fake = Arc::new(Fake::default());
        let base = serve(fake.clone()).await;
        let client = AzureTranslatorClient::new(&base, "k", None);
        assert_eq!(
            client.translate(" ", "en", "fr").await.unwrap_err(),
            ProviderError::EmptyText
        );
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unparseable_error_body_falls_back_to_status() {
        let err = map_error(reqwest::StatusCode::BAD_GATEWAY, "<html>", "en", "fr");
        assert!(matches!(err, ProviderError::ServiceUnavailable(_)));
    }
}
