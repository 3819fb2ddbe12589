use crate::endpointer::{EndpointConfig, Endpointer};
use crate::service_trait::{IntentService, RequestStream, ResponseStream, RESPONSE_BUFFER};
use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use voxgame_core::{
    AudioEncoding, InputAudioConfig, Intent, QueryResult, ServiceError, StreamingRequest,
    StreamingResponse,
};

const DEFAULT_ENDPOINT: &str = "https://dialogflow.googleapis.com/v2";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const TOKEN_SCOPE: &str =
    "https://www.googleapis.com/auth/cloud-platform https://www.googleapis.com/auth/dialogflow";
const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Lifetime requested for the signed assertion.
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh a cached access token this long before it expires.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

// ── Config ────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct DialogflowConfig {
    credentials_path: Option<PathBuf>,

    #[serde(default = "default_endpoint")]
    endpoint: String,

    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,

    #[serde(default)]
    endpointing: EndpointConfig,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

/// Fields of a Google service-account key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccount {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

fn load_service_account(path: &Path) -> Result<ServiceAccount, ServiceError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ServiceError::InitializationFailed(format!(
            "failed to read credentials {}: {e}",
            path.display()
        ))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        ServiceError::InitializationFailed(format!(
            "failed to parse credentials {}: {e}",
            path.display()
        ))
    })
}

// ── REST wire types ───────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentRequest<'a> {
    query_input: QueryInput<'a>,
    input_audio: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryInput<'a> {
    audio_config: WireAudioConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireAudioConfig<'a> {
    audio_encoding: &'static str,
    sample_rate_hertz: u32,
    language_code: &'a str,
    single_utterance: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentResponse {
    #[serde(default)]
    query_result: Option<WireQueryResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireQueryResult {
    #[serde(default)]
    query_text: String,
    #[serde(default)]
    language_code: String,
    #[serde(default)]
    intent: Option<WireIntent>,
    #[serde(default)]
    intent_detection_confidence: f32,
    #[serde(default)]
    fulfillment_text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireIntent {
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

fn encoding_name(encoding: AudioEncoding) -> &'static str {
    match encoding {
        AudioEncoding::Linear16 => "AUDIO_ENCODING_LINEAR_16",
    }
}

fn detect_intent_body<'a>(audio_config: &'a InputAudioConfig, audio: &[u8]) -> DetectIntentRequest<'a> {
    DetectIntentRequest {
        query_input: QueryInput {
            audio_config: WireAudioConfig {
                audio_encoding: encoding_name(audio_config.encoding),
                sample_rate_hertz: audio_config.sample_rate_hertz,
                language_code: &audio_config.language_code,
                single_utterance: true,
            },
        },
        input_audio: base64::engine::general_purpose::STANDARD.encode(audio),
    }
}

fn detect_intent_url(endpoint: &str, session: &str) -> String {
    format!("{}/{}:detectIntent", endpoint.trim_end_matches('/'), session)
}

impl From<DetectIntentResponse> for QueryResult {
    fn from(response: DetectIntentResponse) -> Self {
        let Some(result) = response.query_result else {
            return QueryResult::default();
        };
        QueryResult {
            query_text: result.query_text,
            language_code: result.language_code,
            intent: Intent {
                display_name: result.intent.map(|i| i.display_name).unwrap_or_default(),
                confidence: result.intent_detection_confidence,
            },
            fulfillment_text: result.fulfillment_text,
        }
    }
}

/// Server-side and throttling failures cost one utterance; any other
/// rejection means the request or the agent setup is wrong.
fn classify_status(status: reqwest::StatusCode, body: &str) -> ServiceError {
    let message = format!("dialogflow returned {status}: {body}");
    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        ServiceError::Transport(message)
    } else {
        ServiceError::Protocol(message)
    }
}

// ── Client ────────────────────────────────────────────────────

/// One request per finished utterance. Lets the exchange logic run without
/// a network in tests.
#[async_trait]
trait QueryDetector: Send + Sync {
    async fn detect(
        &self,
        session: &str,
        audio_config: &InputAudioConfig,
        audio: &[u8],
    ) -> Result<QueryResult, ServiceError>;
}

struct CachedToken {
    access_token: String,
    expires_at: i64,
}

struct DialogflowClient {
    http: reqwest::Client,
    endpoint: String,
    account: ServiceAccount,
    key: jsonwebtoken::EncodingKey,
    token: Mutex<Option<CachedToken>>,
}

impl DialogflowClient {
    fn new(config: &DialogflowConfig, account: ServiceAccount) -> Result<Self, ServiceError> {
        let key = jsonwebtoken::EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|e| ServiceError::InitializationFailed(format!("invalid private key: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ServiceError::InitializationFailed(format!("http client: {e}")))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            account,
            key,
            token: Mutex::new(None),
        })
    }

    fn token_url(&self) -> &str {
        self.account.token_uri.as_deref().unwrap_or(GOOGLE_TOKEN_URL)
    }

    fn signed_assertion(&self, now: i64) -> Result<String, ServiceError> {
        let claims = JwtClaims {
            iss: &self.account.client_email,
            scope: TOKEN_SCOPE,
            aud: self.token_url(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        jsonwebtoken::encode(&header, &claims, &self.key)
            .map_err(|e| ServiceError::InitializationFailed(format!("signing assertion: {e}")))
    }

    async fn access_token(&self) -> Result<String, ServiceError> {
        let mut cached = self.token.lock().await;
        let now = Utc::now().timestamp();
        if let Some(ref token) = *cached {
            if token.expires_at > now + TOKEN_REFRESH_MARGIN_SECS {
                return Ok(token.access_token.clone());
            }
        }

        let assertion = self.signed_assertion(now)?;
        let response = self
            .http
            .post(self.token_url())
            .form(&[("grant_type", JWT_GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| ServiceError::Transport(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // A rejected grant will not fix itself on retry.
            return Err(match classify_status(status, &body) {
                ServiceError::Protocol(msg) => ServiceError::InitializationFailed(msg),
                other => other,
            });
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Protocol(format!("token response: {e}")))?;

        tracing::debug!(expires_in = token.expires_in, "dialogflow access token refreshed");
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: now + token.expires_in,
        });
        Ok(access_token)
    }
}

#[async_trait]
impl QueryDetector for DialogflowClient {
    async fn detect(
        &self,
        session: &str,
        audio_config: &InputAudioConfig,
        audio: &[u8],
    ) -> Result<QueryResult, ServiceError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(detect_intent_url(&self.endpoint, session))
            .bearer_auth(token)
            .json(&detect_intent_body(audio_config, audio))
            .send()
            .await
            .map_err(|e| ServiceError::Transport(format!("detectIntent failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }
        let parsed: DetectIntentResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Protocol(format!("detectIntent response: {e}")))?;
        Ok(parsed.into())
    }
}

// ── Exchange ──────────────────────────────────────────────────

/// Collect one utterance, announce its end, then ask for its intent.
async fn run_exchange(
    detector: Arc<dyn QueryDetector>,
    endpointing: EndpointConfig,
    mut requests: RequestStream,
    tx: &mpsc::Sender<Result<StreamingResponse, ServiceError>>,
) -> Result<(), ServiceError> {
    let (session, audio_config) = match requests.recv().await {
        Some(StreamingRequest::Config {
            session,
            audio_config,
            ..
        }) => (session, audio_config),
        Some(_) => {
            return Err(ServiceError::Protocol(
                "first request of an exchange must carry the session config".to_string(),
            ))
        }
        None => return Ok(()),
    };

    let mut endpointer = Endpointer::new(endpointing, audio_config.sample_rate_hertz);
    loop {
        match requests.recv().await {
            Some(StreamingRequest::Audio(chunk)) => {
                if endpointer.push(&chunk) {
                    break;
                }
            }
            Some(StreamingRequest::Config { .. }) => {
                return Err(ServiceError::Protocol(
                    "config sent twice in one exchange".to_string(),
                ))
            }
            None => break,
        }
    }

    if tx.send(Ok(StreamingResponse::end_of_utterance())).await.is_err() {
        return Ok(());
    }
    if !endpointer.heard_speech() {
        return Ok(());
    }

    let audio = endpointer.into_audio();
    tracing::debug!(bytes = audio.len(), "sending utterance to dialogflow");
    let result = detector.detect(&session, &audio_config, &audio).await?;
    let _ = tx
        .send(Ok(StreamingResponse::transcript(&result.query_text, true)))
        .await;
    let _ = tx.send(Ok(StreamingResponse::query(result))).await;

    // Drain whatever the client sent before it saw the boundary.
    while requests.recv().await.is_some() {}
    Ok(())
}

// ── Service ───────────────────────────────────────────────────

/// Dialogflow ES agent over the v2 REST API. Each exchange buffers audio
/// until local endpointing finds the end of the utterance, then sends it
/// in one `detectIntent` call.
///
/// Config table `[service.dialogflow]`; `credentials_path` (a
/// service-account key file) is required:
///
/// ```toml
/// [service.dialogflow]
/// endpoint = "https://dialogflow.googleapis.com/v2"
/// request_timeout_ms = 10000
///
/// [service.dialogflow.endpointing]
/// silence_threshold = 0.015
/// trailing_silence_ms = 800
/// ```
pub struct DialogflowService {
    detector: Option<Arc<dyn QueryDetector>>,
    endpointing: EndpointConfig,
    exchanges: AtomicUsize,
}

impl DialogflowService {
    pub fn new() -> Self {
        Self {
            detector: None,
            endpointing: EndpointConfig::default(),
            exchanges: AtomicUsize::new(0),
        }
    }
}

impl Default for DialogflowService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntentService for DialogflowService {
    fn name(&self) -> &str {
        "dialogflow"
    }

    async fn initialize(&mut self, config: toml::Value) -> Result<(), ServiceError> {
        let config: DialogflowConfig = config
            .try_into()
            .map_err(|e| ServiceError::InitializationFailed(format!("dialogflow config: {e}")))?;
        let path = config.credentials_path.clone().ok_or_else(|| {
            ServiceError::InitializationFailed(
                "dialogflow requires session.credentials_path".to_string(),
            )
        })?;

        let account = load_service_account(&path)?;
        let client = DialogflowClient::new(&config, account)?;
        tracing::info!(
            endpoint = %config.endpoint,
            client = %client.account.client_email,
            "DialogflowService initialized"
        );
        self.detector = Some(Arc::new(client));
        self.endpointing = config.endpointing;
        Ok(())
    }

    async fn streaming_detect_intent(
        &self,
        requests: RequestStream,
    ) -> Result<ResponseStream, ServiceError> {
        let detector = self.detector.clone().ok_or_else(|| {
            ServiceError::InitializationFailed("dialogflow service not initialized".to_string())
        })?;
        let exchange = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
        let endpointing = self.endpointing;
        let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);

        tokio::spawn(async move {
            if let Err(e) = run_exchange(detector, endpointing, requests, &tx).await {
                tracing::debug!("dialogflow exchange #{exchange} ended with error: {e}");
                let _ = tx.send(Err(e)).await;
            }
        });

        Ok(rx)
    }

    async fn shutdown(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}
