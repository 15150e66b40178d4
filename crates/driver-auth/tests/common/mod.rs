#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use driver_auth::{
    ApiRequest, ApiResponse, ClientContext, DeviceInfo, Locale, MemoryTokenStore,
    SessionManager, TokenStore, Transport, TransportError,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const PHONE: &str = "+48500123456";
pub const BASE_URL: &str = "https://api.test.local/";

/// Scripted transport: replies are served in the order they were queued.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<Result<ApiResponse, TransportError>>>,
    requests: Mutex<Vec<ApiRequest>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Transport that sleeps before answering, so concurrent callers overlap.
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn queue_response(&self, status: u16, body: Value) {
        self.replies
            .lock()
            .push_back(Ok(ApiResponse::new(status, body)));
    }

    /// Queue `{code: 0, data}` with HTTP 200.
    pub fn queue_ok(&self, data: Value) {
        self.queue_response(200, json!({"code": 0, "data": data}));
    }

    pub fn queue_transport_error(&self, error: TransportError) {
        self.replies.lock().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    /// Requests whose URL path ends with `endpoint`.
    pub fn requests_to(&self, endpoint: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.path().ends_with(endpoint))
            .collect()
    }

    pub fn pending_replies(&self) -> usize {
        self.replies.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self.replies.lock().pop_front();
        reply.unwrap_or_else(|| Err(TransportError::Request("no scripted reply".to_string())))
    }
}

pub fn device() -> DeviceInfo {
    DeviceInfo {
        device_id: "device-123".to_string(),
        ..DeviceInfo::default()
    }
}

pub fn locale() -> Locale {
    Locale::default()
}

pub fn context() -> ClientContext {
    ClientContext::new(device(), locale())
}

pub fn base_url() -> Url {
    Url::parse(BASE_URL).expect("valid base url")
}

pub fn manager(transport: &Arc<MockTransport>) -> SessionManager {
    manager_with_store(transport, Box::new(MemoryTokenStore::new()))
}

pub fn manager_with_store(
    transport: &Arc<MockTransport>,
    store: Box<dyn TokenStore>,
) -> SessionManager {
    let transport: Arc<dyn Transport> = transport.clone();
    SessionManager::open(transport, store, base_url(), context())
}

/// Unsigned token carrying the given driver id and expiry (epoch seconds).
pub fn jwt(driver_id: i64, exp_secs: i64) -> String {
    let claims = json!({
        "exp": exp_secs,
        "data": {
            "driver_id": driver_id,
            "partner_id": 20,
            "company_id": 30,
            "company_city_id": 40
        }
    });
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        URL_SAFE_NO_PAD.encode("signature")
    )
}

pub fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Token valid for one more hour.
pub fn live_jwt(driver_id: i64) -> String {
    jwt(driver_id, now_secs() + 3600)
}

/// Run the SMS flow to completion with `token` as the issued refresh token.
pub async fn sign_in_with_sms(
    transport: &Arc<MockTransport>,
    manager: &SessionManager,
    token: &str,
) {
    transport.queue_ok(json!({"verification_token": "vt1"}));
    transport.queue_ok(json!({"token": {"refresh_token": token, "token_type": "bearer"}}));

    manager
        .start_sms_sign_in(device(), locale(), PHONE)
        .await
        .expect("start failed");
    manager
        .confirm_sms_sign_in(device(), locale(), "123456")
        .await
        .expect("confirm failed");
}
