//! Common test utilities for broker integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::Utc;
use fayda_broker::email::{DeliveryFailureNotice, DeveloperWelcome};
use fayda_broker::store::Subscriber;
use fayda_broker::{
    routes, AppState, AutomationError, ChallengeHandle, ChallengeOutcome, Config, EmailSender,
    InMemoryRegistry, PortalDriver, SubscriberRegistry, WebhookError, WebhookTransport,
};
use fayda_core::{ExtractedIdentityRecord, Fan, OtpCode};
use serde_json::{json, Value};

pub const FAN: &str = "1234567890123456";
pub const CODE: &str = "123456";

pub type TestState = AppState<ScriptedDriver, InMemoryRegistry, MockEmailSender>;

/// A record as the portal would show it for `fan`
pub fn sample_record(fan: &str) -> ExtractedIdentityRecord {
    ExtractedIdentityRecord {
        image: "data:image/jpeg;base64,/9j/4AAQ".to_string(),
        fan: fan.to_string(),
        name: "Abebe Kebede Tesfaye".to_string(),
        region: "Addis Ababa".to_string(),
        dob: "12/05/1990".to_string(),
        zone: "Region 14".to_string(),
        sex: "Male".to_string(),
        woreda: "Bole".to_string(),
        nationality: "Ethiopian".to_string(),
        phone: "+251911223344".to_string(),
    }
}

/// What the scripted portal does when a FAN is submitted
#[derive(Clone)]
pub enum Script {
    /// Present a challenge with this many code inputs
    Challenge { inputs: usize, submit_delay: Duration },
    /// Go straight to the result page
    DirectAccess,
    /// Neither screen shows up
    NoChallenge,
    /// The portal never finishes loading
    Timeout,
}

/// Portal driver that plays back a script instead of launching a browser
#[derive(Clone)]
pub struct ScriptedDriver {
    script: Arc<RwLock<Script>>,
    /// FAN the result page prints, when it differs from the one submitted
    page_fan: Arc<RwLock<Option<String>>>,
    pub launches: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub submissions: Arc<AtomicUsize>,
}

impl ScriptedDriver {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(RwLock::new(script)),
            page_fan: Arc::new(RwLock::new(None)),
            launches: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            submissions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn challenge() -> Self {
        Self::new(Script::Challenge {
            inputs: 6,
            submit_delay: Duration::ZERO,
        })
    }

    pub fn set_script(&self, script: Script) {
        *self.script.write().unwrap() = script;
    }

    pub fn set_page_fan(&self, fan: &str) {
        *self.page_fan.write().unwrap() = Some(fan.to_string());
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortalDriver for ScriptedDriver {
    async fn open_challenge(&self, fan: &Fan) -> Result<ChallengeOutcome, AutomationError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let script = self.script.read().unwrap().clone();
        let page_fan = self
            .page_fan
            .read()
            .unwrap()
            .clone()
            .unwrap_or_else(|| fan.as_str().to_string());

        match script {
            Script::Challenge {
                inputs,
                submit_delay,
            } => Ok(ChallengeOutcome::Challenge(Box::new(ScriptedHandle {
                record: sample_record(&page_fan),
                inputs,
                submit_delay,
                closed: false,
                closes: Arc::clone(&self.closes),
                submissions: Arc::clone(&self.submissions),
            }))),
            Script::DirectAccess => {
                self.closes.fetch_add(1, Ordering::SeqCst);
                Ok(ChallengeOutcome::DirectAccess(sample_record(&page_fan)))
            }
            Script::NoChallenge => {
                self.closes.fetch_add(1, Ordering::SeqCst);
                Err(AutomationError::ChallengeNotPresented)
            }
            Script::Timeout => {
                self.closes.fetch_add(1, Ordering::SeqCst);
                Err(AutomationError::Timeout("portal navigation"))
            }
        }
    }
}

pub struct ScriptedHandle {
    record: ExtractedIdentityRecord,
    inputs: usize,
    submit_delay: Duration,
    closed: bool,
    closes: Arc<AtomicUsize>,
    submissions: Arc<AtomicUsize>,
}

#[async_trait]
impl ChallengeHandle for ScriptedHandle {
    async fn submit_code(&mut self, _code: &OtpCode) -> Result<ExtractedIdentityRecord, AutomationError> {
        if self.closed {
            return Err(AutomationError::SessionExpired);
        }
        if self.inputs != OtpCode::LEN {
            return Err(AutomationError::InvalidChallengeLayout {
                expected: OtpCode::LEN,
                found: self.inputs,
            });
        }
        self.submissions.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.submit_delay).await;
        Ok(self.record.clone())
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        !self.closed
    }
}

/// Mock email sender that captures what would have been mailed
#[derive(Default, Clone)]
pub struct MockEmailSender {
    pub welcomes: Arc<RwLock<Vec<(String, DeveloperWelcome)>>>,
    pub failures: Arc<RwLock<Vec<(String, DeliveryFailureNotice)>>>,
}

impl MockEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn welcome_for(&self, email: &str) -> Option<DeveloperWelcome> {
        self.welcomes
            .read()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, w)| w.clone())
    }

    pub fn failure_count(&self) -> usize {
        self.failures.read().unwrap().len()
    }
}

impl EmailSender for MockEmailSender {
    fn send_developer_welcome(&self, email: &str, welcome: &DeveloperWelcome) -> Result<(), String> {
        self.welcomes
            .write()
            .unwrap()
            .push((email.to_string(), welcome.clone()));
        Ok(())
    }

    fn send_delivery_failure(&self, email: &str, notice: &DeliveryFailureNotice) -> Result<(), String> {
        self.failures
            .write()
            .unwrap()
            .push((email.to_string(), notice.clone()));
        Ok(())
    }
}

/// A webhook POST as the transport saw it
#[derive(Debug, Clone)]
pub struct Posted {
    pub url: String,
    pub client_id: String,
    pub token: String,
}

/// Transport that records posts and fails on demand
#[derive(Default, Clone)]
pub struct MockTransport {
    pub posts: Arc<RwLock<Vec<Posted>>>,
    pub failing: Arc<std::sync::atomic::AtomicBool>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let transport = Self::default();
        transport.failing.store(true, Ordering::SeqCst);
        transport
    }

    pub fn posts(&self) -> Vec<Posted> {
        self.posts.read().unwrap().clone()
    }
}

#[async_trait]
impl WebhookTransport for MockTransport {
    async fn post(&self, url: &str, client_id: &str, token: &str) -> Result<(), WebhookError> {
        self.posts.write().unwrap().push(Posted {
            url: url.to_string(),
            client_id: client_id.to_string(),
            token: token.to_string(),
        });
        if self.failing.load(Ordering::SeqCst) {
            Err(WebhookError::Request("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Everything a test needs to poke at
pub struct TestContext {
    pub server: TestServer,
    pub state: Arc<TestState>,
    pub driver: ScriptedDriver,
    pub email: MockEmailSender,
    pub transport: MockTransport,
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.delivery.base_delay = Duration::from_millis(10);
    config
}

/// Create a test server with a scripted portal and mock collaborators
pub fn create_test_server(driver: ScriptedDriver) -> TestContext {
    create_test_server_with(test_config(), driver, MockTransport::new())
}

pub fn create_test_server_with(
    config: Config,
    driver: ScriptedDriver,
    transport: MockTransport,
) -> TestContext {
    let email = MockEmailSender::new();

    let state = Arc::new(AppState::new(
        config,
        driver.clone(),
        InMemoryRegistry::new(),
        email.clone(),
        Arc::new(transport.clone()),
    ));

    let app = routes::create_router(state.clone());
    let server = TestServer::new(app).expect("Failed to create test server");

    TestContext {
        server,
        state,
        driver,
        email,
        transport,
    }
}

/// Register a developer-client directly in the registry
pub fn register_subscriber(state: &TestState, client_id: &str, webhook_url: Option<&str>) -> String {
    let secret = "test-secret-key".to_string();
    state
        .registry
        .register_subscriber(Subscriber {
            client_id: client_id.to_string(),
            name: "Dev Team".to_string(),
            email: "dev@example.com".to_string(),
            fan: "9999999999999999".to_string(),
            phone: "+251900000000".to_string(),
            organization_name: "Acme Health".to_string(),
            system_description: "Patient onboarding for clinics".to_string(),
            webhook_url: webhook_url.map(str::to_string),
            secret: Some(secret.clone()),
            password_hash: String::new(),
            created_at: Utc::now(),
        })
        .unwrap();
    secret
}

pub fn user_initiate_body() -> Value {
    json!({
        "identifier": FAN,
        "portal": "user",
        "contactEmail": "abebe@example.com",
        "credential": "Secret#123"
    })
}

pub fn developer_initiate_body(email: &str) -> Value {
    json!({
        "identifier": FAN,
        "portal": "developer",
        "contactEmail": email,
        "organizationName": "Acme Health",
        "systemDescription": "Patient onboarding for clinics in Addis",
        "webhookURL": "https://hooks.example.com/fayda",
        "credential": "Secret#123"
    })
}

/// Initiate a challenge and return the session id
pub async fn start_challenge(server: &TestServer, body: &Value) -> String {
    let response = server.post("/api/v1/fayda/initiate").json(body).await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["message"], "Challenge required");
    body["sessionId"]
        .as_str()
        .expect("No session id")
        .to_string()
}

/// Challenge, verify with the fixed code and return the stored user id
pub async fn verify_user(server: &TestServer) -> String {
    let session_id = start_challenge(server, &user_initiate_body()).await;
    let response = server
        .post("/api/v1/fayda/verify")
        .json(&json!({ "sessionId": session_id, "code": CODE }))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    body["result"]["data"]["userId"]
        .as_str()
        .expect("No user id")
        .to_string()
}

/// Poll until `check` holds or give up after a few seconds
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    check()
}
