//! Chromium-backed portal driver
//!
//! One browser process per automation session. Every path out of
//! [`ChromiumDriver::open_challenge`] either hands the live page to the caller
//! inside a [`PortalPage`] or closes the browser before returning.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventResponseReceived, Headers, SetExtraHttpHeadersParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use fayda_core::{ExtractedIdentityRecord, ExtractionError, ExtractionLayout, Fan, OtpCode, PageSnapshot};
use futures::StreamExt;
use serde_json::json;
use tokio::task::JoinHandle;

use super::{AutomationError, ChallengeHandle, ChallengeOutcome, PortalDriver};
use crate::config::PortalConfig;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

const BROWSER_ARGS: [&str; 3] = [
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
];

// Portal selectors
const FAN_INPUT: &str = r#"input[name="fcn"]"#;
const SUBMIT_BUTTON: &str = r#"button[type="submit"]"#;
const CHALLENGE_HEADING: &str = "p.font-semibold.text-xl";
const PROFILE_IMAGE: &str = r#"img[alt="userPicture"]"#;
const OTP_INPUTS: &str = r#"input[aria-label^="Please enter OTP character"]"#;

const CLEAR_FAN_INPUT: &str = r#"(() => {
    const el = document.querySelector('input[name="fcn"]');
    if (el) { el.value = ''; }
})()"#;

const SNAPSHOT_SCRIPT: &str = r#"(() => ({
    image: document.querySelector('img[alt="userPicture"]')?.src ?? null,
    fanInput: document.querySelector('input[name="fcn"]')?.value ?? null,
    spans: Array.from(document.querySelectorAll('span')).map(el => el.textContent.trim()),
}))()"#;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const PROFILE_IMAGE_WAIT: Duration = Duration::from_secs(10);

fn browser_err(err: CdpError) -> AutomationError {
    match err {
        CdpError::Timeout => AutomationError::Timeout("browser command"),
        other => AutomationError::Browser(other.to_string()),
    }
}

/// Resolves once `selector` matches an element
async fn appears(page: &Page, selector: &str) {
    loop {
        if page.find_element(selector).await.is_ok() {
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn wait_for(page: &Page, selector: &str, timeout: Duration) -> bool {
    tokio::time::timeout(timeout, appears(page, selector))
        .await
        .is_ok()
}

async fn is_present(page: &Page, selector: &str) -> bool {
    page.find_element(selector).await.is_ok()
}

/// Which screen the portal showed after the FAN was submitted
enum Screen {
    Challenge,
    Result,
}

/// Portal driver that launches a local Chromium per session
pub struct ChromiumDriver {
    config: PortalConfig,
    layout: ExtractionLayout,
}

impl ChromiumDriver {
    pub fn new(config: PortalConfig, layout: ExtractionLayout) -> Self {
        Self { config, layout }
    }

    async fn launch(&self) -> Result<PortalPage, AutomationError> {
        let mut builder = BrowserConfig::builder()
            .args(BROWSER_ARGS)
            .window_size(1920, 1080)
            .request_timeout(self.config.navigation_timeout);
        if !self.config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder.build().map_err(AutomationError::Launch)?;

        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| AutomationError::Launch(e.to_string()))?;

        // The handler drives the CDP connection; it ends when the browser goes away
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "Browser handler error");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(browser_err(e));
            }
        };

        Ok(PortalPage {
            browser: Some(browser),
            page: Some(page),
            handler: handler_task,
            layout: self.layout.clone(),
            config: self.config.clone(),
        })
    }
}

#[async_trait]
impl PortalDriver for ChromiumDriver {
    async fn open_challenge(&self, fan: &Fan) -> Result<ChallengeOutcome, AutomationError> {
        let mut session = self.launch().await?;

        match session.submit_fan(fan).await {
            Ok(Screen::Challenge) => {
                tracing::info!(fan = %fan.masked(), "Portal presented a challenge");
                Ok(ChallengeOutcome::Challenge(Box::new(session)))
            }
            Ok(Screen::Result) => {
                tracing::info!(fan = %fan.masked(), "Portal granted direct access");
                let record = session.extract().await;
                session.close().await;
                record.map(ChallengeOutcome::DirectAccess)
            }
            Err(e) => {
                session.close().await;
                Err(e)
            }
        }
    }
}

/// A browser parked on a portal page
pub struct PortalPage {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: JoinHandle<()>,
    layout: ExtractionLayout,
    config: PortalConfig,
}

impl PortalPage {
    fn page(&self) -> Result<&Page, AutomationError> {
        self.page.as_ref().ok_or(AutomationError::SessionExpired)
    }

    async fn submit_fan(&self, fan: &Fan) -> Result<Screen, AutomationError> {
        let page = self.page()?;
        let timeout = self.config.navigation_timeout;

        page.set_user_agent(USER_AGENT)
            .await
            .map_err(browser_err)?;
        page.execute(SetExtraHttpHeadersParams::new(Headers::new(json!({
            "accept-language": ACCEPT_LANGUAGE
        }))))
        .await
        .map_err(browser_err)?;

        tracing::debug!(url = %self.config.url, "Navigating to portal");
        tokio::time::timeout(timeout, page.goto(self.config.url.as_str()))
            .await
            .map_err(|_| AutomationError::Timeout("portal navigation"))?
            .map_err(browser_err)?;

        if !wait_for(page, FAN_INPUT, timeout).await {
            return Err(AutomationError::Timeout("FAN input"));
        }

        tracing::debug!("Filling FAN");
        page.evaluate(CLEAR_FAN_INPUT).await.map_err(browser_err)?;
        page.find_element(FAN_INPUT)
            .await
            .map_err(browser_err)?
            .click()
            .await
            .map_err(browser_err)?
            .type_str(fan.as_str())
            .await
            .map_err(browser_err)?;

        tracing::debug!("Submitting FAN");
        page.find_element(SUBMIT_BUTTON)
            .await
            .map_err(browser_err)?
            .click()
            .await
            .map_err(browser_err)?;

        let race = async {
            tokio::select! {
                _ = appears(page, CHALLENGE_HEADING) => Screen::Challenge,
                _ = appears(page, PROFILE_IMAGE) => Screen::Result,
            }
        };
        tokio::time::timeout(self.config.challenge_timeout, race)
            .await
            .map_err(|_| AutomationError::ChallengeNotPresented)
    }

    async fn extract(&self) -> Result<ExtractedIdentityRecord, AutomationError> {
        let page = self.page()?;

        if !wait_for(page, PROFILE_IMAGE, PROFILE_IMAGE_WAIT).await {
            return Err(ExtractionError::MissingProfileImage.into());
        }

        let snapshot: PageSnapshot = page
            .evaluate(SNAPSHOT_SCRIPT)
            .await
            .map_err(browser_err)?
            .into_value()
            .map_err(|e| AutomationError::Browser(format!("Unreadable page snapshot: {}", e)))?;

        self.layout.extract(&snapshot).map_err(|e| {
            // Page text stays in the logs; callers only see the error kind
            tracing::error!(
                layout = %self.layout.version,
                error = %e,
                spans = ?snapshot.spans,
                "Extraction failed"
            );
            e.into()
        })
    }
}

#[async_trait]
impl ChallengeHandle for PortalPage {
    async fn submit_code(&mut self, code: &OtpCode) -> Result<ExtractedIdentityRecord, AutomationError> {
        if !self.is_live() {
            return Err(AutomationError::SessionExpired);
        }
        let page = self.page()?;
        let timeout = self.config.result_timeout;

        let inputs = page.find_elements(OTP_INPUTS).await.map_err(browser_err)?;
        if inputs.len() != OtpCode::LEN {
            return Err(AutomationError::InvalidChallengeLayout {
                expected: OtpCode::LEN,
                found: inputs.len(),
            });
        }

        tracing::debug!("Entering code");
        for (input, digit) in inputs.iter().zip(code.digits()) {
            input.focus().await.map_err(browser_err)?;
            input.type_str(digit.to_string()).await.map_err(browser_err)?;
        }

        // Listen before clicking so a fast response is not missed
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(browser_err)?;

        tracing::debug!("Submitting code");
        page.find_element(SUBMIT_BUTTON)
            .await
            .map_err(browser_err)?
            .click()
            .await
            .map_err(browser_err)?;

        let navigated = matches!(
            tokio::time::timeout(timeout, page.wait_for_navigation()).await,
            Ok(Ok(_))
        );

        if !navigated && !is_present(page, PROFILE_IMAGE).await {
            tracing::debug!("Navigation wait failed, waiting for a successful response");
            let _ = tokio::time::timeout(timeout, async {
                while let Some(event) = responses.next().await {
                    if event.response.status == 200 {
                        break;
                    }
                }
            })
            .await;
        }

        if !wait_for(page, PROFILE_IMAGE, timeout).await {
            return Err(AutomationError::ResultPageUnreachable);
        }

        self.extract().await
    }

    async fn close(&mut self) {
        // Dropping the page first: closing the browser takes its targets with it
        self.page.take();

        if let Some(mut browser) = self.browser.take() {
            if self.handler.is_finished() {
                // Connection already gone; make sure the process is too
                let _ = browser.kill().await;
            } else {
                if let Err(e) = browser.close().await {
                    tracing::warn!(error = %e, "Error closing browser");
                }
                if let Err(e) = browser.wait().await {
                    tracing::warn!(error = %e, "Error waiting for browser exit");
                }
            }
        }

        self.handler.abort();
    }

    fn is_live(&self) -> bool {
        self.browser.is_some() && self.page.is_some() && !self.handler.is_finished()
    }
}
