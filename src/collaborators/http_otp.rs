use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{CollabResult, CollaboratorError, OtpVerifier};

/// Client for the OTP verification service: `POST {base}/otp_auth/{email}/` with `{"otp": code}`.
/// A 200 means the code is valid; any other status is a failed check.
#[derive(Debug, Clone)]
pub struct HttpOtpVerifier {
    base_url: String,
    client: reqwest::Client,
}

impl HttpOtpVerifier {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { base_url: base_url.into(), client })
    }

    fn endpoint(&self, email: &str) -> String {
        format!("{}/otp_auth/{}/", self.base_url.trim_end_matches('/'), email)
    }
}

#[async_trait]
impl OtpVerifier for HttpOtpVerifier {
    async fn verify(&self, email: &str, code: &str) -> CollabResult<bool> {
        let resp = self
            .client
            .post(self.endpoint(email))
            .json(&json!({ "otp": code }))
            .send()
            .await
            .map_err(|e| CollaboratorError::Unavailable { service: "otp", detail: e.to_string() })?;
        let status = resp.status();
        debug!(target: "membership::auth", "otp service answered {} for {}", status, email);
        Ok(status == reqwest::StatusCode::OK)
    }
}
