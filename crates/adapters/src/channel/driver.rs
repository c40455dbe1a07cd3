// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Channel adapter backed by an external automation driver
//!
//! Each call runs the configured driver executable once, writes one JSON
//! request to its stdin and reads one JSON response from its stdout.
//! Sessions live inside the driver; this side only carries their ids.
//!
//! ```text
//! → {"op":"submit","session":"s-1","submission":{"kind":"post","text":"hi"}}
//! ← {"ok":true}
//! ← {"ok":false,"error":{"kind":"rejected","message":"duplicate content"}}
//! ```

use super::{ActivityItem, ChannelAdapter, ChannelError, SessionId, Submission};
use async_trait::async_trait;
use courier_core::ChannelSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Environment variable carrying the credentials path to the driver
pub const CREDENTIALS_ENV: &str = "COURIER_CREDENTIALS";

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum DriverRequest<'a> {
    OpenSession,
    CloseSession {
        session: &'a str,
    },
    Submit {
        session: &'a str,
        submission: &'a Submission,
    },
    ObserveNavigation {
        session: &'a str,
        wait_ms: u64,
    },
    ConfirmationSurface {
        session: &'a str,
        wait_ms: u64,
    },
    RecentActivity {
        session: &'a str,
        limit: usize,
    },
}

impl DriverRequest<'_> {
    fn op(&self) -> &'static str {
        match self {
            DriverRequest::OpenSession => "open_session",
            DriverRequest::CloseSession { .. } => "close_session",
            DriverRequest::Submit { .. } => "submit",
            DriverRequest::ObserveNavigation { .. } => "observe_navigation",
            DriverRequest::ConfirmationSurface { .. } => "confirmation_surface",
            DriverRequest::RecentActivity { .. } => "recent_activity",
        }
    }
}

#[derive(Debug, Deserialize)]
struct DriverResponse {
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<DriverErrorBody>,
}

#[derive(Debug, Deserialize)]
struct DriverErrorBody {
    kind: String,
    #[serde(default)]
    message: String,
}

impl From<DriverErrorBody> for ChannelError {
    fn from(body: DriverErrorBody) -> Self {
        match body.kind.as_str() {
            "rejected" => ChannelError::Rejected(body.message),
            "unavailable" => ChannelError::Unavailable(body.message),
            "timeout" => ChannelError::Timeout(body.message),
            "session_not_found" => ChannelError::SessionNotFound(body.message),
            "unsupported" => ChannelError::Unsupported(body.message),
            other => ChannelError::Protocol(format!("{other}: {}", body.message)),
        }
    }
}

/// Channel adapter that shells out to a driver executable
#[derive(Clone, Debug)]
pub struct DriverChannelAdapter {
    driver: PathBuf,
    credentials: PathBuf,
    args: Vec<String>,
    call_timeout: Duration,
}

impl DriverChannelAdapter {
    pub fn new(settings: &ChannelSettings) -> Self {
        Self {
            driver: settings.driver.clone(),
            credentials: settings.credentials.clone(),
            args: settings.args.clone(),
            call_timeout: settings.call_timeout,
        }
    }

    /// Run one request; `extra` extends the timeout for calls that wait on the channel
    async fn call(
        &self,
        request: &DriverRequest<'_>,
        extra: Duration,
    ) -> Result<serde_json::Value, ChannelError> {
        let payload = serde_json::to_string(request)
            .map_err(|e| ChannelError::Protocol(e.to_string()))?;

        let mut child = Command::new(&self.driver)
            .args(&self.args)
            .env(CREDENTIALS_ENV, &self.credentials)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ChannelError::Unavailable(format!("{}: {e}", self.driver.display()))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(payload.as_bytes())
                .await
                .map_err(|e| ChannelError::Unavailable(e.to_string()))?;
            stdin
                .write_all(b"\n")
                .await
                .map_err(|e| ChannelError::Unavailable(e.to_string()))?;
        }

        let limit = self.call_timeout + extra;
        let output = match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ChannelError::Unavailable(e.to_string())),
            Err(_) => {
                return Err(ChannelError::Timeout(format!(
                    "{} gave no answer within {}ms",
                    request.op(),
                    limit.as_millis()
                )))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout.lines().rev().find(|l| !l.trim().is_empty());
        let Some(line) = line else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ChannelError::Unavailable(format!(
                "driver exited with {} and no response: {}",
                output.status,
                stderr.trim()
            )));
        };

        let response: DriverResponse =
            serde_json::from_str(line).map_err(|e| ChannelError::Protocol(e.to_string()))?;
        if response.ok {
            Ok(response.value)
        } else {
            Err(response
                .error
                .map(ChannelError::from)
                .unwrap_or_else(|| ChannelError::Protocol("error without body".to_string())))
        }
    }

    fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, ChannelError> {
        serde_json::from_value(value).map_err(|e| ChannelError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl ChannelAdapter for DriverChannelAdapter {
    async fn open_session(&self) -> Result<SessionId, ChannelError> {
        let value = self
            .call(&DriverRequest::OpenSession, Duration::ZERO)
            .await?;
        Self::decode(value)
    }

    async fn close_session(&self, session: &str) -> Result<(), ChannelError> {
        self.call(&DriverRequest::CloseSession { session }, Duration::ZERO)
            .await?;
        Ok(())
    }

    async fn submit(&self, session: &str, submission: &Submission) -> Result<(), ChannelError> {
        self.call(
            &DriverRequest::Submit {
                session,
                submission,
            },
            Duration::ZERO,
        )
        .await?;
        Ok(())
    }

    async fn observe_navigation(
        &self,
        session: &str,
        wait: Duration,
    ) -> Result<Option<String>, ChannelError> {
        let value = self
            .call(
                &DriverRequest::ObserveNavigation {
                    session,
                    wait_ms: wait.as_millis() as u64,
                },
                wait,
            )
            .await?;
        Self::decode(value)
    }

    async fn confirmation_surface(
        &self,
        session: &str,
        wait: Duration,
    ) -> Result<Option<String>, ChannelError> {
        let value = self
            .call(
                &DriverRequest::ConfirmationSurface {
                    session,
                    wait_ms: wait.as_millis() as u64,
                },
                wait,
            )
            .await?;
        Self::decode(value)
    }

    async fn recent_activity(
        &self,
        session: &str,
        limit: usize,
    ) -> Result<Vec<ActivityItem>, ChannelError> {
        let value = self
            .call(&DriverRequest::RecentActivity { session, limit }, Duration::ZERO)
            .await?;
        Self::decode(value)
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
