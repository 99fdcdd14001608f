//! Outbound OTP delivery.
//!
//! The gateway is a single fallible remote call: no retries here, the
//! caller decides what a failed delivery means.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::{SmsConfig, SmsGatewayKind};
use crate::error::AppError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, destination: &str, body: &str) -> Result<(), AppError>;
}

/// Posts a form-encoded message to an SMS provider endpoint.
pub struct HttpSmsGateway {
    client: Client,
    url: String,
    api_key: Option<String>,
    language: String,
    route: String,
}

impl HttpSmsGateway {
    pub fn new(config: &SmsConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            language: config.language.clone(),
            route: config.route.clone(),
        })
    }
}

#[async_trait]
impl NotificationGateway for HttpSmsGateway {
    async fn send(&self, destination: &str, body: &str) -> Result<(), AppError> {
        let mut request = self.client.post(&self.url).form(&[
            ("message", body),
            ("language", self.language.as_str()),
            ("route", self.route.as_str()),
            ("numbers", destination),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("authorization", key.as_str());
        }

        let res = request.send().await?;
        if !res.status().is_success() {
            let status = res.status();
            error!(destination = %destination, status = %status, "SMS provider rejected message");
            return Err(AppError::DependencyError(format!(
                "Failed to send OTP: provider returned {}",
                status
            )));
        }

        info!(destination = %destination, "OTP message handed to SMS provider");
        Ok(())
    }
}

/// Development gateway: writes the message to the log instead of sending it.
#[derive(Clone, Debug, Default)]
pub struct ConsoleGateway;

impl ConsoleGateway {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationGateway for ConsoleGateway {
    async fn send(&self, destination: &str, body: &str) -> Result<(), AppError> {
        info!(destination = %destination, body = %body, "OTP message (development mode, not sent)");
        Ok(())
    }
}

pub fn gateway_from_config(config: &SmsConfig) -> Result<Arc<dyn NotificationGateway>, AppError> {
    Ok(match config.gateway {
        SmsGatewayKind::Console => Arc::new(ConsoleGateway::new()),
        SmsGatewayKind::Http => Arc::new(HttpSmsGateway::new(config)?),
    })
}
