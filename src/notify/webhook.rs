//! WeCom group-bot webhook notifier.

use crate::cancel::Context;
use crate::notify::Notifier;
use crate::registry::options::{populate, ProviderOptions};
use crate::utils::errors::{CertimateError, Result};
use crate::utils::http::create_http_client;
use crate::utils::logger::Logger;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

const EXPECTED_HOST: &str = "qyapi.weixin.qq.com";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookNotifierConfig {
    #[serde(rename = "webhookUrl")]
    pub webhook_url: String,
}

#[derive(Debug, Deserialize)]
struct WebhookReply {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

pub struct WebhookNotifier {
    client: Client,
    webhook_url: Url,
    logger: Logger,
}

impl WebhookNotifier {
    pub fn new(config: WebhookNotifierConfig) -> Result<Self> {
        let webhook_url = Url::parse(&config.webhook_url).map_err(|e| {
            CertimateError::Config(format!("invalid webhook url '{}': {e}", config.webhook_url))
        })?;
        Ok(Self {
            client: create_http_client()?,
            webhook_url,
            logger: Logger::default(),
        })
    }

    pub fn from_options(options: &ProviderOptions) -> Result<Self> {
        Self::new(populate(&options.merged())?)
    }

    pub fn with_logger(mut self, logger: Option<Logger>) -> Self {
        self.logger = Logger::or_discard(logger);
        self
    }

    async fn post(&self, payload: &serde_json::Value) -> Result<(StatusCode, String)> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| CertimateError::vendor("wecom.SendMessage", e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CertimateError::vendor("wecom.SendMessage", e))?;
        Ok((status, text))
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, ctx: &Context, subject: &str, body: &str) -> Result<()> {
        if self.webhook_url.host_str() != Some(EXPECTED_HOST) {
            self.logger.scope(|| {
                warn!(
                    url = %self.webhook_url,
                    "the webhook url hostname is not '{EXPECTED_HOST}', please make sure it is correct"
                );
            });
        }

        let payload = json!({
            "msgtype": "text",
            "text": { "content": format!("{subject}\n\n{body}") },
        });
        let (status, text) = ctx.run(self.post(&payload)).await?;
        if !status.is_success() {
            return Err(CertimateError::vendor(
                "wecom.SendMessage",
                format!("unexpected status code: {}, resp: {text}", status.as_u16()),
            ));
        }

        let reply: WebhookReply = serde_json::from_str(&text).map_err(|e| {
            CertimateError::vendor("wecom.SendMessage", format!("failed to unmarshal response: {e}"))
        })?;
        if reply.errcode != 0 {
            return Err(CertimateError::vendor(
                "wecom.SendMessage",
                format!("errcode='{}', errmsg='{}'", reply.errcode, reply.errmsg),
            ));
        }

        self.logger.scope(|| debug!(subject, "notification delivered"));
        Ok(())
    }
}
