use crate::config::config::LlmCfg;
use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::info;

/// Injected reasoning seam. One call per decision; the adapter above this
/// trait translates every failure into "no proposal".
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn reason(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// OpenAI-compatible chat client (OpenRouter by default), rate limited.
#[derive(Clone)]
pub struct OpenAiReasoner {
    client: Client<OpenAIConfig>,
    cfg: LlmCfg,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl OpenAiReasoner {
    pub fn new(cfg: LlmCfg) -> Self {
        let rpm = NonZeroU32::new(cfg.rate_limit_rpm).unwrap_or(NonZeroU32::new(1).unwrap());
        let quota = Quota::per_minute(rpm);
        let limiter = Arc::new(RateLimiter::direct(quota));

        let openai_config = OpenAIConfig::new()
            .with_api_key(&cfg.api_key)
            .with_api_base(&cfg.base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            cfg,
            limiter,
        }
    }
}

#[async_trait]
impl Reasoner for OpenAiReasoner {
    async fn reason(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.limiter.until_ready().await;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.cfg.model)
            .max_tokens(self.cfg.max_tokens)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_prompt)
                    .build()?
                    .into(),
            ])
            .build()?;

        info!(
            "Calling reasoner at {} with model {}",
            self.cfg.base_url, self.cfg.model
        );

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .context("reasoner request failed")?;

        let choice = response
            .choices
            .first()
            .context("no choices in reasoner response")?;
        let content = choice
            .message
            .content
            .as_ref()
            .context("no content in reasoner response")?;

        Ok(content.clone())
    }
}
