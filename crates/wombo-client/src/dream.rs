//! End-to-end generation
//!
//! [`Dream`] chains the stages: acquire a credential, submit the prompt,
//! poll to completion, and optionally turn the preview frames into a GIF.
//! Stage errors are returned as-is.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use wombo_core::{Credential, DreamConfig, DreamError, Result, Style, StyleInfo, Task};

use crate::auth::{token_from_env, AnonymousCredentials, CredentialSource, StaticCredential};
use crate::frames::FrameAggregator;
use crate::poll::{PollOptions, TaskPoller};
use crate::styles::{SiteStyleCatalog, StyleCatalog};
use crate::submit::TaskSubmitter;
use crate::transport::{ReqwestTransport, Transport};

/// Per-call generation settings
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    pub style: Style,
    pub poll: PollOptions,
    /// Assemble the preview frames into a GIF
    pub animate: bool,
    pub aspect_ratio: Option<String>,
}

impl GenerateOptions {
    /// Defaults with poll cadence taken from `config`
    pub fn from_config(config: &DreamConfig) -> Self {
        Self {
            style: Style::default(),
            poll: PollOptions::from(&config.polling),
            animate: false,
            aspect_ratio: None,
        }
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.poll.interval = interval;
        self.poll.max_interval = self.poll.max_interval.max(interval);
        self
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.poll.budget = budget;
        self
    }

    pub fn with_animation(mut self, animate: bool) -> Self {
        self.animate = animate;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: impl Into<String>) -> Self {
        self.aspect_ratio = Some(aspect_ratio.into());
        self
    }
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self::from_config(&DreamConfig::default())
    }
}

/// Outcome of [`Dream::generate`]
#[derive(Debug, Clone)]
pub enum Generation {
    /// Completed task; image URLs in `photo_url_list`
    Task(Task),
    /// Completed task plus its frames encoded as a looping GIF
    Animation { task: Task, gif: Vec<u8> },
}

impl Generation {
    pub fn task(&self) -> &Task {
        match self {
            Generation::Task(task) => task,
            Generation::Animation { task, .. } => task,
        }
    }

    pub fn gif(&self) -> Option<&[u8]> {
        match self {
            Generation::Task(_) => None,
            Generation::Animation { gif, .. } => Some(gif),
        }
    }
}

/// Dream client
pub struct Dream<T: Transport + Clone> {
    transport: T,
    config: DreamConfig,
    credentials: Arc<dyn CredentialSource>,
}

impl Dream<ReqwestTransport> {
    /// Client over HTTP with default settings
    pub fn new() -> Result<Self> {
        Self::from_config(DreamConfig::default())
    }

    /// Client over HTTP; a token in `WOMBO_ID_TOKEN` replaces anonymous sign-up
    ///
    /// This is the only place the environment is consulted. A later
    /// [`with_token`](Self::with_token) or
    /// [`with_credentials`](Self::with_credentials) overrides it.
    pub fn from_config(config: DreamConfig) -> Result<Self> {
        let dream = Self::with_transport(ReqwestTransport::new()?, config);
        Ok(match token_from_env() {
            Some(source) => dream.with_credentials(source),
            None => dream,
        })
    }
}

impl<T: Transport + Clone + 'static> Dream<T> {
    /// Client over any transport, acquiring anonymous credentials through it
    pub fn with_transport(transport: T, config: DreamConfig) -> Self {
        let credentials = Arc::new(AnonymousCredentials::new(transport.clone(), &config));
        Self {
            transport,
            config,
            credentials,
        }
    }

    /// Replace the credential source
    pub fn with_credentials(mut self, source: impl CredentialSource + 'static) -> Self {
        self.credentials = Arc::new(source);
        self
    }

    /// Use a fixed token instead of anonymous sign-up
    pub fn with_token(self, id_token: impl Into<String>) -> Self {
        self.with_credentials(StaticCredential::new(id_token))
    }

    pub fn config(&self) -> &DreamConfig {
        &self.config
    }

    pub async fn acquire_credential(&self) -> Result<Credential> {
        self.credentials.acquire().await
    }

    /// Generate an image for `prompt`
    pub async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<Generation> {
        self.generate_with_cancel(prompt, options, &CancellationToken::new())
            .await
    }

    /// [`generate`](Self::generate) that stops polling when `cancel` fires
    #[instrument(skip(self, prompt, options, cancel), fields(style = %options.style, animate = options.animate))]
    pub async fn generate_with_cancel(
        &self,
        prompt: &str,
        options: &GenerateOptions,
        cancel: &CancellationToken,
    ) -> Result<Generation> {
        if options.poll.interval.is_zero() {
            return Err(DreamError::Config(
                "poll interval must be greater than zero".to_string(),
            ));
        }

        let credential = self.credentials.acquire().await?;

        let mut submitter = TaskSubmitter::new(self.transport.clone(), &self.config);
        if let Some(ratio) = &options.aspect_ratio {
            submitter = submitter.with_aspect_ratio(ratio.clone());
        }
        let task = submitter.submit(&credential, prompt, options.style).await?;

        let done = TaskPoller::new(self.transport.clone(), &self.config)
            .with_credential(credential)
            .poll_until_done_with_cancel(&task.id, options.poll, cancel)
            .await?;

        if !options.animate {
            return Ok(Generation::Task(done));
        }

        let gif = self.assemble_animation(&done.photo_url_list).await?;
        info!("Task {} produced a {} frame animation", done.id, done.photo_url_list.len());
        Ok(Generation::Animation { task: done, gif })
    }

    /// One status snapshot for an existing task
    pub async fn check(&self, task_id: &str) -> Result<Task> {
        TaskPoller::new(self.transport.clone(), &self.config)
            .poll(task_id)
            .await
    }

    /// Fetch `urls` and encode them, in order, as a looping GIF
    pub async fn assemble_animation(&self, urls: &[String]) -> Result<Vec<u8>> {
        FrameAggregator::new(self.transport.clone(), &self.config)
            .assemble_animation(urls)
            .await
    }

    pub async fn styles(&self) -> Result<Vec<StyleInfo>> {
        SiteStyleCatalog::new(self.transport.clone(), &self.config)
            .styles()
            .await
    }
}
