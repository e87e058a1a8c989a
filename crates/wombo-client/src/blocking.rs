//! Blocking wrapper around [`Dream`]
//!
//! Drives the async client on a private current-thread runtime. Do not call
//! these methods from inside another tokio runtime.

use tokio::runtime::Runtime;
use wombo_core::{Credential, DreamConfig, Result, StyleInfo, Task};

use crate::dream::{Dream, GenerateOptions, Generation};
use crate::transport::{ReqwestTransport, Transport};

/// Synchronous Dream client
pub struct BlockingDream<T: Transport + Clone + 'static> {
    inner: Dream<T>,
    runtime: Runtime,
}

impl BlockingDream<ReqwestTransport> {
    pub fn new() -> Result<Self> {
        Self::from_config(DreamConfig::default())
    }

    pub fn from_config(config: DreamConfig) -> Result<Self> {
        Self::wrap(Dream::from_config(config)?)
    }
}

impl<T: Transport + Clone + 'static> BlockingDream<T> {
    /// Wrap an already configured async client
    pub fn wrap(inner: Dream<T>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self { inner, runtime })
    }

    pub fn inner(&self) -> &Dream<T> {
        &self.inner
    }

    pub fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<Generation> {
        self.runtime.block_on(self.inner.generate(prompt, options))
    }

    pub fn acquire_credential(&self) -> Result<Credential> {
        self.runtime.block_on(self.inner.acquire_credential())
    }

    pub fn check(&self, task_id: &str) -> Result<Task> {
        self.runtime.block_on(self.inner.check(task_id))
    }

    pub fn assemble_animation(&self, urls: &[String]) -> Result<Vec<u8>> {
        self.runtime.block_on(self.inner.assemble_animation(urls))
    }

    pub fn styles(&self) -> Result<Vec<StyleInfo>> {
        self.runtime.block_on(self.inner.styles())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Method, MockTransport};
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_blocking_generate() {
        let config = DreamConfig::default();
        let mock = MockTransport::new()
            .with_json(
                Method::Post,
                &config.endpoints.tasks_url,
                &json!({ "id": "b-1", "state": "pending" }),
            )
            .with_json(
                Method::Get,
                &config.endpoints.task_url("b-1"),
                &json!({ "id": "b-1", "state": "completed", "photo_url_list": ["a", "b"] }),
            );

        let dream = BlockingDream::wrap(Dream::with_transport(mock, config).with_token("T1")).unwrap();
        let options = GenerateOptions::default()
            .with_interval(Duration::from_millis(1))
            .with_budget(Duration::from_secs(1));

        let result = dream.generate("owl", &options).unwrap();
        assert_eq!(result.task().photo_url_list.len(), 2);
    }

    #[test]
    fn test_blocking_check() {
        let config = DreamConfig::default();
        let mock = MockTransport::new().with_json(
            Method::Get,
            &config.endpoints.task_url("b-2"),
            &json!({ "id": "b-2", "state": "failed" }),
        );
        let dream = BlockingDream::wrap(Dream::with_transport(mock, config)).unwrap();
        let task = dream.check("b-2").unwrap();
        assert_eq!(task.id, "b-2");
    }
}
