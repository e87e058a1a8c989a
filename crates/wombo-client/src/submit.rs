//! Task submission

use serde::Serialize;
use tracing::{info, instrument};
use wombo_core::config::{Endpoints, Timeouts};
use wombo_core::{Credential, DreamConfig, DreamError, Result, Style, Task};

use crate::headers;
use crate::transport::{HttpRequest, Transport};

/// Prompts longer than this many characters are cut silently
pub const MAX_PROMPT_CHARS: usize = 200;

/// Preview frame cadence requested from the service
pub const DISPLAY_FREQ: u32 = 10;

#[derive(Debug, Serialize)]
struct CreateTaskRequest<'a> {
    is_premium: bool,
    input_spec: InputSpec<'a>,
}

#[derive(Debug, Serialize)]
struct InputSpec<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<&'a str>,
    prompt: &'a str,
    style: Style,
    display_freq: u32,
}

/// First [`MAX_PROMPT_CHARS`] characters of `prompt`
pub fn truncate_prompt(prompt: &str) -> &str {
    match prompt.char_indices().nth(MAX_PROMPT_CHARS) {
        Some((byte_index, _)) => &prompt[..byte_index],
        None => prompt,
    }
}

/// Serialized task-creation body
pub fn task_body(prompt: &str, style: Style, aspect_ratio: Option<&str>) -> Result<Vec<u8>> {
    let request = CreateTaskRequest {
        is_premium: false,
        input_spec: InputSpec {
            aspect_ratio,
            prompt: truncate_prompt(prompt),
            style,
            display_freq: DISPLAY_FREQ,
        },
    };
    Ok(serde_json::to_vec(&request)?)
}

/// Creates generation tasks
#[derive(Debug, Clone)]
pub struct TaskSubmitter<T: Transport> {
    transport: T,
    endpoints: Endpoints,
    timeouts: Timeouts,
    aspect_ratio: Option<String>,
}

impl<T: Transport> TaskSubmitter<T> {
    pub fn new(transport: T, config: &DreamConfig) -> Self {
        Self {
            transport,
            endpoints: config.endpoints.clone(),
            timeouts: config.timeouts.clone(),
            aspect_ratio: None,
        }
    }

    /// Request a specific aspect ratio (e.g. `"old_vertical_ratio"`)
    pub fn with_aspect_ratio(mut self, aspect_ratio: impl Into<String>) -> Self {
        self.aspect_ratio = Some(aspect_ratio.into());
        self
    }

    /// Submit `prompt` and return the server-assigned task
    #[instrument(skip(self, credential, prompt), fields(style = %style, prompt_len = prompt.chars().count()))]
    pub async fn submit(&self, credential: &Credential, prompt: &str, style: Style) -> Result<Task> {
        let body = task_body(prompt, style, self.aspect_ratio.as_deref())?;
        let request = HttpRequest::post(&self.endpoints.tasks_url)
            .headers(headers::task_headers(credential))
            .header("content-type", "application/json")
            .body(body)
            .timeout(self.timeouts.submit());

        let response = self.transport.execute(request).await?;

        if !response.is_success() {
            return Err(DreamError::Submission(format!(
                "task creation rejected with {}: {}",
                response.status,
                response.snippet()
            )));
        }

        let task: Task = response
            .json()
            .map_err(|e| DreamError::Submission(format!("malformed task response: {}", e)))?;

        info!("Submitted task {} (state {})", task.id, task.state);
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpResponse, Method, MockTransport};
    use serde_json::json;

    fn submitter(mock: &MockTransport) -> TaskSubmitter<MockTransport> {
        TaskSubmitter::new(mock.clone(), &DreamConfig::default())
    }

    #[tokio::test]
    async fn test_submit_sends_exact_body() {
        let config = DreamConfig::default();
        let mock = MockTransport::new().with_json(
            Method::Post,
            &config.endpoints.tasks_url,
            &json!({ "id": "task-1", "state": "pending" }),
        );

        let task = submitter(&mock)
            .submit(&Credential::new("T1"), "hello", Style(84))
            .await
            .unwrap();
        assert_eq!(task.id, "task-1");

        let sent = mock.requests_to(Method::Post, &config.endpoints.tasks_url);
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].body_text().unwrap(),
            r#"{"is_premium":false,"input_spec":{"prompt":"hello","style":84,"display_freq":10}}"#
        );
        assert_eq!(sent[0].header_value("authorization"), Some("bearer T1"));
    }

    #[test]
    fn test_prompt_truncated_to_200_chars() {
        let prompt = "a".repeat(250);
        assert_eq!(truncate_prompt(&prompt), "a".repeat(200));
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let prompt = "ü".repeat(201);
        let truncated = truncate_prompt(&prompt);
        assert_eq!(truncated.chars().count(), 200);
    }

    #[test]
    fn test_short_prompt_untouched() {
        assert_eq!(truncate_prompt("hello"), "hello");
        assert_eq!(truncate_prompt(""), "");
    }

    #[tokio::test]
    async fn test_long_prompt_submitted_truncated() {
        let config = DreamConfig::default();
        let mock = MockTransport::new().with_json(
            Method::Post,
            &config.endpoints.tasks_url,
            &json!({ "id": "task-1", "state": "pending" }),
        );
        let prompt = "b".repeat(250);
        submitter(&mock)
            .submit(&Credential::new("T1"), &prompt, Style::default())
            .await
            .unwrap();

        let sent = mock.requests_to(Method::Post, &config.endpoints.tasks_url);
        let body: serde_json::Value = serde_json::from_slice(sent[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(body["input_spec"]["prompt"], "b".repeat(200));
    }

    #[test]
    fn test_prompt_is_json_escaped() {
        let body = task_body(r#"say "hi""#, Style(84), None).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["input_spec"]["prompt"], r#"say "hi""#);
    }

    #[test]
    fn test_aspect_ratio_only_when_set() {
        let body = task_body("x", Style(84), Some("old_vertical_ratio")).unwrap();
        assert_eq!(
            String::from_utf8(body).unwrap(),
            r#"{"is_premium":false,"input_spec":{"aspect_ratio":"old_vertical_ratio","prompt":"x","style":84,"display_freq":10}}"#
        );
    }

    #[tokio::test]
    async fn test_rejected_submission() {
        let config = DreamConfig::default();
        let mock = MockTransport::new().with_response(
            Method::Post,
            &config.endpoints.tasks_url,
            HttpResponse::new(401, "unauthorized"),
        );
        let err = submitter(&mock)
            .submit(&Credential::new("T1"), "hello", Style(84))
            .await
            .unwrap_err();
        assert!(matches!(err, DreamError::Submission(_)));
    }

    #[tokio::test]
    async fn test_unparseable_submission_response() {
        let config = DreamConfig::default();
        let mock = MockTransport::new().with_text(
            Method::Post,
            &config.endpoints.tasks_url,
            "<html>oops</html>",
        );
        let err = submitter(&mock)
            .submit(&Credential::new("T1"), "hello", Style(84))
            .await
            .unwrap_err();
        assert!(matches!(err, DreamError::Submission(_)));
    }
}
