//! Core type definitions for the Dream wire model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Anonymous bearer credential returned by the identity-token exchange
///
/// Short-lived and never persisted. `Debug` redacts the token so it can't
/// leak into logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    id_token: String,
    acquired_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(id_token: impl Into<String>) -> Self {
        Self {
            id_token: id_token.into(),
            acquired_at: Utc::now(),
        }
    }

    /// The raw `idToken`
    pub fn id_token(&self) -> &str {
        &self.id_token
    }

    /// When this credential was obtained
    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("bearer {}", self.id_token)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id_token", &"<redacted>")
            .field("acquired_at", &self.acquired_at)
            .finish()
    }
}

/// Rendering style code
///
/// The set of valid codes belongs to the service; see `StyleCatalog` in
/// `wombo-client` for the live list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Style(pub u32);

impl Style {
    pub const DEFAULT: Style = Style(84);

    pub fn code(&self) -> u32 {
        self.0
    }
}

impl Default for Style {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u32> for Style {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

impl std::fmt::Display for Style {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Style {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(Style)
            .map_err(|_| format!("Invalid style code: {}", s))
    }
}

/// One entry of the service's style list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleInfo {
    pub id: Style,
    pub name: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
}

/// Task state as reported by the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteState {
    Pending,
    Input,
    Generating,
    Completed,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for RemoteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Input => write!(f, "input"),
            Self::Generating => write!(f, "generating"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Final rendering reported once a task completes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(rename = "final", default)]
    pub final_url: Option<String>,
}

/// Server-side generation job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Opaque id assigned by the service
    pub id: String,
    #[serde(default)]
    pub state: RemoteState,
    /// Preview frames in generation order
    #[serde(default, deserialize_with = "null_as_empty")]
    pub photo_url_list: Vec<String>,
    #[serde(default)]
    pub result: Option<TaskResult>,
}

impl Task {
    /// Whether the service has produced its result
    ///
    /// A task counts as finished once it has at least one preview frame and
    /// is no longer `generating`.
    pub fn is_finished(&self) -> bool {
        !self.photo_url_list.is_empty() && self.state != RemoteState::Generating
    }

    /// URL of the final image, falling back to the last preview frame
    pub fn final_url(&self) -> Option<&str> {
        self.result
            .as_ref()
            .and_then(|r| r.final_url.as_deref())
            .or_else(|| self.photo_url_list.last().map(String::as_str))
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<String>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_default_and_parse() {
        assert_eq!(Style::default(), Style(84));
        assert_eq!("32".parse::<Style>().unwrap(), Style(32));
        assert!("cyberpunk".parse::<Style>().is_err());
    }

    #[test]
    fn test_style_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Style(84)).unwrap(), "84");
    }

    #[test]
    fn test_credential_debug_redacts_token() {
        let cred = Credential::new("secret-token");
        let dbg = format!("{:?}", cred);
        assert!(!dbg.contains("secret-token"));
        assert_eq!(cred.bearer(), "bearer secret-token");
    }

    #[test]
    fn test_task_from_submission_response() {
        let task: Task = serde_json::from_str(r#"{"id":"abc","state":"pending"}"#).unwrap();
        assert_eq!(task.id, "abc");
        assert_eq!(task.state, RemoteState::Pending);
        assert!(task.photo_url_list.is_empty());
        assert!(!task.is_finished());
    }

    #[test]
    fn test_task_null_photo_list() {
        let task: Task =
            serde_json::from_str(r#"{"id":"abc","state":"generating","photo_url_list":null}"#)
                .unwrap();
        assert!(task.photo_url_list.is_empty());
    }

    #[test]
    fn test_unknown_state_is_tolerated() {
        let task: Task = serde_json::from_str(r#"{"id":"abc","state":"queued"}"#).unwrap();
        assert_eq!(task.state, RemoteState::Unknown);
    }

    #[test]
    fn test_is_finished_needs_frames_and_non_generating_state() {
        let mut task = Task {
            id: "t".to_string(),
            state: RemoteState::Generating,
            photo_url_list: vec!["a".to_string()],
            result: None,
        };
        assert!(!task.is_finished());

        task.state = RemoteState::Completed;
        assert!(task.is_finished());

        task.photo_url_list.clear();
        assert!(!task.is_finished());
    }

    #[test]
    fn test_final_url_prefers_result() {
        let task: Task = serde_json::from_str(
            r#"{"id":"t","state":"completed","photo_url_list":["a","b"],"result":{"final":"f"}}"#,
        )
        .unwrap();
        assert_eq!(task.final_url(), Some("f"));

        let task = Task {
            result: None,
            ..task
        };
        assert_eq!(task.final_url(), Some("b"));
    }
}
