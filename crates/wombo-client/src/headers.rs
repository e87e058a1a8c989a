//! Fixed request headers the Dream endpoints expect

use wombo_core::Credential;

const ORIGIN: &str = "https://dream.ai";
const REFERER: &str = "https://dream.ai/";
const APP_VERSION: &str = "WEB-2.0.0";

/// Headers for the identity-token exchange
pub fn identity_headers() -> Vec<(&'static str, String)> {
    vec![
        ("origin", ORIGIN.to_string()),
        ("referer", REFERER.to_string()),
        ("x-client-version", "Chrome/JsCore/9.1.2/FirebaseCore-web".to_string()),
    ]
}

/// Headers for task creation
pub fn task_headers(credential: &Credential) -> Vec<(&'static str, String)> {
    vec![
        ("authorization", credential.bearer()),
        ("origin", ORIGIN.to_string()),
        ("referer", REFERER.to_string()),
        ("x-app-version", APP_VERSION.to_string()),
    ]
}

/// Headers for status checks; the bearer is attached when one is held
pub fn check_headers(credential: Option<&Credential>) -> Vec<(&'static str, String)> {
    let mut headers = vec![
        ("origin", ORIGIN.to_string()),
        ("referer", REFERER.to_string()),
        ("x-app-version", APP_VERSION.to_string()),
    ];
    if let Some(credential) = credential {
        headers.insert(0, ("authorization", credential.bearer()));
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_headers_carry_bearer() {
        let headers = task_headers(&Credential::new("T1"));
        assert!(headers.contains(&("authorization", "bearer T1".to_string())));
    }

    #[test]
    fn test_check_headers_without_credential() {
        let headers = check_headers(None);
        assert!(headers.iter().all(|(k, _)| *k != "authorization"));
    }
}
