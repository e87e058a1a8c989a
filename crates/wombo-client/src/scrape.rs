//! Token extraction from Dream's public pages and bundles
//!
//! Everything that depends on the layout of third-party markup lives here.
//! When the site changes, update these patterns and the frozen fixtures under
//! `tests/fixtures/`, nothing else.

use regex::Regex;
use std::sync::OnceLock;
use wombo_core::{DreamError, Result};

static BUNDLE_TOKEN: OnceLock<Regex> = OnceLock::new();
static API_KEY: OnceLock<Regex> = OnceLock::new();
static BUILD_ID: OnceLock<Regex> = OnceLock::new();

fn pattern(cell: &'static OnceLock<Regex>, source: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(source).expect("static pattern compiles"))
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extract `<token>` from the first `_app-<token>` on the creation page
pub fn extract_bundle_token(html: &str) -> Result<String> {
    first_capture(pattern(&BUNDLE_TOKEN, r"_app-(\w+)"), html).ok_or_else(|| {
        DreamError::Parse("creation page has no _app-<token> bundle reference".to_string())
    })
}

/// Extract the first quoted `"AI…"` API key from the app bundle
pub fn extract_api_key(bundle: &str) -> Result<String> {
    first_capture(pattern(&API_KEY, r#""(AI\w+)""#), bundle)
        .ok_or_else(|| DreamError::Parse("app bundle has no \"AI…\" API key".to_string()))
}

/// Extract the Next.js build id from the `_ssgManifest.js` script path
pub fn extract_build_id(html: &str) -> Result<String> {
    first_capture(
        pattern(&BUILD_ID, r"/_next/static/([a-zA-Z0-9-]+)/_ssgManifest\.js"),
        html,
    )
    .ok_or_else(|| DreamError::Parse("site root has no _ssgManifest.js build id".to_string()))
}
