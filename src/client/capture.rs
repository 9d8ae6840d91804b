//! Session extraction from login responses.

use serde::Deserialize;

/// Status code a successful login reply carries in its body.
const LOGIN_OK: i64 = 200;

#[derive(Debug, Deserialize)]
struct LoginReply {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    session: Option<String>,
}

/// Pull the session token out of a login reply body.
///
/// Returns `None` unless the body is a JSON object with `code == 200` and a
/// non-empty string `session`.
pub fn extract_session(body: &[u8]) -> Option<String> {
    let reply: LoginReply = serde_json::from_slice(body).ok()?;
    if reply.code != Some(LOGIN_OK) {
        return None;
    }
    reply.session.filter(|s| !s.is_empty())
}
