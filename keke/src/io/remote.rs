//! Remote agent transport.
//!
//! The loop talks to the model through [`RemoteAgent`]; [`HttpRemote`] is the
//! blocking HTTP implementation. Tests substitute a scripted agent.

use std::env;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use directories::BaseDirs;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use super::config::KekeConfig;
use crate::core::action::{ActionRecord, ToolCall, ToolResult};
use crate::core::tier::{Mode, ModelTier};
use crate::core::transcript::Turn;
use crate::ui::truncate_chars;

/// Environment variable holding the access token.
pub const ACCESS_TOKEN_ENV: &str = "KEKE_ACCESS_TOKEN";

const ERROR_BODY_CHARS: usize = 200;

/// Failure talking to the remote agent. Fatal to the current loop.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("could not reach remote agent: {0}")]
    Transport(String),
    #[error("insufficient credits")]
    InsufficientCredits,
    #[error("server error ({status}): {body}")]
    Server { status: u16, body: String },
    #[error("invalid response from remote agent: {0}")]
    Decode(String),
    #[error("remote agent not configured: {0}")]
    NotConfigured(String),
}

/// What one round sends besides the request-level selectors.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundPayload {
    /// Full ordered transcript (ask and research modes).
    Transcript(Vec<Turn>),
    /// Newest message plus continuation token (code mode).
    Message {
        text: String,
        session: Option<String>,
    },
    /// Results of the previous round's tool calls (code mode).
    ToolResults {
        results: Vec<ToolResult>,
        session: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoundRequest {
    pub tier: ModelTier,
    pub mode: Mode,
    pub provider: Option<String>,
    pub payload: RoundPayload,
}

/// One round's answer from the remote agent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemoteReply {
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(deserialize_with = "null_as_default")]
    pub actions: Vec<ActionRecord>,
    #[serde(deserialize_with = "null_as_default")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(alias = "credits")]
    pub credits_used: u64,
    pub done: bool,
    pub session_id: Option<String>,
}

impl RemoteReply {
    pub fn action_count(&self) -> usize {
        self.actions.len() + self.tool_calls.len()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One request/response exchange with the remote agent.
pub trait RemoteAgent {
    fn exchange(&self, request: &RoundRequest) -> Result<RemoteReply, RemoteError>;
}

/// Opaque credential forwarded to the remote agent.
#[derive(Clone)]
pub struct AuthContext {
    access_token: String,
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct AuthFile {
    #[serde(default)]
    access_token: String,
}

impl AuthContext {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    /// Token from [`ACCESS_TOKEN_ENV`], else from `~/.keke/auth.json`.
    pub fn discover() -> Result<Self> {
        if let Ok(token) = env::var(ACCESS_TOKEN_ENV)
            && !token.trim().is_empty()
        {
            return Ok(Self::new(token.trim()));
        }
        let path = auth_file_path()?;
        let contents = fs::read_to_string(&path).map_err(|_| {
            anyhow!("not logged in: set {ACCESS_TOKEN_ENV} or provide {}", path.display())
        })?;
        let file: AuthFile =
            serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
        if file.access_token.trim().is_empty() {
            return Err(anyhow!("no access token in {}", path.display()));
        }
        Ok(Self::new(file.access_token.trim()))
    }
}

fn auth_file_path() -> Result<PathBuf> {
    let dirs = BaseDirs::new().ok_or_else(|| anyhow!("cannot locate home directory"))?;
    Ok(dirs.home_dir().join(".keke").join("auth.json"))
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation: Option<&'a [Turn]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_results: Option<&'a [ToolResult]>,
    model: ModelTier,
    mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

impl<'a> WireRequest<'a> {
    fn from_round(request: &'a RoundRequest) -> Self {
        let mut wire = Self {
            conversation: None,
            message: None,
            tool_results: None,
            model: request.tier,
            mode: request.mode,
            provider: request.provider.as_deref(),
            session_id: None,
        };
        match &request.payload {
            RoundPayload::Transcript(turns) => wire.conversation = Some(turns),
            RoundPayload::Message { text, session } => {
                wire.message = Some(text);
                wire.session_id = session.as_deref();
            }
            RoundPayload::ToolResults { results, session } => {
                wire.tool_results = Some(results);
                wire.session_id = session.as_deref();
            }
        }
        wire
    }
}

/// Blocking HTTP client for the remote agent endpoint.
pub struct HttpRemote {
    client: Client,
    endpoint: String,
    auth: AuthContext,
}

impl HttpRemote {
    pub fn new(
        endpoint: impl Into<String>,
        auth: AuthContext,
        config: &KekeConfig,
    ) -> Result<Self, RemoteError> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(RemoteError::NotConfigured("empty endpoint".to_string()));
        }
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|err| RemoteError::Transport(format!("build HTTP client: {err}")))?;
        Ok(Self {
            client,
            endpoint,
            auth,
        })
    }
}

impl RemoteAgent for HttpRemote {
    #[instrument(skip_all, fields(mode = %request.mode, tier = %request.tier))]
    fn exchange(&self, request: &RoundRequest) -> Result<RemoteReply, RemoteError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.auth.access_token)
            .json(&WireRequest::from_round(request))
            .send()
            .map_err(|err| RemoteError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| RemoteError::Transport(format!("read response: {err}")))?;
        debug!(status = status.as_u16(), bytes = body.len(), "remote responded");

        if status == StatusCode::PAYMENT_REQUIRED {
            return Err(RemoteError::InsufficientCredits);
        }
        if !status.is_success() {
            return Err(RemoteError::Server {
                status: status.as_u16(),
                body: single_line(&body),
            });
        }
        parse_reply(&body)
    }
}

/// Decode a reply body.
pub fn parse_reply(body: &str) -> Result<RemoteReply, RemoteError> {
    serde_json::from_str(body).map_err(|err| RemoteError::Decode(err.to_string()))
}

fn single_line(body: &str) -> String {
    let joined = body.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&joined, ERROR_BODY_CHARS).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transcript::Role;
    use serde_json::{Value, json};

    fn wire_json(payload: RoundPayload, mode: Mode) -> Value {
        let request = RoundRequest {
            tier: ModelTier::Fast,
            mode,
            provider: Some("groq".to_string()),
            payload,
        };
        serde_json::to_value(WireRequest::from_round(&request)).expect("serialize")
    }

    #[test]
    fn transcript_round_sends_conversation() {
        let body = wire_json(
            RoundPayload::Transcript(vec![Turn {
                role: Role::User,
                content: "list files".to_string(),
            }]),
            Mode::Ask,
        );
        assert_eq!(
            body,
            json!({
                "conversation": [{"role": "user", "content": "list files"}],
                "model": "fast",
                "mode": "ask",
                "provider": "groq",
            })
        );
    }

    #[test]
    fn tool_results_round_carries_session() {
        let body = wire_json(
            RoundPayload::ToolResults {
                results: vec![ToolResult {
                    tool_call_id: "c1".to_string(),
                    output: "ok".to_string(),
                    error: None,
                }],
                session: Some("s-9".to_string()),
            },
            Mode::Code,
        );
        assert_eq!(body["session_id"], "s-9");
        assert_eq!(body["mode"], "code");
        assert_eq!(body["tool_results"][0]["tool_call_id"], "c1");
        assert!(body["tool_results"][0].get("error").is_none());
        assert!(body.get("conversation").is_none());
    }

    #[test]
    fn reply_tolerates_missing_and_null_fields() {
        let reply =
            parse_reply(r#"{"message": null, "actions": null, "done": true}"#).expect("parse");
        assert!(reply.done);
        assert_eq!(reply.message, "");
        assert_eq!(reply.action_count(), 0);
        assert_eq!(reply.credits_used, 0);
    }

    #[test]
    fn reply_decodes_actions_and_tool_calls() {
        let reply = parse_reply(
            r#"{
                "message": "working",
                "actions": [{"type": "list_files", "path": "."}],
                "tool_calls": [{"id": "c1", "type": "function",
                    "function": {"name": "execute_command", "arguments": "{\"command\":\"ls\"}"}}],
                "credits": 4,
                "session_id": "abc"
            }"#,
        )
        .expect("parse");
        assert_eq!(reply.action_count(), 2);
        assert_eq!(reply.actions[0].kind, "list_files");
        assert_eq!(reply.tool_calls[0].function.name, "execute_command");
        assert_eq!(reply.credits_used, 4);
        assert_eq!(reply.session_id.as_deref(), Some("abc"));
    }

    #[test]
    fn non_json_reply_is_decode_error() {
        let err = parse_reply("<html>oops</html>").unwrap_err();
        assert!(matches!(err, RemoteError::Decode(_)));
    }

    #[test]
    fn error_body_is_flattened_and_bounded() {
        let body = format!("line one\n  line two {}", "x".repeat(500));
        let shown = single_line(&body);
        assert!(shown.starts_with("line one line two x"));
        assert_eq!(shown.chars().count(), ERROR_BODY_CHARS);
    }

    #[test]
    fn empty_endpoint_is_not_configured() {
        let err = HttpRemote::new(" ", AuthContext::new("t"), &KekeConfig::default())
            .err()
            .expect("error");
        assert!(matches!(err, RemoteError::NotConfigured(_)));
    }

    #[test]
    fn auth_debug_redacts_token() {
        let shown = format!("{:?}", AuthContext::new("secret-token"));
        assert!(!shown.contains("secret-token"));
    }
}
