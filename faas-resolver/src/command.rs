//! Command-backed handlers.
//!
//! A handler field in a module file names a command. The command runs
//! through the shell runner in the module file's directory with
//! `FAAS_FUNCTION` set to the export name. Each role speaks JSON over
//! stdin/stdout:
//!
//! | Role | stdin | stdout |
//! |------|-------|--------|
//! | request | the request | an envelope `{status?, headers?, body}`, other JSON, or text |
//! | guard | the request | empty, `{"continue": true, "headers": {..}}`, or an envelope |
//! | event | `{auth, body, connection}` | one action per line |
//! | job | nothing | ignored |

use async_trait::async_trait;
use faas_shell::{ShellCommand, ShellError};
use faas_types::{
    ConnectionId, EventHandler, EventRequest, EventResponse, FunctionRequest, FunctionResponse,
    GuardHandler, GuardOutcome, HandlerError, JobHandler, RequestHandler, ResponseBody,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable carrying the export name into the command.
pub const FUNCTION_ENV: &str = "FAAS_FUNCTION";

const UNAUTHORIZED: &str = "Unauthorized request";

/// What to run for a handler.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CommandSpec {
    /// Command line for `sh -c`.
    pub command: String,
    /// Kill the command after this many milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Extra environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCommandSpec {
    Line(String),
    Full(CommandSpec),
}

impl CommandSpec {
    /// A bare command line.
    pub fn line(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout_ms: None,
            env: BTreeMap::new(),
        }
    }

    /// Parse a handler field: a command line string or
    /// `{command, timeoutMs?, env?}`.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let spec = match RawCommandSpec::deserialize(value) {
            Ok(RawCommandSpec::Line(line)) => Self::line(line),
            Ok(RawCommandSpec::Full(spec)) => spec,
            Err(_) => {
                return Err(
                    "expected a command string or {command, timeoutMs?, env?}".to_owned(),
                );
            }
        };
        if spec.command.trim().is_empty() {
            return Err("command is empty".to_owned());
        }
        Ok(spec)
    }
}

/// Runs a [`CommandSpec`] for one export. Implements every handler role;
/// the descriptor decides which role it is mounted as.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    function: String,
    spec: CommandSpec,
    cwd: PathBuf,
    default_timeout: Option<Duration>,
}

impl CommandHandler {
    /// A handler for export `function` declared in a module under `cwd`.
    pub fn new(
        function: impl Into<String>,
        spec: CommandSpec,
        cwd: impl AsRef<Path>,
        default_timeout: Option<Duration>,
    ) -> Self {
        Self {
            function: function.into(),
            spec,
            cwd: cwd.as_ref().to_path_buf(),
            default_timeout,
        }
    }

    /// The command spec.
    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    fn shell(&self) -> ShellCommand {
        let mut cmd = ShellCommand::new(&self.spec.command)
            .current_dir(&self.cwd)
            .env(FUNCTION_ENV, &self.function)
            .envs(self.spec.env.clone());
        let timeout = self
            .spec
            .timeout_ms
            .map(Duration::from_millis)
            .or(self.default_timeout);
        if let Some(limit) = timeout {
            cmd = cmd.timeout(limit);
        }
        cmd
    }

    fn handler_error(&self, error: ShellError) -> HandlerError {
        match error {
            ShellError::Timeout { after, .. } => {
                HandlerError::Timeout(format!("{} did not finish within {after:?}", self.function))
            }
            ShellError::NonZeroExit { code, stderr, .. } => {
                let stderr = stderr.trim();
                if stderr.is_empty() {
                    HandlerError::Failed(format!("{} failed with exit code {code:?}", self.function))
                } else {
                    HandlerError::Failed(stderr.to_owned())
                }
            }
            other => HandlerError::Failed(other.to_string()),
        }
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, HandlerError> {
    serde_json::to_vec(value).map_err(|e| HandlerError::Other(Box::new(e)))
}

fn header_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_envelope(map: &Map<String, Value>) -> bool {
    map.contains_key("status") || map.contains_key("body")
}

fn envelope(map: Map<String, Value>) -> Result<FunctionResponse, HandlerError> {
    let status = match map.get("status") {
        None | Some(Value::Null) => 200,
        Some(Value::Number(n)) => n
            .as_u64()
            .filter(|s| (100..=599).contains(s))
            .and_then(|s| u16::try_from(s).ok())
            .ok_or_else(|| HandlerError::InvalidOutput(format!("status {n} out of range")))?,
        Some(other) => {
            return Err(HandlerError::InvalidOutput(format!(
                "status must be a number, got {other}"
            )));
        }
    };
    let mut response = FunctionResponse::empty(status);
    if let Some(Value::Object(headers)) = map.get("headers") {
        for (name, value) in headers {
            response
                .headers
                .insert(name.to_ascii_lowercase(), header_value(value));
        }
    }
    response.body = match map.get("body") {
        None | Some(Value::Null) => ResponseBody::Empty,
        Some(Value::String(text)) => ResponseBody::Text(text.clone()),
        Some(other) => ResponseBody::Json(other.clone()),
    };
    Ok(response)
}

/// Interpret a request command's stdout.
pub(crate) fn parse_response(stdout: &str) -> Result<FunctionResponse, HandlerError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(FunctionResponse::empty(200));
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) if is_envelope(&map) => envelope(map),
        Ok(value) => Ok(FunctionResponse::json(200, value)),
        Err(_) => Ok(FunctionResponse::text(200, stdout.trim_end_matches('\n'))),
    }
}

/// Interpret a guard command's stdout after a zero exit.
pub(crate) fn guard_outcome(
    request: &mut FunctionRequest,
    stdout: &str,
) -> Result<GuardOutcome, HandlerError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(GuardOutcome::Continue);
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) if map.get("continue") == Some(&Value::Bool(true)) => {
            if let Some(Value::Object(headers)) = map.get("headers") {
                for (name, value) in headers {
                    request
                        .headers
                        .insert(name.to_ascii_lowercase(), header_value(value));
                }
            }
            Ok(GuardOutcome::Continue)
        }
        Ok(Value::Object(map)) if is_envelope(&map) => Ok(GuardOutcome::Respond(envelope(map)?)),
        _ => {
            debug!(output = trimmed, "guard output is not a directive, continuing");
            Ok(GuardOutcome::Continue)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum EventAction {
    Emit {
        #[serde(default)]
        body: Value,
    },
    Broadcast {
        #[serde(default)]
        body: Value,
    },
    Announce {
        #[serde(default)]
        body: Value,
    },
    Join {
        topic: String,
    },
    TopicAnnounce {
        topic: String,
        #[serde(default)]
        body: Value,
    },
    TopicBroadcast {
        topic: String,
        #[serde(default)]
        body: Value,
    },
    EmitTo {
        connection: String,
        #[serde(default)]
        body: Value,
    },
}

/// Apply one stdout line of an event command to the response.
pub(crate) fn apply_event_line(
    line: &str,
    response: &EventResponse,
) -> Result<(), faas_types::PubSubError> {
    let parsed: Option<Value> = serde_json::from_str(line).ok();
    let action = parsed
        .as_ref()
        .and_then(|v| EventAction::deserialize(v).ok());
    match action {
        Some(EventAction::Emit { body }) => response.emit(body),
        Some(EventAction::Broadcast { body }) => response.broadcast(body),
        Some(EventAction::Announce { body }) => response.announce(body),
        Some(EventAction::Join { topic }) => response.topic(topic).join(),
        Some(EventAction::TopicAnnounce { topic, body }) => response.topic(topic).announce(body),
        Some(EventAction::TopicBroadcast { topic, body }) => response.topic(topic).broadcast(body),
        Some(EventAction::EmitTo { connection, body }) => {
            response.emit_to(&ConnectionId::new(connection), body)
        }
        None => response.emit(parsed.unwrap_or_else(|| Value::String(line.to_owned()))),
    }
}

#[async_trait]
impl RequestHandler for CommandHandler {
    async fn handle(&self, request: FunctionRequest) -> Result<FunctionResponse, HandlerError> {
        let input = encode(&request)?;
        let output = self
            .shell()
            .stdin(input)
            .run()
            .await
            .map_err(|e| self.handler_error(e))?;
        parse_response(&output.stdout)
    }
}

#[async_trait]
impl GuardHandler for CommandHandler {
    async fn check(&self, request: &mut FunctionRequest) -> Result<GuardOutcome, HandlerError> {
        let input = encode(&*request)?;
        match self.shell().stdin(input).run().await {
            Ok(output) => guard_outcome(request, &output.stdout),
            Err(ShellError::NonZeroExit { stderr, .. }) => {
                let message = stderr.trim();
                let message = if message.is_empty() {
                    UNAUTHORIZED
                } else {
                    message
                };
                Ok(GuardOutcome::Respond(FunctionResponse::message(401, message)))
            }
            Err(e) => Err(self.handler_error(e)),
        }
    }
}

#[async_trait]
impl EventHandler for CommandHandler {
    async fn on_event(
        &self,
        request: EventRequest,
        response: EventResponse,
    ) -> Result<(), HandlerError> {
        let input = encode(&json!({
            "auth": request.auth,
            "body": request.body,
            "connection": response.connection_id(),
        }))?;
        let output = self
            .shell()
            .stdin(input)
            .run()
            .await
            .map_err(|e| self.handler_error(e))?;
        for line in output.stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Err(e) = apply_event_line(line, &response) {
                warn!(function = %self.function, error = %e, "event action failed");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl JobHandler for CommandHandler {
    async fn run(&self) -> Result<(), HandlerError> {
        self.shell()
            .run()
            .await
            .map(|_| ())
            .map_err(|e| self.handler_error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faas_types::Delivery;
    use faas_types::test_utils::RecordingPubSub;
    use std::sync::Arc;

    #[test]
    fn spec_from_string_or_map() {
        assert_eq!(
            CommandSpec::from_value(&json!("./run.sh")).unwrap(),
            CommandSpec::line("./run.sh")
        );
        let full = CommandSpec::from_value(&json!({
            "command": "node x.js",
            "timeoutMs": 500,
            "env": {"A": "1"}
        }))
        .unwrap();
        assert_eq!(full.timeout_ms, Some(500));
        assert_eq!(full.env.get("A").map(String::as_str), Some("1"));
    }

    #[test]
    fn spec_rejects_other_shapes() {
        assert!(CommandSpec::from_value(&json!(42)).is_err());
        assert!(CommandSpec::from_value(&json!({"cmd": "x"})).is_err());
        assert!(CommandSpec::from_value(&json!("   ")).is_err());
    }

    #[test]
    fn response_envelope() {
        let resp = parse_response(r#"{"status": 201, "headers": {"X-Id": 7}, "body": {"ok": true}}"#)
            .unwrap();
        assert_eq!(resp.status, 201);
        assert_eq!(resp.headers.get("x-id").map(String::as_str), Some("7"));
        assert_eq!(resp.body, ResponseBody::Json(json!({"ok": true})));
    }

    #[test]
    fn response_plain_json_and_text() {
        assert_eq!(
            parse_response("[1,2]\n").unwrap(),
            FunctionResponse::json(200, json!([1, 2]))
        );
        assert_eq!(
            parse_response("hello world\n").unwrap(),
            FunctionResponse::text(200, "hello world")
        );
        assert_eq!(parse_response("\n").unwrap(), FunctionResponse::empty(200));
    }

    #[test]
    fn response_bad_status_is_invalid_output() {
        assert!(matches!(
            parse_response(r#"{"status": 42}"#),
            Err(HandlerError::InvalidOutput(_))
        ));
        assert!(matches!(
            parse_response(r#"{"status": "ok"}"#),
            Err(HandlerError::InvalidOutput(_))
        ));
    }

    #[test]
    fn guard_continue_annotates_headers() {
        let mut req = FunctionRequest::new("GET", "/x");
        let outcome = guard_outcome(
            &mut req,
            r#"{"continue": true, "headers": {"X-User": "ada"}}"#,
        )
        .unwrap();
        assert_eq!(outcome, GuardOutcome::Continue);
        assert_eq!(req.header("x-user"), Some("ada"));
    }

    #[test]
    fn guard_envelope_short_circuits() {
        let mut req = FunctionRequest::new("GET", "/x");
        let outcome = guard_outcome(&mut req, r#"{"status": 403, "body": {"message": "no"}}"#).unwrap();
        assert_eq!(
            outcome,
            GuardOutcome::Respond(FunctionResponse::json(403, json!({"message": "no"})))
        );
    }

    #[test]
    fn event_lines_map_to_deliveries() {
        let pubsub = Arc::new(RecordingPubSub::new());
        let me = ConnectionId::new("me");
        let response = EventResponse::new(pubsub.clone(), "room", "room", me.clone());

        apply_event_line(r#"{"action": "broadcast", "body": {"n": 1}}"#, &response).unwrap();
        apply_event_line(r#"{"action": "emitTo", "connection": "c9", "body": 2}"#, &response).unwrap();
        apply_event_line(r#"{"action": "join", "topic": "blue"}"#, &response).unwrap();
        apply_event_line("plain text", &response).unwrap();

        let got: Vec<(Delivery, Value)> = pubsub
            .deliveries()
            .into_iter()
            .map(|d| (d.target, d.body))
            .collect();
        assert_eq!(
            got,
            vec![
                (Delivery::Namespace { except: Some(me.clone()) }, json!({"n": 1})),
                (Delivery::Connection(ConnectionId::new("c9")), json!(2)),
                (Delivery::Connection(me.clone()), json!("plain text")),
            ]
        );
        assert_eq!(pubsub.joins().len(), 1);
    }
}
