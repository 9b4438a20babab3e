//! Action model shared by the loop, dispatcher, and remote wire types.
//!
//! Remote payloads arrive either as flat [`ActionRecord`]s or as provider
//! [`ToolCall`] envelopes. Both are validated into the closed [`Action`]
//! union before anything is dispatched.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use thiserror::Error;

use super::normalize::{CommandArgs, PathArgs, WriteArgs, normalize, normalize_object};

/// Capability required before an action may take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionKind {
    Read,
    Write,
    Execute,
}

impl PermissionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Execute => "execute",
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validated operation requested by the remote agent.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ReadFile {
        path: String,
    },
    WriteFile {
        path: String,
        content: String,
    },
    ExecuteCommand {
        command: String,
    },
    ListFiles {
        path: String,
    },
    LoadDataset {
        path: String,
        format: Option<String>,
    },
    AnalyzeData {
        analysis_type: String,
        parameters: Map<String, Value>,
    },
    TrainModel {
        model_type: String,
        parameters: Map<String, Value>,
    },
    EvaluateModel {
        path: String,
    },
    Visualize {
        viz_type: String,
        parameters: Map<String, Value>,
    },
}

impl Action {
    /// Wire name of the action type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReadFile { .. } => "read_file",
            Self::WriteFile { .. } => "write_file",
            Self::ExecuteCommand { .. } => "execute_command",
            Self::ListFiles { .. } => "list_files",
            Self::LoadDataset { .. } => "load_dataset",
            Self::AnalyzeData { .. } => "analyze_data",
            Self::TrainModel { .. } => "train_model",
            Self::EvaluateModel { .. } => "evaluate_model",
            Self::Visualize { .. } => "visualize",
        }
    }

    pub fn permission(&self) -> PermissionKind {
        match self {
            Self::ReadFile { .. } | Self::ListFiles { .. } | Self::LoadDataset { .. } => {
                PermissionKind::Read
            }
            Self::WriteFile { .. } | Self::Visualize { .. } => PermissionKind::Write,
            Self::ExecuteCommand { .. }
            | Self::AnalyzeData { .. }
            | Self::TrainModel { .. }
            | Self::EvaluateModel { .. } => PermissionKind::Execute,
        }
    }

    /// Text shown to the user when asking for the action's grant.
    pub fn permission_message(&self) -> String {
        match self {
            Self::ReadFile { path } => format!("AI wants to read: {path}"),
            Self::WriteFile { path, .. } => format!("AI wants to write: {path}"),
            Self::ExecuteCommand { command } => format!("AI wants to run: {command}"),
            Self::ListFiles { path } => format!("AI wants to list files in: {path}"),
            Self::LoadDataset { path, .. } => format!("AI wants to load dataset: {path}"),
            Self::AnalyzeData { analysis_type, .. } => {
                format!("AI wants to run analysis: {analysis_type}")
            }
            Self::TrainModel { model_type, .. } => format!("AI wants to train model: {model_type}"),
            Self::EvaluateModel { path } => format!("AI wants to evaluate model: {path}"),
            Self::Visualize { viz_type, .. } => {
                format!("AI wants to create visualization: {viz_type}")
            }
        }
    }

    /// One-line description for progress output.
    pub fn describe(&self) -> String {
        match self {
            Self::ReadFile { path } => format!("Read: {path}"),
            Self::WriteFile { path, .. } => format!("Write: {path}"),
            Self::ExecuteCommand { command } => format!("Execute: {command}"),
            Self::ListFiles { path } => format!("List: {path}"),
            other => format!("Tool: {}", other.kind()),
        }
    }

    /// Build an action from a provider tool-call envelope.
    pub fn from_tool_call(call: &ToolCall) -> Result<Self, ActionError> {
        let raw = call.function.arguments.get().as_bytes();
        match call.function.name.as_str() {
            "execute_command" => {
                let args: CommandArgs = normalize(raw);
                if args.command.trim().is_empty() {
                    return Err(ActionError::MalformedArguments(
                        "no command provided".to_string(),
                    ));
                }
                Ok(Self::ExecuteCommand {
                    command: args.command,
                })
            }
            "write_file" => {
                let args: WriteArgs = normalize(raw);
                if args.path.is_empty() {
                    return Err(ActionError::MalformedArguments(
                        "could not extract file path from arguments".to_string(),
                    ));
                }
                let Some(content) = args.content else {
                    return Err(ActionError::MalformedArguments(
                        "could not extract file content from arguments".to_string(),
                    ));
                };
                Ok(Self::WriteFile {
                    path: args.path,
                    content,
                })
            }
            "read_file" => {
                let args: PathArgs = normalize(raw);
                Ok(Self::ReadFile { path: args.path })
            }
            "list_files" => {
                let args: PathArgs = normalize(raw);
                Ok(Self::ListFiles { path: args.path })
            }
            name => {
                let object = normalize_object(raw).ok_or_else(|| {
                    ActionError::MalformedArguments(format!(
                        "arguments for {name} are not an object"
                    ))
                })?;
                let mut record: ActionRecord = serde_json::from_value(Value::Object(object))
                    .map_err(|err| {
                        ActionError::MalformedArguments(format!("arguments for {name}: {err}"))
                    })?;
                record.kind = name.to_string();
                Self::try_from(record)
            }
        }
    }
}

/// Flat action record as sent by the remote in the transcript protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viz_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,
}

impl TryFrom<ActionRecord> for Action {
    type Error = ActionError;

    fn try_from(record: ActionRecord) -> Result<Self, Self::Error> {
        let ActionRecord {
            kind,
            path,
            content,
            command,
            format,
            analysis_type,
            model_type,
            viz_type,
            parameters,
        } = record;
        let parameters = parameters.unwrap_or_default();
        let action = match kind.as_str() {
            "read_file" => Self::ReadFile {
                path: required(path, "read_file", "path")?,
            },
            "write_file" => Self::WriteFile {
                path: required(path, "write_file", "path")?,
                content: content.ok_or_else(|| missing("write_file", "content"))?,
            },
            "execute_command" => Self::ExecuteCommand {
                command: required(command, "execute_command", "command")?,
            },
            "list_files" => Self::ListFiles {
                path: non_empty(path).unwrap_or_else(|| ".".to_string()),
            },
            "load_dataset" => Self::LoadDataset {
                path: required(path, "load_dataset", "path")?,
                format: non_empty(format),
            },
            "analyze_data" => Self::AnalyzeData {
                analysis_type: required(analysis_type, "analyze_data", "analysis_type")?,
                parameters,
            },
            "train_model" => Self::TrainModel {
                model_type: required(model_type, "train_model", "model_type")?,
                parameters,
            },
            "evaluate_model" => Self::EvaluateModel {
                path: required(path, "evaluate_model", "path")?,
            },
            "visualize" => Self::Visualize {
                viz_type: required(viz_type, "visualize", "viz_type")?,
                parameters,
            },
            _ => return Err(ActionError::UnknownAction(kind)),
        };
        Ok(action)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required(value: Option<String>, kind: &str, field: &str) -> Result<String, ActionError> {
    non_empty(value).ok_or_else(|| missing(kind, field))
}

fn missing(kind: &str, field: &str) -> ActionError {
    ActionError::MalformedArguments(format!("{kind} requires a non-empty {field}"))
}

/// Provider envelope around a requested action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Opaque payload; its shape is only known after normalization.
    pub arguments: Box<RawValue>,
}

fn default_call_type() -> String {
    "function".to_string()
}

/// Outcome of one tool call, correlated by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Recoverable action failures. Each becomes result text for the remote.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Permission denied by user")]
    PermissionDenied,
    #[error("malformed tool arguments: {0}")]
    MalformedArguments(String),
    #[error("Unknown action type: {0}")]
    UnknownAction(String),
    #[error("invalid path: cannot write outside project directory ({0})")]
    OutsideProject(String),
    #[error("Error {op} {path}: {source}")]
    Io {
        op: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Command failed: {reason}\nOutput: {output}")]
    CommandFailed { reason: String, output: String },
}

impl ActionError {
    pub fn io(op: &'static str, path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Convert into a tool result, keeping any partial output.
    pub fn into_tool_result(self, tool_call_id: &str) -> ToolResult {
        match self {
            Self::CommandFailed { reason, output } => ToolResult {
                tool_call_id: tool_call_id.to_string(),
                output,
                error: Some(format!("Command failed: {reason}")),
            },
            other => ToolResult {
                tool_call_id: tool_call_id.to_string(),
                output: String::new(),
                error: Some(other.to_string()),
            },
        }
    }
}
