use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Ok,
    Error,
}

/// Envelope printed on stdout for every command.
#[derive(Debug, Serialize, Clone)]
pub struct CommandResponse {
    pub status: CommandStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    pub data: Value,
}

impl CommandResponse {
    pub fn ok<T: Serialize>(data: T) -> Result<Self> {
        Ok(Self {
            status: CommandStatus::Ok,
            message: None,
            hints: Vec::new(),
            data: serde_json::to_value(data)?,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Error,
            message: Some(message.into()),
            hints: Vec::new(),
            data: Value::Null,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    pub const fn is_error(&self) -> bool {
        matches!(self.status, CommandStatus::Error)
    }
}
