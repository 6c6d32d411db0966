//! Shared types for the dmbot project.
//!
//! This library defines the envelopes exchanged between the control
//! client and the daemon, and the closed set of command kinds the daemon
//! understands.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use thiserror::Error;

/// Default Unix Domain Socket path for the dmbot daemon.
///
/// Shared by the daemon and CLI to avoid configuration drift.
pub const DEFAULT_SOCKET_PATH: &str = "/run/dmbot/dmbot.sock";

/// Every command the daemon accepts.
///
/// The wire name of each variant is its camelCase identifier, as sent by the
/// desktop front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Restore every configuration section to its defaults.
    ResetGlobalDefaultSettings,
    /// Remove all persisted daemon data.
    ClearAllData,
    /// Replace the account credentials.
    IgCredentialsForm,
    /// Replace the quotas section.
    QuotasForm,
    /// Replace the schedule section.
    SchedulerForm,
    /// Replace the blacklist section.
    BlacklistForm,
    /// Replace the outbound message settings.
    DmSettingsForm,
    /// Replace the source selection settings.
    DmUserScrappingSettingsForm,
    /// Start the DM bot.
    LaunchDmBot,
    /// Stop the DM bot and wait for it to exit.
    StopDmBot,
    /// Push the current configuration to the running bot.
    HotReloadBot,
    /// Fetch the daemon logs.
    GetLogs,
}

impl CommandKind {
    /// All command kinds, in wire-table order.
    pub const ALL: [Self; 12] = [
        Self::ResetGlobalDefaultSettings,
        Self::ClearAllData,
        Self::IgCredentialsForm,
        Self::QuotasForm,
        Self::SchedulerForm,
        Self::BlacklistForm,
        Self::DmSettingsForm,
        Self::DmUserScrappingSettingsForm,
        Self::LaunchDmBot,
        Self::StopDmBot,
        Self::HotReloadBot,
        Self::GetLogs,
    ];

    /// Wire identifier of the command.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResetGlobalDefaultSettings => "resetGlobalDefaultSettings",
            Self::ClearAllData => "clearAllData",
            Self::IgCredentialsForm => "igCredentialsForm",
            Self::QuotasForm => "quotasForm",
            Self::SchedulerForm => "schedulerForm",
            Self::BlacklistForm => "blacklistForm",
            Self::DmSettingsForm => "dmSettingsForm",
            Self::DmUserScrappingSettingsForm => "dmUserScrappingSettingsForm",
            Self::LaunchDmBot => "launchDmBot",
            Self::StopDmBot => "stopDmBot",
            Self::HotReloadBot => "hotReloadBot",
            Self::GetLogs => "getLogs",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a wire identifier names no known command.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown command kind: {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for CommandKind {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownCommand(s.to_owned()))
    }
}

/// Request sent from the control interface to the daemon.
///
/// The payload is kept as an unparsed JSON fragment; only the handler for
/// `kind` knows its schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Wire identifier of the command.
    pub kind: String,
    /// Serialized payload, if the command carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Box<RawValue>>,
}

impl CommandEnvelope {
    /// Build an envelope without a payload.
    #[must_use]
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind: kind.as_str().to_owned(),
            payload: None,
        }
    }

    /// Build an envelope carrying `payload` serialized as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if `payload` cannot be serialized.
    pub fn with_payload<T: Serialize>(kind: CommandKind, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            kind: kind.as_str().to_owned(),
            payload: Some(serde_json::value::to_raw_value(payload)?),
        })
    }

    /// Build an envelope from an already serialized JSON payload.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not valid JSON.
    pub fn with_raw_payload(kind: &str, json: String) -> serde_json::Result<Self> {
        Ok(Self {
            kind: kind.to_owned(),
            payload: Some(RawValue::from_string(json)?),
        })
    }
}

/// Outcome of a command.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
}

/// Reply sent from the daemon for every command, including failed ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    /// Whether the command succeeded.
    pub status: Status,
    /// Human-readable outcome, or the requested text for `getLogs`.
    pub message: String,
    /// Optional structured result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl Response {
    /// A successful response with `message`.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
            payload: None,
        }
    }

    /// A failed response with `message`.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            payload: None,
        }
    }

    /// Attach a structured payload.
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// `true` when the status is [`Status::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}
