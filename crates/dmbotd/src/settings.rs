//! Bot settings: the six configuration sections edited by the front-end.
//!
//! Each section is validated on its own when submitted through a form and
//! replaced as a whole. [`BotConfig::readiness`] decides whether the
//! composite is complete enough to launch the bot; partial configurations
//! are valid in memory but not launchable.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Time format used by schedule windows.
pub const TIME_FORMAT: &str = "%H:%M";
/// Number of profiles fetched per source account when unset.
const DEFAULT_FETCH_QUANTITY: u32 = 500;

/// Account credentials for the third-party service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AccountSettings {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Daily and hourly DM quotas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_quotas"))]
pub struct QuotaSettings {
    #[serde(default)]
    pub activated: bool,
    #[validate(range(min = 1, max = 1000))]
    pub dm_day: u32,
    #[validate(range(min = 1, max = 1000))]
    pub dm_hour: u32,
}

/// One daily activity window, bounds formatted as `HH:MM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    pub begin_at: String,
    pub end_at: String,
}

impl ScheduleWindow {
    /// Parse both bounds, returning `None` if either is malformed.
    #[must_use]
    pub fn bounds(&self) -> Option<(NaiveTime, NaiveTime)> {
        let begin = NaiveTime::parse_from_str(&self.begin_at, TIME_FORMAT).ok()?;
        let end = NaiveTime::parse_from_str(&self.end_at, TIME_FORMAT).ok()?;
        Some((begin, end))
    }

    /// `true` when `now` falls inside the window.
    #[must_use]
    pub fn contains(&self, now: NaiveTime) -> bool {
        self.bounds()
            .is_some_and(|(begin, end)| begin <= now && now < end)
    }
}

/// Hours during which the bot may act.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_schedule"))]
pub struct ScheduleSettings {
    #[serde(default)]
    pub activated: bool,
    #[validate(length(min = 1))]
    pub windows: Vec<ScheduleWindow>,
}

/// Users the bot must never contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_blacklist"))]
pub struct BlacklistSettings {
    #[serde(default)]
    pub activated: bool,
    /// Add every contacted user to the blacklist automatically.
    #[serde(default)]
    pub blacklist_interacted: bool,
    #[serde(default)]
    pub users: Vec<String>,
}

impl Default for BlacklistSettings {
    fn default() -> Self {
        Self {
            activated: true,
            blacklist_interacted: false,
            users: Vec::new(),
        }
    }
}

/// Optional greeting prepended to every message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greeting {
    #[serde(default)]
    pub activated: bool,
    #[serde(default)]
    pub template: String,
}

/// Outbound message settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_dm_settings"))]
pub struct DmSettings {
    #[serde(default)]
    pub activated: bool,
    #[validate(length(min = 1))]
    pub dm_templates: Vec<String>,
    #[serde(default)]
    pub greeting: Greeting,
}

/// Accounts whose followers are targeted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_sources"))]
pub struct SourceSettings {
    #[validate(length(min = 1))]
    pub src_accounts: Vec<String>,
    #[validate(range(min = 1, max = 100_000))]
    pub fetch_quantity: u32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            src_accounts: Vec::new(),
            fetch_quantity: DEFAULT_FETCH_QUANTITY,
        }
    }
}

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn no_blank_entries(entries: &[String], code: &'static str) -> Result<(), ValidationError> {
    if entries.iter().any(|e| e.trim().is_empty()) {
        return Err(rule(code, "entries must not be blank"));
    }
    Ok(())
}

fn validate_quotas(quotas: &QuotaSettings) -> Result<(), ValidationError> {
    if quotas.dm_hour > quotas.dm_day {
        return Err(rule(
            "dm_hour_exceeds_dm_day",
            "hourly quota must not exceed the daily quota",
        ));
    }
    Ok(())
}

fn validate_schedule(schedule: &ScheduleSettings) -> Result<(), ValidationError> {
    for window in &schedule.windows {
        let Some((begin, end)) = window.bounds() else {
            return Err(rule("time_format", "times must be formatted as HH:MM"));
        };
        if begin >= end {
            return Err(rule("window_order", "a window must begin before it ends"));
        }
    }
    Ok(())
}

fn validate_blacklist(blacklist: &BlacklistSettings) -> Result<(), ValidationError> {
    no_blank_entries(&blacklist.users, "blank_user")
}

fn validate_dm_settings(dm: &DmSettings) -> Result<(), ValidationError> {
    no_blank_entries(&dm.dm_templates, "blank_template")?;
    if dm.greeting.activated && dm.greeting.template.trim().is_empty() {
        return Err(rule(
            "greeting_template",
            "an activated greeting needs a template",
        ));
    }
    Ok(())
}

fn validate_sources(sources: &SourceSettings) -> Result<(), ValidationError> {
    no_blank_entries(&sources.src_accounts, "blank_account")
}

/// Reason the configuration cannot launch the bot.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum NotReady {
    #[error("account credentials are missing, please fill the credentials form")]
    MissingCredentials,
    #[error("quotas are not set, please fill the quotas form")]
    QuotasUnset,
    #[error("no schedule window is configured, please fill the scheduler form")]
    NoScheduleWindow,
    #[error("no message template is configured, please fill the dm tool form")]
    NoDmTemplates,
    #[error("no source account is configured, please fill the scrapper form")]
    NoSourceAccounts,
}

/// Complete bot configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub account: AccountSettings,
    #[serde(default)]
    pub quotas: QuotaSettings,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    #[serde(default)]
    pub blacklist: BlacklistSettings,
    #[serde(default)]
    pub auto_dm: DmSettings,
    #[serde(default)]
    pub src_users: SourceSettings,
}

impl BotConfig {
    /// Check every section for completeness, reporting the first gap.
    ///
    /// # Errors
    ///
    /// Returns the first [`NotReady`] condition found, in section order.
    pub fn readiness(&self) -> Result<(), NotReady> {
        if self.account.username.is_empty() || self.account.password.is_empty() {
            return Err(NotReady::MissingCredentials);
        }
        if self.quotas.dm_day == 0 || self.quotas.dm_hour == 0 {
            return Err(NotReady::QuotasUnset);
        }
        if self.schedule.windows.is_empty() {
            return Err(NotReady::NoScheduleWindow);
        }
        if self.auto_dm.dm_templates.is_empty() {
            return Err(NotReady::NoDmTemplates);
        }
        if self.src_users.src_accounts.is_empty() || self.src_users.fetch_quantity == 0 {
            return Err(NotReady::NoSourceAccounts);
        }
        Ok(())
    }

    /// `true` when [`Self::readiness`] finds nothing missing.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.readiness().is_ok()
    }

    /// Replace the section carried by `section`, leaving the others intact.
    pub fn replace(&mut self, section: Section) {
        match section {
            Section::Account(s) => self.account = s,
            Section::Quotas(s) => self.quotas = s,
            Section::Schedule(s) => self.schedule = s,
            Section::Blacklist(s) => self.blacklist = s,
            Section::AutoDm(s) => self.auto_dm = s,
            Section::SrcUsers(s) => self.src_users = s,
        }
    }
}

/// A single replaceable section, tagged by which slot it fills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    Account(AccountSettings),
    Quotas(QuotaSettings),
    Schedule(ScheduleSettings),
    Blacklist(BlacklistSettings),
    AutoDm(DmSettings),
    SrcUsers(SourceSettings),
}

impl Section {
    /// Name of the slot in [`BotConfig`].
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Account(_) => "account",
            Self::Quotas(_) => "quotas",
            Self::Schedule(_) => "schedule",
            Self::Blacklist(_) => "blacklist",
            Self::AutoDm(_) => "auto_dm",
            Self::SrcUsers(_) => "src_users",
        }
    }
}
