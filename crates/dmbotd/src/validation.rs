//! Form validation pipeline.
//!
//! Every configuration form goes through the same two steps: decode the
//! command payload into the form's section type, then check its field
//! constraints. Only a section that passes both reaches the store.

use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::settings::{
    AccountSettings, BlacklistSettings, DmSettings, QuotaSettings, ScheduleSettings, Section,
    SourceSettings,
};

/// A configuration section submitted through a front-end form.
pub trait Form: DeserializeOwned + Validate {
    /// Form name used in validation messages.
    const FORM: &'static str;
    /// Section label used in confirmation messages.
    const LABEL: &'static str;

    /// Wrap the validated form as a store section.
    fn into_section(self) -> Section;
}

impl Form for AccountSettings {
    const FORM: &'static str = "credentials";
    const LABEL: &'static str = "Credentials";

    fn into_section(self) -> Section {
        Section::Account(self)
    }
}

impl Form for QuotaSettings {
    const FORM: &'static str = "quotas";
    const LABEL: &'static str = "Quotas";

    fn into_section(self) -> Section {
        Section::Quotas(self)
    }
}

impl Form for ScheduleSettings {
    const FORM: &'static str = "scheduler";
    const LABEL: &'static str = "Scheduler";

    fn into_section(self) -> Section {
        Section::Schedule(self)
    }
}

impl Form for BlacklistSettings {
    const FORM: &'static str = "blacklist";
    const LABEL: &'static str = "Blacklist";

    fn into_section(self) -> Section {
        Section::Blacklist(self)
    }
}

impl Form for DmSettings {
    const FORM: &'static str = "dm tool";
    const LABEL: &'static str = "Dm bot";

    fn into_section(self) -> Section {
        Section::AutoDm(self)
    }
}

impl Form for SourceSettings {
    const FORM: &'static str = "scrapper";
    const LABEL: &'static str = "Scrapper";

    fn into_section(self) -> Section {
        Section::SrcUsers(self)
    }
}

/// Why a form payload was rejected.
#[derive(Debug, Error)]
pub enum FormError {
    /// The command carried no payload.
    #[error("Failed to parse message payload.")]
    Missing,
    /// The payload does not match the form's schema.
    #[error("Failed to parse message payload.")]
    Parse(#[source] serde_json::Error),
    /// The payload parsed but broke a field constraint.
    #[error("Validation issue on {form} form, please check given informations.")]
    Invalid {
        form: &'static str,
        #[source]
        source: ValidationErrors,
    },
}

/// Decode and validate `payload` as form `T`.
///
/// # Errors
///
/// Returns [`FormError::Missing`] or [`FormError::Parse`] when the payload
/// is absent or malformed, and
/// [`FormError::Invalid`] when a constraint fails.
///
/// # Examples
///
/// ```
/// use dmbotd::settings::AccountSettings;
/// use dmbotd::validation::parse_form;
/// use serde_json::value::RawValue;
///
/// let raw = RawValue::from_string(r#"{"username":"a","password":"b"}"#.into()).unwrap();
/// let form: AccountSettings = parse_form(Some(&raw)).unwrap();
/// assert_eq!(form.username, "a");
/// ```
pub fn parse_form<T: Form>(payload: Option<&RawValue>) -> Result<T, FormError> {
    let raw = payload.ok_or(FormError::Missing)?;
    let form: T = serde_json::from_str(raw.get()).map_err(FormError::Parse)?;
    form.validate().map_err(|source| FormError::Invalid {
        form: T::FORM,
        source,
    })?;
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn raw(json: &str) -> Box<RawValue> {
        RawValue::from_string(json.to_owned()).expect("valid json")
    }

    #[test]
    fn accepts_valid_credentials() {
        let payload = raw(r#"{"username":"a","password":"b"}"#);
        let form: AccountSettings = parse_form(Some(&payload)).expect("valid form");
        assert_eq!(form.password, "b");
    }

    #[rstest]
    #[case::wrong_type(r#"{"username":1,"password":"b"}"#)]
    #[case::missing_field(r#"{"username":"a"}"#)]
    #[case::not_an_object(r#""a""#)]
    fn malformed_payloads_are_parse_errors(#[case] json: &str) {
        let payload = raw(json);
        let err = parse_form::<AccountSettings>(Some(&payload)).expect_err("rejected");
        assert!(matches!(err, FormError::Parse(_)));
        assert_eq!(err.to_string(), "Failed to parse message payload.");
    }

    #[test]
    fn missing_payload_is_a_parse_error() {
        let err = parse_form::<QuotaSettings>(None).expect_err("rejected");
        assert!(matches!(err, FormError::Missing));
        assert_eq!(err.to_string(), "Failed to parse message payload.");
    }

    #[test]
    fn constraint_failures_name_the_form() {
        let payload = raw(r#"{"username":"","password":"x"}"#);
        let err = parse_form::<AccountSettings>(Some(&payload)).expect_err("rejected");
        assert!(matches!(err, FormError::Invalid { form: "credentials", .. }));
        assert!(err.to_string().contains("check given informations"));
    }

    #[rstest]
    #[case::quotas_range(r#"{"dm_day":0,"dm_hour":0}"#, "quotas")]
    #[case::quotas_cross_field(r#"{"dm_day":2,"dm_hour":3}"#, "quotas")]
    fn quota_rules(#[case] json: &str, #[case] form: &str) {
        let payload = raw(json);
        let err = parse_form::<QuotaSettings>(Some(&payload)).expect_err("rejected");
        assert!(err.to_string().contains(form));
    }

    #[test]
    fn scheduler_form_requires_a_window() {
        let payload = raw(r#"{"activated":true,"windows":[]}"#);
        let err = parse_form::<ScheduleSettings>(Some(&payload)).expect_err("rejected");
        assert!(err.to_string().contains("scheduler"));
    }

    #[test]
    fn scrapper_form_fills_src_users_section() {
        let payload = raw(r#"{"src_accounts":["x"],"fetch_quantity":3}"#);
        let form: SourceSettings = parse_form(Some(&payload)).expect("valid form");
        assert_eq!(
            form.into_section(),
            Section::SrcUsers(SourceSettings {
                src_accounts: vec!["x".into()],
                fetch_quantity: 3,
            })
        );
    }
}
