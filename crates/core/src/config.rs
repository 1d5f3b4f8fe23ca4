//! Pharmacy runtime configuration.
//!
//! This module defines configuration that should be resolved once at startup and then passed
//! into the dispensing workflow. Nothing in the core reads environment variables; the CLI (or
//! any other host) decides where values come from and hands over a validated `PharmacyConfig`.

use crate::constants::{
    DEFAULT_DISPENSE_TYPE_CODE, DEFAULT_EXPIRATION_PERIOD_IN_DAYS,
    MAX_EXPIRATION_PERIOD_IN_DAYS, PRIVILEGE_CREATE_DISPENSE_MODIFY_DETAILS,
};
use crate::{DispenseError, DispenseResult};
use dispense_types::NonEmptyText;
use serde::Deserialize;
use std::path::Path;

/// Pharmacy configuration resolved at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PharmacyConfig {
    expiration_period_in_days: u32,
    substitution_type_value_set: Option<String>,
    substitution_reason_value_set: Option<String>,
    modify_details_privilege: String,
    dispense_type_code: String,
}

impl Default for PharmacyConfig {
    fn default() -> Self {
        Self {
            expiration_period_in_days: DEFAULT_EXPIRATION_PERIOD_IN_DAYS,
            substitution_type_value_set: None,
            substitution_reason_value_set: None,
            modify_details_privilege: PRIVILEGE_CREATE_DISPENSE_MODIFY_DETAILS.to_owned(),
            dispense_type_code: DEFAULT_DISPENSE_TYPE_CODE.to_owned(),
        }
    }
}

/// On-disk YAML shape. Every key is optional and falls back to the default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
struct PharmacyConfigFile {
    medication_request_expiration_period_in_days: Option<u32>,
    substitution_type_value_set: Option<String>,
    substitution_reason_value_set: Option<String>,
    modify_details_privilege: Option<String>,
    dispense_type_code: Option<String>,
}

impl PharmacyConfig {
    /// Create a new `PharmacyConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`DispenseError::InvalidInput`] if the expiration window is zero or longer than
    /// [`MAX_EXPIRATION_PERIOD_IN_DAYS`], or any provided identifier is blank.
    pub fn new(
        expiration_period_in_days: u32,
        substitution_type_value_set: Option<&str>,
        substitution_reason_value_set: Option<&str>,
        modify_details_privilege: &str,
        dispense_type_code: &str,
    ) -> DispenseResult<Self> {
        Ok(Self {
            expiration_period_in_days: expiration_window(expiration_period_in_days)?,
            substitution_type_value_set: substitution_type_value_set
                .map(|v| non_empty("substitution_type_value_set", v))
                .transpose()?,
            substitution_reason_value_set: substitution_reason_value_set
                .map(|v| non_empty("substitution_reason_value_set", v))
                .transpose()?,
            modify_details_privilege: non_empty(
                "modify_details_privilege",
                modify_details_privilege,
            )?,
            dispense_type_code: non_empty("dispense_type_code", dispense_type_code)?,
        })
    }

    /// Parse configuration from YAML text.
    ///
    /// Unknown keys are rejected so that typos do not silently fall back to defaults.
    pub fn from_yaml_str(yaml_text: &str) -> DispenseResult<Self> {
        if yaml_text.trim().is_empty() {
            return Ok(Self::default());
        }

        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        let file = match serde_path_to_error::deserialize::<_, PharmacyConfigFile>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() || path == "." {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(DispenseError::YamlDeserialization(format!(
                    "pharmacy config schema mismatch at {path}: {source}"
                )));
            }
        };

        let defaults = Self::default();
        Self::new(
            file.medication_request_expiration_period_in_days
                .unwrap_or(defaults.expiration_period_in_days),
            file.substitution_type_value_set.as_deref(),
            file.substitution_reason_value_set.as_deref(),
            file.modify_details_privilege
                .as_deref()
                .unwrap_or(&defaults.modify_details_privilege),
            file.dispense_type_code
                .as_deref()
                .unwrap_or(&defaults.dispense_type_code),
        )
    }

    /// Read and parse a YAML configuration file.
    pub fn load(path: &Path) -> DispenseResult<Self> {
        let text = std::fs::read_to_string(path).map_err(DispenseError::FileRead)?;
        Self::from_yaml_str(&text)
    }

    /// Return a copy with a different expiration window.
    pub fn with_expiration_period_in_days(mut self, days: u32) -> DispenseResult<Self> {
        self.expiration_period_in_days = expiration_window(days)?;
        Ok(self)
    }

    pub fn expiration_period_in_days(&self) -> u32 {
        self.expiration_period_in_days
    }

    /// Id of the value set to fetch for substitution types, if configured.
    pub fn substitution_type_value_set(&self) -> Option<&str> {
        self.substitution_type_value_set.as_deref()
    }

    pub fn substitution_reason_value_set(&self) -> Option<&str> {
        self.substitution_reason_value_set.as_deref()
    }

    pub fn modify_details_privilege(&self) -> &str {
        &self.modify_details_privilege
    }

    pub fn dispense_type_code(&self) -> &str {
        &self.dispense_type_code
    }
}

fn expiration_window(days: u32) -> DispenseResult<u32> {
    if !(1..=MAX_EXPIRATION_PERIOD_IN_DAYS).contains(&days) {
        return Err(DispenseError::InvalidInput(format!(
            "medication_request_expiration_period_in_days must be between 1 and \
             {MAX_EXPIRATION_PERIOD_IN_DAYS}, got {days}"
        )));
    }
    Ok(days)
}

fn non_empty(field: &str, value: &str) -> DispenseResult<String> {
    NonEmptyText::new(value)
        .map(NonEmptyText::into_string)
        .map_err(|_| DispenseError::InvalidInput(format!("{field} cannot be empty")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config = PharmacyConfig::from_yaml_str("").expect("defaults");
        assert_eq!(config, PharmacyConfig::default());
        assert_eq!(config.expiration_period_in_days(), 90);
        assert_eq!(config.substitution_type_value_set(), None);
    }

    #[test]
    fn parses_all_keys() {
        let input = r#"medication_request_expiration_period_in_days: 30
substitution_type_value_set: "vs-type"
substitution_reason_value_set: "vs-reason"
modify_details_privilege: "Dispense: Modify"
dispense_type_code: "type-code"
"#;
        let config = PharmacyConfig::from_yaml_str(input).expect("parse config");
        assert_eq!(config.expiration_period_in_days(), 30);
        assert_eq!(config.substitution_type_value_set(), Some("vs-type"));
        assert_eq!(config.substitution_reason_value_set(), Some("vs-reason"));
        assert_eq!(config.modify_details_privilege(), "Dispense: Modify");
        assert_eq!(config.dispense_type_code(), "type-code");
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = PharmacyConfig::from_yaml_str("expiration_days: 30\n")
            .expect_err("should reject unknown key");
        match err {
            DispenseError::YamlDeserialization(msg) => assert!(msg.contains("expiration_days")),
            other => panic!("expected YamlDeserialization error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_zero_window_and_blank_identifiers() {
        assert!(matches!(
            PharmacyConfig::from_yaml_str("medication_request_expiration_period_in_days: 0\n"),
            Err(DispenseError::InvalidInput(_))
        ));
        assert!(matches!(
            PharmacyConfig::from_yaml_str("dispense_type_code: \"  \"\n"),
            Err(DispenseError::InvalidInput(_))
        ));
        assert!(PharmacyConfig::default()
            .with_expiration_period_in_days(0)
            .is_err());
    }

    #[test]
    fn rejects_window_beyond_the_cap() {
        let err = PharmacyConfig::from_yaml_str(
            "medication_request_expiration_period_in_days: 4000000000\n",
        )
        .expect_err("window too long");
        assert!(matches!(err, DispenseError::InvalidInput(_)));

        let capped = PharmacyConfig::default()
            .with_expiration_period_in_days(MAX_EXPIRATION_PERIOD_IN_DAYS)
            .expect("cap is allowed");
        assert_eq!(capped.expiration_period_in_days(), MAX_EXPIRATION_PERIOD_IN_DAYS);
        assert!(PharmacyConfig::default()
            .with_expiration_period_in_days(MAX_EXPIRATION_PERIOD_IN_DAYS + 1)
            .is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "medication_request_expiration_period_in_days: 14").expect("write");

        let config = PharmacyConfig::load(file.path()).expect("load config");
        assert_eq!(config.expiration_period_in_days(), 14);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = PharmacyConfig::load(&dir.path().join("absent.yaml")).expect_err("missing");
        assert!(matches!(err, DispenseError::FileRead(_)));
    }
}
