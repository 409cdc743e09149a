//! Request schemas and their validation rules.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

pub const DEFAULT_START_DATE: &str = "30daysAgo";
pub const DEFAULT_END_DATE: &str = "today";

fn property_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{6,12}$").expect("valid property id regex"))
}

// Absolute dates or GA4's relative forms.
fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{4}-\d{2}-\d{2}|today|yesterday|\d+daysAgo)$").expect("valid date regex")
    })
}

fn check_property_id(value: Option<&str>, errors: &mut Vec<String>) -> Option<String> {
    match value {
        None | Some("") => {
            errors.push("\"propertyId\" is required".into());
            None
        }
        Some(id) if !property_id_re().is_match(id) => {
            errors.push("Property ID must be 6-12 digits (numeric format)".into());
            None
        }
        Some(id) => Some(id.to_string()),
    }
}

fn check_date(field: &str, value: Option<&str>, default: &str, errors: &mut Vec<String>) -> String {
    match value.filter(|v| !v.is_empty()) {
        None => default.to_string(),
        Some(v) if date_re().is_match(v) => v.to_string(),
        Some(v) => {
            errors.push(format!(
                "\"{}\" must be YYYY-MM-DD, today, yesterday or NdaysAgo (got '{}')",
                field, v
            ));
            v.to_string()
        }
    }
}

/// Query string of `GET /api/analytics/ai-referrals`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiReferralQuery {
    pub property_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralParams {
    pub property_id: String,
    pub start_date: String,
    pub end_date: String,
}

impl AiReferralQuery {
    pub fn validate(self) -> Result<ReferralParams, Vec<String>> {
        let mut errors = Vec::new();
        let property_id = check_property_id(self.property_id.as_deref(), &mut errors);
        let start_date = check_date("startDate", self.start_date.as_deref(), DEFAULT_START_DATE, &mut errors);
        let end_date = check_date("endDate", self.end_date.as_deref(), DEFAULT_END_DATE, &mut errors);

        match property_id {
            Some(property_id) if errors.is_empty() => Ok(ReferralParams {
                property_id,
                start_date,
                end_date,
            }),
            _ => Err(errors.into_iter().map(|e| format!("Query: {}", e)).collect()),
        }
    }
}

/// Body of `POST /api/analytics/validate-property`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePropertyBody {
    pub property_id: Option<String>,
}

impl ValidatePropertyBody {
    pub fn validate(self) -> Result<String, Vec<String>> {
        let mut errors = Vec::new();
        check_property_id(self.property_id.as_deref(), &mut errors)
            .ok_or_else(|| errors.into_iter().map(|e| format!("Body: {}", e)).collect())
    }
}

/// Body of `POST /api/auth/google-callback`.
#[derive(Debug, Default, Deserialize)]
pub struct CodeExchangeBody {
    pub code: Option<String>,
}

impl CodeExchangeBody {
    pub fn validate(self) -> Result<String, Vec<String>> {
        match self.code.filter(|c| !c.is_empty()) {
            Some(code) => Ok(code),
            None => Err(vec!["Body: \"code\" is required".into()]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(id: Option<&str>, start: Option<&str>, end: Option<&str>) -> AiReferralQuery {
        AiReferralQuery {
            property_id: id.map(String::from),
            start_date: start.map(String::from),
            end_date: end.map(String::from),
        }
    }

    #[test]
    fn test_defaults_applied() {
        let params = query(Some("123456789"), None, None).validate().unwrap();
        assert_eq!(params.start_date, "30daysAgo");
        assert_eq!(params.end_date, "today");
    }

    #[test]
    fn test_property_id_rules() {
        assert!(query(Some("123456"), None, None).validate().is_ok());
        assert!(query(Some("123456789012"), None, None).validate().is_ok());
        assert!(query(Some("12345"), None, None).validate().is_err());
        assert!(query(Some("1234567890123"), None, None).validate().is_err());
        assert!(query(Some("G-ABCDEFGH"), None, None).validate().is_err());

        let errors = query(None, None, None).validate().unwrap_err();
        assert_eq!(errors, vec!["Query: \"propertyId\" is required"]);
    }

    #[test]
    fn test_date_rules() {
        assert!(query(Some("123456"), Some("2024-01-01"), Some("yesterday")).validate().is_ok());
        assert!(query(Some("123456"), Some("7daysAgo"), Some("today")).validate().is_ok());

        let errors = query(Some("123456"), Some("last week"), Some("tomorrow"))
            .validate()
            .unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("startDate"));
    }

    #[test]
    fn test_validate_property_body() {
        let ok = ValidatePropertyBody {
            property_id: Some("987654".into()),
        };
        assert_eq!(ok.validate().unwrap(), "987654");

        let bad = ValidatePropertyBody {
            property_id: Some("abc".into()),
        };
        let errors = bad.validate().unwrap_err();
        assert!(errors[0].starts_with("Body: Property ID must be 6-12 digits"));
    }

    #[test]
    fn test_code_body() {
        assert_eq!(
            CodeExchangeBody { code: Some("4/0Abc".into()) }.validate().unwrap(),
            "4/0Abc"
        );
        assert!(CodeExchangeBody { code: Some(String::new()) }.validate().is_err());
        assert!(CodeExchangeBody::default().validate().is_err());
    }
}
