//! crates/vital_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of Firestore's wire format; the mobile
//! client owns the profile schema, so every field is optional and unknown
//! keys are carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single user's intake/demographic and tobacco-use record.
///
/// Scalar fields are kept as display text: the client stores ages and
/// spending sometimes as strings, sometimes as numbers, and the report only
/// ever prints them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub uid: String,

    // --- Identity ---
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub aadhar: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub marital_status: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub occupation_other: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub income: Option<String>,

    // --- Tobacco use ---
    #[serde(default, deserialize_with = "lenient::text_list", skip_serializing_if = "Vec::is_empty")]
    pub tobacco_types: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub other_tobacco_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub frequency_per_day: Option<String>,
    #[serde(default, deserialize_with = "lenient::text_list", skip_serializing_if = "Vec::is_empty")]
    pub craving_timings: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub other_craving_timing: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub years_using: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub quitting_reason: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub quitting_reason_other: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub confidence_level: Option<String>,
    #[serde(default, deserialize_with = "lenient::text_list", skip_serializing_if = "Vec::is_empty")]
    pub health_issues: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub health_issues_other: Option<String>,
    #[serde(default, deserialize_with = "lenient::text_list", skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub other_trigger: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text", skip_serializing_if = "Option::is_none")]
    pub tobacco_spending: Option<String>,

    /// Everything else in the stored document (createdAt, cravingTimes, ...).
    /// Preserved so GET endpoints remain a faithful pass-through.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One completed breathing-exercise attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreathingSession {
    /// Firestore document id; absent before the session is stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub uid: String,
    /// Seconds, non-negative. Missing counts as 0 in every aggregate.
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub duration: Option<f64>,
    /// RFC 3339; the chronological ordering key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// The three independent section-inclusion flags controlling report content.
/// Absent flags are false; all combinations are valid.
#[derive(Debug, Clone, Copy, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportOptions {
    #[serde(default)]
    pub include_personal_info: bool,
    #[serde(default)]
    pub include_tobacco_info: bool,
    #[serde(default)]
    pub include_breathing_progress: bool,
}

/// Aggregate metrics computed from a user's breathing sessions at
/// report-render time. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DerivedStats {
    pub total_duration: f64,
    pub session_count: usize,
    pub best_session: f64,
}

/// A Firebase Auth user record, as far as this backend cares.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
}

// Returned by a successful password sign-in. Tokens are relayed to the
// mobile client verbatim.
#[derive(Debug, Clone)]
pub struct SignInTokens {
    pub uid: String,
    pub id_token: String,
    pub refresh_token: String,
}

/// One entry of the static mood-based music catalog.
#[derive(Debug, Clone, Serialize)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub url: String,
}

/// Lenient deserializers for client-owned fields: the app has historically
/// written numbers where the schema says text, and vice versa.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn as_text(v: &Value) -> Option<String> {
        match v {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let v = Option::<Value>::deserialize(d)?;
        Ok(v.as_ref().and_then(as_text))
    }

    pub fn opt_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        let v = Option::<Value>::deserialize(d)?;
        Ok(match v {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        })
    }

    pub fn text_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let v = Option::<Value>::deserialize(d)?;
        Ok(match v {
            Some(Value::Array(items)) => items.iter().filter_map(as_text).collect(),
            Some(other) => as_text(&other).into_iter().collect(),
            None => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_tolerates_numeric_scalars() {
        let profile: Profile = serde_json::from_value(json!({
            "name": "Asha",
            "age": 42,
            "tobaccoSpending": 1500.5,
            "tobaccoTypes": ["Cigarettes", "Other"],
        }))
        .unwrap();
        assert_eq!(profile.age.as_deref(), Some("42"));
        assert_eq!(profile.tobacco_spending.as_deref(), Some("1500.5"));
        assert_eq!(profile.tobacco_types, vec!["Cigarettes", "Other"]);
    }

    #[test]
    fn profile_preserves_unknown_fields() {
        let profile: Profile = serde_json::from_value(json!({
            "name": "Asha",
            "cravingTimes": {"morning": true},
        }))
        .unwrap();
        assert!(profile.extra.contains_key("cravingTimes"));

        let back = serde_json::to_value(&profile).unwrap();
        assert_eq!(back["cravingTimes"], json!({"morning": true}));
        // Absent optionals must not reappear as nulls in the pass-through.
        assert!(back.get("aadhar").is_none());
    }

    #[test]
    fn report_options_default_to_all_false() {
        let opts: ReportOptions = serde_json::from_value(json!({})).unwrap();
        assert!(!opts.include_personal_info);
        assert!(!opts.include_tobacco_info);
        assert!(!opts.include_breathing_progress);
    }
}
