//! Typed object properties with a validated extension map.
//!
//! Known object kinds carry a typed [`ObjectDetails`] variant keyed by
//! category and type. Anything else goes into `extra`, whose keys must be
//! snake_case identifiers.

use chrono::NaiveDate;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FloorscanError, Result};

/// Maximum number of free-form property keys per object.
pub const MAX_EXTRA_FIELDS: usize = 64;

/// Maximum nesting depth of a free-form property value.
pub const MAX_EXTRA_DEPTH: usize = 4;

static EXTRA_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,63}$").expect("valid extension key pattern"));

/// Kind-specific attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectDetails {
    Door {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width_mm: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fire_rating_minutes: Option<u32>,
    },
    FireExtinguisher {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        capacity_kg: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_inspected: Option<NaiveDate>,
    },
    ElectricalOutlet {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        voltage: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        circuit: Option<String>,
    },
    EmergencyExit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        illuminated: Option<bool>,
    },
    /// No typed attributes; everything lives in the extension map.
    #[default]
    Generic,
}

impl ObjectDetails {
    /// Name of the variant as serialized in the `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ObjectDetails::Door { .. } => "door",
            ObjectDetails::FireExtinguisher { .. } => "fire_extinguisher",
            ObjectDetails::ElectricalOutlet { .. } => "electrical_outlet",
            ObjectDetails::EmergencyExit { .. } => "emergency_exit",
            ObjectDetails::Generic => "generic",
        }
    }

    /// The typed variant expected for a category/type pair, if one exists.
    pub fn expected_kind(category: &str, object_type: &str) -> Option<&'static str> {
        match (category, object_type) {
            ("access", "door") => Some("door"),
            ("safety", "fire_extinguisher") => Some("fire_extinguisher"),
            ("electrical", "outlet") => Some("electrical_outlet"),
            ("safety", "emergency_exit") => Some("emergency_exit"),
            _ => None,
        }
    }

    fn validate_values(&self) -> std::result::Result<(), String> {
        let non_negative = |name: &str, value: Option<f64>| match value {
            Some(v) if !v.is_finite() || v < 0.0 => {
                Err(format!("{} must be a non-negative number, got {}", name, v))
            }
            _ => Ok(()),
        };
        match self {
            ObjectDetails::Door { width_mm, .. } => non_negative("width_mm", *width_mm),
            ObjectDetails::FireExtinguisher { capacity_kg, .. } => {
                non_negative("capacity_kg", *capacity_kg)
            }
            _ => Ok(()),
        }
    }
}

/// Properties of an infra object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectProperties {
    #[serde(default)]
    pub details: ObjectDetails,

    /// Free-form attributes not covered by `details`.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, Value>,
}

impl ObjectProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the typed details.
    pub fn with_details(mut self, details: ObjectDetails) -> Self {
        self.details = details;
        self
    }

    /// Add a free-form attribute.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Check the properties against the schema for a category/type pair.
    pub fn validate(&self, category: &str, object_type: &str) -> Result<()> {
        if let Some(expected) = ObjectDetails::expected_kind(category, object_type) {
            let actual = self.details.kind();
            if actual != "generic" && actual != expected {
                return Err(FloorscanError::Validation(format!(
                    "{}/{} objects take '{}' details, got '{}'",
                    category, object_type, expected, actual
                )));
            }
        } else if self.details != ObjectDetails::Generic {
            return Err(FloorscanError::Validation(format!(
                "{}/{} objects have no typed details, got '{}'",
                category,
                object_type,
                self.details.kind()
            )));
        }

        self.details
            .validate_values()
            .map_err(FloorscanError::Validation)?;

        if self.extra.len() > MAX_EXTRA_FIELDS {
            return Err(FloorscanError::Validation(format!(
                "{} extra properties exceeds the limit of {}",
                self.extra.len(),
                MAX_EXTRA_FIELDS
            )));
        }
        for (key, value) in &self.extra {
            if !EXTRA_KEY.is_match(key) {
                return Err(FloorscanError::Validation(format!(
                    "Property key '{}' must be snake_case",
                    key
                )));
            }
            if depth(value) > MAX_EXTRA_DEPTH {
                return Err(FloorscanError::Validation(format!(
                    "Property '{}' is nested deeper than {} levels",
                    key, MAX_EXTRA_DEPTH
                )));
            }
        }
        Ok(())
    }
}

fn depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}
