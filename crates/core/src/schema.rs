//! The schema capability consumed by the generation client.

use std::fmt::{self, Display};
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// A single structural mismatch between a value and a schema.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SchemaViolation {
    /// A JSON pointer to the offending location.
    pub path: String,
    /// What the schema expected there.
    pub message: String,
}

/// Describes why a value did not pass schema validation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SchemaError {
    message: Option<String>,
    violations: Vec<SchemaViolation>,
}

impl SchemaError {
    /// Creates an error with a free-form message.
    #[inline]
    pub fn message<S: Into<String>>(message: S) -> Self {
        Self {
            message: Some(message.into()),
            violations: vec![],
        }
    }

    /// Creates an error enumerating per-path violations.
    #[inline]
    pub fn with_violations(violations: Vec<SchemaViolation>) -> Self {
        Self {
            message: None,
            violations,
        }
    }

    /// Returns the per-path violations, if any were enumerated.
    #[inline]
    pub fn violations(&self) -> &[SchemaViolation] {
        &self.violations
    }
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(message) = &self.message {
            return write!(f, "{message}");
        }
        let mut first = true;
        for violation in &self.violations {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            write!(f, "{} at {}", violation.message, violation.path)?;
        }
        if first {
            write!(f, "schema validation failed")?;
        }
        Ok(())
    }
}

/// The capability of validating a raw JSON value into a typed one.
///
/// The generation client depends only on this interface; schema
/// technologies plug in behind it.
pub trait Schema<T>: Send + Sync + 'static {
    /// A short name identifying the schema to the endpoint.
    fn name(&self) -> &str {
        "output"
    }

    /// Returns the JSON Schema describing valid values.
    fn json_schema(&self) -> &Value;

    /// Validates a raw value, returning the typed value or a
    /// structural mismatch description.
    fn validate(&self, value: Value) -> Result<T, SchemaError>;
}

fn collect_violations(
    validator: &jsonschema::Validator,
    value: &Value,
) -> Vec<SchemaViolation> {
    validator
        .iter_errors(value)
        .map(|err| SchemaViolation {
            path: err.instance_path.to_string(),
            message: err.to_string(),
        })
        .collect()
}

/// A schema derived from a Rust type via `schemars`, validated
/// structurally and then decoded with `serde`.
pub struct TypedSchema<T> {
    name: String,
    schema: Value,
    // Structured per-path errors come from the compiled validator; if
    // the generated schema doesn't compile we fall back to the serde
    // error message alone.
    compiled: Option<jsonschema::Validator>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: schemars::JsonSchema> TypedSchema<T> {
    /// Creates a schema for `T`, named after the type.
    pub fn new() -> Self {
        Self::with_name(T::schema_name())
    }

    /// Creates a schema for `T` with an explicit name.
    pub fn with_name<S: Into<String>>(name: S) -> Self {
        let schema = schemars::SchemaGenerator::default()
            .into_root_schema_for::<T>()
            .to_value();
        let compiled = match jsonschema::validator_for(&schema) {
            Ok(compiled) => Some(compiled),
            Err(err) => {
                warn!("generated schema does not compile: {err}");
                None
            }
        };
        Self {
            name: name.into(),
            schema,
            compiled,
            _marker: PhantomData,
        }
    }
}

impl<T: schemars::JsonSchema> Default for TypedSchema<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Schema<T> for TypedSchema<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn json_schema(&self) -> &Value {
        &self.schema
    }

    fn validate(&self, value: Value) -> Result<T, SchemaError> {
        if let Some(compiled) = &self.compiled {
            let violations = collect_violations(compiled, &value);
            if !violations.is_empty() {
                return Err(SchemaError::with_violations(violations));
            }
        }
        serde_json::from_value(value)
            .map_err(|err| SchemaError::message(err.to_string()))
    }
}

/// A schema supplied as a raw JSON Schema document, validating into
/// plain [`Value`]s.
pub struct RawJsonSchema {
    name: String,
    schema: Value,
    compiled: jsonschema::Validator,
}

impl RawJsonSchema {
    /// Compiles the given JSON Schema document.
    ///
    /// An uncompilable document is reported here, before any request
    /// is made with it.
    pub fn new<S: Into<String>>(
        name: S,
        schema: Value,
    ) -> Result<Self, SchemaError> {
        let compiled = jsonschema::validator_for(&schema)
            .map_err(|err| SchemaError::message(err.to_string()))?;
        Ok(Self {
            name: name.into(),
            schema,
            compiled,
        })
    }
}

impl Schema<Value> for RawJsonSchema {
    fn name(&self) -> &str {
        &self.name
    }

    fn json_schema(&self) -> &Value {
        &self.schema
    }

    fn validate(&self, value: Value) -> Result<Value, SchemaError> {
        let violations = collect_violations(&self.compiled, &value);
        if !violations.is_empty() {
            return Err(SchemaError::with_violations(violations));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, schemars::JsonSchema, PartialEq)]
    struct Notification {
        name: String,
        message: String,
        minutes_ago: f64,
    }

    #[derive(Debug, Deserialize, schemars::JsonSchema, PartialEq)]
    struct Notifications {
        notifications: Vec<Notification>,
    }

    #[test]
    fn test_typed_schema_accepts_conforming_value() {
        let schema = TypedSchema::<Notifications>::new();
        let value = json!({
            "notifications": [
                { "name": "A", "message": "hi", "minutes_ago": 5 }
            ]
        });
        let parsed = schema.validate(value).unwrap();
        assert_eq!(parsed.notifications.len(), 1);
        assert_eq!(parsed.notifications[0].name, "A");
    }

    #[test]
    fn test_typed_schema_reports_structural_mismatch() {
        let schema = TypedSchema::<Notifications>::new();
        let value = json!({
            "notifications": [
                { "name": "A", "message": 42, "minutes_ago": 5 }
            ]
        });
        let err = schema.validate(value).unwrap_err();
        assert!(!err.violations().is_empty());
        assert!(
            err.violations()
                .iter()
                .any(|v| v.path.contains("notifications"))
        );
    }

    #[test]
    fn test_raw_schema() {
        let schema = RawJsonSchema::new(
            "color",
            json!({
                "type": "object",
                "properties": { "color": { "type": "string" } },
                "required": ["color"]
            }),
        )
        .unwrap();

        let ok = schema.validate(json!({ "color": "blue" })).unwrap();
        assert_eq!(ok, json!({ "color": "blue" }));

        let err = schema.validate(json!({})).unwrap_err();
        assert!(!err.violations().is_empty());
    }

    #[test]
    fn test_raw_schema_rejects_uncompilable_document() {
        let result =
            RawJsonSchema::new("bad", json!({ "type": "not-a-type" }));
        assert!(result.is_err());
    }
}
