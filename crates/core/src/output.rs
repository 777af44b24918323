//! Output modes and their parsing strategies.
//!
//! The mode/schema pairing the client requires is enforced by
//! construction: the object and array strategies own a schema, the
//! enum and no-schema strategies cannot carry one. The residual
//! dynamic misconfigurations (an empty enum variant list, a raw schema
//! that doesn't compile) surface as configuration errors before any
//! transport call.

use std::sync::Arc;

use objgen_model::ResponseFormat;
use serde_json::{Value, json};

use crate::error::Error;
use crate::schema::{Schema, SchemaError};

/// The output mode of a generation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputMode {
    /// A single object conforming to a schema.
    Object,
    /// An array of elements, each conforming to a schema.
    Array,
    /// One of a fixed set of string variants.
    Enum,
    /// Any syntactically valid JSON value.
    NoSchema,
}

/// How the raw model output is requested, checked, and turned into a
/// typed value.
pub trait OutputStrategy: Send + Sync + 'static {
    /// The typed value this strategy produces.
    type Output: Send + 'static;

    /// The output mode this strategy implements.
    fn mode(&self) -> OutputMode;

    /// The response format to request from the transport.
    fn response_format(&self) -> ResponseFormat;

    /// Checks the strategy's own configuration. Runs before any
    /// transport call.
    fn check(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Runs the full raw output through schema validation, exactly
    /// once per response.
    fn parse(&self, raw: &str) -> Result<Self::Output, SchemaError>;

    /// Projects a repaired partial value into the fragment shape
    /// consumers see. Returns `None` when nothing presentable can be
    /// extracted yet.
    fn partial_value(&self, repaired: Value) -> Option<Value> {
        Some(repaired)
    }
}

fn parse_raw(raw: &str) -> Result<Value, SchemaError> {
    serde_json::from_str(raw).map_err(|err| {
        SchemaError::message(format!("output is not valid JSON: {err}"))
    })
}

/// Generates a single object conforming to a schema.
pub struct ObjectOutput<T> {
    schema: Arc<dyn Schema<T>>,
}

impl<T> ObjectOutput<T> {
    /// Creates the strategy from a schema capability.
    #[inline]
    pub fn new<S: Schema<T>>(schema: S) -> Self {
        Self {
            schema: Arc::new(schema),
        }
    }
}

impl<T: Send + 'static> OutputStrategy for ObjectOutput<T> {
    type Output = T;

    fn mode(&self) -> OutputMode {
        OutputMode::Object
    }

    fn response_format(&self) -> ResponseFormat {
        ResponseFormat::JsonSchema {
            name: self.schema.name().to_owned(),
            schema: self.schema.json_schema().clone(),
        }
    }

    fn parse(&self, raw: &str) -> Result<T, SchemaError> {
        self.schema.validate(parse_raw(raw)?)
    }
}

/// Generates an array of elements, each conforming to a schema.
///
/// Endpoints commonly reject top-level arrays in schema-constrained
/// mode, so the elements are wrapped in a root object under an
/// `elements` field on the wire and unwrapped before validation.
pub struct ArrayOutput<T> {
    element_schema: Arc<dyn Schema<T>>,
    wrapped: Value,
}

impl<T> ArrayOutput<T> {
    /// Creates the strategy from the schema of a single element.
    pub fn new<S: Schema<T>>(element_schema: S) -> Self {
        let wrapped = json!({
            "type": "object",
            "properties": {
                "elements": {
                    "type": "array",
                    "items": element_schema.json_schema().clone(),
                },
            },
            "required": ["elements"],
            "additionalProperties": false,
        });
        Self {
            element_schema: Arc::new(element_schema),
            wrapped,
        }
    }
}

impl<T: Send + 'static> OutputStrategy for ArrayOutput<T> {
    type Output = Vec<T>;

    fn mode(&self) -> OutputMode {
        OutputMode::Array
    }

    fn response_format(&self) -> ResponseFormat {
        ResponseFormat::JsonSchema {
            name: self.element_schema.name().to_owned(),
            schema: self.wrapped.clone(),
        }
    }

    fn parse(&self, raw: &str) -> Result<Vec<T>, SchemaError> {
        let value = parse_raw(raw)?;
        let Some(elements) =
            value.get("elements").and_then(Value::as_array)
        else {
            return Err(SchemaError::message(
                "expected a root object with an `elements` array",
            ));
        };
        elements
            .iter()
            .map(|element| self.element_schema.validate(element.clone()))
            .collect()
    }

    fn partial_value(&self, repaired: Value) -> Option<Value> {
        repaired.get("elements").cloned()
    }
}

/// Generates one of a fixed set of string variants.
pub struct EnumOutput {
    variants: Vec<String>,
    schema: Value,
}

impl EnumOutput {
    /// Creates the strategy from the allowed variants.
    pub fn new<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let variants: Vec<String> =
            variants.into_iter().map(Into::into).collect();
        let schema = json!({
            "type": "object",
            "properties": {
                "result": { "type": "string", "enum": variants },
            },
            "required": ["result"],
            "additionalProperties": false,
        });
        Self { variants, schema }
    }
}

impl OutputStrategy for EnumOutput {
    type Output = String;

    fn mode(&self) -> OutputMode {
        OutputMode::Enum
    }

    fn response_format(&self) -> ResponseFormat {
        ResponseFormat::JsonSchema {
            name: "enum".to_owned(),
            schema: self.schema.clone(),
        }
    }

    fn check(&self) -> Result<(), Error> {
        if self.variants.is_empty() {
            return Err(Error::configuration(
                "enum output requires at least one variant",
            ));
        }
        Ok(())
    }

    fn parse(&self, raw: &str) -> Result<String, SchemaError> {
        let value = parse_raw(raw)?;
        let Some(result) = value.get("result").and_then(Value::as_str)
        else {
            return Err(SchemaError::message(
                "expected a root object with a `result` string",
            ));
        };
        if !self.variants.iter().any(|variant| variant == result) {
            return Err(SchemaError::message(format!(
                "`{result}` is not one of the allowed variants"
            )));
        }
        Ok(result.to_owned())
    }

    fn partial_value(&self, repaired: Value) -> Option<Value> {
        // A partially generated variant name is not presentable; only
        // emit the fragment once it matches a variant outright.
        let result = repaired.get("result")?.as_str()?;
        if self.variants.iter().any(|variant| variant == result) {
            Some(Value::String(result.to_owned()))
        } else {
            None
        }
    }
}

/// Generates any syntactically valid JSON value.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSchemaOutput;

impl OutputStrategy for NoSchemaOutput {
    type Output = Value;

    fn mode(&self) -> OutputMode {
        OutputMode::NoSchema
    }

    fn response_format(&self) -> ResponseFormat {
        ResponseFormat::JsonObject
    }

    fn parse(&self, raw: &str) -> Result<Value, SchemaError> {
        parse_raw(raw)
    }
}
