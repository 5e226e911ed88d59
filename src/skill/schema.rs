//! Declarative parameter schemas and validation.
//!
//! Each skill declares its parameters as a [`ParamSchema`]: type,
//! required/optional, default, enum membership, numeric bounds. The same
//! declaration renders the JSON Schema object advertised via `tools/list`
//! and drives validation of caller-supplied arguments.
//!
//! Validation is exhaustive: every violated constraint is reported, not
//! just the first, so a caller can fix all mistakes in one round trip.

use serde_json::{json, Map, Value};

/// The JSON type of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// UTF-8 string.
    String,
    /// Integral number.
    Integer,
    /// Any number.
    Number,
    /// Boolean.
    Boolean,
}

impl ParamType {
    /// Returns the JSON Schema type name.
    #[must_use]
    pub const fn json_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }

    /// Checks whether `value` is of this type.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

/// Declaration of a single parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: String,
    /// Human-readable description (surfaced in the JSON Schema).
    pub description: String,
    /// Declared type.
    pub param_type: ParamType,
    /// Whether the parameter must be supplied when no default exists.
    pub required: bool,
    /// Default applied when the parameter is absent or null.
    pub default: Option<Value>,
    /// Admitted values (enum membership), if constrained.
    pub allowed_values: Option<Vec<Value>>,
    /// Inclusive lower bound for numeric parameters.
    pub minimum: Option<f64>,
    /// Inclusive upper bound for numeric parameters.
    pub maximum: Option<f64>,
}

impl ParamSpec {
    /// Declares a required parameter.
    #[must_use]
    pub fn required(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            param_type,
            required: true,
            default: None,
            allowed_values: None,
            minimum: None,
            maximum: None,
        }
    }

    /// Declares an optional parameter.
    #[must_use]
    pub fn optional(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    /// Sets the default value applied when the parameter is absent.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Constrains the parameter to an admitted set of values.
    #[must_use]
    pub fn with_allowed_values(mut self, values: Vec<Value>) -> Self {
        self.allowed_values = Some(values);
        self
    }

    /// Constrains a numeric parameter to an inclusive range.
    #[must_use]
    pub const fn with_bounds(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }
}

/// An ordered set of parameter declarations.
#[derive(Debug, Clone)]
pub struct ParamSchema {
    params: Vec<ParamSpec>,
}

impl ParamSchema {
    /// Creates a schema from parameter declarations.
    #[must_use]
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    /// Returns the declared parameters in declaration order.
    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Renders the JSON Schema object advertised via `tools/list`.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for spec in &self.params {
            let mut property = Map::new();
            property.insert("type".to_string(), json!(spec.param_type.json_name()));
            property.insert("description".to_string(), json!(spec.description));
            if let Some(ref default) = spec.default {
                property.insert("default".to_string(), default.clone());
            }
            if let Some(ref allowed) = spec.allowed_values {
                property.insert("enum".to_string(), Value::Array(allowed.clone()));
            }
            if let Some(minimum) = spec.minimum {
                property.insert("minimum".to_string(), json!(minimum));
            }
            if let Some(maximum) = spec.maximum {
                property.insert("maximum".to_string(), json!(maximum));
            }
            properties.insert(spec.name.clone(), Value::Object(property));

            if spec.required {
                required.push(json!(spec.name));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Validates caller-supplied arguments against this schema.
    ///
    /// Checks, in order, per declared parameter: presence (if required
    /// and no default), type match, enum membership, numeric bounds.
    /// Defaults are applied for absent or null optional parameters.
    /// Parameters not declared in the schema are ignored.
    ///
    /// # Errors
    ///
    /// Returns every violated constraint; a non-empty violation list
    /// means no normalised parameter set is produced.
    pub fn validate(&self, args: &Value) -> Result<Map<String, Value>, Vec<String>> {
        let empty = Map::new();
        let supplied = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => return Err(vec!["arguments must be an object".to_string()]),
        };

        let mut normalised = Map::new();
        let mut violations = Vec::new();

        for spec in &self.params {
            match supplied.get(&spec.name) {
                None | Some(Value::Null) => {
                    if let Some(ref default) = spec.default {
                        normalised.insert(spec.name.clone(), default.clone());
                    } else if spec.required {
                        violations.push(format!("Required parameter '{}' is missing", spec.name));
                    }
                }
                Some(value) => {
                    if !spec.param_type.matches(value) {
                        violations.push(format!(
                            "Parameter '{}' must be a {}",
                            spec.name,
                            spec.param_type.json_name()
                        ));
                        continue;
                    }
                    if let Some(ref allowed) = spec.allowed_values {
                        if !allowed.contains(value) {
                            violations.push(format!(
                                "Parameter '{}' must be one of the admitted values",
                                spec.name
                            ));
                            continue;
                        }
                    }
                    if let Some(number) = value.as_f64() {
                        if spec.minimum.is_some_and(|min| number < min) {
                            violations.push(format!(
                                "Parameter '{}' is below the admitted minimum",
                                spec.name
                            ));
                            continue;
                        }
                        if spec.maximum.is_some_and(|max| number > max) {
                            violations.push(format!(
                                "Parameter '{}' is above the admitted maximum",
                                spec.name
                            ));
                            continue;
                        }
                    }
                    normalised.insert(spec.name.clone(), value.clone());
                }
            }
        }

        if violations.is_empty() {
            Ok(normalised)
        } else {
            Err(violations)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_schema() -> ParamSchema {
        ParamSchema::new(vec![
            ParamSpec::required("username", ParamType::String, "Account name"),
            ParamSpec::optional("subject", ParamType::String, "Subject line")
                .with_default(json!("Hello")),
            ParamSpec::optional("level", ParamType::String, "Verbosity")
                .with_allowed_values(vec![json!("low"), json!("high")]),
            ParamSpec::optional("retries", ParamType::Integer, "Attempt count")
                .with_bounds(Some(0.0), Some(5.0)),
        ])
    }

    #[test]
    fn valid_arguments_normalise() {
        let schema = test_schema();
        let normalised = schema
            .validate(&json!({"username": "a@b.com", "level": "low", "retries": 3}))
            .unwrap();
        assert_eq!(normalised["username"], "a@b.com");
        // Default applied for absent optional parameter.
        assert_eq!(normalised["subject"], "Hello");
        assert_eq!(normalised["retries"], 3);
    }

    #[test]
    fn missing_required_is_the_only_violation() {
        let schema = test_schema();
        let violations = schema.validate(&json!({})).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("username"));
    }

    #[test]
    fn all_violations_are_collected() {
        let schema = test_schema();
        let violations = schema
            .validate(&json!({"subject": 42, "level": "medium", "retries": 9}))
            .unwrap_err();
        // missing username, wrong subject type, bad enum value, out-of-bounds
        assert_eq!(violations.len(), 4);
    }

    #[test]
    fn null_optional_takes_default() {
        let schema = test_schema();
        let normalised = schema
            .validate(&json!({"username": "a@b.com", "subject": null}))
            .unwrap();
        assert_eq!(normalised["subject"], "Hello");
    }

    #[test]
    fn undeclared_parameters_are_ignored() {
        let schema = test_schema();
        let normalised = schema
            .validate(&json!({"username": "a@b.com", "extra": true}))
            .unwrap();
        assert!(!normalised.contains_key("extra"));
    }

    #[test]
    fn non_object_arguments_rejected() {
        let schema = test_schema();
        assert!(schema.validate(&json!([1, 2])).is_err());
        // Null is treated as an empty argument set.
        assert!(schema.validate(&Value::Null).is_err()); // username still missing
    }

    #[test]
    fn json_schema_shape() {
        let schema = test_schema().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["username"]["type"], "string");
        assert_eq!(schema["properties"]["subject"]["default"], "Hello");
        assert_eq!(schema["properties"]["level"]["enum"][0], "low");
        assert_eq!(schema["required"], json!(["username"]));
    }
}
