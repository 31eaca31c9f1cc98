//! Binding of request payload fields to declared handler parameters

use super::dispatch::InvokeError;
use greenhouse_shared::Payload;
use serde_json::Value;
use std::fmt;

/// JSON shape a parameter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Number,
}

impl ParamKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            ParamKind::Number => value.is_number(),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Number => "a number",
        };
        f.write_str(name)
    }
}

/// One named parameter of a direct method
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: Option<Value>,
}

impl ParamSpec {
    #[cfg(test)]
    pub fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            default: None,
        }
    }

    pub fn optional(name: &'static str, kind: ParamKind, default: impl Into<Value>) -> Self {
        Self {
            name,
            kind,
            default: Some(default.into()),
        }
    }
}

/// Arguments after binding: every declared parameter is present and well typed
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodArgs {
    values: Payload,
}

impl MethodArgs {
    /// Match payload fields against `params`, filling defaults.
    ///
    /// Unknown fields, missing required parameters and type mismatches all
    /// fail with `InvalidArgument`.
    pub fn bind(method_name: &str, params: &[ParamSpec], payload: &Payload) -> Result<Self, InvokeError> {
        if let Some(unexpected) = payload
            .keys()
            .find(|key| !params.iter().any(|p| p.name == key.as_str()))
        {
            return Err(InvokeError::InvalidArgument(format!(
                "{method_name}() got an unexpected argument '{unexpected}'"
            )));
        }

        let mut values = Payload::new();
        for param in params {
            let value = match (payload.get(param.name), &param.default) {
                (Some(value), _) => value.clone(),
                (None, Some(default)) => default.clone(),
                (None, None) => {
                    return Err(InvokeError::InvalidArgument(format!(
                        "{method_name}() missing required argument '{}'",
                        param.name
                    )));
                }
            };

            if !param.kind.accepts(&value) {
                return Err(InvokeError::InvalidArgument(format!(
                    "argument '{}' of {method_name}() must be {}",
                    param.name, param.kind
                )));
            }
            values.insert(param.name.to_string(), value);
        }

        Ok(Self { values })
    }

    pub fn number(&self, name: &str) -> Result<f64, InvokeError> {
        self.values
            .get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| InvokeError::InvalidArgument(format!("argument '{name}' is not a number")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap_or_default()
    }

    fn turn_on_params() -> Vec<ParamSpec> {
        vec![ParamSpec::optional("duration_in_min", ParamKind::Number, 0)]
    }

    #[test]
    fn test_default_fills_missing_optional() {
        let args = MethodArgs::bind("turn_on", &turn_on_params(), &Payload::new()).unwrap();
        assert_eq!(args.number("duration_in_min").unwrap(), 0.0);
    }

    #[test]
    fn test_supplied_value_wins_over_default() {
        let args = MethodArgs::bind("turn_on", &turn_on_params(), &payload(json!({"duration_in_min": 10})))
            .unwrap();
        assert_eq!(args.number("duration_in_min").unwrap(), 10.0);
    }

    #[test]
    fn test_unexpected_argument_rejected() {
        let err = MethodArgs::bind("turn_off", &[], &payload(json!({"level": 3}))).unwrap_err();
        assert_eq!(
            err,
            InvokeError::InvalidArgument("turn_off() got an unexpected argument 'level'".into())
        );
    }

    #[test]
    fn test_missing_required_rejected() {
        let params = vec![ParamSpec::required("target", ParamKind::Number)];
        let err = MethodArgs::bind("set_target", &params, &Payload::new()).unwrap_err();
        assert!(matches!(err, InvokeError::InvalidArgument(ref m) if m.contains("missing required argument 'target'")));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let err = MethodArgs::bind(
            "turn_on",
            &turn_on_params(),
            &payload(json!({"duration_in_min": "ten"})),
        )
        .unwrap_err();
        assert!(matches!(err, InvokeError::InvalidArgument(ref m) if m.contains("must be a number")));
    }

    #[test]
    fn test_number_accepts_any_numeric_value() {
        let params = vec![
            ParamSpec::required("a", ParamKind::Number),
            ParamSpec::required("b", ParamKind::Number),
            ParamSpec::optional("c", ParamKind::Number, 1.5),
        ];
        let args = MethodArgs::bind("m", &params, &payload(json!({"a": -5, "b": 2.5}))).unwrap();
        assert_eq!(args.number("a").unwrap(), -5.0);
        assert_eq!(args.number("b").unwrap(), 2.5);
        assert_eq!(args.number("c").unwrap(), 1.5);
    }
}
