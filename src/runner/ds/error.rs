use crate::runner::ds::object::JsObject;
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::JsValue;

/// An abrupt completion raised while running script code.
///
/// The named variants are the engine's own errors; `Thrown` carries whatever
/// value a script passed to `throw`.
#[derive(Debug, Clone)]
pub enum JErrorType {
    ReferenceError(String),
    TypeError(String),
    RangeError(String),
    SyntaxError(String),
    URIError(String),
    Error(String),
    Thrown(JsValue),
}
impl JErrorType {
    pub fn new_copy(other: &Self) -> Self {
        other.clone()
    }

    /// Constructor name of the error object this error materialises as.
    pub fn name(&self) -> &'static str {
        match self {
            JErrorType::ReferenceError(_) => "ReferenceError",
            JErrorType::TypeError(_) => "TypeError",
            JErrorType::RangeError(_) => "RangeError",
            JErrorType::SyntaxError(_) => "SyntaxError",
            JErrorType::URIError(_) => "URIError",
            JErrorType::Error(_) | JErrorType::Thrown(_) => "Error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            JErrorType::ReferenceError(m)
            | JErrorType::TypeError(m)
            | JErrorType::RangeError(m)
            | JErrorType::SyntaxError(m)
            | JErrorType::URIError(m)
            | JErrorType::Error(m) => m.clone(),
            JErrorType::Thrown(v) => to_string(v),
        }
    }

    /// The value a `catch` clause binds.
    pub fn into_value(self) -> JsValue {
        match self {
            JErrorType::Thrown(v) => v,
            other => JsValue::Object(JsObject::new_error(other.name(), &other.message())),
        }
    }

    /// One-line description in the `Name: message` form browsers print.
    pub fn describe(&self) -> String {
        match self {
            JErrorType::Thrown(v) => to_string(v),
            other => format!("{}: {}", other.name(), other.message()),
        }
    }

    pub fn to_string(&self) -> String {
        match self {
            JErrorType::ReferenceError(m) => format!("Uncaught reference error: {}.", m),
            JErrorType::TypeError(m) => format!("Uncaught type error: {}.", m),
            JErrorType::RangeError(m) => format!("Uncaught range error: {}.", m),
            JErrorType::SyntaxError(m) => format!("Uncaught syntax error: {}.", m),
            JErrorType::URIError(m) => format!("Uncaught URI error: {}.", m),
            JErrorType::Error(m) => format!("Uncaught error: {}.", m),
            JErrorType::Thrown(v) => format!("Uncaught {}", to_string(v)),
        }
    }
}
