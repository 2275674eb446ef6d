use crate::runner::ds::error::JErrorType;
use crate::runner::ds::value::JsValue;

/// How a statement finished. Thrown exceptions travel as
/// `Err(JErrorType)` instead of a variant here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompletionType {
    Normal,
    Return,
    Break,
    Continue,
}

/// Result of running one statement: its kind, the value it produced (the
/// script's completion value is the last one seen) and, for labelled
/// `break`/`continue`, the label it targets.
pub struct Completion {
    pub completion_type: CompletionType,
    pub value: Option<JsValue>,
    pub target: Option<String>,
}

impl Completion {
    fn new(completion_type: CompletionType, value: Option<JsValue>, target: Option<String>) -> Self {
        Completion {
            completion_type,
            value,
            target,
        }
    }

    pub fn normal() -> Self {
        Self::new(CompletionType::Normal, None, None)
    }

    pub fn normal_with_value(value: JsValue) -> Self {
        Self::new(CompletionType::Normal, Some(value), None)
    }

    pub fn return_value(value: JsValue) -> Self {
        Self::new(CompletionType::Return, Some(value), None)
    }

    pub fn break_completion(target: Option<String>) -> Self {
        Self::new(CompletionType::Break, None, target)
    }

    pub fn continue_completion(target: Option<String>) -> Self {
        Self::new(CompletionType::Continue, None, target)
    }

    pub fn is_abrupt(&self) -> bool {
        self.completion_type != CompletionType::Normal
    }

    pub fn get_value(&self) -> JsValue {
        self.value.clone().unwrap_or(JsValue::Undefined)
    }

    /// Carries an earlier statement's value through a completion that
    /// produced none of its own.
    pub fn update_empty(mut self, value: Option<JsValue>) -> Self {
        if self.value.is_none() {
            self.value = value;
        }
        self
    }
}

pub type EvalResult = Result<Completion, JErrorType>;

pub type ValueResult = Result<JsValue, JErrorType>;
