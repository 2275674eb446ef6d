//! Isolated evaluation sessions.
//!
//! A session owns one interpreter living on its own OS thread. The host
//! never touches the interpreter directly: requests and responses cross the
//! boundary as JSON envelopes, and a dispatcher task on the tokio runtime
//! routes each response to the request that is waiting for it. Every
//! envelope carries the session's random origin; anything that does not
//! match an outstanding request of this session is dropped.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex, MutexGuard};
use std::thread;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::parser::ast::{
    ExpressionType, IdentifierData, LiteralData, LiteralType, Meta, NumberLiteralType, PropertyData, PropertyKey,
    PropertyKind, UnaryOperator,
};
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::{JsObjectType, ObjectKind, Property};
use crate::runner::ds::operations::type_conversion::to_string;
use crate::runner::ds::value::JsValue;
use crate::runner::plugin::types::EvalContext;

/// Stack reserved for the interpreter thread. Deeply nested decoders
/// recurse through the tree-walker many frames per script call.
const SANDBOX_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Objects nested deeper than this cannot cross the boundary.
const MAX_CLONE_DEPTH: usize = 64;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SandboxError {
    /// The script threw, or its result could not be cloned.
    #[error("evaluation failed: {0}")]
    Evaluation(String),
    /// A response could not be correlated or decoded.
    #[error("sandbox protocol error: {0}")]
    Protocol(String),
    /// The session was destroyed before the request resolved.
    #[error("sandbox session is closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Ready,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestKind {
    SandboxEval,
}

/// Host to sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxRequest {
    pub origin: Uuid,
    pub request_id: u64,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub code: String,
}

/// Sandbox to host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxResponse {
    pub origin: Uuid,
    pub request_id: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<SandboxValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A structured clone of a script value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum SandboxValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(#[serde(with = "js_number")] f64),
    String(String),
    Array(Vec<SandboxValue>),
    Object(Vec<(String, SandboxValue)>),
}

/// JSON has no NaN or infinities; those travel as their `String(n)` text.
mod js_number {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::runner::ds::operations::type_conversion::number_to_string;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Finite(f64),
        Special(String),
    }

    pub fn serialize<S: Serializer>(n: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if n.is_finite() {
            serializer.serialize_f64(*n)
        } else {
            serializer.serialize_str(&number_to_string(*n))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Finite(n) => n,
            Repr::Special(text) => match text.as_str() {
                "Infinity" => f64::INFINITY,
                "-Infinity" => f64::NEG_INFINITY,
                _ => f64::NAN,
            },
        })
    }
}

impl SandboxValue {
    /// Clones a value out of the interpreter. Functions and other host
    /// objects cannot be cloned.
    pub fn from_js(value: &JsValue) -> Result<SandboxValue, String> {
        let mut stack = vec![];
        clone_value(value, &mut stack)
    }

    /// Source-level expression that evaluates to this value.
    pub fn to_expression(&self) -> ExpressionType {
        match self {
            SandboxValue::Undefined => ExpressionType::new_identifier("undefined"),
            SandboxValue::Null => ExpressionType::new_literal(LiteralType::NullLiteral),
            SandboxValue::Boolean(b) => ExpressionType::new_literal(LiteralType::BooleanLiteral(*b)),
            SandboxValue::String(s) => ExpressionType::new_literal(LiteralType::StringLiteral(s.clone())),
            SandboxValue::Number(n) => number_expression(*n),
            SandboxValue::Array(items) => ExpressionType::ArrayExpression {
                meta: Meta::synthetic(),
                elements: items.iter().map(|v| Some(v.to_expression())).collect(),
            },
            SandboxValue::Object(entries) => ExpressionType::ObjectExpression {
                meta: Meta::synthetic(),
                properties: entries
                    .iter()
                    .map(|(key, value)| PropertyData {
                        meta: Meta::synthetic(),
                        key: property_key(key),
                        value: value.to_expression(),
                        kind: PropertyKind::Init,
                    })
                    .collect(),
            },
        }
    }
}

fn number_expression(n: f64) -> ExpressionType {
    if n.is_nan() {
        return ExpressionType::new_identifier("NaN");
    }
    if n.is_infinite() {
        let infinity = ExpressionType::new_identifier("Infinity");
        return if n > 0.0 {
            infinity
        } else {
            ExpressionType::UnaryExpression {
                meta: Meta::synthetic(),
                operator: UnaryOperator::Minus,
                argument: Box::new(infinity),
            }
        };
    }
    let literal = if n.fract() == 0.0 && n.abs() < 9007199254740992.0 && !(n == 0.0 && n.is_sign_negative()) {
        NumberLiteralType::IntegerLiteral(n as i64)
    } else {
        NumberLiteralType::FloatLiteral(n)
    };
    ExpressionType::new_literal(LiteralType::NumberLiteral(literal))
}

fn property_key(key: &str) -> PropertyKey {
    let is_identifier = key
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        .unwrap_or(false)
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if is_identifier {
        PropertyKey::Identifier(IdentifierData::new(key))
    } else {
        PropertyKey::Literal(LiteralData {
            meta: Meta::synthetic(),
            value: LiteralType::StringLiteral(key.to_string()),
        })
    }
}

fn clone_value(value: &JsValue, stack: &mut Vec<JsObjectType>) -> Result<SandboxValue, String> {
    Ok(match value {
        JsValue::Undefined => SandboxValue::Undefined,
        JsValue::Null => SandboxValue::Null,
        JsValue::Boolean(b) => SandboxValue::Boolean(*b),
        JsValue::Number(n) => SandboxValue::Number(n.as_f64()),
        JsValue::String(s) => SandboxValue::String(s.clone()),
        JsValue::Object(o) => {
            if stack.len() >= MAX_CLONE_DEPTH || stack.iter().any(|seen| Rc::ptr_eq(seen, o)) {
                return Err("circular structure could not be cloned".to_string());
            }
            stack.push(o.clone());
            let object = o.borrow();
            let cloned = match &object.kind {
                ObjectKind::Array(elements) => SandboxValue::Array(
                    elements
                        .iter()
                        .map(|e| clone_value(e, stack))
                        .collect::<Result<_, _>>()?,
                ),
                ObjectKind::Function(_) => {
                    return Err(format!("{} could not be cloned", to_string(value)))
                }
                ObjectKind::Ordinary | ObjectKind::Error | ObjectKind::RegExp(_) => {
                    let mut entries = vec![];
                    for key in object.own_keys() {
                        if let Some(Property::Data(v)) = object.get_own(&key) {
                            entries.push((key, clone_value(&v, stack)?));
                        }
                    }
                    SandboxValue::Object(entries)
                }
            };
            drop(object);
            stack.pop();
            cloned
        }
    })
}

enum Inbound {
    Message(String),
    WorkerExited,
}

type PendingTable = HashMap<u64, oneshot::Sender<Result<SandboxValue, SandboxError>>>;

/// Handle for posting raw messages into a session's inbound queue, as any
/// other party sharing the channel could.
#[derive(Clone)]
pub struct MessagePort {
    inbound: mpsc::UnboundedSender<Inbound>,
}

impl MessagePort {
    pub fn post(&self, message: String) {
        let _ = self.inbound.send(Inbound::Message(message));
    }
}

/// An isolated script context with one persistent global scope.
pub struct SandboxSession {
    origin: Uuid,
    next_request_id: AtomicU64,
    pending: Arc<Mutex<PendingTable>>,
    requests: Mutex<Option<std_mpsc::Sender<String>>>,
    state: Arc<watch::Sender<SessionState>>,
    state_rx: watch::Receiver<SessionState>,
    inbound: mpsc::UnboundedSender<Inbound>,
}

fn lock(pending: &Mutex<PendingTable>) -> MutexGuard<'_, PendingTable> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SandboxSession {
    /// Starts the interpreter thread and the response dispatcher. Must be
    /// called from within a tokio runtime. The session is `Initializing`
    /// until the interpreter signals readiness.
    pub fn spawn() -> Result<SandboxSession, SandboxError> {
        let origin = Uuid::new_v4();
        let (state_tx, state_rx) = watch::channel(SessionState::Initializing);
        let state = Arc::new(state_tx);
        let pending: Arc<Mutex<PendingTable>> = Arc::new(Mutex::new(HashMap::new()));
        let (request_tx, request_rx) = std_mpsc::channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Inbound>();

        let worker_state = state.clone();
        let worker_outbound = inbound_tx.clone();
        thread::Builder::new()
            .name(format!("jsdeob-sandbox-{}", origin))
            .stack_size(SANDBOX_STACK_SIZE)
            .spawn(move || {
                run_worker(origin, request_rx, &worker_outbound, &worker_state);
                let _ = worker_outbound.send(Inbound::WorkerExited);
            })
            .map_err(|e| SandboxError::Protocol(format!("could not start sandbox thread: {}", e)))?;

        tokio::spawn(dispatch(origin, inbound_rx, pending.clone(), state.clone()));

        debug!(%origin, "sandbox session spawned");
        Ok(SandboxSession {
            origin,
            next_request_id: AtomicU64::new(0),
            pending,
            requests: Mutex::new(Some(request_tx)),
            state,
            state_rx,
            inbound: inbound_tx,
        })
    }

    /// Spawns a session and waits until it is ready.
    pub async fn open() -> Result<SandboxSession, SandboxError> {
        let session = SandboxSession::spawn()?;
        session.ready().await?;
        Ok(session)
    }

    pub fn origin(&self) -> Uuid {
        self.origin
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    pub fn message_port(&self) -> MessagePort {
        MessagePort {
            inbound: self.inbound.clone(),
        }
    }

    /// Resolves once the interpreter is ready; fails if the session was
    /// destroyed first.
    pub async fn ready(&self) -> Result<(), SandboxError> {
        let mut state = self.state_rx.clone();
        loop {
            let current = *state.borrow_and_update();
            match current {
                SessionState::Ready => return Ok(()),
                SessionState::Destroyed => return Err(SandboxError::Closed),
                SessionState::Initializing => {}
            }
            if state.changed().await.is_err() {
                return Err(SandboxError::Closed);
            }
        }
    }

    /// Runs `code` in the session's global scope and clones its completion
    /// value back.
    pub async fn evaluate(&self, code: &str) -> Result<SandboxValue, SandboxError> {
        self.ready().await?;
        let request_id = self.next_request_id.fetch_add(1, Ordering::SeqCst) + 1;
        let request = SandboxRequest {
            origin: self.origin,
            request_id,
            kind: RequestKind::SandboxEval,
            code: code.to_string(),
        };
        let message = serde_json::to_string(&request)
            .map_err(|e| SandboxError::Protocol(e.to_string()))?;
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(request_id, tx);
        let sent = {
            let requests = self.requests.lock().unwrap_or_else(|p| p.into_inner());
            match requests.as_ref() {
                Some(sender) => sender.send(message).is_ok(),
                None => false,
            }
        };
        if !sent {
            lock(&self.pending).remove(&request_id);
            return Err(SandboxError::Closed);
        }
        debug!(origin = %self.origin, request_id, "sandbox request sent");
        rx.await.unwrap_or(Err(SandboxError::Closed))
    }

    /// Releases the interpreter. Outstanding and later requests fail with
    /// `SandboxError::Closed`.
    pub fn destroy(&self) {
        self.state.send_replace(SessionState::Destroyed);
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).take();
        for (_, waiter) in lock(&self.pending).drain() {
            let _ = waiter.send(Err(SandboxError::Closed));
        }
        debug!(origin = %self.origin, "sandbox session destroyed");
    }
}

impl Drop for SandboxSession {
    fn drop(&mut self) {
        if self.state() != SessionState::Destroyed {
            self.destroy();
        }
    }
}

/// Routes responses to their waiting requests until the worker exits.
async fn dispatch(
    origin: Uuid,
    mut inbound: mpsc::UnboundedReceiver<Inbound>,
    pending: Arc<Mutex<PendingTable>>,
    state: Arc<watch::Sender<SessionState>>,
) {
    while let Some(message) = inbound.recv().await {
        let text = match message {
            Inbound::Message(text) => text,
            Inbound::WorkerExited => break,
        };
        let response: SandboxResponse = match serde_json::from_str(&text) {
            Ok(response) => response,
            Err(e) => {
                warn!(%origin, error = %e, "dropping malformed sandbox message");
                continue;
            }
        };
        if response.origin != origin {
            warn!(%origin, foreign = %response.origin, "dropping sandbox message from foreign origin");
            continue;
        }
        let waiter = match lock(&pending).remove(&response.request_id) {
            Some(waiter) => waiter,
            None => {
                warn!(%origin, request_id = response.request_id, "dropping sandbox message for unknown request");
                continue;
            }
        };
        let outcome = match (response.success, response.result, response.error) {
            (true, Some(value), _) => Ok(value),
            (true, None, _) => Ok(SandboxValue::Undefined),
            (false, _, Some(error)) => Err(SandboxError::Evaluation(error)),
            (false, _, None) => Err(SandboxError::Protocol("Internal error.".to_string())),
        };
        let _ = waiter.send(outcome);
    }
    state.send_replace(SessionState::Destroyed);
    for (_, waiter) in lock(&pending).drain() {
        let _ = waiter.send(Err(SandboxError::Closed));
    }
}

fn run_worker(
    origin: Uuid,
    requests: std_mpsc::Receiver<String>,
    outbound: &mpsc::UnboundedSender<Inbound>,
    state: &watch::Sender<SessionState>,
) {
    let mut ctx = match catch_unwind(EvalContext::new) {
        Ok(ctx) => ctx,
        Err(_) => {
            warn!(%origin, "sandbox interpreter failed to initialise");
            return;
        }
    };
    state.send_if_modified(|s| {
        if *s == SessionState::Initializing {
            *s = SessionState::Ready;
            true
        } else {
            false
        }
    });
    while let Ok(message) = requests.recv() {
        let request: SandboxRequest = match serde_json::from_str(&message) {
            Ok(request) => request,
            Err(e) => {
                warn!(%origin, error = %e, "sandbox ignoring malformed request");
                continue;
            }
        };
        if request.origin != origin || request.kind != RequestKind::SandboxEval {
            warn!(%origin, "sandbox ignoring request from foreign origin");
            continue;
        }
        let outcome = match catch_unwind(AssertUnwindSafe(|| ctx.run_script(&request.code))) {
            Ok(Ok(value)) => SandboxValue::from_js(&value),
            Ok(Err(error)) => Err(error_message(&error)),
            Err(_) => Err("Internal error: interpreter panicked".to_string()),
        };
        let response = match outcome {
            Ok(value) => SandboxResponse {
                origin,
                request_id: request.request_id,
                success: true,
                result: Some(value),
                error: None,
            },
            Err(error) => SandboxResponse {
                origin,
                request_id: request.request_id,
                success: false,
                result: None,
                error: Some(error),
            },
        };
        match serde_json::to_string(&response) {
            Ok(text) => {
                if outbound.send(Inbound::Message(text)).is_err() {
                    break;
                }
            }
            Err(e) => warn!(%origin, error = %e, "sandbox could not encode response"),
        }
    }
}

/// The message of an uncaught error, in the `Name: message` form.
fn error_message(error: &JErrorType) -> String {
    error.describe()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_declarations_persist_across_requests() {
        let session = SandboxSession::open().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        session.evaluate("function twice(x) { return x * 2; }").await.unwrap();
        assert_eq!(session.evaluate("twice(21);").await.unwrap(), SandboxValue::Number(42.0));
        session.destroy();
    }

    #[tokio::test]
    async fn test_evaluate_before_ready_waits() {
        let session = SandboxSession::spawn().unwrap();
        assert_eq!(session.evaluate("'a' + 'b';").await.unwrap(), SandboxValue::String("ab".to_string()));
    }

    #[tokio::test]
    async fn test_throwing_script_is_an_error_result() {
        let session = SandboxSession::open().await.unwrap();
        assert_eq!(
            session.evaluate("throw new Error('boom');").await,
            Err(SandboxError::Evaluation("Error: boom".to_string()))
        );
        assert_eq!(session.evaluate("1;").await.unwrap(), SandboxValue::Number(1.0));
        assert_eq!(session.evaluate("-1 / 0;").await.unwrap(), SandboxValue::Number(f64::NEG_INFINITY));
    }

    #[tokio::test]
    async fn test_functions_cannot_be_cloned() {
        let session = SandboxSession::open().await.unwrap();
        assert!(matches!(
            session.evaluate("(function () {});").await,
            Err(SandboxError::Evaluation(_))
        ));
    }

    #[tokio::test]
    async fn test_evaluate_after_destroy_is_closed() {
        let session = SandboxSession::open().await.unwrap();
        session.destroy();
        assert_eq!(session.state(), SessionState::Destroyed);
        assert_eq!(session.evaluate("1;").await, Err(SandboxError::Closed));
    }

    #[tokio::test]
    async fn test_foreign_messages_are_dropped() {
        let session = SandboxSession::open().await.unwrap();
        let forged = SandboxResponse {
            origin: Uuid::new_v4(),
            request_id: 1,
            success: true,
            result: Some(SandboxValue::String("forged".to_string())),
            error: None,
        };
        session.message_port().post(serde_json::to_string(&forged).unwrap());
        session.message_port().post("not json".to_string());
        assert_eq!(session.evaluate("'real';").await.unwrap(), SandboxValue::String("real".to_string()));
    }

    #[tokio::test]
    async fn test_concurrent_requests_get_their_own_results() {
        let session = Arc::new(SandboxSession::open().await.unwrap());
        session.evaluate("function square(n) { return n * n; }").await.unwrap();
        let handles: Vec<_> = (0..20)
            .map(|n| {
                let session = session.clone();
                tokio::spawn(async move { (n, session.evaluate(&format!("square({});", n)).await) })
            })
            .collect();
        for handle in handles {
            let (n, result) = handle.await.unwrap();
            assert_eq!(result.unwrap(), SandboxValue::Number((n * n) as f64));
        }
    }

    #[tokio::test]
    async fn test_destroy_fails_requests_in_flight() {
        let session = Arc::new(SandboxSession::open().await.unwrap());
        let busy = session.clone();
        let request = tokio::spawn(async move {
            busy.evaluate("var n = 0; for (var i = 0; i < 5000000; i++) { n += i; } n;").await
        });
        while lock(&session.pending).is_empty() {
            tokio::task::yield_now().await;
        }
        session.destroy();
        assert_eq!(request.await.unwrap(), Err(SandboxError::Closed));
        assert_eq!(session.evaluate("1;").await, Err(SandboxError::Closed));
    }

    #[tokio::test]
    async fn test_unknown_request_ids_are_dropped() {
        let session = SandboxSession::open().await.unwrap();
        let stray = SandboxResponse {
            origin: session.origin(),
            request_id: u64::MAX,
            success: true,
            result: Some(SandboxValue::String("stray".to_string())),
            error: None,
        };
        session.message_port().post(serde_json::to_string(&stray).unwrap());
        tokio::task::yield_now().await;
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.evaluate("'real';").await.unwrap(), SandboxValue::String("real".to_string()));
        assert_eq!(session.evaluate("'next';").await.unwrap(), SandboxValue::String("next".to_string()));
    }

    #[test]
    fn test_values_become_expressions() {
        use crate::parser::codegen::generate_expression;
        let value = SandboxValue::Array(vec![
            SandboxValue::Number(-1.5),
            SandboxValue::Number(3.0),
            SandboxValue::String("x".to_string()),
            SandboxValue::Undefined,
        ]);
        assert_eq!(generate_expression(&value.to_expression()), "[\n    -1.5,\n    3,\n    'x',\n    undefined\n]");
        assert_eq!(generate_expression(&SandboxValue::Number(f64::NAN).to_expression()), "NaN");
    }
}
