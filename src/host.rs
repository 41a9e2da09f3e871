// ABOUTME: The Evaluator capability set a host application must supply (§6.2).

use crate::comparer::ComparerKey;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// Error type a host capability fails with. Propagated as-is by the walker,
/// wrapped into [`crate::error::EvalError::HostError`] (§7).
pub type HostError = Box<dyn std::error::Error + Send + Sync>;

pub type HostResult<T> = Result<T, HostError>;

/// Cooperative cancellation signal (§5 "Cancellation"). A walker fetches one
/// from the host at begin-expression entry and propagates the same instance
/// to every child walker, including lambda invocations.
pub trait CancellationToken: fmt::Debug {
    fn is_cancelled(&self) -> bool;
}

/// "a perpetual-non-cancelling sentinel" (§6.2) for hosts that do not
/// support cancellation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancelled;

impl CancellationToken for NeverCancelled {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// The host capability set the evaluator is built against (§6.2). The host
/// application implements this once; the walker only ever sees it behind a
/// shared reference, since nested walkers (lambda invocations) share the
/// same host within one top-level evaluation (§5 "Shared resources").
pub trait Evaluator {
    /// Fallback variable lookup; returns `Value::Null` for an unknown name.
    fn get_variable(&self, name: &str) -> HostResult<Value>;

    /// Global/free function call.
    fn invoke_method(&self, name: &str, args: &[Value]) -> HostResult<Value>;

    /// Property read when `args` is `None`, method call otherwise.
    fn invoke_member(&self, receiver: &Value, name: &str, args: Option<&[Value]>) -> HostResult<Value>;

    /// Indexer `receiver[key]`.
    fn invoke_indexer(&self, receiver: &Value, key: &Value) -> HostResult<Value>;

    /// Sink for a begin-expression parameter declaration.
    fn save_parameter(&self, name: &str, value: &Value) -> HostResult<()>;

    /// Drains and returns any buffered textual output since the last flush.
    fn flush_output(&self) -> HostResult<Option<String>>;

    /// Token or perpetual-non-cancelling sentinel (§6.2).
    fn get_cancellation_token(&self) -> Rc<dyn CancellationToken>;

    /// Additional comparer entries the host wants consulted, keyed by
    /// variant tag or host-type token (§3, §6.2 `known_comparers`).
    fn known_comparers(&self) -> Vec<(ComparerKey, crate::comparer::ComparerFn)> {
        Vec::new()
    }
}
