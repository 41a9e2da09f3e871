// ABOUTME: Loop-control signalling across statement lists, lambda bodies, and loops.

use crate::value::Value;

/// The result of evaluating one statement: either a value destined for the
/// statement-list accumulator, or a control signal that must be observed by
/// the nearest enclosing loop, lambda, or top-level walker (§4.6, §9 design
/// note — a sum type carried through the return channel instead of mutable
/// flags on the walker).
#[derive(Debug, Clone)]
pub enum Signal {
    Value(Value),
    Break,
    Continue,
    /// `return`'s carried value; `Value::Null` if the `return` had none.
    Return(Value),
}

impl Signal {
    pub fn is_jump(&self) -> bool {
        matches!(self, Signal::Break | Signal::Continue | Signal::Return(_))
    }

    /// Whether a statement list's iteration must halt immediately after this
    /// statement (§4.6: "After each statement inside a statement list, if
    /// any flag is set, iteration halts").
    pub fn halts_statement_list(&self) -> bool {
        self.is_jump()
    }

    /// Unwraps a non-jump signal into its value; jump signals have no
    /// statement-list contribution of their own.
    pub fn into_value(self) -> Value {
        match self {
            Signal::Value(v) => v,
            Signal::Break | Signal::Continue => Value::Null,
            Signal::Return(v) => v,
        }
    }
}
