// ABOUTME: Lambda invocation — fresh scope, arity/conflict checks, caller write-back (§4.5).

use crate::ast::SourceSpan;
use crate::control::Signal;
use crate::error::{EvalError, RecursionLimitExceeded};
use crate::eval::Walker;
use crate::scope::Scope;
use crate::value::{LambdaValue, Value};
use std::rc::Rc;

impl<'h> Walker<'h> {
    /// Invokes `lambda` with already-evaluated `args` (§4.5). `self` is the
    /// calling walker; its scope plays "the caller's scope" for both the
    /// parameter-collision check (step 1) and the post-call write-back
    /// (step 4). `lambda` is taken as an `Rc` (not a bare reference) so the
    /// write-back step can identify — and skip — the very binding that
    /// holds this lambda, by pointer identity (see below).
    pub(crate) fn invoke_lambda(
        &mut self,
        lambda: &Rc<LambdaValue>,
        args: &[Value],
        span: Option<SourceSpan>,
    ) -> Result<Value, EvalError> {
        if self.depth() + 1 > self.config().max_call_depth {
            return Err(EvalError::host(
                RecursionLimitExceeded {
                    depth: self.depth() + 1,
                    limit: self.config().max_call_depth,
                },
                span,
            ));
        }

        for name in &lambda.signature {
            if self.scope().contains_local(name) {
                return Err(EvalError::conflict(name.clone(), span));
            }
        }
        if args.len() != lambda.signature.len() {
            return Err(EvalError::arity(lambda.signature.len(), args.len(), span));
        }

        // §4.5 step 4's "names that existed in the caller's scope pre-call"
        // excludes the binding currently holding `lambda` itself: the
        // closure snapshot is captured before that binding exists (e.g.
        // `x = (n) => n*n` captures an empty closure, then assigns `x`), so
        // writing `x` back to Null after the call would strand the caller
        // without its own lambda, breaking every subsequent `x(...)` call.
        let caller_keys: Vec<String> = self
            .scope()
            .snapshot()
            .into_iter()
            .filter(|(_, v)| !matches!(v, Value::Lambda(rc) if Rc::ptr_eq(rc, lambda)))
            .map(|(name, _)| name)
            .collect();

        let mut bindings = lambda.closure.clone();
        for (name, value) in lambda.signature.iter().zip(args.iter()) {
            bindings.insert(name.clone(), value.clone());
        }
        let child_scope = Scope::seeded(self.scope().host(), bindings);
        let mut child = self.child_for_lambda(child_scope);

        let span_guard = tracing::debug_span!("invoke_lambda", depth = child.depth());
        let _guard = span_guard.enter();

        let result = match child.eval(&lambda.body)? {
            Signal::Return(v) => v,
            // §3 invariant: break/continue never cross a lambda boundary in
            // well-formed input; treat a stray one as contributing nothing.
            Signal::Break | Signal::Continue => Value::Null,
            Signal::Value(v) => v,
        };

        // §9 "UpdateLocalVariables": names that existed in the caller's scope
        // pre-call are written back from the child scope, defaulting to
        // `Null` when the lambda never touched them. Preserved as documented
        // (error-prone but matches observed source behaviour).
        if !caller_keys.is_empty() && !self.warned_lambda_writeback {
            tracing::warn!("lambda write-back defaults untouched caller bindings to Null");
            self.warned_lambda_writeback = true;
        }
        let child_snapshot = child.scope().snapshot();
        for name in caller_keys {
            let value = child_snapshot.get(&name).cloned().unwrap_or(Value::Null);
            self.scope_mut().set(name, value);
        }

        Ok(result)
    }
}
