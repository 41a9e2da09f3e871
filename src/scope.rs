// ABOUTME: Per-visitor local variable mapping layered above the host's global provider.

use crate::error::EvalError;
use crate::host::Evaluator;
use crate::value::Value;
use std::collections::HashMap;

/// A flat name→value mapping owned by one active walker (§3 "Scope"). Unlike
/// a lexically-nested environment, there is exactly one `Scope` per walker —
/// lambda invocations get a fresh one seeded from the closure snapshot, not
/// a child chained onto the caller's (§3 "Lambda closure", §4.5). Lookups
/// that miss locally fall through to the host's variable provider; writes
/// always target the local map (§3 "Scope").
pub struct Scope<'h> {
    locals: HashMap<String, Value>,
    host: &'h dyn Evaluator,
}

impl<'h> Scope<'h> {
    pub fn new(host: &'h dyn Evaluator) -> Self {
        Self {
            locals: HashMap::new(),
            host,
        }
    }

    pub fn seeded(host: &'h dyn Evaluator, bindings: HashMap<String, Value>) -> Self {
        Self {
            locals: bindings,
            host,
        }
    }

    pub fn host(&self) -> &'h dyn Evaluator {
        self.host
    }

    /// Looks up `name`, falling through to the host on a local miss.
    pub fn get(&self, name: &str) -> Result<Value, EvalError> {
        if let Some(v) = self.locals.get(name) {
            return Ok(v.clone());
        }
        self.host
            .get_variable(name)
            .map_err(|e| EvalError::from_host_error(e, None))
    }

    /// Looks up `name` in the local map only, without host fallback — used
    /// by lambda dispatch (§4.5) and compound-assignment/increment checks
    /// (§4.8), which only ever operate on local bindings.
    pub fn get_local(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.locals.contains_key(name)
    }

    /// Writes always target the local scope (§3).
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.locals.insert(name.into(), value);
    }

    pub fn remove_local(&mut self, name: &str) {
        self.locals.remove(name);
    }

    /// Copies the current local bindings by value — used both to capture a
    /// lambda's closure snapshot and to read back a child walker's bindings
    /// on lambda return (§4.5).
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.locals.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{CancellationToken, HostResult, NeverCancelled};
    use std::rc::Rc;

    struct StubHost {
        vars: HashMap<String, Value>,
    }

    impl Evaluator for StubHost {
        fn get_variable(&self, name: &str) -> HostResult<Value> {
            Ok(self.vars.get(name).cloned().unwrap_or(Value::Null))
        }
        fn invoke_method(&self, _name: &str, _args: &[Value]) -> HostResult<Value> {
            Ok(Value::Null)
        }
        fn invoke_member(
            &self,
            _receiver: &Value,
            _name: &str,
            _args: Option<&[Value]>,
        ) -> HostResult<Value> {
            Ok(Value::Null)
        }
        fn invoke_indexer(&self, _receiver: &Value, _key: &Value) -> HostResult<Value> {
            Ok(Value::Null)
        }
        fn save_parameter(&self, _name: &str, _value: &Value) -> HostResult<()> {
            Ok(())
        }
        fn flush_output(&self) -> HostResult<Option<String>> {
            Ok(None)
        }
        fn get_cancellation_token(&self) -> Rc<dyn CancellationToken> {
            Rc::new(NeverCancelled)
        }
    }

    #[test]
    fn local_binding_shadows_host_variable() {
        let mut vars = HashMap::new();
        vars.insert("x".to_string(), Value::Integer(1));
        let host = StubHost { vars };
        let mut scope = Scope::new(&host);
        scope.set("x", Value::Integer(99));
        assert_eq!(scope.get("x").unwrap(), Value::Integer(99));
    }

    #[test]
    fn missing_local_falls_through_to_host() {
        let mut vars = HashMap::new();
        vars.insert("y".to_string(), Value::Integer(7));
        let host = StubHost { vars };
        let scope = Scope::new(&host);
        assert_eq!(scope.get("y").unwrap(), Value::Integer(7));
    }

    #[test]
    fn unknown_name_resolves_to_null_via_host() {
        let host = StubHost {
            vars: HashMap::new(),
        };
        let scope = Scope::new(&host);
        assert_eq!(scope.get("nope").unwrap(), Value::Null);
    }

    #[test]
    fn snapshot_copies_bindings_by_value() {
        let host = StubHost {
            vars: HashMap::new(),
        };
        let mut scope = Scope::new(&host);
        scope.set("a", Value::Integer(1));
        let snap = scope.snapshot();
        scope.set("a", Value::Integer(2));
        assert_eq!(snap.get("a"), Some(&Value::Integer(1)));
        assert_eq!(scope.get("a").unwrap(), Value::Integer(2));
    }
}
