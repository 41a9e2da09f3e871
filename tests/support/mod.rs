// ABOUTME: Shared test-only host and AST-building helpers for the integration test suite.
#![allow(dead_code)]

use macroxpr::comparer::ComparerKey;
use macroxpr::host::{CancellationToken, Evaluator, HostResult};
use macroxpr::value::Collection;
use macroxpr::{ast::*, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// A minimal [`Evaluator`] standing in for "the host" (SPEC_FULL.md §D),
/// the way the teacher's `tests/integration_test.rs::setup()` stands up an
/// `Environment` + `MacroRegistry` pair. Variables are a flat map seeded by
/// the test; a handful of member/method/indexer forms are implemented just
/// well enough to exercise the walker's host-dispatch paths.
pub struct TestHost {
    vars: RefCell<HashMap<String, Value>>,
    output: RefCell<String>,
    cancelled: Rc<Cell<bool>>,
    comparers: Vec<(ComparerKey, macroxpr::comparer::ComparerFn)>,
}

#[derive(Debug)]
struct FlagToken(Rc<Cell<bool>>);

impl CancellationToken for FlagToken {
    fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

impl TestHost {
    pub fn new() -> Self {
        Self {
            vars: RefCell::new(HashMap::new()),
            output: RefCell::new(String::new()),
            cancelled: Rc::new(Cell::new(false)),
            comparers: Vec::new(),
        }
    }

    pub fn with_var(self, name: &str, value: Value) -> Self {
        self.vars.borrow_mut().insert(name.to_string(), value);
        self
    }

    pub fn with_comparer(mut self, key: ComparerKey, f: macroxpr::comparer::ComparerFn) -> Self {
        self.comparers.push((key, f));
        self
    }

    pub fn var(&self, name: &str) -> Option<Value> {
        self.vars.borrow().get(name).cloned()
    }

    /// Simulates the host writing to its textual output channel, the way a
    /// `print`/`console.log`-style builtin would before the next statement's
    /// flush (§4.3).
    pub fn write_output(&self, text: &str) {
        self.output.borrow_mut().push_str(text);
    }

    pub fn set_cancelled(&self, cancelled: bool) {
        self.cancelled.set(cancelled);
    }
}

impl Evaluator for TestHost {
    fn get_variable(&self, name: &str) -> HostResult<Value> {
        Ok(self.vars.borrow().get(name).cloned().unwrap_or(Value::Null))
    }

    fn invoke_method(&self, name: &str, args: &[Value]) -> HostResult<Value> {
        match name {
            "len" => match args.first() {
                Some(Value::Text(s)) => Ok(Value::Integer(s.chars().count() as i32)),
                Some(Value::Collection(c)) => Ok(Value::Integer(c.len() as i32)),
                _ => Err("len: expected a single Text or Collection argument".into()),
            },
            "makeList" => Ok(Value::Collection(Collection::from_items(args.to_vec()))),
            _ => Err(format!("unknown host method `{name}`").into()),
        }
    }

    fn invoke_member(&self, receiver: &Value, name: &str, args: Option<&[Value]>) -> HostResult<Value> {
        match (name, args) {
            ("length", None) => match receiver {
                Value::Text(s) => Ok(Value::Integer(s.chars().count() as i32)),
                Value::Collection(c) => Ok(Value::Integer(c.len() as i32)),
                other => Err(format!("{:?} has no `length` property", other.type_tag()).into()),
            },
            ("upper", Some(_)) | ("upper", None) => match receiver {
                Value::Text(s) => Ok(Value::Text(s.to_uppercase())),
                other => Err(format!("{:?} has no `upper` method", other.type_tag()).into()),
            },
            _ => Err(format!("unknown member `{name}`").into()),
        }
    }

    fn invoke_indexer(&self, receiver: &Value, key: &Value) -> HostResult<Value> {
        match receiver {
            Value::Collection(c) => match key {
                Value::Integer(i) => Ok(c.get_index(*i as i64).cloned().unwrap_or(Value::Null)),
                Value::Text(s) => Ok(c.get_key(s).cloned().unwrap_or(Value::Null)),
                other => Err(format!("cannot index a Collection with {:?}", other.type_tag()).into()),
            },
            Value::Text(s) => match key {
                Value::Integer(i) => Ok(s
                    .chars()
                    .nth(*i as usize)
                    .map(Value::Character)
                    .unwrap_or(Value::Null)),
                other => Err(format!("cannot index Text with {:?}", other.type_tag()).into()),
            },
            other => Err(format!("{:?} is not indexable", other.type_tag()).into()),
        }
    }

    fn save_parameter(&self, name: &str, value: &Value) -> HostResult<()> {
        self.vars.borrow_mut().insert(name.to_string(), value.clone());
        Ok(())
    }

    fn flush_output(&self) -> HostResult<Option<String>> {
        let mut buf = self.output.borrow_mut();
        if buf.is_empty() {
            Ok(None)
        } else {
            Ok(Some(std::mem::take(&mut *buf)))
        }
    }

    fn get_cancellation_token(&self) -> Rc<dyn CancellationToken> {
        Rc::new(FlagToken(Rc::clone(&self.cancelled)))
    }

    fn known_comparers(&self) -> Vec<(ComparerKey, macroxpr::comparer::ComparerFn)> {
        self.comparers.clone()
    }
}

// ===== AST-building helpers =====
//
// The parser is out of scope (spec §1); tests build `Node` trees by hand,
// the same way the crate's own `src/eval.rs` unit tests do.

pub fn begin(stmts: Vec<Node>) -> Node {
    Node::BeginExpression {
        parameters: Vec::new(),
        body: Rc::new(Node::StatementList(stmts.into_iter().map(Rc::new).collect())),
    }
}

pub fn begin_with_params(params: Vec<ParameterDecl>, stmts: Vec<Node>) -> Node {
    Node::BeginExpression {
        parameters: params,
        body: Rc::new(Node::StatementList(stmts.into_iter().map(Rc::new).collect())),
    }
}

pub fn block(stmts: Vec<Node>) -> Rc<Node> {
    Rc::new(Node::Block(Rc::new(Node::StatementList(
        stmts.into_iter().map(Rc::new).collect(),
    ))))
}

pub fn ident(name: &str) -> Rc<Node> {
    Rc::new(Node::Identifier(name.to_string()))
}

pub fn int(n: i32) -> Rc<Node> {
    Rc::new(Node::Literal(Literal::Integer(n)))
}

pub fn dec(n: i64, scale: u32) -> Rc<Node> {
    Rc::new(Node::Literal(Literal::Real(rust_decimal::Decimal::new(n, scale))))
}

pub fn boolean(b: bool) -> Rc<Node> {
    Rc::new(Node::Literal(Literal::Boolean(b)))
}

pub fn text(s: &str) -> Rc<Node> {
    Rc::new(Node::Literal(Literal::Str {
        value: s.to_string(),
        verbatim: false,
    }))
}

pub fn assign(target: &str, value: Rc<Node>) -> Node {
    Node::Assignment {
        target: target.to_string(),
        op: AssignOp::Assign,
        value,
        span: None,
    }
}

pub fn compound_assign(target: &str, op: AssignOp, value: Rc<Node>) -> Node {
    Node::Assignment {
        target: target.to_string(),
        op,
        value,
        span: None,
    }
}

pub fn inc(target: &str, prefix: bool) -> Node {
    Node::IncDec {
        target: target.to_string(),
        op: IncDecOp::Increment,
        prefix,
        span: None,
    }
}

pub fn add(left: Rc<Node>, right: Rc<Node>) -> Rc<Node> {
    Rc::new(Node::Additive {
        op: AdditiveOp::Add,
        left,
        right,
        span: None,
    })
}

pub fn lt(left: Rc<Node>, right: Rc<Node>) -> Rc<Node> {
    Rc::new(Node::Comparison {
        op: ComparisonOp::Lt,
        left,
        right,
        span: None,
    })
}

pub fn call(receiver: &str, args: Vec<Rc<Node>>) -> Rc<Node> {
    Rc::new(Node::Primary {
        start: ident(receiver),
        chain: vec![Accessor::MethodCall { args, span: None }],
    })
}
