// ABOUTME: The recursive tree-walking visitor — operational semantics for every syntax node.

use crate::arithmetic;
use crate::ast::{Accessor, AssignOp, IncDecOp, JumpKind, Literal, Node, ParameterDecl};
use crate::comparer::ComparerRegistry;
use crate::config::EvaluatorConfig;
use crate::control::Signal;
use crate::error::EvalError;
use crate::host::{CancellationToken, Evaluator};
use crate::scope::Scope;
use crate::value::{to_integer, to_text, Collection, Value};
use std::rc::Rc;

/// One active tree-walking visitor (§2 "Evaluator walker", §3 "Scope"). A
/// lambda invocation spins up a fresh `Walker` sharing the registry,
/// cancellation token, and config with its caller (§5 "Shared resources").
pub struct Walker<'h> {
    scope: Scope<'h>,
    registry: Rc<ComparerRegistry>,
    cancellation: Rc<dyn CancellationToken>,
    config: EvaluatorConfig,
    depth: usize,
    warned_no_short_circuit: bool,
    pub(crate) warned_lambda_writeback: bool,
}

impl<'h> Walker<'h> {
    fn new(
        scope: Scope<'h>,
        registry: Rc<ComparerRegistry>,
        cancellation: Rc<dyn CancellationToken>,
        config: EvaluatorConfig,
        depth: usize,
    ) -> Self {
        Self {
            scope,
            registry,
            cancellation,
            config,
            depth,
            warned_no_short_circuit: false,
            warned_lambda_writeback: false,
        }
    }

    pub(crate) fn scope(&self) -> &Scope<'h> {
        &self.scope
    }

    pub(crate) fn scope_mut(&mut self) -> &mut Scope<'h> {
        &mut self.scope
    }

    pub(crate) fn registry(&self) -> &Rc<ComparerRegistry> {
        &self.registry
    }

    pub(crate) fn cancellation(&self) -> &Rc<dyn CancellationToken> {
        &self.cancellation
    }

    pub(crate) fn config(&self) -> EvaluatorConfig {
        self.config
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    /// Spins up a fresh child walker for a lambda invocation (§4.5 step 2),
    /// sharing the registry, cancellation token, and config with `self`.
    pub(crate) fn child_for_lambda(&self, scope: Scope<'h>) -> Walker<'h> {
        Walker::new(
            scope,
            Rc::clone(&self.registry),
            Rc::clone(&self.cancellation),
            self.config,
            self.depth + 1,
        )
    }

    fn check_cancelled(&self) -> Result<(), EvalError> {
        if self.cancellation.is_cancelled() {
            Err(EvalError::CancelledError)
        } else {
            Ok(())
        }
    }

    /// Evaluates `node` and returns a plain value, collapsing any stray
    /// jump signal into its carried value — used at every call site that
    /// just needs an operand, an argument, or a condition (§5 "Ordering":
    /// left-to-right, arguments evaluated in source order before dispatch).
    pub(crate) fn eval_value(&mut self, node: &Node) -> Result<Value, EvalError> {
        Ok(self.eval(node)?.into_value())
    }

    pub(crate) fn eval_args(&mut self, nodes: &[Rc<Node>]) -> Result<Vec<Value>, EvalError> {
        nodes.iter().map(|n| self.eval_value(n)).collect()
    }

    fn eval_literal(&self, lit: &Literal) -> Value {
        match lit {
            Literal::Integer(n) => Value::Integer(*n),
            Literal::Real(d) => Value::Decimal(*d),
            Literal::Percent(d) => Value::Decimal(*d / rust_decimal::Decimal::ONE_HUNDRED),
            Literal::Character(c) => Value::Character(*c),
            Literal::Date(dt) => Value::DateTime(*dt),
            Literal::Guid(g) => Value::Guid(*g),
            Literal::Boolean(b) => Value::Boolean(*b),
            Literal::Str { value, .. } => Value::Text(value.clone()),
        }
    }

    /// §4.7 last paragraph: a bare identifier-looking token is resolved
    /// through the scope chain, *unless* it carries an embedded quote
    /// character, in which case it is actually string data in disguise and
    /// has its surrounding quotes stripped instead. Preserved exactly as
    /// described, odd as it is.
    fn resolve_identifier_like(&self, raw: &str) -> Result<Value, EvalError> {
        if raw.contains('"') {
            Ok(Value::Text(raw.trim_matches('"').to_string()))
        } else {
            self.scope.get(raw)
        }
    }

    /// The main recursive visit. Returns a [`Signal`]: a plain value for
    /// expression nodes, or a jump that the nearest statement list, loop, or
    /// lambda boundary must observe (§4.6, §9 "Loop-control flags").
    pub(crate) fn eval(&mut self, node: &Node) -> Result<Signal, EvalError> {
        match node {
            Node::BeginExpression { .. } => {
                unreachable!("BeginExpression is only ever the walker's own entry node")
            }
            Node::StatementList(stmts) => self.eval_statement_list(stmts),
            Node::Block(inner) => self.eval(inner),
            Node::Literal(lit) => Ok(Signal::Value(self.eval_literal(lit))),
            Node::Identifier(raw) => Ok(Signal::Value(self.resolve_identifier_like(raw)?)),
            Node::Assignment { target, op, value, span } => {
                self.eval_assignment(target, *op, value, *span)
            }
            Node::IncDec { target, op, prefix, span } => self.eval_inc_dec(target, *op, *prefix, *span),
            Node::Ternary {
                condition,
                then_branch,
                else_branch,
                span,
            } => self.eval_ternary(condition, then_branch.as_deref(), else_branch.as_deref(), *span),
            Node::NullCoalescing { left, right } => self.eval_null_coalescing(left, right),
            Node::Or(l, r) => self.eval_logical(l, r, arithmetic::logical_or),
            Node::Xor(l, r) => self.eval_logical(l, r, arithmetic::logical_xor),
            Node::And(l, r) => self.eval_logical(l, r, arithmetic::logical_and),
            Node::Equality { op, left, right } => {
                let l = self.eval_value(left)?;
                let r = self.eval_value(right)?;
                Ok(Signal::Value(arithmetic::equality(&self.registry, *op, &l, &r)?))
            }
            Node::Comparison { op, left, right, span } => {
                let l = self.eval_value(left)?;
                let r = self.eval_value(right)?;
                Ok(Signal::Value(arithmetic::comparison(&self.registry, *op, &l, &r, *span)?))
            }
            Node::Shift { op, left, right, span } => {
                let l = self.eval_value(left)?;
                let r = self.eval_value(right)?;
                Ok(Signal::Value(arithmetic::shift(*op, &l, &r, *span)?))
            }
            Node::Additive { op, left, right, span } => {
                let l = self.eval_value(left)?;
                let r = self.eval_value(right)?;
                Ok(Signal::Value(arithmetic::additive(*op, &l, &r, *span)?))
            }
            Node::Multiplicative { op, left, right, span } => {
                let l = self.eval_value(left)?;
                let r = self.eval_value(right)?;
                Ok(Signal::Value(arithmetic::multiplicative(*op, &l, &r, *span)?))
            }
            Node::Unary { op, operand } => {
                let v = self.eval_value(operand)?;
                Ok(Signal::Value(arithmetic::unary(*op, &v)?))
            }
            Node::Primary { start, chain } => Ok(Signal::Value(self.eval_primary(start, chain)?)),
            Node::Lambda { signature, body } => Ok(Signal::Value(Value::Lambda(Rc::new(
                crate::value::LambdaValue {
                    signature: signature.clone(),
                    body: Rc::clone(body),
                    closure: self.scope.snapshot(),
                },
            )))),
            Node::If {
                condition,
                then_branch,
                else_branch,
                span,
            } => self.eval_if(condition, then_branch, else_branch.as_deref(), *span),
            Node::For {
                init,
                condition,
                iterator,
                body,
            } => self.eval_for(init.as_deref(), condition.as_deref(), iterator.as_deref(), body),
            Node::While { condition, body } => self.eval_while(condition, body),
            Node::Foreach {
                binding,
                iterable,
                body,
            } => self.eval_foreach(binding, iterable, body),
            Node::Jump { kind, value } => self.eval_jump(*kind, value.as_deref()),
        }
    }

    /// §4.3: accumulates non-null statement results, applying the
    /// output-buffer interleaving rule after each one. A jump mid-list
    /// halts immediately and propagates, discarding whatever had already
    /// accumulated — the list itself never completes when interrupted.
    fn eval_statement_list(&mut self, stmts: &[Rc<Node>]) -> Result<Signal, EvalError> {
        let mut results: Vec<Value> = Vec::new();
        for stmt in stmts {
            let signal = self.eval(stmt)?;
            if signal.halts_statement_list() {
                return Ok(signal);
            }
            let value = signal.into_value();
            if value.is_null() {
                continue;
            }
            let flushed = self
                .scope
                .host()
                .flush_output()
                .map_err(|e| EvalError::from_host_error(e, None))?;
            match flushed {
                Some(text) if !text.is_empty() => {
                    if matches!(value, Value::Collection(_)) {
                        results.push(value);
                        results.push(Value::Text(text));
                    } else {
                        results.push(Value::Text(format!("{text}{}", to_text(&value))));
                    }
                }
                _ => results.push(value),
            }
        }
        Ok(Signal::Value(pack_results(results)))
    }

    fn eval_assignment(
        &mut self,
        target: &str,
        op: AssignOp,
        value: &Node,
        span: Option<crate::ast::SourceSpan>,
    ) -> Result<Signal, EvalError> {
        let rhs = self.eval_value(value)?;
        if op == AssignOp::Assign {
            self.scope.set(target.to_string(), rhs);
            return Ok(Signal::Value(Value::Null));
        }
        let current = self
            .scope
            .get_local(target)
            .cloned()
            .filter(|v| !v.is_null())
            .ok_or_else(|| EvalError::unbound(target.to_string(), span))?;
        let updated = match op {
            AssignOp::AddAssign => arithmetic::add(&current, &rhs, span)?,
            AssignOp::SubAssign => arithmetic::sub(&current, &rhs, span)?,
            AssignOp::MulAssign => arithmetic::mul(&current, &rhs, span)?,
            AssignOp::DivAssign => arithmetic::div(&current, &rhs, span)?,
            AssignOp::ModAssign => arithmetic::rem(&current, &rhs, span)?,
            AssignOp::AndAssign => arithmetic::logical_and(&current, &rhs)?,
            AssignOp::OrAssign => arithmetic::logical_or(&current, &rhs)?,
            AssignOp::XorAssign => arithmetic::logical_xor(&current, &rhs)?,
            AssignOp::ShlAssign => arithmetic::shift(crate::ast::ShiftOp::Shl, &current, &rhs, span)?,
            AssignOp::ShrAssign => arithmetic::shift(crate::ast::ShiftOp::Shr, &current, &rhs, span)?,
            AssignOp::Assign => unreachable!(),
        };
        self.scope.set(target.to_string(), updated);
        Ok(Signal::Value(Value::Null))
    }

    /// §4.8: increment/decrement coerce the current value to `Integer`,
    /// apply, and store; prefix contributes the new value, postfix the old.
    fn eval_inc_dec(
        &mut self,
        target: &str,
        op: IncDecOp,
        prefix: bool,
        span: Option<crate::ast::SourceSpan>,
    ) -> Result<Signal, EvalError> {
        let current = self
            .scope
            .get_local(target)
            .cloned()
            .filter(|v| !v.is_null())
            .ok_or_else(|| EvalError::unbound(target.to_string(), span))?;
        let old = to_integer(&current)?;
        let new = match op {
            IncDecOp::Increment => old.wrapping_add(1),
            IncDecOp::Decrement => old.wrapping_sub(1),
        };
        self.scope.set(target.to_string(), Value::Integer(new));
        Ok(Signal::Value(Value::Integer(if prefix { new } else { old })))
    }

    fn eval_ternary(
        &mut self,
        condition: &Node,
        then_branch: Option<&Node>,
        else_branch: Option<&Node>,
        span: Option<crate::ast::SourceSpan>,
    ) -> Result<Signal, EvalError> {
        let cond = self.eval_value(condition)?;
        if then_branch.is_none() && else_branch.is_none() {
            // §4.4, §9: a childless ternary passes the condition through untouched.
            return Ok(Signal::Value(cond));
        }
        let truthy = require_boolean(&cond, span)?;
        match (truthy, then_branch, else_branch) {
            (true, Some(then_node), _) => self.eval(then_node),
            (false, _, Some(else_node)) => self.eval(else_node),
            _ => Ok(Signal::Value(Value::Null)),
        }
    }

    fn eval_null_coalescing(&mut self, left: &Node, right: &Node) -> Result<Signal, EvalError> {
        let l = self.eval_value(left)?;
        if l.is_null() {
            self.eval(right)
        } else {
            Ok(Signal::Value(l))
        }
    }

    fn eval_logical(
        &mut self,
        left: &Node,
        right: &Node,
        op: fn(&Value, &Value) -> Result<Value, EvalError>,
    ) -> Result<Signal, EvalError> {
        if !self.warned_no_short_circuit {
            tracing::warn!("logical operator evaluating both operands without short-circuiting");
            self.warned_no_short_circuit = true;
        }
        let l = self.eval_value(left)?;
        let r = self.eval_value(right)?;
        Ok(Signal::Value(op(&l, &r)?))
    }

    fn eval_if(
        &mut self,
        condition: &Node,
        then_branch: &Node,
        else_branch: Option<&Node>,
        span: Option<crate::ast::SourceSpan>,
    ) -> Result<Signal, EvalError> {
        let cond = self.eval_value(condition)?;
        if require_boolean(&cond, span)? {
            self.eval(then_branch)
        } else if let Some(else_node) = else_branch {
            self.eval(else_node)
        } else {
            Ok(Signal::Value(Value::Null))
        }
    }

    fn eval_for(
        &mut self,
        init: Option<&Node>,
        condition: Option<&Node>,
        iterator: Option<&Node>,
        body: &Node,
    ) -> Result<Signal, EvalError> {
        if let Some(init) = init {
            self.eval(init)?;
        }
        let mut collected = Vec::new();
        loop {
            self.check_cancelled()?;
            if let Some(cond) = condition {
                let v = self.eval_value(cond)?;
                if !require_boolean(&v, None)? {
                    break;
                }
            }
            match self.run_loop_body(body)? {
                LoopOutcome::Continue(mut values) => collected.append(&mut values),
                LoopOutcome::Break => break,
                LoopOutcome::Return(v) => return Ok(Signal::Return(v)),
            }
            if let Some(iterator) = iterator {
                self.eval(iterator)?;
            }
        }
        Ok(Signal::Value(pack_results(collected)))
    }

    fn eval_while(&mut self, condition: &Node, body: &Node) -> Result<Signal, EvalError> {
        let mut collected = Vec::new();
        loop {
            self.check_cancelled()?;
            let v = self.eval_value(condition)?;
            if !require_boolean(&v, None)? {
                break;
            }
            match self.run_loop_body(body)? {
                LoopOutcome::Continue(mut values) => collected.append(&mut values),
                LoopOutcome::Break => break,
                LoopOutcome::Return(v) => return Ok(Signal::Return(v)),
            }
        }
        Ok(Signal::Value(pack_results(collected)))
    }

    /// §4.4, SPEC_FULL.md §E: iterates `Text` char-by-char (each code point
    /// becomes a one-character `Text`, not a `Character`) or a `Collection`
    /// element-by-element; binds `binding` in the local scope for the
    /// duration and removes it afterwards.
    fn eval_foreach(&mut self, binding: &str, iterable: &Node, body: &Node) -> Result<Signal, EvalError> {
        let source = self.eval_value(iterable)?;
        let items: Vec<Value> = match source {
            Value::Text(s) => s.chars().map(|c| Value::Text(c.to_string())).collect(),
            Value::Collection(c) => c.into_items(),
            other => {
                return Err(EvalError::type_error(
                    format!("foreach requires Text or Collection, got {:?}", other.type_tag()),
                    None,
                ))
            }
        };
        let mut collected = Vec::new();
        let mut outcome_return = None;
        for item in items {
            if let Err(e) = self.check_cancelled() {
                self.scope.remove_local(binding);
                return Err(e);
            }
            self.scope.set(binding.to_string(), item);
            match self.run_loop_body(body) {
                Ok(LoopOutcome::Continue(mut values)) => collected.append(&mut values),
                Ok(LoopOutcome::Break) => break,
                Ok(LoopOutcome::Return(v)) => {
                    outcome_return = Some(v);
                    break;
                }
                Err(e) => {
                    self.scope.remove_local(binding);
                    return Err(e);
                }
            }
        }
        self.scope.remove_local(binding);
        match outcome_return {
            Some(v) => Ok(Signal::Return(v)),
            None => Ok(Signal::Value(pack_results(collected))),
        }
    }

    fn run_loop_body(&mut self, body: &Node) -> Result<LoopOutcome, EvalError> {
        match self.eval(body)? {
            Signal::Return(v) => Ok(LoopOutcome::Return(v)),
            Signal::Break => Ok(LoopOutcome::Break),
            Signal::Continue => Ok(LoopOutcome::Continue(Vec::new())),
            Signal::Value(v) => {
                let mut out = Vec::new();
                flatten_into(&mut out, v);
                Ok(LoopOutcome::Continue(out))
            }
        }
    }

    fn eval_jump(&mut self, kind: JumpKind, value: Option<&Node>) -> Result<Signal, EvalError> {
        match kind {
            JumpKind::Break => Ok(Signal::Break),
            JumpKind::Continue => Ok(Signal::Continue),
            JumpKind::Return => {
                let v = match value {
                    Some(n) => self.eval_value(n)?,
                    None => Value::Null,
                };
                Ok(Signal::Return(v))
            }
        }
    }

    /// §4.7: primary-expression-start plus its accessor chain.
    fn eval_primary(&mut self, start: &Node, chain: &[Accessor]) -> Result<Value, EvalError> {
        if let [Accessor::MethodCall { args, span }] = chain {
            if let Node::Identifier(name) = start {
                return self.invoke_callable(name, args, *span);
            }
        }
        let mut current = self.eval_primary_start(start)?;
        for accessor in chain {
            current = match accessor {
                Accessor::Index(args) => self.eval_index_chain(current, args)?,
                Accessor::Member { name, args, .. } => self.eval_member(current, name, args.as_deref())?,
                Accessor::MethodCall { span, .. } => {
                    return Err(EvalError::type_error(
                        "method-call accessor requires an identifier receiver",
                        *span,
                    ))
                }
            };
        }
        Ok(current)
    }

    fn eval_primary_start(&mut self, start: &Node) -> Result<Value, EvalError> {
        match start {
            Node::Identifier(raw) => self.resolve_identifier_like(raw),
            other => self.eval_value(other),
        }
    }

    /// A call expression `name(args...)` over an identifier start (§4.7
    /// bullet 3): a local `Lambda` binding for `name` is invoked directly;
    /// otherwise the call is dispatched to the host as a free function.
    fn invoke_callable(
        &mut self,
        name: &str,
        args: &[Rc<Node>],
        span: Option<crate::ast::SourceSpan>,
    ) -> Result<Value, EvalError> {
        if let Some(Value::Lambda(lambda)) = self.scope.get_local(name).cloned() {
            let values = self.eval_args(args)?;
            return self.invoke_lambda(&lambda, &values, span);
        }
        let values = self.eval_args(args)?;
        self.scope
            .host()
            .invoke_method(name, &values)
            .map_err(|e| EvalError::from_host_error(e, span))
    }

    fn eval_index_chain(&mut self, receiver: Value, args: &[Rc<Node>]) -> Result<Value, EvalError> {
        let mut iter = args.iter();
        let first = iter.next().ok_or_else(|| {
            EvalError::type_error("indexer accessor requires at least one argument", None)
        })?;
        let key = self.eval_value(first)?;
        let mut result = self
            .scope
            .host()
            .invoke_indexer(&receiver, &key)
            .map_err(|e| EvalError::from_host_error(e, None))?;
        for rest in iter {
            let member_name = self.node_member_name(rest)?;
            result = self
                .scope
                .host()
                .invoke_member(&result, &member_name, None)
                .map_err(|e| EvalError::from_host_error(e, None))?;
        }
        Ok(result)
    }

    fn eval_member(&mut self, receiver: Value, name: &str, args: Option<&[Rc<Node>]>) -> Result<Value, EvalError> {
        match args {
            Some(arg_nodes) => {
                let values = self.eval_args(arg_nodes)?;
                self.scope
                    .host()
                    .invoke_member(&receiver, name, Some(&values))
                    .map_err(|e| EvalError::from_host_error(e, None))
            }
            None => self
                .scope
                .host()
                .invoke_member(&receiver, name, None)
                .map_err(|e| EvalError::from_host_error(e, None)),
        }
    }

    /// A chained indexer's second-and-later entries are member-name lookups
    /// (§4.7 bullet 1); a bare identifier node names the member directly,
    /// anything else is evaluated and stringified.
    fn node_member_name(&mut self, node: &Node) -> Result<String, EvalError> {
        match node {
            Node::Identifier(name) => Ok(name.clone()),
            other => Ok(to_text(&self.eval_value(other)?)),
        }
    }
}

fn require_boolean(value: &Value, span: Option<crate::ast::SourceSpan>) -> Result<bool, EvalError> {
    match value {
        Value::Boolean(b) => Ok(*b),
        other => Err(EvalError::type_error(
            format!("condition must be Boolean, got {:?}", other.type_tag()),
            span,
        )),
    }
}

enum LoopOutcome {
    Continue(Vec<Value>),
    Break,
    Return(Value),
}

/// `for`/`while`/`foreach` (§4.4): "block results that are collections
/// contribute each element"; scalars contribute themselves; `Null`
/// contributes nothing.
fn flatten_into(out: &mut Vec<Value>, value: Value) {
    match value {
        Value::Null => {}
        Value::Collection(c) => out.extend(c.into_items()),
        other => out.push(other),
    }
}

/// The convention shared by statement lists and loops: an empty result set
/// is `Null`, exactly one value stays unwrapped, and two-or-more pack into a
/// `Collection` (§4.3's "accumulated list", resolved this way — see
/// DESIGN.md).
fn pack_results(values: Vec<Value>) -> Value {
    match values.len() {
        0 => Value::Null,
        1 => values.into_iter().next().unwrap_or(Value::Null),
        _ => Value::Collection(Collection::from_items(values)),
    }
}

/// Evaluates a whole begin-expression (§4.3 last paragraph): registers
/// parameters, fetches the cancellation token, evaluates the body, flushes
/// output once more, and normalises the result into the external list
/// representation (§2 "top-level statement values plus flushed host output
/// gathered into the final result list").
pub fn evaluate(tree: &Node, host: &dyn Evaluator, config: EvaluatorConfig) -> Result<Vec<Value>, EvalError> {
    let (parameters, body) = match tree {
        Node::BeginExpression { parameters, body } => (parameters, body),
        other => {
            return Err(EvalError::type_error(
                format!("evaluate() expects a BeginExpression root, got {other:?}"),
                None,
            ))
        }
    };
    let span = tracing::debug_span!("evaluate");
    let _guard = span.enter();

    let mut registry = ComparerRegistry::new();
    registry.extend(host.known_comparers());
    let cancellation = host.get_cancellation_token();
    if cancellation.is_cancelled() {
        return Err(EvalError::CancelledError);
    }

    let mut walker = Walker::new(Scope::new(host), Rc::new(registry), cancellation, config, 0);
    register_parameters(&mut walker, parameters)?;

    let result = walker.eval(body)?.into_value();
    let mut out = match result {
        Value::Null => Vec::new(),
        Value::Collection(c) => c.into_items(),
        other => vec![other],
    };

    let flushed = host.flush_output().map_err(|e| EvalError::from_host_error(e, None))?;
    if let Some(text) = flushed {
        if !text.is_empty() {
            out.push(Value::Text(text));
        }
    }
    Ok(out)
}

fn register_parameters(walker: &mut Walker<'_>, parameters: &[ParameterDecl]) -> Result<(), EvalError> {
    for param in parameters {
        let value = match &param.value {
            Some(expr) => walker.eval_value(expr)?,
            None => Value::Null,
        };
        walker
            .scope()
            .host()
            .save_parameter(&param.name, &value)
            .map_err(|e| EvalError::from_host_error(e, None))?;
        walker.scope_mut().set(param.name.clone(), value);
    }
    Ok(())
}
