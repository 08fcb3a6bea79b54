//! AST to bytecode compilation.
//!
//! The compiler walks the typed AST with an explicit state triplet: a segment
//! stack (one segment per nested procedure), the environment stack, and the
//! current [`ExpressionResult`] that tells each visit whether its caller
//! expects a value. The first semantic error aborts compilation.

use std::{borrow::Cow, fmt};

use num_bigint::BigInt;

use super::{Opcode, Operand, Segment};
use crate::{
    ast::Node,
    env::{EnvError, Environments, ScopedTemp, Symbol},
    lex::{CodeRange, LexKind, LexValue, Lexeme},
    store::{Closure, Store, Value},
};

/// Errors that abort compilation.
#[derive(Debug, Clone)]
pub enum CompileError {
    UnboundVariable {
        name: String,
        position: CodeRange,
    },
    /// A declared but not yet compilable construct was reached.
    Unsupported {
        what: Cow<'static, str>,
        position: CodeRange,
    },
    InvalidCall {
        msg: Cow<'static, str>,
        position: CodeRange,
    },
    InvalidProc {
        msg: Cow<'static, str>,
        position: CodeRange,
    },
    DuplicateParameter {
        name: String,
        position: CodeRange,
    },
    LockedDefinition {
        name: String,
        position: CodeRange,
    },
    /// A compiler invariant was violated; names the offending node kind.
    Internal {
        msg: Cow<'static, str>,
        position: CodeRange,
    },
}

impl CompileError {
    fn unsupported(what: impl Into<Cow<'static, str>>, position: CodeRange) -> Self {
        Self::Unsupported {
            what: what.into(),
            position,
        }
    }

    fn invalid_call(msg: impl Into<Cow<'static, str>>, position: CodeRange) -> Self {
        Self::InvalidCall {
            msg: msg.into(),
            position,
        }
    }

    fn invalid_proc(msg: impl Into<Cow<'static, str>>, position: CodeRange) -> Self {
        Self::InvalidProc {
            msg: msg.into(),
            position,
        }
    }

    fn internal(msg: impl Into<Cow<'static, str>>, position: CodeRange) -> Self {
        Self::Internal {
            msg: msg.into(),
            position,
        }
    }

    fn from_env(err: EnvError, position: CodeRange) -> Self {
        match err {
            EnvError::Unbound(name) => Self::UnboundVariable { name, position },
            EnvError::DuplicateParameter(name) => Self::DuplicateParameter { name, position },
            EnvError::LockedScope(name) => Self::LockedDefinition { name, position },
        }
    }

    #[must_use]
    pub fn position(&self) -> CodeRange {
        match self {
            Self::UnboundVariable { position, .. }
            | Self::Unsupported { position, .. }
            | Self::InvalidCall { position, .. }
            | Self::InvalidProc { position, .. }
            | Self::DuplicateParameter { position, .. }
            | Self::LockedDefinition { position, .. }
            | Self::Internal { position, .. } => *position,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnboundVariable { name, position } => {
                write!(f, "compile error at {position}: unbound variable: {name}")
            }
            Self::Unsupported { what, position } => {
                write!(f, "compile error at {position}: not implemented: cannot compile {what}")
            }
            Self::InvalidCall { msg, position } | Self::InvalidProc { msg, position } => {
                write!(f, "compile error at {position}: {msg}")
            }
            Self::DuplicateParameter { name, position } => {
                write!(f, "compile error at {position}: duplicate parameter: {name}")
            }
            Self::LockedDefinition { name, position } => {
                write!(
                    f,
                    "compile error at {position}: cannot define '{name}' in a locked scope"
                )
            }
            Self::Internal { msg, position } => write!(f, "internal compile error at {position}: {msg}"),
        }
    }
}

impl std::error::Error for CompileError {}

/// Tells a visited node what its caller expects.
///
/// Statement mode expects side effects only. Expression mode expects the
/// visit to supply an operand, either directly ([`Self::set_value`]) or by
/// binding the placeholder temporary a caller pre-allocated.
#[derive(Debug)]
enum ExpressionResult {
    Statement,
    Expression {
        operand: Operand,
        temp: Option<ScopedTemp>,
    },
}

impl ExpressionResult {
    fn statement() -> Self {
        Self::Statement
    }

    fn expression() -> Self {
        Self::Expression {
            operand: Operand::Invalid,
            temp: None,
        }
    }

    fn is_statement(&self) -> bool {
        matches!(self, Self::Statement)
    }

    fn set_value(&mut self, value: Operand) {
        if let Self::Expression { operand, .. } = self {
            *operand = value;
        }
    }

    fn value(&self) -> Option<Operand> {
        match self {
            Self::Expression { operand, .. } if !operand.is_invalid() => Some(*operand),
            _ => None,
        }
    }

    /// Pre-allocates a temporary register the producer can bind with
    /// `new_variable`, for results whose value is only known at run time.
    fn setup_placeholder(&mut self, envs: &mut Environments) {
        if let Self::Expression { operand, temp } = self
            && operand.is_invalid()
        {
            let scoped = ScopedTemp::allocate(envs);
            *operand = scoped.operand();
            *temp = Some(scoped);
        }
    }

    /// Releases the placeholder temporary, if one was allocated.
    fn release(self, envs: &mut Environments) {
        if let Self::Expression { temp: Some(temp), .. } = self {
            temp.release(envs);
        }
    }
}

/// Compiles a parsed, error-checked AST into bytecode against a store.
pub struct Compiler<'s> {
    store: &'s mut Store,
    envs: Environments,
    /// One segment per nested procedure, innermost last.
    segments: Vec<Segment>,
    result: ExpressionResult,
    /// Most recent top-level value, returned by the entry point.
    last_value: Option<Value>,
}

impl<'s> Compiler<'s> {
    /// Compiles the top-level generic node, returning the last computed value
    /// (typically a closure) and the top-level segment.
    pub fn compile_program(root: &Node, store: &'s mut Store) -> Result<(Value, Segment), CompileError> {
        let Node::Generic(generic) = root else {
            return Err(CompileError::internal(
                format!("cannot compile {} as a program", root.kind_name()),
                root.span(),
            ));
        };
        if generic.kind != LexKind::TopLevel {
            return Err(CompileError::internal(
                format!("cannot compile generic node: {}", generic.kind),
                generic.span,
            ));
        }

        let mut compiler = Compiler {
            store,
            envs: Environments::new(),
            segments: vec![Segment::new()],
            result: ExpressionResult::statement(),
            last_value: None,
        };
        for node in &generic.nodes {
            compiler.compile_top(node)?;
        }

        let segment = compiler.segments.pop().expect("top-level segment present");
        let value = match compiler.last_value {
            Some(value) => value,
            None => compiler.store.new_atom("unit"),
        };
        Ok((value, segment))
    }

    /// Compiles one top-level definition.
    ///
    /// Value-shaped nodes run in expression mode so the entry point can
    /// report the last computed value; everything else is a statement.
    fn compile_top(&mut self, node: &Node) -> Result<(), CompileError> {
        if is_expression_shaped(node) {
            self.result = ExpressionResult::expression();
            self.compile_node(node)?;
            let result = std::mem::replace(&mut self.result, ExpressionResult::statement());
            if let Some(Operand::Immediate(value)) = result.value() {
                self.last_value = Some(value);
            }
            result.release(&mut self.envs);
        } else {
            self.result = ExpressionResult::statement();
            self.compile_node(node)?;
        }
        Ok(())
    }

    fn emit(&mut self, op: Opcode, operands: impl IntoIterator<Item = Operand>) {
        self.segments
            .last_mut()
            .expect("segment stack is never empty")
            .emit(op, operands);
    }

    fn compile_node(&mut self, node: &Node) -> Result<(), CompileError> {
        match node {
            Node::Leaf(lexeme) => self.compile_leaf(lexeme),
            Node::Var { name, span } => self.compile_var(name, *span),
            Node::NaryOp { op, operands, span } => self.compile_nary(*op, operands, *span),
            Node::Local { defs, body, .. } => self.compile_local(defs.as_deref(), body),
            Node::Proc {
                signature,
                body,
                fun,
                span,
            } => self.compile_proc(signature, body, *fun, *span),
            Node::Sequence { nodes, span } => self.compile_sequence(nodes, *span),
            Node::Call { nodes, span } => self.compile_call(nodes, *span),
            Node::Raise { exn, .. } => self.compile_raise(exn),
            Node::Generic(generic) => Err(CompileError::internal(
                format!("cannot compile generic node: {}", generic.kind),
                generic.span,
            )),
            Node::Error { message, span, .. } => Err(CompileError::internal(
                format!("error node survived the check pass: {message}"),
                *span,
            )),
            // Declared, pending implementation.
            Node::Record { .. }
            | Node::UnaryOp { .. }
            | Node::BinaryOp { .. }
            | Node::Functor { .. }
            | Node::Cond { .. }
            | Node::CondBranch { .. }
            | Node::PatternMatch { .. }
            | Node::PatternBranch { .. }
            | Node::Thread { .. }
            | Node::Lock { .. }
            | Node::Loop { .. }
            | Node::ForLoop { .. }
            | Node::Try { .. }
            | Node::Class { .. }
            | Node::List { .. } => Err(CompileError::unsupported(node.kind_name(), node.span())),
        }
    }

    /// Materializes a literal as a store value.
    fn compile_leaf(&mut self, lexeme: &Lexeme) -> Result<(), CompileError> {
        if self.result.is_statement() {
            return Err(CompileError::internal(
                format!("literal in statement position: {lexeme}"),
                lexeme.span,
            ));
        }
        let value = match &lexeme.value {
            LexValue::Int(v) => self.store.new_integer(v.clone()),
            LexValue::Atom(name) => self.store.new_atom(name),
            LexValue::Str(text) => self.store.new_string(text.clone()),
            LexValue::Real(v) => self.store.new_real(*v),
            LexValue::None | LexValue::Var(_) => {
                return Err(CompileError::unsupported(
                    format!("token '{}'", lexeme.exact),
                    lexeme.span,
                ));
            }
        };
        self.result.set_value(Operand::Immediate(value));
        Ok(())
    }

    fn compile_var(&mut self, name: &str, span: CodeRange) -> Result<(), CompileError> {
        if self.result.is_statement() {
            return Err(CompileError::internal(
                format!("invalid statement: variable {name}"),
                span,
            ));
        }
        let symbol = self.resolve_var(name, span)?;
        self.result.set_value(symbol.operand());
        Ok(())
    }

    /// Looks a name up; unresolved names at the top level become fresh
    /// globals (interactive top-level semantics), anywhere else they are
    /// unbound-variable errors.
    fn resolve_var(&mut self, name: &str, span: CodeRange) -> Result<Symbol, CompileError> {
        match self.envs.get(name) {
            Ok(symbol) => Ok(symbol),
            Err(EnvError::Unbound(_)) if self.envs.at_top_level() => Ok(self.envs.define_global(name, self.store)),
            Err(err) => Err(CompileError::from_env(err, span)),
        }
    }

    fn compile_proc(&mut self, signature: &Node, body: &Node, fun: bool, span: CodeRange) -> Result<(), CompileError> {
        if fun {
            // fun {F X} is proc {F X Result} with an implicit return slot.
            return Err(CompileError::unsupported("'fun' definitions", span));
        }
        let Node::Call { nodes: sig_nodes, .. } = signature else {
            return Err(CompileError::internal(
                "procedure signature is not a call",
                signature.span(),
            ));
        };
        let head = sig_nodes.first().expect("call nodes are non-empty");

        // proc {P …} is a statement (binds P); proc {$ …} is an expression.
        let head_symbol = match head {
            Node::Var { name, span: head_span } => {
                if !self.result.is_statement() {
                    return Err(CompileError::invalid_proc(
                        "named procedure declaration in expression position",
                        span,
                    ));
                }
                Some(self.resolve_proc_name(name, *head_span)?)
            }
            Node::Leaf(lexeme) if lexeme.exact == LexKind::VarAnon => {
                if self.result.is_statement() {
                    return Err(CompileError::invalid_proc(
                        "anonymous procedure declaration in statement position",
                        span,
                    ));
                }
                None
            }
            other => {
                return Err(CompileError::invalid_proc(
                    format!("invalid procedure signature head: {}", other.kind_name()),
                    other.span(),
                ));
            }
        };

        self.envs.push_frame();
        for param in &sig_nodes[1..] {
            let Node::Var { name, span: param_span } = param else {
                self.envs.pop_frame();
                return Err(CompileError::invalid_proc(
                    "procedure parameters must be variables",
                    param.span(),
                ));
            };
            if let Err(err) = self.envs.add_parameter(name) {
                self.envs.pop_frame();
                return Err(CompileError::from_env(err, *param_span));
            }
        }

        self.segments.push(Segment::new());
        let saved = std::mem::replace(&mut self.result, ExpressionResult::statement());
        let body_result = self.compile_node(body);
        self.result = saved;

        let nparams = self.envs.nparams();
        let nlocals = self.envs.nlocals();
        let nclosures = self.envs.nclosures();
        let segment = self.segments.pop().expect("procedure segment present");
        self.envs.pop_frame();
        body_result?;

        let closure = self.store.new_closure(Closure {
            segment,
            nparams,
            nlocals,
            nclosures,
        });
        let closure = self.store.optimize(closure);
        self.last_value = Some(closure);

        match head_symbol {
            // proc {P …}: bind the name to the closure.
            Some(symbol) => self.emit(Opcode::Unify, [symbol.operand(), Operand::Immediate(closure)]),
            None => self.result.set_value(Operand::Immediate(closure)),
        }
        Ok(())
    }

    /// Resolves the name a `proc {P …}` statement binds.
    ///
    /// An unknown name is introduced as a declaration: local while an
    /// unlocked declaration scope is open, global otherwise.
    fn resolve_proc_name(&mut self, name: &str, span: CodeRange) -> Result<Symbol, CompileError> {
        if self.envs.exists_globally(name) {
            return self.envs.get(name).map_err(|err| CompileError::from_env(err, span));
        }
        match self.envs.get(name) {
            Ok(symbol) => Ok(symbol),
            Err(EnvError::Unbound(_)) => match self.envs.define(name) {
                Ok(symbol) => Ok(symbol),
                Err(EnvError::LockedScope(_)) => Ok(self.envs.define_global(name, self.store)),
                Err(err) => Err(CompileError::from_env(err, span)),
            },
            Err(err) => Err(CompileError::from_env(err, span)),
        }
    }

    fn compile_local(&mut self, defs: Option<&Node>, body: &Node) -> Result<(), CompileError> {
        let scope = self.envs.push_locals();
        let result = self.compile_local_inner(defs, body);
        self.envs.pop_locals(scope);
        result
    }

    fn compile_local_inner(&mut self, defs: Option<&Node>, body: &Node) -> Result<(), CompileError> {
        if let Some(defs) = defs {
            self.declare_defs(defs)?;
        }
        // Declarations are frozen; the scope stays visible for lookup.
        self.envs.lock_locals();
        // The body inherits the caller's result mode.
        self.compile_node(body)
    }

    /// Processes a declaration region: plain variables allocate local
    /// registers, unifications declare their first operand then run as
    /// initializing statements, and anything else runs as a statement.
    fn declare_defs(&mut self, defs: &Node) -> Result<(), CompileError> {
        match defs {
            Node::Var { name, span } => {
                self.envs
                    .define(name)
                    .map_err(|err| CompileError::from_env(err, *span))?;
                Ok(())
            }
            Node::Sequence { nodes, .. } => {
                for node in nodes {
                    self.declare_defs(node)?;
                }
                Ok(())
            }
            Node::NaryOp {
                op: LexKind::Unify,
                operands,
                ..
            } => {
                self.declare_defs(operands.first().expect("unify operands are non-empty"))?;
                self.compile_as_statement(defs)
            }
            other => self.compile_as_statement(other),
        }
    }

    fn compile_as_statement(&mut self, node: &Node) -> Result<(), CompileError> {
        let saved = std::mem::replace(&mut self.result, ExpressionResult::statement());
        let result = self.compile_node(node);
        self.result = saved;
        result
    }

    fn compile_nary(&mut self, op: LexKind, operands: &[Node], span: CodeRange) -> Result<(), CompileError> {
        match op {
            LexKind::Unify => {}
            LexKind::TupleCons | LexKind::NumericMul | LexKind::NumericAdd => {
                return Err(CompileError::unsupported(format!("n-ary '{op}' operator"), span));
            }
            other => {
                return Err(CompileError::internal(
                    format!("invalid n-ary operator: {other}"),
                    span,
                ));
            }
        }

        // In expression mode the first operand is compiled straight into the
        // caller's result and becomes the value of the whole unification.
        let caller_is_statement = self.result.is_statement();
        let saved = if caller_is_statement {
            Some(std::mem::replace(&mut self.result, ExpressionResult::expression()))
        } else {
            None
        };

        self.compile_node(operands.first().expect("unify operands are non-empty"))?;
        let first = std::mem::replace(&mut self.result, ExpressionResult::statement());
        let Some(first_op) = first.value() else {
            return Err(CompileError::internal("unification operand produced no value", span));
        };

        // Each remaining operand unifies against the first.
        for operand_node in &operands[1..] {
            self.result = ExpressionResult::expression();
            self.compile_node(operand_node)?;
            let result = std::mem::replace(&mut self.result, ExpressionResult::statement());
            let Some(operand) = result.value() else {
                return Err(CompileError::internal("unification operand produced no value", span));
            };
            self.emit(Opcode::Unify, [first_op, operand]);
            result.release(&mut self.envs);
        }

        if caller_is_statement {
            first.release(&mut self.envs);
            self.result = saved.expect("saved statement result");
        } else {
            self.result = first;
        }
        Ok(())
    }

    fn compile_sequence(&mut self, nodes: &[Node], span: CodeRange) -> Result<(), CompileError> {
        let Some((last, rest)) = nodes.split_last() else {
            if self.result.is_statement() {
                return Ok(());
            }
            return Err(CompileError::internal("empty expression region", span));
        };

        let caller = std::mem::replace(&mut self.result, ExpressionResult::statement());
        for node in rest {
            self.result = ExpressionResult::statement();
            self.compile_node(node)?;
        }
        // The last node inherits the caller's mode.
        self.result = caller;
        self.compile_node(last)
    }

    fn compile_call(&mut self, nodes: &[Node], span: CodeRange) -> Result<(), CompileError> {
        let is_statement = self.result.is_statement();
        if !is_statement {
            self.result.setup_placeholder(&mut self.envs);
        }
        let caller = std::mem::replace(&mut self.result, ExpressionResult::statement());
        let caller_op = caller.value();

        // At most one explicit return parameter, and only in expressions.
        let mut has_anon = false;
        for arg in &nodes[1..] {
            if arg.is_leaf(LexKind::VarAnon) {
                if has_anon {
                    self.result = caller;
                    return Err(CompileError::invalid_call("invalid call with multiple '$'", span));
                }
                has_anon = true;
            }
        }
        if has_anon && is_statement {
            self.result = caller;
            return Err(CompileError::invalid_call("invalid statement call with '$'", span));
        }

        // Expressions without an explicit '$' get an implicit trailing
        // return parameter.
        let mut nparams = nodes.len() - 1;
        if !is_statement && !has_anon {
            nparams += 1;
        }

        let (params_temp, params_op) = if nparams > 0 {
            let temp = ScopedTemp::allocate(&mut self.envs);
            let operand = temp.operand();
            let size = self.store.new_integer(BigInt::from(nparams));
            let empty = self.store.new_atom("");
            self.emit(
                Opcode::NewArray,
                [operand, Operand::Immediate(size), Operand::Immediate(empty)],
            );
            (Some(temp), operand)
        } else {
            (None, Operand::Invalid)
        };

        let call_result = self.compile_call_slots(nodes, span, caller_op, params_op, has_anon, is_statement, nparams);
        if call_result.is_ok()
            && let Some(temp) = params_temp
        {
            // On error the temporary is abandoned: compilation aborts and a
            // release here would break the LIFO discipline mid-unwind.
            temp.release(&mut self.envs);
        }
        self.result = caller;
        call_result
    }

    /// Fills the parameter array and emits the call itself.
    #[expect(clippy::too_many_arguments, reason = "internal helper carrying call state")]
    fn compile_call_slots(
        &mut self,
        nodes: &[Node],
        span: CodeRange,
        caller_op: Option<Operand>,
        params_op: Operand,
        has_anon: bool,
        is_statement: bool,
        nparams: usize,
    ) -> Result<(), CompileError> {
        for (slot, arg) in nodes[1..].iter().enumerate() {
            let mut arg_result = None;
            let param_op = if arg.is_leaf(LexKind::VarAnon) {
                // Explicit output parameter: bind a fresh unbound variable
                // into the caller's result operand.
                let operand = caller_op
                    .ok_or_else(|| CompileError::internal("expression call without a result operand", span))?;
                self.emit(Opcode::NewVariable, [operand]);
                operand
            } else {
                self.result = ExpressionResult::expression();
                self.compile_node(arg)?;
                let result = std::mem::replace(&mut self.result, ExpressionResult::statement());
                let Some(operand) = result.value() else {
                    return Err(CompileError::internal("call argument produced no value", arg.span()));
                };
                arg_result = Some(result);
                operand
            };
            let index = self.store.new_integer(BigInt::from(slot));
            self.emit(Opcode::AssignArray, [params_op, Operand::Immediate(index), param_op]);
            if let Some(result) = arg_result {
                result.release(&mut self.envs);
            }
        }

        // Implicit return slot for expression calls without '$'.
        if !is_statement && !has_anon {
            let operand =
                caller_op.ok_or_else(|| CompileError::internal("expression call without a result operand", span))?;
            self.emit(Opcode::NewVariable, [operand]);
            let index = self.store.new_integer(BigInt::from(nparams - 1));
            self.emit(Opcode::AssignArray, [params_op, Operand::Immediate(index), operand]);
        }

        // The callee expression runs after the arguments.
        self.result = ExpressionResult::expression();
        self.compile_node(nodes.first().expect("call nodes are non-empty"))?;
        let callee = std::mem::replace(&mut self.result, ExpressionResult::statement());
        let Some(proc_op) = callee.value() else {
            return Err(CompileError::internal("callee produced no value", span));
        };

        // An immediate atom names a host primitive.
        let native = matches!(proc_op, Operand::Immediate(value) if self.store.is_atom(value));
        self.emit(
            if native { Opcode::CallNative } else { Opcode::Call },
            [proc_op, params_op],
        );
        callee.release(&mut self.envs);
        Ok(())
    }

    /// `raise Exn end`: the caller's result is saved and restored around the
    /// exception subexpression.
    fn compile_raise(&mut self, exn: &Node) -> Result<(), CompileError> {
        let saved = std::mem::replace(&mut self.result, ExpressionResult::expression());
        let compile_result = self.compile_node(exn);
        let result = std::mem::replace(&mut self.result, saved);
        compile_result?;
        let Some(operand) = result.value() else {
            return Err(CompileError::internal("raise produced no value", exn.span()));
        };
        self.emit(Opcode::ExnRaise, [operand]);
        result.release(&mut self.envs);
        Ok(())
    }
}

/// Whether a top-level node yields a value worth reporting as the program's
/// result.
fn is_expression_shaped(node: &Node) -> bool {
    match node {
        Node::Leaf(lexeme) => matches!(
            lexeme.kind,
            LexKind::Integer | LexKind::Atom | LexKind::String | LexKind::Real
        ),
        Node::Var { .. }
        | Node::NaryOp { .. }
        | Node::BinaryOp { .. }
        | Node::UnaryOp { .. }
        | Node::Record { .. }
        | Node::List { .. } => true,
        Node::Proc { signature, .. } => match signature.as_ref() {
            Node::Call { nodes, .. } => nodes.first().is_some_and(|head| head.is_leaf(LexKind::VarAnon)),
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::tokenize, parse::parse_lexemes};

    fn compile(code: &str) -> Result<(Value, Segment), CompileError> {
        let mut store = Store::new();
        let root = parse_lexemes(&tokenize(code).expect("lexes")).expect("parses");
        Compiler::compile_program(&root, &mut store)
    }

    #[test]
    fn multiple_anonymous_returns_are_rejected() {
        let err = compile("X = {F $ $}").expect_err("should fail");
        assert!(matches!(err, CompileError::InvalidCall { .. }), "got {err:?}");
    }

    #[test]
    fn anonymous_return_in_statement_call_is_rejected() {
        let err = compile("{F $}").expect_err("should fail");
        assert!(matches!(err, CompileError::InvalidCall { .. }), "got {err:?}");
    }

    #[test]
    fn unbound_variable_inside_proc_is_rejected() {
        let err = compile("proc {P X} X = Undefined end").expect_err("should fail");
        let CompileError::UnboundVariable { name, .. } = &err else {
            panic!("expected unbound variable, got {err:?}");
        };
        assert_eq!(name, "Undefined");
    }

    #[test]
    fn duplicate_parameters_are_rejected() {
        let err = compile("proc {P X X} X = 1 end").expect_err("should fail");
        assert!(matches!(err, CompileError::DuplicateParameter { .. }), "got {err:?}");
    }

    #[test]
    fn fun_definitions_fail_cleanly() {
        let err = compile("fun {F X} X end").expect_err("should fail");
        assert!(matches!(err, CompileError::Unsupported { .. }), "got {err:?}");
    }

    #[test]
    fn unimplemented_constructs_fail_cleanly() {
        let err = compile("if A then B = 1 end").expect_err("should fail");
        let CompileError::Unsupported { what, .. } = &err else {
            panic!("expected unsupported, got {err:?}");
        };
        assert_eq!(what.as_ref(), "conditional");
    }

    #[test]
    fn named_proc_in_expression_position_is_rejected() {
        let err = compile("X = proc {P Y} Y = 1 end").expect_err("should fail");
        assert!(matches!(err, CompileError::InvalidProc { .. }), "got {err:?}");
    }
}
