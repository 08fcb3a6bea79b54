//! Typed abstract syntax tree.
//!
//! One enum variant per node kind; exhaustive matching replaces visitor
//! dispatch. Every node carries the [`CodeRange`] of the lexemes that produced
//! it, and each node exclusively owns its children.

use crate::lex::{CodeRange, LexKind, Lexeme};

/// A not-yet-typed group of nodes: the whole file (`TopLevel`) or one
/// bracketed scope identified by its opener kind.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericNode {
    pub kind: LexKind,
    pub nodes: Vec<Node>,
    pub span: CodeRange,
}

/// An AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A literal, the anonymous variable `$`, or an unresolved token.
    Leaf(Lexeme),
    Var {
        name: String,
        span: CodeRange,
    },
    Generic(GenericNode),
    /// A structural parse error, wrapping the offending subtree.
    Error {
        inner: Box<Node>,
        message: String,
        span: CodeRange,
    },
    Record {
        label: Box<Node>,
        features: Box<Node>,
        open: bool,
        span: CodeRange,
    },
    UnaryOp {
        op: LexKind,
        operand: Box<Node>,
        span: CodeRange,
    },
    BinaryOp {
        op: LexKind,
        lop: Box<Node>,
        rop: Box<Node>,
        span: CodeRange,
    },
    NaryOp {
        op: LexKind,
        operands: Vec<Node>,
        span: CodeRange,
    },
    Functor {
        functor: Option<Box<Node>>,
        exports: Option<Box<Node>>,
        require: Option<Box<Node>>,
        prepare: Option<Box<Node>>,
        import: Option<Box<Node>>,
        define: Option<Box<Node>>,
        span: CodeRange,
    },
    Local {
        defs: Option<Box<Node>>,
        body: Box<Node>,
        span: CodeRange,
    },
    /// `proc {Name Params…} Body end`; `signature` is always a `Call`.
    Proc {
        signature: Box<Node>,
        body: Box<Node>,
        fun: bool,
        span: CodeRange,
    },
    Cond {
        branches: Vec<Node>,
        else_branch: Option<Box<Node>>,
        span: CodeRange,
    },
    CondBranch {
        condition: Box<Node>,
        body: Box<Node>,
        span: CodeRange,
    },
    PatternMatch {
        value: Box<Node>,
        branches: Vec<Node>,
        span: CodeRange,
    },
    PatternBranch {
        pattern: Box<Node>,
        condition: Option<Box<Node>>,
        body: Box<Node>,
        span: CodeRange,
    },
    Thread {
        body: Box<Node>,
        span: CodeRange,
    },
    Lock {
        lock: Box<Node>,
        body: Box<Node>,
        span: CodeRange,
    },
    Loop {
        body: Box<Node>,
        span: CodeRange,
    },
    ForLoop {
        body: Box<Node>,
        span: CodeRange,
    },
    Try {
        body: Box<Node>,
        catches: Option<Box<Node>>,
        finally: Option<Box<Node>>,
        span: CodeRange,
    },
    Raise {
        exn: Box<Node>,
        span: CodeRange,
    },
    /// Declared for completeness; structural parsing reports class blocks as
    /// unimplemented.
    Class {
        span: CodeRange,
    },
    /// `{Callee Arg…}`; `nodes[0]` is the callee.
    Call {
        nodes: Vec<Node>,
        span: CodeRange,
    },
    Sequence {
        nodes: Vec<Node>,
        span: CodeRange,
    },
    List {
        items: Vec<Node>,
        span: CodeRange,
    },
}

impl Node {
    #[must_use]
    pub fn span(&self) -> CodeRange {
        match self {
            Self::Leaf(lexeme) => lexeme.span,
            Self::Var { span, .. }
            | Self::Error { span, .. }
            | Self::Record { span, .. }
            | Self::UnaryOp { span, .. }
            | Self::BinaryOp { span, .. }
            | Self::NaryOp { span, .. }
            | Self::Functor { span, .. }
            | Self::Local { span, .. }
            | Self::Proc { span, .. }
            | Self::Cond { span, .. }
            | Self::CondBranch { span, .. }
            | Self::PatternMatch { span, .. }
            | Self::PatternBranch { span, .. }
            | Self::Thread { span, .. }
            | Self::Lock { span, .. }
            | Self::Loop { span, .. }
            | Self::ForLoop { span, .. }
            | Self::Try { span, .. }
            | Self::Raise { span, .. }
            | Self::Class { span }
            | Self::Call { span, .. }
            | Self::Sequence { span, .. }
            | Self::List { span, .. } => *span,
            Self::Generic(generic) => generic.span,
        }
    }

    /// Lexeme kind this node answers to during separator scans and operator
    /// folds: leaves report their lexeme kind, generic groups their opener,
    /// and variables [`LexKind::Variable`]. Typed nodes have no lexeme kind.
    #[must_use]
    pub fn lex_kind(&self) -> Option<LexKind> {
        match self {
            Self::Leaf(lexeme) => Some(lexeme.kind),
            Self::Generic(generic) => Some(generic.kind),
            Self::Var { .. } => Some(LexKind::Variable),
            _ => None,
        }
    }

    /// Returns true when this node is a leaf of the given exact kind.
    #[must_use]
    pub fn is_leaf(&self, kind: LexKind) -> bool {
        matches!(self, Self::Leaf(lexeme) if lexeme.exact == kind)
    }

    /// Human-readable node kind name for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Leaf(_) => "leaf",
            Self::Var { .. } => "variable",
            Self::Generic(_) => "generic",
            Self::Error { .. } => "error",
            Self::Record { .. } => "record",
            Self::UnaryOp { .. } => "unary operator",
            Self::BinaryOp { .. } => "binary operator",
            Self::NaryOp { .. } => "n-ary operator",
            Self::Functor { .. } => "functor",
            Self::Local { .. } => "local",
            Self::Proc { .. } => "procedure",
            Self::Cond { .. } => "conditional",
            Self::CondBranch { .. } => "conditional branch",
            Self::PatternMatch { .. } => "pattern match",
            Self::PatternBranch { .. } => "pattern branch",
            Self::Thread { .. } => "thread",
            Self::Lock { .. } => "lock",
            Self::Loop { .. } => "loop",
            Self::ForLoop { .. } => "for loop",
            Self::Try { .. } => "try",
            Self::Raise { .. } => "raise",
            Self::Class { .. } => "class",
            Self::Call { .. } => "call",
            Self::Sequence { .. } => "sequence",
            Self::List { .. } => "list",
        }
    }

    /// Applies `f` to each direct child, in source order.
    pub fn for_each_child<'a>(&'a self, f: &mut dyn FnMut(&'a Self)) {
        match self {
            Self::Leaf(_) | Self::Var { .. } | Self::Class { .. } => {}
            Self::Generic(generic) => {
                for node in &generic.nodes {
                    f(node);
                }
            }
            Self::Error { inner, .. } => f(inner),
            Self::Record { label, features, .. } => {
                f(label);
                f(features);
            }
            Self::UnaryOp { operand, .. } => f(operand),
            Self::BinaryOp { lop, rop, .. } => {
                f(lop);
                f(rop);
            }
            Self::NaryOp { operands, .. } => {
                for node in operands {
                    f(node);
                }
            }
            Self::Functor {
                functor,
                exports,
                require,
                prepare,
                import,
                define,
                ..
            } => {
                for section in [functor, exports, require, prepare, import, define].into_iter().flatten() {
                    f(section);
                }
            }
            Self::Local { defs, body, .. } => {
                if let Some(defs) = defs {
                    f(defs);
                }
                f(body);
            }
            Self::Proc { signature, body, .. } => {
                f(signature);
                f(body);
            }
            Self::Cond {
                branches, else_branch, ..
            } => {
                for branch in branches {
                    f(branch);
                }
                if let Some(else_branch) = else_branch {
                    f(else_branch);
                }
            }
            Self::CondBranch { condition, body, .. } => {
                f(condition);
                f(body);
            }
            Self::PatternMatch { value, branches, .. } => {
                f(value);
                for branch in branches {
                    f(branch);
                }
            }
            Self::PatternBranch {
                pattern,
                condition,
                body,
                ..
            } => {
                f(pattern);
                if let Some(condition) = condition {
                    f(condition);
                }
                f(body);
            }
            Self::Thread { body, .. } | Self::Loop { body, .. } | Self::ForLoop { body, .. } => f(body),
            Self::Lock { lock, body, .. } => {
                f(lock);
                f(body);
            }
            Self::Try {
                body, catches, finally, ..
            } => {
                f(body);
                if let Some(catches) = catches {
                    f(catches);
                }
                if let Some(finally) = finally {
                    f(finally);
                }
            }
            Self::Raise { exn, .. } => f(exn),
            Self::Call { nodes, .. } | Self::Sequence { nodes, .. } => {
                for node in nodes {
                    f(node);
                }
            }
            Self::List { items, .. } => {
                for item in items {
                    f(item);
                }
            }
        }
    }
}
