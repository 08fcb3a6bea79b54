//! Scope and structural parsing.
//!
//! The scope parser folds the flat lexeme stream into a tree of
//! [`GenericNode`]s using a fixed begin/end bracket table. The structural
//! parser then rewrites each generic group into a typed [`Node`] variant by
//! splitting its children on section-separator lexemes (`in`, `then`, `of`,
//! `catch`, `export`, …). Structural problems become [`Node::Error`] nodes in
//! the tree rather than hard failures; only bracket mismatches abort parsing.

use std::{borrow::Cow, fmt, sync::LazyLock};

use ahash::{AHashMap, AHashSet};
use indexmap::IndexMap;

use crate::{
    ast::{GenericNode, Node},
    expr,
    lex::{CodeRange, LexKind, LexValue, Lexeme},
};

/// Maximum bracket nesting depth.
///
/// Prevents stack overflow on adversarial input like `((((…))))`.
const MAX_NESTING_DEPTH: u16 = 200;

/// Errors that abort scope parsing.
#[derive(Debug, Clone)]
pub enum ParseError {
    /// Malformed input outside the bracket structure.
    Syntax { msg: Cow<'static, str>, position: CodeRange },
    /// A closer was found that does not match the innermost open scope.
    UnexpectedEnd { msg: Cow<'static, str>, position: CodeRange },
    /// Input ended while a scope was still open.
    Unclosed { msg: Cow<'static, str>, position: CodeRange },
}

impl ParseError {
    pub(crate) fn syntax(msg: impl Into<Cow<'static, str>>, position: CodeRange) -> Self {
        Self::Syntax {
            msg: msg.into(),
            position,
        }
    }

    fn unexpected_end(msg: impl Into<Cow<'static, str>>, position: CodeRange) -> Self {
        Self::UnexpectedEnd {
            msg: msg.into(),
            position,
        }
    }

    fn unclosed(msg: impl Into<Cow<'static, str>>, position: CodeRange) -> Self {
        Self::Unclosed {
            msg: msg.into(),
            position,
        }
    }

    #[must_use]
    pub fn position(&self) -> CodeRange {
        match self {
            Self::Syntax { position, .. } | Self::UnexpectedEnd { position, .. } | Self::Unclosed { position, .. } => {
                *position
            }
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { msg, position }
            | Self::UnexpectedEnd { msg, position }
            | Self::Unclosed { msg, position } => write!(f, "parse error at {position}: {msg}"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Pairs each scope opener with its required closer, keyed by exact kind.
const SCOPE_RULES: &[(LexKind, LexKind)] = &[
    (LexKind::Case, LexKind::End),
    (LexKind::Class, LexKind::End),
    (LexKind::For, LexKind::End),
    (LexKind::Fun, LexKind::End),
    (LexKind::Functor, LexKind::End),
    (LexKind::If, LexKind::End),
    (LexKind::Local, LexKind::End),
    (LexKind::Lock, LexKind::End),
    (LexKind::Meth, LexKind::End),
    (LexKind::Proc, LexKind::End),
    (LexKind::Raise, LexKind::End),
    (LexKind::Thread, LexKind::End),
    (LexKind::Try, LexKind::End),
    (LexKind::CallBegin, LexKind::CallEnd),
    (LexKind::ListBegin, LexKind::ListEnd),
    (LexKind::BeginLparen, LexKind::EndRparen),
    (LexKind::BeginRecordFeatures, LexKind::EndRparen),
];

struct ScopeSchema {
    rules: AHashMap<LexKind, LexKind>,
    end_tokens: AHashSet<LexKind>,
}

static SCOPE_SCHEMA: LazyLock<ScopeSchema> = LazyLock::new(|| {
    let mut rules = AHashMap::with_capacity(SCOPE_RULES.len());
    let mut end_tokens = AHashSet::new();
    for &(begin, end) in SCOPE_RULES {
        rules.insert(begin, end);
        end_tokens.insert(end);
    }
    ScopeSchema { rules, end_tokens }
});

const LOCAL_SECTIONS: &[LexKind] = &[LexKind::In];
const TRY_SECTIONS: &[LexKind] = &[LexKind::Catch, LexKind::Finally];
const COND_SECTIONS: &[LexKind] = &[LexKind::Elseif, LexKind::Elsecase, LexKind::Else];
const COND_IF_SECTIONS: &[LexKind] = &[LexKind::Then];
const COND_CASE_SECTIONS: &[LexKind] = &[LexKind::Of, LexKind::Elseof];
const FUNCTOR_SECTIONS: &[LexKind] = &[
    LexKind::Export,
    LexKind::Require,
    LexKind::Prepare,
    LexKind::Import,
    LexKind::Define,
];

/// Parses a lexeme stream into the typed AST rooted at a top-level generic.
pub fn parse_lexemes(lexemes: &[Lexeme]) -> Result<Node, ParseError> {
    let span = match (lexemes.first(), lexemes.last()) {
        (Some(first), Some(last)) => first.span.cover(last.span),
        _ => CodeRange::default(),
    };
    let mut root = GenericNode {
        kind: LexKind::TopLevel,
        nodes: Vec::new(),
        span,
    };
    let mut stream = lexemes;
    parse_scope_into(&mut stream, &mut root, MAX_NESTING_DEPTH)?;
    if let Some(token) = stream.first() {
        return Err(ParseError::unexpected_end(
            format!("Unexpected end token: {token}"),
            token.span,
        ));
    }
    Ok(parse_generic(root))
}

/// Recursive descent over brackets.
///
/// Consumes lexemes into `root` until the stream ends or a closer belonging
/// to an enclosing scope is reached (which is left for the caller to check).
fn parse_scope_into(stream: &mut &[Lexeme], root: &mut GenericNode, depth: u16) -> Result<(), ParseError> {
    while let Some(token) = stream.first() {
        if SCOPE_SCHEMA.end_tokens.contains(&token.exact) {
            return Ok(());
        }

        if let Some(&closer) = SCOPE_SCHEMA.rules.get(&token.exact) {
            let Some(depth) = depth.checked_sub(1) else {
                return Err(ParseError::syntax("scopes nested too deeply", token.span));
            };
            let opener = token.clone();
            *stream = &stream[1..];
            let mut branch = GenericNode {
                kind: opener.kind,
                nodes: Vec::new(),
                span: opener.span,
            };
            parse_scope_into(stream, &mut branch, depth)?;

            let Some(end_token) = stream.first() else {
                return Err(ParseError::unclosed(
                    format!("Reached end of input and could not find end token for {opener}"),
                    opener.span,
                ));
            };
            if end_token.exact != closer {
                return Err(ParseError::unexpected_end(
                    format!("End token {end_token} does not match expectations to end {opener}"),
                    end_token.span,
                ));
            }
            branch.span = opener.span.cover(end_token.span);
            *stream = &stream[1..];
            root.nodes.push(parse_generic(branch));
        } else {
            // Not a scope boundary: wrap the lexeme as a Var or Leaf.
            let node = if let LexValue::Var(name) = &token.value {
                Node::Var {
                    name: name.clone(),
                    span: token.span,
                }
            } else {
                Node::Leaf(token.clone())
            };
            root.nodes.push(node);
            *stream = &stream[1..];
        }
    }
    Ok(())
}

/// Indices of `nodes` whose lexeme kind is one of `separators`.
fn split_nodes(nodes: &[Node], separators: &[LexKind]) -> Vec<usize> {
    nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| node.lex_kind().is_some_and(|kind| separators.contains(&kind)))
        .map(|(i, _)| i)
        .collect()
}

fn error_node(inner: Node, message: impl Into<String>) -> Node {
    let span = inner.span();
    Node::Error {
        inner: Box::new(inner),
        message: message.into(),
        span,
    }
}

/// Runs the expression parser over a carved-out section and collapses it:
/// one node stands alone, several become a [`Node::Sequence`].
fn section(mut nodes: Vec<Node>, fallback: CodeRange) -> Node {
    expr::parse_expressions(&mut nodes);
    match nodes.len() {
        0 => Node::Sequence {
            nodes: Vec::new(),
            span: fallback,
        },
        1 => nodes.pop().expect("section has one node"),
        _ => {
            let span = nodes
                .first()
                .expect("section is non-empty")
                .span()
                .cover(nodes.last().expect("section is non-empty").span());
            Node::Sequence { nodes, span }
        }
    }
}

/// Rewrites one generic scope into its typed AST variant.
pub(crate) fn parse_generic(generic: GenericNode) -> Node {
    match generic.kind {
        LexKind::Begin => parse_local(generic),
        LexKind::Thread => {
            let span = generic.span;
            Node::Thread {
                body: Box::new(parse_local(generic)),
                span,
            }
        }
        LexKind::Raise => {
            let span = generic.span;
            Node::Raise {
                exn: Box::new(parse_local(generic)),
                span,
            }
        }
        LexKind::Try => parse_try(generic),
        LexKind::If | LexKind::Case => parse_cond(generic),
        LexKind::Functor => parse_functor(generic),
        LexKind::Proc | LexKind::Fun => parse_proc(generic),
        LexKind::CallBegin => {
            let span = generic.span;
            let kind = generic.kind;
            let mut nodes = generic.nodes;
            expr::parse_expressions(&mut nodes);
            if nodes.is_empty() {
                error_node(Node::Generic(GenericNode { kind, nodes, span }), "Invalid empty call")
            } else {
                Node::Call { nodes, span }
            }
        }
        LexKind::ListBegin => {
            let span = generic.span;
            let mut items = generic.nodes;
            expr::parse_expressions(&mut items);
            Node::List { items, span }
        }
        LexKind::BeginRecordFeatures | LexKind::TopLevel => {
            let mut generic = generic;
            expr::parse_expressions(&mut generic.nodes);
            Node::Generic(generic)
        }
        LexKind::Lock | LexKind::For | LexKind::Class | LexKind::Meth => {
            let kind = generic.kind;
            error_node(Node::Generic(generic), format!("'{kind}' blocks are not implemented"))
        }
        other => error_node(Node::Generic(generic), format!("unhandled scope kind: {other}")),
    }
}

/// `local Defs in Body end`, `(…)` grouping, and the interiors of `thread`,
/// `raise`, and `proc` bodies, all of which admit one optional `in` split.
fn parse_local(generic: GenericNode) -> Node {
    let span = generic.span;
    let edges = split_nodes(&generic.nodes, LOCAL_SECTIONS);
    match edges.len() {
        // Pure grouping, no declarations.
        0 => section(generic.nodes, span),
        1 => {
            let mut nodes = generic.nodes;
            let body_nodes = nodes.split_off(edges[0] + 1);
            nodes.pop();
            let defs = if nodes.is_empty() {
                None
            } else {
                Some(Box::new(section(nodes, span)))
            };
            Node::Local {
                defs,
                body: Box::new(section(body_nodes, span)),
                span,
            }
        }
        _ => error_node(Node::Generic(generic), "Invalid local with too many 'in' separators"),
    }
}

fn parse_try(generic: GenericNode) -> Node {
    let span = generic.span;
    let mut edges = split_nodes(&generic.nodes, TRY_SECTIONS);
    if edges.is_empty() {
        return error_node(
            Node::Generic(generic),
            "Invalid try block, must have 'catch' or 'finally' sections",
        );
    }

    let last_edge = *edges.last().expect("edges is non-empty");
    let mut nodes = generic.nodes;
    let mut catches = None;
    let mut finally = None;
    while let Some(edge) = edges.pop() {
        let content = nodes.split_off(edge + 1);
        let separator = nodes.pop().expect("separator at edge position");
        match separator.lex_kind() {
            Some(LexKind::Finally) if edge == last_edge => finally = Some(Box::new(section(content, span))),
            Some(LexKind::Finally) => {
                nodes.extend(content);
                return error_node(
                    Node::Generic(GenericNode {
                        kind: LexKind::Try,
                        nodes,
                        span,
                    }),
                    "Invalid try block, 'finally' must be the last section",
                );
            }
            // Earlier catch sections overwrite later ones, so the first wins.
            _ => catches = Some(Box::new(section(content, span))),
        }
    }

    Node::Try {
        body: Box::new(section(nodes, span)),
        catches,
        finally,
        span,
    }
}

/// One `if`/`elseif` section (or a `case` pattern branch when `pattern` is
/// set): exactly one `then` splits condition from body.
fn parse_if_branch(generic: GenericNode, pattern: bool) -> Node {
    let span = generic.span;
    let edges = split_nodes(&generic.nodes, COND_IF_SECTIONS);
    if edges.len() != 1 {
        return error_node(
            Node::Generic(generic),
            "Invalid conditional, must have exactly one 'then'",
        );
    }

    let mut nodes = generic.nodes;
    let body_nodes = nodes.split_off(edges[0] + 1);
    nodes.pop();
    let condition = Box::new(section(nodes, span));
    let body = Box::new(section(body_nodes, span));

    if pattern {
        Node::PatternBranch {
            pattern: condition,
            condition: None,
            body,
            span,
        }
    } else {
        Node::CondBranch { condition, body, span }
    }
}

/// One `case`/`elsecase` section: the scrutinee before `of`, then pattern
/// branches separated by `elseof`.
fn parse_case_branch(generic: GenericNode) -> Node {
    let span = generic.span;
    let edges = split_nodes(&generic.nodes, COND_CASE_SECTIONS);
    if edges.is_empty() {
        return error_node(Node::Generic(generic), "Invalid pattern case, missing 'of'");
    }

    let kind = generic.kind;
    let mut nodes = generic.nodes;
    let mut branches = Vec::with_capacity(edges.len());
    for &edge in edges.iter().rev() {
        let content = nodes.split_off(edge + 1);
        nodes.pop();
        branches.push(parse_if_branch(
            GenericNode {
                kind,
                nodes: content,
                span,
            },
            true,
        ));
    }
    branches.reverse();

    Node::PatternMatch {
        value: Box::new(section(nodes, span)),
        branches,
        span,
    }
}

fn parse_cond(generic: GenericNode) -> Node {
    let span = generic.span;
    let opener = generic.kind;
    let mut nodes = generic.nodes;
    let mut edges = split_nodes(&nodes, COND_SECTIONS);

    // The trailing `else` section, if present, becomes the else branch.
    let mut else_branch = None;
    if let Some(&last) = edges.last()
        && nodes[last].lex_kind() == Some(LexKind::Else)
    {
        let content = nodes.split_off(last + 1);
        nodes.pop();
        edges.pop();
        else_branch = Some(Box::new(section(content, span)));
    }

    // Remaining sections, each typed by the separator that introduced it;
    // the leading section is typed by the opener itself.
    let mut sections: Vec<(LexKind, Vec<Node>)> = Vec::with_capacity(edges.len() + 1);
    for &edge in edges.iter().rev() {
        let content = nodes.split_off(edge + 1);
        let separator = nodes.pop().expect("separator at edge position");
        let kind = separator.lex_kind().expect("separator has a lexeme kind");
        sections.push((kind, content));
    }
    sections.push((opener, nodes));
    sections.reverse();

    let branches = sections
        .into_iter()
        .map(|(kind, content)| {
            let branch = GenericNode {
                kind: opener,
                nodes: content,
                span,
            };
            match kind {
                LexKind::If | LexKind::Elseif => parse_if_branch(branch, false),
                LexKind::Case | LexKind::Elsecase => parse_case_branch(branch),
                other => error_node(Node::Generic(branch), format!("unexpected conditional section: {other}")),
            }
        })
        .collect();

    Node::Cond {
        branches,
        else_branch,
        span,
    }
}

fn parse_functor(generic: GenericNode) -> Node {
    let span = generic.span;
    let edges = split_nodes(&generic.nodes, FUNCTOR_SECTIONS);

    let mut nodes = generic.nodes;
    let mut sections: IndexMap<LexKind, Node> = IndexMap::with_capacity(edges.len() + 1);
    for &edge in edges.iter().rev() {
        let content = nodes.split_off(edge + 1);
        let separator = nodes.pop().expect("separator at edge position");
        let kind = separator.lex_kind().expect("separator has a lexeme kind");
        sections.insert(kind, section(content, span));
    }
    if !nodes.is_empty() {
        sections.insert(LexKind::Functor, section(nodes, span));
    }

    let mut take = |kind: LexKind| sections.shift_remove(&kind).map(Box::new);
    Node::Functor {
        functor: take(LexKind::Functor),
        exports: take(LexKind::Export),
        require: take(LexKind::Require),
        prepare: take(LexKind::Prepare),
        import: take(LexKind::Import),
        define: take(LexKind::Define),
        span,
    }
}

fn parse_proc(generic: GenericNode) -> Node {
    let span = generic.span;
    let fun = generic.kind == LexKind::Fun;
    if generic.nodes.len() < 2 {
        return error_node(Node::Generic(generic), "Invalid empty procedure declaration");
    }
    if !matches!(generic.nodes[0], Node::Call { .. }) {
        return error_node(Node::Generic(generic), "Invalid procedure signature");
    }

    let kind = generic.kind;
    let mut nodes = generic.nodes;
    let rest = nodes.split_off(1);
    let signature = nodes.pop().expect("signature present");

    Node::Proc {
        signature: Box::new(signature),
        body: Box::new(parse_local(GenericNode {
            kind,
            nodes: rest,
            span,
        })),
        fun,
        span,
    }
}
