//! AST traversal and the post-parse error check.

use std::fmt;

use crate::{ast::Node, lex::CodeRange};

/// One structural error found in the AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckError {
    pub message: String,
    pub position: CodeRange,
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error: {} : {}", self.position, self.message)
    }
}

/// Applies `f` to `node` and every descendant, depth first, in source order.
///
/// Error nodes are entered as well, so problems inside an already-failed
/// subtree still surface.
pub fn walk<'a>(node: &'a Node, f: &mut impl FnMut(&'a Node)) {
    f(node);
    node.for_each_child(&mut |child| walk(child, f));
}

/// Collects every [`Node::Error`] in the tree.
///
/// The AST is valid, and compilation may proceed, iff the result is empty.
/// The traversal never mutates the tree, so re-running it on a valid AST is
/// a no-op that again reports no errors.
#[must_use]
pub fn check_errors(root: &Node) -> Vec<CheckError> {
    let mut errors = Vec::new();
    walk(root, &mut |node| {
        if let Node::Error { message, span, .. } = node {
            errors.push(CheckError {
                message: message.clone(),
                position: *span,
            });
        }
    });
    errors
}
