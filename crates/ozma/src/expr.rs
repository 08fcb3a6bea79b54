//! Expression parsing over the flat child sequence of a scope.
//!
//! Precedence is encoded purely by the order of [`OPERATOR_TABLE`];
//! associativity by the fold direction. Each fold rewrites the node vector in
//! place, consuming operator leaves, so running the passes a second time is a
//! no-op.

use std::collections::VecDeque;

use crate::{ast::Node, lex::LexKind};

#[derive(Debug, Clone, Copy)]
enum Fold {
    /// Prefix operator, folded right-to-left so stacked prefixes nest.
    Unary,
    BinaryLtr,
    BinaryRtl,
    /// Maximal runs `a OP b OP c` collapse into a single n-ary node.
    Nary,
}

/// Operator passes in priority order (highest first).
const OPERATOR_TABLE: &[(LexKind, Fold)] = &[
    (LexKind::CellAccess, Fold::Unary),
    (LexKind::VarNodef, Fold::Unary),
    (LexKind::ReadOnly, Fold::Unary),
    (LexKind::NumericNeg, Fold::Unary),
    (LexKind::RecordAccess, Fold::BinaryRtl),
    (LexKind::NumericDiv, Fold::BinaryLtr),
    (LexKind::NumericMul, Fold::Nary),
    (LexKind::NumericMinus, Fold::BinaryLtr),
    (LexKind::NumericAdd, Fold::Nary),
    (LexKind::Equal, Fold::BinaryLtr),
    (LexKind::Different, Fold::BinaryLtr),
    (LexKind::GreaterOrEqual, Fold::BinaryLtr),
    (LexKind::LessOrEqual, Fold::BinaryLtr),
    (LexKind::GreaterThan, Fold::BinaryLtr),
    (LexKind::LessThan, Fold::BinaryLtr),
    (LexKind::AndThen, Fold::BinaryRtl),
    (LexKind::OrElse, Fold::BinaryRtl),
    (LexKind::Unify, Fold::Nary),
    (LexKind::CellAssign, Fold::BinaryLtr),
    (LexKind::AttrAssign, Fold::BinaryLtr),
    (LexKind::ListCons, Fold::BinaryRtl),
    (LexKind::TupleCons, Fold::Nary),
    (LexKind::RecordDefFeature, Fold::BinaryLtr),
];

/// Applies all expression passes to `nodes` in place.
pub(crate) fn parse_expressions(nodes: &mut Vec<Node>) {
    fold_record_cons(nodes);
    for &(op, fold) in OPERATOR_TABLE {
        match fold {
            Fold::Unary => fold_unary(nodes, op),
            Fold::BinaryLtr => fold_binary_ltr(nodes, op),
            Fold::BinaryRtl => fold_binary_rtl(nodes, op),
            Fold::Nary => fold_nary(nodes, op),
        }
    }
}

fn is_op(node: &Node, op: LexKind) -> bool {
    node.lex_kind() == Some(op) && matches!(node, Node::Leaf(_))
}

fn binary(op: LexKind, lop: Node, rop: Node) -> Node {
    let span = lop.span().cover(rop.span());
    Node::BinaryOp {
        op,
        lop: Box::new(lop),
        rop: Box::new(rop),
        span,
    }
}

/// Collapses `[RecordCons, label, features-group]` triples into records.
///
/// A trailing `...` inside the features group marks the record as open.
fn fold_record_cons(nodes: &mut Vec<Node>) {
    if !nodes.iter().any(|node| is_op(node, LexKind::RecordCons)) {
        return;
    }
    let mut queue: VecDeque<Node> = std::mem::take(nodes).into();
    let mut out = Vec::with_capacity(queue.len());
    while let Some(node) = queue.pop_front() {
        if !is_op(&node, LexKind::RecordCons) {
            out.push(node);
            continue;
        }
        // The lexer only emits the marker directly before a label + group.
        let label = queue.pop_front().expect("record label follows marker");
        let features = queue.pop_front().expect("record features follow label");
        let Node::Generic(mut group) = features else {
            unreachable!("record marker is followed by a features group");
        };
        debug_assert_eq!(group.kind, LexKind::BeginRecordFeatures);

        let open = group
            .nodes
            .last()
            .is_some_and(|last| is_op(last, LexKind::RecordOpen));
        if open {
            group.nodes.pop();
        }

        let span = node.span().cover(group.span);
        out.push(Node::Record {
            label: Box::new(label),
            features: Box::new(Node::Generic(group)),
            open,
            span,
        });
    }
    *nodes = out;
}

fn fold_unary(nodes: &mut Vec<Node>, op: LexKind) {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in std::mem::take(nodes).into_iter().rev() {
        if is_op(&node, op)
            && let Some(operand) = out.pop()
        {
            let span = node.span().cover(operand.span());
            out.push(Node::UnaryOp {
                op,
                operand: Box::new(operand),
                span,
            });
        } else {
            out.push(node);
        }
    }
    out.reverse();
    *nodes = out;
}

fn fold_binary_ltr(nodes: &mut Vec<Node>, op: LexKind) {
    let mut queue: VecDeque<Node> = std::mem::take(nodes).into();
    let mut out: Vec<Node> = Vec::with_capacity(queue.len());
    while let Some(node) = queue.pop_front() {
        if is_op(&node, op) && !out.is_empty() && !queue.is_empty() {
            let lop = out.pop().expect("left operand present");
            let rop = queue.pop_front().expect("right operand present");
            out.push(binary(op, lop, rop));
        } else {
            out.push(node);
        }
    }
    *nodes = out;
}

fn fold_binary_rtl(nodes: &mut Vec<Node>, op: LexKind) {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    let mut queue: VecDeque<Node> = std::mem::take(nodes).into();
    while let Some(node) = queue.pop_back() {
        if is_op(&node, op) && !out.is_empty() && !queue.is_empty() {
            let rop = out.pop().expect("right operand present");
            let lop = queue.pop_back().expect("left operand present");
            out.push(binary(op, lop, rop));
        } else {
            out.push(node);
        }
    }
    out.reverse();
    *nodes = out;
}

fn fold_nary(nodes: &mut Vec<Node>, op: LexKind) {
    let mut queue: VecDeque<Node> = std::mem::take(nodes).into();
    let mut out: Vec<Node> = Vec::with_capacity(queue.len());
    while let Some(node) = queue.pop_front() {
        if is_op(&node, op) && !out.is_empty() && !queue.is_empty() {
            let mut operands = vec![out.pop().expect("first operand present")];
            operands.push(queue.pop_front().expect("second operand present"));
            // Extend the run: any further `OP operand` pairs join this node.
            while queue.len() >= 2 && is_op(&queue[0], op) {
                queue.pop_front();
                operands.push(queue.pop_front().expect("run operand present"));
            }
            let span = operands
                .first()
                .expect("operands are non-empty")
                .span()
                .cover(operands.last().expect("operands are non-empty").span());
            out.push(Node::NaryOp { op, operands, span });
        } else {
            out.push(node);
        }
    }
    *nodes = out;
}
