//! Graph traversal over expression DAGs.

use std::collections::HashSet;

use crate::expr::Expr;

/// Topological order of all nodes reachable from `roots`, operands first.
///
/// Each node appears once, however many times it is shared. The traversal uses
/// an explicit stack, so long unrolled chains cannot overflow the call stack.
pub fn topological_order(roots: &[Expr]) -> Vec<Expr> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    let mut stack: Vec<(Expr, bool)> = roots.iter().rev().map(|e| (e.clone(), false)).collect();

    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            order.push(node);
            continue;
        }
        if !visited.insert(node.id()) {
            continue;
        }
        let operands: Vec<Expr> = node.op().operands().into_iter().cloned().collect();
        stack.push((node, true));
        for operand in operands.into_iter().rev() {
            if !visited.contains(&operand.id()) {
                stack.push((operand, false));
            }
        }
    }

    order
}
