//! Execution ordering from declared dependencies
//!
//! Depth-first topological sort over the "depends on" graph: every
//! dependency precedes its dependents in the returned order. Cyclic
//! graphs are rejected up front with a dedicated error rather than
//! silently truncating the order.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::domain::ScheduledItem;

/// Errors from dependency resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Cyclic dependency: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

/// Compute an execution order for the given items.
///
/// Returns indices into the input slice, dependencies first. Dependencies
/// referencing ids outside the input set do not affect ordering; the
/// coordinator checks those at run time.
pub fn execution_order(items: &[ScheduledItem]) -> Result<Vec<usize>, ResolveError> {
    check_acyclic(items)?;

    let index_map: HashMap<&str, usize> = items.iter().enumerate().map(|(i, item)| (item.id(), i)).collect();

    let mut visited = HashSet::new();
    let mut order = Vec::with_capacity(items.len());

    for idx in 0..items.len() {
        visit(idx, items, &index_map, &mut visited, &mut order);
    }

    Ok(order)
}

/// Reorder items so that dependencies precede dependents
pub fn order_items(items: Vec<ScheduledItem>) -> Result<Vec<ScheduledItem>, ResolveError> {
    let order = execution_order(&items)?;
    let mut slots: Vec<Option<ScheduledItem>> = items.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|idx| slots[idx].take()).collect())
}

/// Post-order DFS append: a node follows everything it depends on
fn visit(
    idx: usize,
    items: &[ScheduledItem],
    index_map: &HashMap<&str, usize>,
    visited: &mut HashSet<usize>,
    order: &mut Vec<usize>,
) {
    if !visited.insert(idx) {
        return;
    }

    for dep_id in items[idx].deps() {
        if let Some(&dep_idx) = index_map.get(dep_id.as_str()) {
            visit(dep_idx, items, index_map, visited, order);
        }
    }
    order.push(idx);
}

/// DFS cycle detection with a recursion stack; the error carries the
/// offending path for diagnostics.
fn check_acyclic(items: &[ScheduledItem]) -> Result<(), ResolveError> {
    let graph: HashMap<&str, &ScheduledItem> = items.iter().map(|item| (item.id(), item)).collect();

    let mut visited = HashSet::new();
    let mut stack = HashSet::new();
    let mut path = Vec::new();

    for id in graph.keys() {
        if !visited.contains(id) && walk_for_cycle(id, &graph, &mut visited, &mut stack, &mut path) {
            return Err(ResolveError::Cycle(path));
        }
    }

    Ok(())
}

fn walk_for_cycle<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, &'a ScheduledItem>,
    visited: &mut HashSet<&'a str>,
    stack: &mut HashSet<&'a str>,
    path: &mut Vec<String>,
) -> bool {
    visited.insert(node);
    stack.insert(node);
    path.push(node.to_string());

    if let Some(item) = graph.get(node) {
        for dep_id in item.deps() {
            if !visited.contains(dep_id.as_str()) {
                if graph.contains_key(dep_id.as_str())
                    && walk_for_cycle(dep_id.as_str(), graph, visited, stack, path)
                {
                    return true;
                }
            } else if stack.contains(dep_id.as_str()) {
                path.push(dep_id.clone());
                return true;
            }
        }
    }

    stack.remove(node);
    path.pop();
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Task;

    fn item(id: &str, deps: &[&str]) -> ScheduledItem {
        let mut task = Task::new("story-1", "step");
        task.id = id.to_string();
        task.deps = deps.iter().map(|d| d.to_string()).collect();
        ScheduledItem::Task(task)
    }

    fn position(order: &[usize], idx: usize) -> usize {
        order.iter().position(|&i| i == idx).unwrap()
    }

    #[test]
    fn test_dependency_precedes_dependent() {
        // T depends on U; submitted in the wrong order on purpose
        let items = vec![item("t", &["u"]), item("u", &[])];

        let ordered = order_items(items).unwrap();
        let ids: Vec<&str> = ordered.iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["u", "t"]);
    }

    #[test]
    fn test_chain_order() {
        let items = vec![item("c", &["b"]), item("b", &["a"]), item("a", &[])];

        let order = execution_order(&items).unwrap();
        assert!(position(&order, 2) < position(&order, 1));
        assert!(position(&order, 1) < position(&order, 0));
    }

    #[test]
    fn test_diamond_order() {
        // d depends on b and c, both depend on a
        let items = vec![
            item("a", &[]),
            item("b", &["a"]),
            item("c", &["a"]),
            item("d", &["b", "c"]),
        ];

        let order = execution_order(&items).unwrap();
        assert_eq!(order.len(), 4);
        assert!(position(&order, 0) < position(&order, 1));
        assert!(position(&order, 0) < position(&order, 2));
        assert!(position(&order, 1) < position(&order, 3));
        assert!(position(&order, 2) < position(&order, 3));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let items = vec![item("a", &["b"]), item("b", &["a"])];

        let result = execution_order(&items);
        assert!(matches!(result, Err(ResolveError::Cycle(_))));
    }

    #[test]
    fn test_self_cycle_is_rejected() {
        let items = vec![item("a", &["a"])];

        let result = execution_order(&items);
        assert!(matches!(result, Err(ResolveError::Cycle(_))));
    }

    #[test]
    fn test_external_deps_are_ignored_for_ordering() {
        // "a" depends on an id outside the set; order still resolves
        let items = vec![item("a", &["elsewhere"]), item("b", &[])];

        let order = execution_order(&items).unwrap();
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn test_every_dependency_before_its_dependent() {
        let items = vec![
            item("e", &["c", "d"]),
            item("d", &["a"]),
            item("c", &["a", "b"]),
            item("b", &[]),
            item("a", &["b"]),
        ];

        let ordered = order_items(items).unwrap();
        for (pos, it) in ordered.iter().enumerate() {
            for dep in it.deps() {
                if let Some(dep_pos) = ordered.iter().position(|o| o.id() == dep.as_str()) {
                    assert!(dep_pos < pos, "{} must precede {}", dep, it.id());
                }
            }
        }
    }
}
