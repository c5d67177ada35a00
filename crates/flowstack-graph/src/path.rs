use std::collections::{HashMap, HashSet};

/// Hard cap on resolved path length. Guards against unbounded walks through
/// malformed graphs with long chains.
pub const MAX_PATH_LEN: usize = 256;

/// Resolve a single linear execution path from `start` to `goal`.
///
/// Greedy, deterministic walk: at each step take the first unvisited
/// neighbor in edge-declaration order. No backtracking — if the chosen
/// branch dead-ends, resolution fails even when another branch would have
/// reached `goal`. That limitation is observable behavior and is kept
/// intentionally; do not replace this with BFS.
///
/// Returns `None` on a dead end or when the path exceeds [`MAX_PATH_LEN`].
/// `start == goal` resolves to `[start]`.
pub fn resolve(
    adjacency: &HashMap<String, Vec<String>>,
    start: &str,
    goal: &str,
) -> Option<Vec<String>> {
    let mut path = vec![start.to_string()];
    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(start);
    let mut current = start;

    while current != goal {
        let next = adjacency
            .get(current)?
            .iter()
            .find(|n| !visited.contains(n.as_str()))?;
        visited.insert(next);
        path.push(next.clone());
        if path.len() > MAX_PATH_LEN {
            return None;
        }
        current = next;
    }

    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::{Edge, Graph, Node, NodeKind};

    fn adjacency(edges: &[(&str, &str)]) -> HashMap<String, Vec<String>> {
        let graph = Graph::new(
            vec![],
            edges
                .iter()
                .map(|(s, t)| Edge::new(*s, *t))
                .collect(),
        );
        graph.adjacency()
    }

    #[test]
    fn test_resolves_linear_chain() {
        let adj = adjacency(&[("q", "g"), ("g", "o")]);
        assert_eq!(
            resolve(&adj, "q", "o"),
            Some(vec!["q".into(), "g".into(), "o".into()])
        );
    }

    #[test]
    fn test_start_equals_goal() {
        let adj = adjacency(&[("q", "o")]);
        assert_eq!(resolve(&adj, "q", "q"), Some(vec!["q".into()]));
    }

    #[test]
    fn test_disconnected_goal() {
        let adj = adjacency(&[("q", "a")]);
        assert_eq!(resolve(&adj, "q", "o"), None);
    }

    #[test]
    fn test_deterministic_first_branch() {
        // Both neighbors lead somewhere; declaration order decides.
        let adj = adjacency(&[("q", "b"), ("q", "a"), ("b", "o"), ("a", "o")]);
        assert_eq!(
            resolve(&adj, "q", "o"),
            Some(vec!["q".into(), "b".into(), "o".into()])
        );
        // Identical inputs, identical answer.
        assert_eq!(resolve(&adj, "q", "o"), resolve(&adj, "q", "o"));
    }

    #[test]
    fn test_no_backtracking_on_dead_end() {
        // First branch dead-ends; a correct general resolver would take the
        // second branch, this one must not.
        let adj = adjacency(&[("q", "dead"), ("q", "a"), ("a", "o")]);
        assert_eq!(resolve(&adj, "q", "o"), None);
    }

    #[test]
    fn test_never_revisits_a_node() {
        // Cycle back to q; the visited set must keep the walk moving.
        let adj = adjacency(&[("q", "a"), ("a", "q"), ("a", "o")]);
        let path = resolve(&adj, "q", "o").unwrap();
        let mut seen = HashSet::new();
        for id in &path {
            assert!(seen.insert(id.clone()), "revisited {id}");
        }
    }

    #[test]
    fn test_self_loop_is_unreachable() {
        let adj = adjacency(&[("q", "q"), ("q", "o")]);
        assert_eq!(
            resolve(&adj, "q", "o"),
            Some(vec!["q".into(), "o".into()])
        );
    }

    #[test]
    fn test_long_chain_exceeds_cap() {
        // 300 linear hops: the walk must stop at the cap, not loop forever.
        let mut nodes = vec![Node::new("n0", NodeKind::Query)];
        let mut edges = Vec::new();
        for i in 1..=300 {
            nodes.push(Node::new(format!("n{i}"), NodeKind::Other));
            edges.push(Edge::new(format!("n{}", i - 1), format!("n{i}")));
        }
        let graph = Graph::new(nodes, edges);
        let adj = graph.adjacency();
        assert_eq!(resolve(&adj, "n0", "n300"), None);
        // Inside the cap the same chain resolves.
        let path = resolve(&adj, "n0", "n200").unwrap();
        assert_eq!(path.len(), 201);
    }
}
