//! Node forest: root detection, structural validation and traversal.

use crate::AssetError;
use crate::ir::Node;
use glam::Mat4;

/// Mark roots and reject graphs that are not a forest.
///
/// A node is a root iff no node lists it as a child. Out-of-range children,
/// nodes with several parents and cycles are parse errors.
pub fn link(nodes: &mut [Node]) -> Result<(), AssetError> {
    let count = nodes.len();
    let mut parent: Vec<Option<usize>> = vec![None; count];

    for node in nodes.iter() {
        for &child in &node.children {
            if child >= count {
                return Err(AssetError::Parse(format!(
                    "node {} lists missing child {child}",
                    node.index
                )));
            }
            if let Some(existing) = parent[child] {
                return Err(AssetError::Parse(format!(
                    "node {child} has two parents ({existing} and {})",
                    node.index
                )));
            }
            parent[child] = Some(node.index);
        }
    }

    for (node, parent) in nodes.iter_mut().zip(&parent) {
        node.is_root = parent.is_none();
    }

    // With at most one parent each, every node outside the root subtrees
    // sits on a cycle.
    let mut reached = 0;
    visit_depth_first(nodes, |_, _| reached += 1);
    if reached != count {
        return Err(AssetError::Parse(format!(
            "node graph contains a cycle ({} of {count} nodes unreachable from a root)",
            count - reached
        )));
    }
    Ok(())
}

/// Pre-order walk of every root subtree, roots in declaration order. The
/// callback receives each node with its model-space transform
/// (ancestors × local).
pub fn visit_depth_first(nodes: &[Node], mut f: impl FnMut(&Node, Mat4)) {
    let mut stack: Vec<(usize, Mat4)> = Vec::new();
    for root in nodes.iter().rev().filter(|n| n.is_root) {
        stack.push((root.index, Mat4::IDENTITY));
    }
    while let Some((index, parent)) = stack.pop() {
        let Some(node) = nodes.get(index) else {
            continue;
        };
        let model = parent * node.local;
        f(node, model);
        for &child in node.children.iter().rev() {
            stack.push((child, model));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn node(index: usize, children: &[usize]) -> Node {
        let mut n = Node::new(index, format!("n{index}"), Mat4::IDENTITY);
        n.children = children.to_vec();
        n
    }

    #[test]
    fn roots_are_nodes_without_parents() {
        let mut nodes = vec![node(0, &[2]), node(1, &[]), node(2, &[3]), node(3, &[])];
        link(&mut nodes).unwrap();
        let roots: Vec<usize> = nodes.iter().filter(|n| n.is_root).map(|n| n.index).collect();
        assert_eq!(roots, vec![0, 1]);
    }

    #[test]
    fn root_subtrees_cover_each_node_once() {
        let mut nodes = vec![
            node(0, &[1, 2]),
            node(1, &[]),
            node(2, &[4]),
            node(3, &[]),
            node(4, &[]),
        ];
        link(&mut nodes).unwrap();
        let mut seen = Vec::new();
        visit_depth_first(&nodes, |n, _| seen.push(n.index));
        assert_eq!(seen, vec![0, 1, 2, 4, 3]);
    }

    #[test]
    fn cycle_is_rejected() {
        let mut nodes = vec![node(0, &[]), node(1, &[2]), node(2, &[1])];
        let err = link(&mut nodes).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn self_child_is_rejected() {
        let mut nodes = vec![node(0, &[0])];
        assert!(matches!(link(&mut nodes), Err(AssetError::Parse(_))));
    }

    #[test]
    fn second_parent_is_rejected() {
        let mut nodes = vec![node(0, &[2]), node(1, &[2]), node(2, &[])];
        let err = link(&mut nodes).unwrap_err();
        assert!(err.to_string().contains("two parents"));
    }

    #[test]
    fn missing_child_is_rejected() {
        let mut nodes = vec![node(0, &[7])];
        assert!(matches!(link(&mut nodes), Err(AssetError::Parse(_))));
    }

    #[test]
    fn transforms_accumulate_parent_first() {
        let mut nodes = vec![node(0, &[1]), node(1, &[])];
        nodes[0].local = Mat4::from_translation(Vec3::X);
        nodes[1].local = Mat4::from_scale(Vec3::splat(2.0));
        link(&mut nodes).unwrap();
        let mut child_model = Mat4::IDENTITY;
        visit_depth_first(&nodes, |n, m| {
            if n.index == 1 {
                child_model = m;
            }
        });
        assert_eq!(child_model, nodes[0].local * nodes[1].local);
        assert_eq!(child_model.transform_point3(Vec3::ONE), Vec3::new(3.0, 2.0, 2.0));
    }
}
