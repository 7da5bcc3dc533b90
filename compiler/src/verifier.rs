use std::collections::HashMap;

use crate::{
    error::Error,
    graph::{Graph, NodeId, NodeKind},
    hash::key_hash,
};

/// Checks the graph before emission.
///
/// Key hashes must be collision-free within each object, because the emitted
/// `map_key` handler dispatches on the hash alone. Everything else here is a
/// structural property the builder guarantees by construction; a violation
/// is a generator bug, so those are asserts rather than errors.
pub fn verify_graph(graph: &Graph) -> Result<(), Error> {
    let mut states = HashMap::new();

    for (id, node) in graph.nodes() {
        if let Some(previous) = states.insert(node.state, id) {
            panic!(
                "state {} assigned to both {} and {}",
                node.state,
                graph.node(previous).full_name,
                node.full_name
            );
        }
        if let Some(parent) = node.parent {
            assert!(
                node.state > graph.node(parent).state,
                "state allocation is not pre-order at {}",
                node.full_name
            );
        }

        match node.kind {
            NodeKind::Array => {
                assert_eq!(
                    node.children.len(),
                    1,
                    "array node {} must have exactly one element child",
                    node.full_name
                );
            }
            NodeKind::KeyOfMessage => {
                assert_eq!(node.children.len(), 1);
                assert_eq!(
                    graph.node(node.children[0]).kind,
                    NodeKind::InsideObject,
                    "key node {} must lead into an object",
                    node.full_name
                );
            }
            NodeKind::InsideObject => {
                check_key_hashes(graph, id)?;
            }
            _ => {}
        }
    }

    Ok(())
}

fn check_key_hashes(graph: &Graph, object: NodeId) -> Result<(), Error> {
    let node = graph.node(object);
    let mut seen: HashMap<u32, &str> = HashMap::new();
    for &child in &node.children {
        let name = graph.node(child).name.as_str();
        if let Some(first) = seen.insert(key_hash(name), name) {
            return Err(Error::HashCollision {
                object: node.full_name.clone(),
                first: first.to_string(),
                second: name.to_string(),
            });
        }
    }
    Ok(())
}
