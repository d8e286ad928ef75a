//! Cycle detection over the edges of one build file.

use std::collections::HashMap;

use camino::Utf8PathBuf;

use super::BuildEdge;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Mark {
    /// On the current dependency path.
    Open,
    /// Fully explored without finding a cycle.
    Done,
}

/// Return one cycle through `edges`, if any exists.
///
/// Every output maps to its producing edge; dependencies without a producer
/// are leaves (sources, or outputs of another file).
pub(crate) fn find_cycle<'a>(
    edges: impl IntoIterator<Item = &'a BuildEdge>,
) -> Option<Vec<Utf8PathBuf>> {
    let mut producers: HashMap<&'a Utf8PathBuf, &'a BuildEdge> = HashMap::new();
    let mut roots = Vec::new();
    for edge in edges {
        for output in edge.outputs() {
            producers.insert(output, edge);
            roots.push(output);
        }
    }
    let mut walk = Walk {
        producers: &producers,
        path: Vec::new(),
        marks: HashMap::new(),
    };
    roots.into_iter().find_map(|node| walk.enter(node))
}

/// Depth-first walk from outputs to the outputs they depend on.
struct Walk<'a, 'm> {
    producers: &'m HashMap<&'a Utf8PathBuf, &'a BuildEdge>,
    path: Vec<&'a Utf8PathBuf>,
    marks: HashMap<&'a Utf8PathBuf, Mark>,
}

impl<'a> Walk<'a, '_> {
    fn enter(&mut self, node: &'a Utf8PathBuf) -> Option<Vec<Utf8PathBuf>> {
        match self.marks.get(node) {
            Some(Mark::Done) => return None,
            Some(Mark::Open) => return Some(self.close(node)),
            None => {}
        }
        self.marks.insert(node, Mark::Open);
        self.path.push(node);

        let edge = self.producers.get(node).copied();
        let found = edge.into_iter().flat_map(BuildEdge::dependencies).find_map(|dep| {
            if self.producers.contains_key(dep) {
                self.enter(dep)
            } else {
                tracing::trace!(leaf = %dep, dependent = %node, "dependency has no producer");
                None
            }
        });
        if found.is_none() {
            self.path.pop();
            self.marks.insert(node, Mark::Done);
        }
        found
    }

    /// The closed loop from the first visit of `node` back to itself.
    fn close(&self, node: &Utf8PathBuf) -> Vec<Utf8PathBuf> {
        let from = self.path.iter().position(|n| *n == node).unwrap_or(0);
        let mut cycle: Vec<Utf8PathBuf> = self
            .path
            .iter()
            .skip(from)
            .map(|n| (*n).clone())
            .collect();
        cycle.push(node.clone());
        rotate_to_smallest(cycle)
    }
}

/// Rotate a closed cycle so it starts and ends at its smallest node.
fn rotate_to_smallest(mut cycle: Vec<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    cycle.pop();
    let Some(start) = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, node)| *node)
        .map(|(idx, _)| idx)
    else {
        return cycle;
    };
    cycle.rotate_left(start);
    if let Some(first) = cycle.first().cloned() {
        cycle.push(first);
    }
    cycle
}
