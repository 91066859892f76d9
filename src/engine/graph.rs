//! Dependency Grapher
//!
//! Computes the transitive dependency closure of an asset record and
//! classifies every record in it as exclusive or shared.
//!
//! A record is *exclusive* to the target when it is reachable from the target
//! and not reachable from any other asset root in the same container. Anything
//! else reachable from the target is *shared*. Classification is recomputed
//! fresh for every mutation and never cached.

use std::fmt;

use crate::container::{Container, RecordId};
use crate::error::{Error, Result};

/// Whether a dependency may be removed together with its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exclusivity {
    Exclusive,
    Shared,
}

impl fmt::Display for Exclusivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusivity::Exclusive => f.write_str("exclusive"),
            Exclusivity::Shared => f.write_str("shared"),
        }
    }
}

/// Adjacency over arena positions of one container.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    edges: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl DependencyGraph {
    pub fn build(container: &Container) -> Self {
        let edges = container
            .records()
            .iter()
            .map(|record| {
                record
                    .refs
                    .iter()
                    .filter_map(|id| container.position(id.as_str()))
                    .collect()
            })
            .collect();
        let roots = container
            .records()
            .iter()
            .enumerate()
            .filter(|(_, record)| record.is_asset())
            .map(|(position, _)| position)
            .collect();
        Self { edges, roots }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Arena positions of asset records.
    pub fn asset_roots(&self) -> &[usize] {
        &self.roots
    }

    /// Positions reachable from any of `starts`, the starts included.
    ///
    /// Iterative DFS with a visited set, so cycles terminate.
    pub fn reachable_from(&self, starts: &[usize]) -> Vec<bool> {
        let mut visited = vec![false; self.edges.len()];
        let mut stack: Vec<usize> = starts.to_vec();
        while let Some(node) = stack.pop() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            stack.extend(self.edges[node].iter().copied().filter(|&next| !visited[next]));
        }
        visited
    }
}

/// Exclusive/shared split of one target's dependency closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    target: RecordId,
    target_shared: bool,
    /// Every reachable record in table order, target included
    entries: Vec<(RecordId, Exclusivity)>,
}

impl Classification {
    pub fn target(&self) -> &RecordId {
        &self.target
    }

    /// True when another asset root reaches the target itself.
    pub fn is_target_shared(&self) -> bool {
        self.target_shared
    }

    pub fn entries(&self) -> &[(RecordId, Exclusivity)] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<Exclusivity> {
        self.entries
            .iter()
            .find(|(entry, _)| entry.as_str() == id)
            .map(|(_, class)| *class)
    }

    /// Records reachable from the target, target included.
    pub fn reachable(&self) -> impl Iterator<Item = &RecordId> {
        self.entries.iter().map(|(id, _)| id)
    }

    /// Records that may be removed together with the target.
    pub fn exclusive(&self) -> impl Iterator<Item = &RecordId> {
        self.with_class(Exclusivity::Exclusive)
    }

    /// Records another asset also depends on.
    pub fn shared(&self) -> impl Iterator<Item = &RecordId> {
        self.with_class(Exclusivity::Shared)
    }

    /// Dependencies of the target, excluding the target itself.
    pub fn dependencies(&self) -> impl Iterator<Item = (&RecordId, Exclusivity)> {
        self.entries
            .iter()
            .filter(move |(id, _)| id != &self.target)
            .map(|(id, class)| (id, *class))
    }

    fn with_class(&self, wanted: Exclusivity) -> impl Iterator<Item = &RecordId> {
        self.entries
            .iter()
            .filter(move |(_, class)| *class == wanted)
            .map(|(id, _)| id)
    }
}

/// Classify the closure of `target` within `container`.
///
/// Fails with `RecordNotFound` if the target does not exist and with
/// `InvalidOperation` if it is not an asset record.
pub fn classify(container: &Container, target: &str) -> Result<Classification> {
    let record = container.require_asset(target)?;
    let target_pos = container.position(target).ok_or_else(|| Error::RecordNotFound {
        container: container.path().to_path_buf(),
        id: target.to_string(),
    })?;
    let graph = DependencyGraph::build(container);

    let closure = graph.reachable_from(&[target_pos]);
    let others: Vec<usize> = graph
        .asset_roots()
        .iter()
        .copied()
        .filter(|&root| root != target_pos)
        .collect();
    let claimed = graph.reachable_from(&others);

    let entries = container
        .records()
        .iter()
        .enumerate()
        .filter(|(position, _)| closure[*position])
        .map(|(position, rec)| {
            let class = if claimed[position] {
                Exclusivity::Shared
            } else {
                Exclusivity::Exclusive
            };
            (rec.id.clone(), class)
        })
        .collect();

    Ok(Classification {
        target: record.id.clone(),
        target_shared: claimed[target_pos],
        entries,
    })
}
