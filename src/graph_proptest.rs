//! Property-based tests for dependency classification and planning.
//!
//! Random record graphs (cycles included) are classified and checked against
//! a naive reachability computation.

#[cfg(test)]
mod proptest_tests {
    use std::collections::HashSet;
    use std::path::PathBuf;

    use proptest::prelude::*;

    use crate::container::{AssetMetadata, Container, DataKind, PayloadSlot, Record, RecordId};
    use crate::engine::graph::{classify, Exclusivity};
    use crate::engine::plan::{self, Edit, PlanStep};
    use crate::naming::{sanitize_name, MAX_NAME_LENGTH};

    /// Nodes as (is_asset, outgoing edges). Node 0 is always an asset.
    fn graph_strategy() -> impl Strategy<Value = Vec<(bool, Vec<usize>)>> {
        (1usize..12).prop_flat_map(|n| {
            prop::collection::vec((any::<bool>(), prop::collection::vec(0..n, 0..4)), n)
        })
    }

    fn build(nodes: &[(bool, Vec<usize>)]) -> Container {
        let records = nodes
            .iter()
            .enumerate()
            .map(|(i, (asset, refs))| Record {
                id: RecordId::new(format!("r{}", i)),
                name: format!("r{}", i),
                kind: DataKind::Other,
                refs: refs.iter().map(|r| RecordId::new(format!("r{}", r))).collect(),
                asset: (*asset || i == 0).then(|| AssetMetadata::new(format!("Asset {}", i))),
                payload: PayloadSlot::Embedded { offset: 0, len: 0 },
            })
            .collect();
        Container::from_parts(PathBuf::from("/lib/random.shelf"), 1, records, 0)
    }

    fn naive_reach(nodes: &[(bool, Vec<usize>)], start: usize, seen: &mut HashSet<usize>) {
        if !seen.insert(start) {
            return;
        }
        for &next in &nodes[start].1 {
            naive_reach(nodes, next, seen);
        }
    }

    proptest! {
        /// Property: exclusive = reachable from target minus reachable from any other asset
        #[test]
        fn classification_matches_naive_reachability(nodes in graph_strategy()) {
            let container = build(&nodes);
            let class = classify(&container, "r0").unwrap();

            let mut from_target = HashSet::new();
            naive_reach(&nodes, 0, &mut from_target);
            let mut from_others = HashSet::new();
            for (i, (asset, _)) in nodes.iter().enumerate() {
                if *asset && i != 0 {
                    naive_reach(&nodes, i, &mut from_others);
                }
            }

            prop_assert_eq!(class.reachable().count(), from_target.len());
            for (id, exclusivity) in class.entries() {
                let index: usize = id.as_str()[1..].parse().unwrap();
                prop_assert!(from_target.contains(&index));
                let expected = if from_others.contains(&index) {
                    Exclusivity::Shared
                } else {
                    Exclusivity::Exclusive
                };
                prop_assert_eq!(*exclusivity, expected);
            }
            prop_assert_eq!(class.is_target_shared(), from_others.contains(&0));
        }

        /// Property: a delete plan never leaves a dangling reference behind
        #[test]
        fn delete_plan_keeps_references_intact(nodes in graph_strategy()) {
            let container = build(&nodes);
            let class = classify(&container, "r0").unwrap();
            let Ok(plan) = plan::delete(&container, &class) else {
                prop_assert!(class.is_target_shared());
                return Ok(());
            };

            let removed: HashSet<&str> = match &plan.steps()[0] {
                PlanStep::Dispose { .. } => {
                    container.records().iter().map(|r| r.id.as_str()).collect()
                }
                PlanStep::Write(write) => write
                    .edits
                    .iter()
                    .filter_map(|edit| match edit {
                        Edit::Remove { record } => Some(record.as_str()),
                        _ => None,
                    })
                    .collect(),
                PlanStep::Relocate { .. } => HashSet::new(),
            };
            prop_assert!(removed.contains("r0"));
            for record in container.records() {
                if removed.contains(record.id.as_str()) {
                    continue;
                }
                for reference in &record.refs {
                    prop_assert!(
                        !removed.contains(reference.as_str()),
                        "{} still references removed {}",
                        record.id,
                        reference
                    );
                }
            }
        }

        /// Property: sanitized names are safe single path components
        #[test]
        fn sanitize_name_is_a_safe_component(input in ".*") {
            let result = sanitize_name(&input, MAX_NAME_LENGTH);
            prop_assert!(!result.is_empty());
            prop_assert!(result.chars().count() <= MAX_NAME_LENGTH);
            for ch in ['/', '\\', ':', '*', '?', '"', '<', '>', '|'] {
                prop_assert!(!result.contains(ch));
            }
            prop_assert!(!result.starts_with('.'));
        }

        /// Property: tag normalization is idempotent
        #[test]
        fn normalize_tags_is_idempotent(tags in prop::collection::vec("[a-z ,]{0,12}", 0..6)) {
            let once = plan::normalize_tags(&tags);
            let twice = plan::normalize_tags(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
