use super::*;

use proptest::prelude::*;

/// Walks both arenas from the root and checks the structural invariants:
/// counter conservation per node, the terminal sentinel for small buckets,
/// and that leaf records are all-terminal.
fn validate_tree<K: Key>(t: &HistogramTree<K>) {
    let root = if t.internal.is_empty() {
        assert_eq!(t.leaves.records(), 1, "all-terminal index must be one leaf");
        NodeRef::Leaf(0)
    } else {
        NodeRef::Internal(0)
    };

    // (node, element count of the sub-range it represents)
    let mut stack: Vec<(NodeRef, usize)> = vec![(root, t.len())];
    while let Some((node, expected)) = stack.pop() {
        match node {
            NodeRef::Leaf(off) => {
                let counts = t.leaves.counts(off);
                assert!(
                    counts.iter().all(|&n| n <= t.threshold),
                    "leaf record with a non-terminal bucket"
                );
                let total: usize = counts.iter().map(|&n| n as usize).sum();
                assert_eq!(total, expected, "leaf counter conservation");
            }
            NodeRef::Internal(off) => {
                let counts = t.internal.counts(off);
                let total: usize = counts.iter().map(|&n| n as usize).sum();
                assert_eq!(total, expected, "internal counter conservation");
                assert!(
                    counts.iter().any(|&n| n > t.threshold),
                    "internal record without any expanded bucket"
                );
                for (&n, &child) in counts.iter().zip(t.internal.children(off)) {
                    if n <= t.threshold {
                        assert_eq!(child, NodeRef::TERMINAL, "terminal bucket sentinel");
                    } else {
                        stack.push((child, n as usize));
                    }
                }
            }
        }
    }
}

fn keys_strategy_u32() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::btree_set(any::<u32>(), 1..400).prop_map(|s| s.into_iter().collect())
}

fn keys_strategy_i64() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::btree_set(any::<i64>(), 1..400).prop_map(|s| s.into_iter().collect())
}

fn params_strategy() -> impl Strategy<Value = (u32, u32)> {
    (1u32..=6, 1u32..=32)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_lookup_matches_binary_search_u32(
        data in keys_strategy_u32(),
        (p, thr) in params_strategy(),
        probes in prop::collection::vec(any::<u32>(), 0..64),
    ) {
        let t = HistogramTree::with_params(data.clone(), p, thr);
        validate_tree(&t);

        for probe in probes {
            let expected = data.partition_point(|&k| k < probe);
            prop_assert_eq!(t.lookup(probe), expected, "probe {}", probe);
        }
        // Present keys and both domain edges.
        for (i, &k) in data.iter().enumerate() {
            prop_assert_eq!(t.lookup(k), i);
        }
        prop_assert_eq!(t.lookup(t.min()), 0);
        prop_assert_eq!(t.lookup(t.max()), t.len() - 1);
    }

    #[test]
    fn prop_lookup_matches_binary_search_i64(
        data in keys_strategy_i64(),
        (p, thr) in params_strategy(),
        probes in prop::collection::vec(any::<i64>(), 0..64),
    ) {
        let t = HistogramTree::with_params(data.clone(), p, thr);
        validate_tree(&t);

        for probe in probes {
            let expected = data.partition_point(|&k| k < probe);
            prop_assert_eq!(t.lookup(probe), expected, "probe {}", probe);
        }
    }

    #[test]
    fn prop_predict_is_monotone(
        data in keys_strategy_u32(),
        (p, thr) in params_strategy(),
        mut probes in prop::collection::vec(any::<u32>(), 2..64),
    ) {
        let t = HistogramTree::with_params(data, p, thr);

        probes.sort_unstable();
        let mut prev = 0usize;
        for probe in probes {
            let rank = t.lookup_predict(probe);
            prop_assert!(rank >= prev, "predict not monotone at probe {}", probe);
            prev = rank;
        }
    }

    #[test]
    fn prop_bounded_correction_distance(
        data in keys_strategy_u32(),
        (p, thr) in params_strategy(),
        probes in prop::collection::vec(any::<u32>(), 0..64),
    ) {
        let t = HistogramTree::with_params(data, p, thr);

        for probe in probes {
            if probe < t.min() || probe > t.max() {
                continue;
            }
            let predicted = t.lookup_predict(probe);
            let exact = t.lookup(probe);
            prop_assert!(
                exact >= predicted && exact - predicted <= thr as usize,
                "correction distance exceeded at probe {}: {} -> {}",
                probe, predicted, exact
            );
        }
    }

    #[test]
    fn prop_out_of_domain_probes(
        data in keys_strategy_u32(),
        (p, thr) in params_strategy(),
    ) {
        let t = HistogramTree::with_params(data, p, thr);

        if t.min() > u32::MIN {
            prop_assert_eq!(t.lookup(t.min() - 1), 0);
            prop_assert_eq!(t.lookup_predict(t.min() - 1), 0);
        }
        if t.max() < u32::MAX {
            prop_assert_eq!(t.lookup(t.max() + 1), t.len());
            prop_assert_eq!(t.lookup_predict(t.max() + 1), t.len());
        }
    }
}
