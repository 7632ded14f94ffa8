//! Property tests for boundary arrays, renumbering and the contiguous split.

mod common;

use halo_spmv::distribute::balance::balanced_boundaries;
use halo_spmv::matrix::GraphChecks;
use halo_spmv::partition::metrics::part_sizes;
use halo_spmv::partition::{
    ContiguousOracle, GreedyGrowOracle, PartitionOracle, DEFAULT_IMBALANCE, partition_graph,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_partition_is_a_contiguous_relabelling(
        n in 1usize..40,
        k in 1usize..6,
        edge_prob in 0.05f64..0.6f64,
        seed in any::<u64>(),
    ) {
        let original = common::random_symmetric(n, edge_prob, seed);
        let x0 = common::random_vector(n, seed ^ 0x5eed);
        let mut g = original.clone();
        let mut x = x0.clone();
        let (p, renum) =
            partition_graph(&mut g, k, &mut x, &GreedyGrowOracle, DEFAULT_IMBALANCE).unwrap();

        // boundary array shape
        let b = p.as_slice();
        prop_assert_eq!(b.len(), k + 1);
        prop_assert_eq!(b[0], 0);
        prop_assert_eq!(b[k], n);
        prop_assert!(b.windows(2).all(|w| w[0] <= w[1]));

        // ranges are disjoint, cover [0, n), and agree with owner lookup
        for v in 0..n {
            let owner = p.owner_of(v).unwrap();
            prop_assert!(p.range(owner).contains(&v));
        }

        // renumbering is a bijection and the vector moved with it
        let mut seen = vec![false; n];
        for &o in &renum.old_id {
            prop_assert!(!seen[o]);
            seen[o] = true;
        }
        for new in 0..n {
            prop_assert_eq!(renum.new_id[renum.old_id[new]], new);
            prop_assert_eq!(x[new].to_bits(), x0[renum.old_id[new]].to_bits());
        }
        prop_assert_eq!(renum.restore(&x), x0);

        // graph is the same graph under new names
        g.validate(GraphChecks::all()).unwrap();
        prop_assert_eq!(g.nnz(), original.nnz());
        for new in 0..n {
            let (cols, vals) = g.row(new);
            let (ocols, ovals) = original.row(renum.old_id[new]);
            let mut mapped: Vec<(usize, u64)> = ocols
                .iter()
                .zip(ovals)
                .map(|(&c, &v)| (renum.new_id[c], v.to_bits()))
                .collect();
            mapped.sort_unstable();
            let got: Vec<(usize, u64)> = cols.iter().copied().zip(vals.iter().map(|v| v.to_bits())).collect();
            prop_assert_eq!(got, mapped);
        }
    }

    #[test]
    fn prop_greedy_grow_sizes_are_exact(n in 0usize..60, k in 1usize..8, seed in any::<u64>()) {
        let g = common::random_symmetric(n, 0.1, seed);
        let labels = GreedyGrowOracle.assign(&g, k, DEFAULT_IMBALANCE).unwrap();
        let sizes = part_sizes(&labels, k);
        prop_assert_eq!(sizes.iter().sum::<usize>(), n);
        prop_assert!(sizes.iter().max().unwrap() - sizes.iter().min().unwrap() <= 1);
    }

    #[test]
    fn prop_balanced_split_never_crosses_edges(
        degrees in prop::collection::vec(0usize..20, 0..50),
        k in 1usize..8,
    ) {
        let mut row_ptr = vec![0usize];
        for d in &degrees {
            row_ptr.push(row_ptr.last().unwrap() + d);
        }
        let p = balanced_boundaries(&row_ptr, k).unwrap();
        let nnz = *row_ptr.last().unwrap();
        prop_assert_eq!(p.parts(), k);
        prop_assert_eq!(p.total(), degrees.len());
        if nnz > 0 {
            // every cut sits at the first row reaching its share
            for i in 1..k {
                let r = p.as_slice()[i];
                prop_assert!(r == degrees.len() || row_ptr[r] * k >= i * nnz);
                prop_assert!(r == 0 || r == p.as_slice()[i - 1] || row_ptr[r - 1] * k < i * nnz);
            }
        }
    }
}

#[test]
fn contiguous_oracle_yields_identity_renumbering() {
    let mut g = common::random_symmetric(25, 0.2, 7);
    let mut x = common::random_vector(25, 8);
    let before = g.clone();
    let (p, renum) = partition_graph(&mut g, 3, &mut x, &ContiguousOracle, DEFAULT_IMBALANCE).unwrap();
    assert!(renum.is_identity());
    assert_eq!(g, before);
    assert_eq!(p, balanced_boundaries(before.row_ptr(), 3).unwrap());
}
