//! Shared graph generators for the integration tests.
#![allow(dead_code)]

use halo_spmv::matrix::{CsrBuilder, Graph};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Undirected ring 0-1-..-(n-1)-0 with unit weights.
pub fn ring(n: usize) -> Graph {
    let mut b = CsrBuilder::new(n, n);
    for v in 0..n {
        b.push_symmetric(v, (v + 1) % n, 1.0);
    }
    b.build().unwrap()
}

/// Random symmetric graph with weights in [0.5, 1.5); reproducible from `seed`.
pub fn random_symmetric(n: usize, edge_prob: f64, seed: u64) -> Graph {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut b = CsrBuilder::new(n, n);
    for u in 0..n {
        for v in (u + 1)..n {
            if rng.r#gen::<f64>() < edge_prob {
                b.push_symmetric(u, v, 0.5 + rng.r#gen::<f64>());
            }
        }
    }
    b.build().unwrap()
}

pub fn random_vector(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.r#gen::<f64>() - 0.5).collect()
}

/// Serial reference: `steps` repeated products.
pub fn serial_iterate(g: &Graph, x: &[f64], steps: usize) -> Vec<f64> {
    use halo_spmv::matrix::SparseMatrix;
    let mut cur = x.to_vec();
    let mut next = vec![0.0; x.len()];
    for _ in 0..steps {
        g.spmv(&cur, &mut next);
        std::mem::swap(&mut cur, &mut next);
    }
    cur
}
