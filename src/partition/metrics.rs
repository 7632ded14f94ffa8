//! Quality measures for a labelling.

use crate::matrix::Graph;

/// Number of edges whose endpoints carry different labels. Each stored
/// direction counts once, so a symmetric graph reports every cut edge twice.
pub fn edge_cut(graph: &Graph, labels: &[usize]) -> usize {
    (0..graph.nrows())
        .map(|r| {
            let (targets, _) = graph.row(r);
            targets.iter().filter(|&&t| labels[t] != labels[r]).count()
        })
        .sum()
}

pub fn part_sizes(labels: &[usize], parts: usize) -> Vec<usize> {
    let mut sizes = vec![0usize; parts];
    for &l in labels {
        if l < parts {
            sizes[l] += 1;
        }
    }
    sizes
}

/// Largest part relative to the mean part size, minus one.
pub fn imbalance(sizes: &[usize]) -> f64 {
    let total: usize = sizes.iter().sum();
    if sizes.is_empty() || total == 0 {
        return 0.0;
    }
    let mean = total as f64 / sizes.len() as f64;
    let max = sizes.iter().copied().max().unwrap_or(0) as f64;
    max / mean - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cut_counts_both_directions() {
        let g = Graph::from_triplets(3, 3, &[(0, 1, 1.0), (1, 0, 1.0), (1, 2, 1.0), (2, 1, 1.0)])
            .unwrap();
        assert_eq!(edge_cut(&g, &[0, 0, 1]), 2);
        assert_eq!(edge_cut(&g, &[0, 0, 0]), 0);
    }

    #[test]
    fn imbalance_of_sizes() {
        assert_relative_eq!(imbalance(&[5, 5]), 0.0);
        assert_relative_eq!(imbalance(&[6, 4]), 0.2);
        assert_relative_eq!(imbalance(&[]), 0.0);
    }
}
