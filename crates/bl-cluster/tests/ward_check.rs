use std::collections::BTreeMap;

use bl_cluster::ward_merge;

#[test]
fn returns_labels_unchanged_when_already_coarse_enough() {
    let centroids = vec![[0.0, 0.0], [5.0, 0.0], [10.0, 0.0]];
    let labels = vec![0, 1, 2, 1, 0];
    assert_eq!(ward_merge(&centroids, &labels, 3), labels);
    assert_eq!(ward_merge(&centroids, &labels, 5), labels);
}

#[test]
fn empty_input_yields_empty_output() {
    assert_eq!(ward_merge(&[], &[], 2), Vec::<usize>::new());
}

#[test]
fn merges_tight_pairs_before_distant_ones() {
    // Two tight pairs far apart: merging must unite each pair.
    let centroids = vec![[0.0, 0.0], [1.0, 0.0], [10.0, 0.0], [11.0, 0.0]];
    let labels = vec![0, 1, 2, 3];
    let merged = ward_merge(&centroids, &labels, 2);
    assert_eq!(merged.len(), 4);
    assert_eq!(merged[0], merged[1], "left pair stays together");
    assert_eq!(merged[2], merged[3], "right pair stays together");
    assert_ne!(merged[0], merged[2]);
    // Relabeling is contiguous from zero.
    let mut seen = merged.clone();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen, vec![0, 1]);
}

#[test]
fn merge_to_one_collapses_everything() {
    let centroids = vec![[0.0, 0.0], [4.0, 4.0], [9.0, 1.0]];
    let labels = vec![0, 0, 1, 2, 2, 2];
    let merged = ward_merge(&centroids, &labels, 1);
    assert!(merged.iter().all(|&label| label == 0));
}

#[test]
fn size_weighting_prefers_small_cluster_merges() {
    // A heavy cluster at the origin, two singletons nearby. Ward distance
    // grows with 2*ni*nj/(ni+nj), so the two singletons unite first even
    // though each sits slightly closer to the heavy cluster.
    let centroids = vec![[0.0, 0.0], [2.5, 1.5], [2.5, -1.5]];
    let labels = vec![0, 0, 0, 0, 0, 0, 0, 0, 1, 2];
    let merged = ward_merge(&centroids, &labels, 2);
    assert_eq!(merged[8], merged[9], "singletons merged together");
    assert_ne!(merged[0], merged[8]);
}

#[test]
fn partition_is_invariant_under_label_permutation() {
    let centroids = vec![[0.0, 0.0], [1.0, 0.0], [10.0, 0.0], [11.0, 0.0], [20.0, 0.0]];
    let labels = vec![0, 1, 2, 3, 4, 0, 2];
    let merged = ward_merge(&centroids, &labels, 2);

    // Permute the cluster id space with a bijection and re-run.
    let perm = [3usize, 0, 4, 1, 2];
    let permuted_centroids = {
        let mut out = vec![[0.0, 0.0]; 5];
        for (old, &new) in perm.iter().enumerate() {
            out[new] = centroids[old];
        }
        out
    };
    let permuted_labels: Vec<usize> = labels.iter().map(|&label| perm[label]).collect();
    let merged_permuted = ward_merge(&permuted_centroids, &permuted_labels, 2);

    // The two outputs must describe the same partition of the points.
    assert_eq!(partition_signature(&merged), partition_signature(&merged_permuted));
}

/// Canonical form of a label sequence: group indices by label, sorted.
fn partition_signature(labels: &[usize]) -> Vec<Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(idx);
    }
    let mut signature: Vec<Vec<usize>> = groups.into_values().collect();
    signature.sort();
    signature
}
