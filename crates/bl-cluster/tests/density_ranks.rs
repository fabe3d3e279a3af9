use bl_cluster::{cluster_density, level_density_ranks, DENSITY_EPSILON};

#[test]
fn singleton_density_is_inverse_epsilon() {
    assert_eq!(cluster_density(&[[4.0, -2.0]]), 1.0 / DENSITY_EPSILON);
    assert_eq!(cluster_density(&[]), 1.0 / DENSITY_EPSILON);
}

#[test]
fn coincident_pair_density_is_inverse_epsilon() {
    let density = cluster_density(&[[1.0, 1.0], [1.0, 1.0]]);
    let expected = 1.0 / DENSITY_EPSILON;
    assert!((density - expected).abs() / expected < 1e-6);
}

#[test]
fn tighter_clusters_are_denser() {
    let tight = cluster_density(&[[0.0, 0.0], [0.1, 0.0], [0.0, 0.1]]);
    let loose = cluster_density(&[[0.0, 0.0], [5.0, 0.0], [0.0, 5.0]]);
    assert!(tight > loose);
}

#[test]
fn symmetric_pair_spread_matches_hand_computation() {
    // Two points 2 apart: center in the middle, every member 1 away.
    let density = cluster_density(&[[0.0, 0.0], [2.0, 0.0]]);
    assert!((density - 1.0 / (1.0 + DENSITY_EPSILON)).abs() < 1e-9);
}

#[test]
fn ranks_are_dense_and_percentiles_cover_the_level() {
    // Cluster 0 loose, cluster 1 tight, cluster 2 singleton (max density).
    let assignments = vec![0, 0, 1, 1, 2];
    let coords = vec![
        [0.0, 0.0],
        [8.0, 0.0],
        [20.0, 0.0],
        [20.2, 0.0],
        [40.0, 0.0],
    ];
    let ranks = level_density_ranks(&assignments, &coords);
    assert_eq!(ranks.len(), 3);

    assert_eq!(ranks[&2].density_rank, 1);
    assert_eq!(ranks[&1].density_rank, 2);
    assert_eq!(ranks[&0].density_rank, 3);

    let mut percentiles: Vec<f64> = ranks.values().map(|info| info.density_rank_percentile).collect();
    percentiles.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(percentiles, vec![1.0 / 3.0, 2.0 / 3.0, 1.0]);
}

#[test]
fn equal_densities_rank_lower_cluster_number_first() {
    let assignments = vec![0, 0, 1, 1];
    let coords = vec![[0.0, 0.0], [2.0, 0.0], [10.0, 0.0], [12.0, 0.0]];
    let ranks = level_density_ranks(&assignments, &coords);
    assert_eq!(ranks[&0].density_rank, 1);
    assert_eq!(ranks[&1].density_rank, 2);
    assert_eq!(ranks[&0].density_rank_percentile, 0.5);
    assert_eq!(ranks[&1].density_rank_percentile, 1.0);
}
