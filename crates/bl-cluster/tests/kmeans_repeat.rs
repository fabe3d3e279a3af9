use bl_cluster::{kmeans, KmeansOptions};
use bl_core::BlError;

fn grid_points(n: usize) -> Vec<[f64; 2]> {
    (0..n)
        .map(|i| [(i % 7) as f64 + (i as f64) * 0.013, (i / 7) as f64])
        .collect()
}

#[test]
fn identical_seeds_repeat_bitwise() {
    let points = grid_points(40);
    let opts = KmeansOptions::default();
    let a = kmeans(&points, 6, 42, &opts).expect("fit");
    let b = kmeans(&points, 6, 42, &opts).expect("fit");
    assert_eq!(a.labels, b.labels);
    assert_eq!(a.centroids, b.centroids);
    assert_eq!(a.inertia.to_bits(), b.inertia.to_bits());
}

#[test]
fn different_seeds_may_disagree_but_stay_valid() {
    let points = grid_points(30);
    let opts = KmeansOptions::default();
    let fit = kmeans(&points, 5, 7, &opts).expect("fit");
    assert_eq!(fit.labels.len(), 30);
    assert!(fit.labels.iter().all(|&label| label < 5));
    assert!(fit.inertia.is_finite());
    assert!(fit.inertia >= 0.0);
}

#[test]
fn k_equal_n_gives_zero_inertia() {
    let points: Vec<[f64; 2]> = (0..6).map(|i| [i as f64 * 3.0, 0.0]).collect();
    let fit = kmeans(&points, 6, 42, &KmeansOptions::default()).expect("fit");
    assert!(fit.inertia.abs() < 1e-12);
    let mut sorted = fit.labels.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), 6, "every point sits in its own cluster");
}

#[test]
fn rejects_zero_clusters() {
    let points = grid_points(5);
    match kmeans(&points, 0, 42, &KmeansOptions::default()) {
        Err(BlError::Clustering(info)) => assert_eq!(info.code, "invalid-input"),
        other => panic!("expected clustering error, got {other:?}"),
    }
}

#[test]
fn rejects_more_clusters_than_points() {
    let points = grid_points(4);
    match kmeans(&points, 5, 42, &KmeansOptions::default()) {
        Err(BlError::Clustering(info)) => {
            assert_eq!(info.code, "invalid-input");
            assert_eq!(info.context.get("k").map(String::as_str), Some("5"));
        }
        other => panic!("expected clustering error, got {other:?}"),
    }
}

#[test]
fn coincident_points_converge() {
    let points = vec![[1.0, 1.0]; 8];
    let fit = kmeans(&points, 3, 42, &KmeansOptions::default()).expect("fit");
    assert_eq!(fit.labels.len(), 8);
    assert!(fit.inertia.abs() < 1e-12);
}

#[test]
fn well_separated_blobs_recover_membership() {
    let mut points = Vec::new();
    for i in 0..10 {
        points.push([i as f64 * 0.01, 0.0]);
    }
    for i in 0..10 {
        points.push([100.0 + i as f64 * 0.01, 0.0]);
    }
    let fit = kmeans(&points, 2, 42, &KmeansOptions::default()).expect("fit");
    let left = fit.labels[0];
    assert!(fit.labels[..10].iter().all(|&label| label == left));
    assert!(fit.labels[10..].iter().all(|&label| label != left));
}
