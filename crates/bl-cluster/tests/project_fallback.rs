use bl_cluster::{project_embeddings, UmapParams};

#[test]
fn neighbor_count_saturates_at_fifteen() {
    assert_eq!(UmapParams::for_samples(15).n_neighbors, 15);
    assert_eq!(UmapParams::for_samples(500).n_neighbors, 15);
}

#[test]
fn small_samples_shrink_the_neighborhood() {
    assert_eq!(UmapParams::for_samples(14).n_neighbors, 13);
    assert_eq!(UmapParams::for_samples(4).n_neighbors, 3);
    assert_eq!(UmapParams::for_samples(3).n_neighbors, 2);
    assert_eq!(UmapParams::for_samples(2).n_neighbors, 2);
    assert_eq!(UmapParams::for_samples(1).n_neighbors, 2);
}

#[test]
fn fixed_seed_and_two_components() {
    let params = UmapParams::for_samples(100);
    assert_eq!(params.n_components, 2);
    assert_eq!(params.seed, 42);
}

#[test]
fn empty_input_projects_to_nothing() {
    assert!(project_embeddings(&[]).is_empty());
}

#[test]
fn single_sample_projects_to_finite_origin() {
    let coords = project_embeddings(&[vec![3.0, -1.0, 2.0]]);
    assert_eq!(coords.len(), 1);
    assert!(coords[0][0].is_finite());
    assert!(coords[0][1].is_finite());
    assert!(coords[0][0].abs() < 1e-9, "centered single sample sits at the origin");
}

#[test]
fn collinear_embeddings_spread_along_one_axis() {
    let rows: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64, 0.0, 0.0, 0.0]).collect();
    let coords = project_embeddings(&rows);
    assert_eq!(coords.len(), 6);
    for point in &coords {
        assert!(point[0].is_finite() && point[1].is_finite());
        assert!(point[1].abs() < 1e-9, "no variance off the line");
    }
    // The x coordinates preserve the betweenness structure of the input.
    let mut xs: Vec<f64> = coords.iter().map(|point| point[0]).collect();
    let ascending = xs.windows(2).all(|pair| pair[0] < pair[1]);
    let descending = xs.windows(2).all(|pair| pair[0] > pair[1]);
    assert!(ascending || descending);
    xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert!(xs.last().unwrap() - xs.first().unwrap() > 1.0);
}

#[test]
fn projection_repeats_exactly() {
    let rows: Vec<Vec<f64>> = (0..12)
        .map(|i| vec![(i * 7 % 5) as f64, (i * 3 % 4) as f64, i as f64 * 0.25])
        .collect();
    let a = project_embeddings(&rows);
    let b = project_embeddings(&rows);
    assert_eq!(a, b);
}

#[test]
fn ragged_rows_are_zero_padded() {
    let rows = vec![vec![1.0, 0.0], vec![0.0], vec![-1.0, 0.0]];
    let coords = project_embeddings(&rows);
    assert_eq!(coords.len(), 3);
    assert!(coords.iter().all(|p| p[0].is_finite() && p[1].is_finite()));
}
