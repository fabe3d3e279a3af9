//! Ward-linkage agglomeration over KMeans centroids.

use std::collections::BTreeMap;

use crate::kmeans::squared_distance;

/// Merges the clusters described by `centroids` and `labels` bottom-up with
/// Ward linkage until `target` clusters remain, then relabels the
/// assignments onto the contiguous range `0..target`.
///
/// Ties on the minimum Ward distance break lexicographically on
/// `(min(i, j), max(i, j))`, so the merge order never depends on container
/// iteration order. The merged cluster keeps the smaller of the two ids,
/// which makes a group's representative id equal to its minimum member.
pub fn ward_merge(centroids: &[[f64; 2]], labels: &[usize], target: usize) -> Vec<usize> {
    if labels.is_empty() {
        return Vec::new();
    }
    let target = target.max(1);

    let mut groups: BTreeMap<usize, Group> = BTreeMap::new();
    for &label in labels {
        let group = groups.entry(label).or_insert_with(|| Group {
            centroid: centroids[label],
            size: 0,
        });
        group.size += 1;
    }
    if groups.len() <= target {
        return labels.to_vec();
    }

    // owner[original label] = key of the group currently holding it.
    let mut owner: BTreeMap<usize, usize> = groups.keys().map(|&key| (key, key)).collect();

    while groups.len() > target {
        let (low, high) = closest_pair(&groups);
        let merged = {
            let a = &groups[&low];
            let b = &groups[&high];
            let total = (a.size + b.size) as f64;
            Group {
                centroid: [
                    (a.centroid[0] * a.size as f64 + b.centroid[0] * b.size as f64) / total,
                    (a.centroid[1] * a.size as f64 + b.centroid[1] * b.size as f64) / total,
                ],
                size: a.size + b.size,
            }
        };
        groups.remove(&high);
        groups.insert(low, merged);
        for value in owner.values_mut() {
            if *value == high {
                *value = low;
            }
        }
    }

    // Representative group keys, ascending, remapped to 0..target.
    let remap: BTreeMap<usize, usize> = groups
        .keys()
        .enumerate()
        .map(|(new_label, &key)| (key, new_label))
        .collect();

    labels.iter().map(|label| remap[&owner[label]]).collect()
}

struct Group {
    centroid: [f64; 2],
    size: usize,
}

/// Ward distance `sqrt(2 n_i n_j / (n_i + n_j) * ||c_i - c_j||^2)`.
fn ward_distance(a: &Group, b: &Group) -> f64 {
    let ni = a.size as f64;
    let nj = b.size as f64;
    (2.0 * ni * nj / (ni + nj) * squared_distance(&a.centroid, &b.centroid)).sqrt()
}

fn closest_pair(groups: &BTreeMap<usize, Group>) -> (usize, usize) {
    let keys: Vec<usize> = groups.keys().copied().collect();
    let mut best: Option<(usize, usize)> = None;
    let mut best_dist = f64::INFINITY;
    for (pos, &i) in keys.iter().enumerate() {
        for &j in &keys[pos + 1..] {
            let dist = ward_distance(&groups[&i], &groups[&j]);
            // Ascending (i, j) iteration makes the first strict minimum the
            // lexicographically smallest pair among equal distances.
            if dist < best_dist {
                best_dist = dist;
                best = Some((i, j));
            }
        }
    }
    best.expect("at least two groups are present while merging")
}
