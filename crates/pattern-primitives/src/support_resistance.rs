/// A clustered support or resistance level (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SrLevel {
    pub price: f64,
    pub touches: usize,
    pub strength: f64,
}

/// Clusters `values` (typically recent highs for resistance, lows for
/// support) within `relative_distance` of each other into levels, keeping
/// only clusters with at least `min_touches` members. Returned sorted by
/// strength descending, then by price ascending (spec §4.4).
pub fn cluster_levels(values: &[f64], relative_distance: f64, min_touches: usize) -> Vec<SrLevel> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut clusters: Vec<Vec<f64>> = Vec::new();
    for &v in &sorted {
        match clusters.last_mut() {
            Some(cluster) => {
                let anchor = cluster[0];
                let threshold = if anchor.abs() < f64::EPSILON {
                    relative_distance
                } else {
                    anchor.abs() * relative_distance
                };
                if (v - anchor).abs() <= threshold {
                    cluster.push(v);
                } else {
                    clusters.push(vec![v]);
                }
            }
            None => clusters.push(vec![v]),
        }
    }

    let max_touches = clusters.iter().map(Vec::len).max().unwrap_or(1) as f64;
    let mut levels: Vec<SrLevel> = clusters
        .into_iter()
        .filter(|cluster| cluster.len() >= min_touches)
        .map(|cluster| {
            let touches = cluster.len();
            let price = cluster.iter().sum::<f64>() / touches as f64;
            SrLevel {
                price,
                touches,
                strength: touches as f64 / max_touches,
            }
        })
        .collect();

    levels.sort_by(|a, b| {
        b.strength
            .total_cmp(&a.strength)
            .then(a.price.total_cmp(&b.price))
    });
    levels
}
