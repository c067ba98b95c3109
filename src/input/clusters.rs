//! Row grouping for random-intercept clusters.

use std::collections::BTreeMap;

/// Dense cluster index built from arbitrary cluster labels.
///
/// Clusters are numbered in ascending label order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterIndex {
    row_to_cluster: Vec<usize>,
    cluster_rows: Vec<Vec<usize>>,
}

impl ClusterIndex {
    #[must_use]
    pub fn from_ids(cluster_ids: &[u64]) -> Self {
        let mut grouped: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
        for (row, cluster_id) in cluster_ids.iter().copied().enumerate() {
            grouped.entry(cluster_id).or_default().push(row);
        }

        let mut row_to_cluster = vec![0; cluster_ids.len()];
        let mut cluster_rows = Vec::with_capacity(grouped.len());
        for (cluster, rows) in grouped.into_values().enumerate() {
            for row in &rows {
                row_to_cluster[*row] = cluster;
            }
            cluster_rows.push(rows);
        }

        Self {
            row_to_cluster,
            cluster_rows,
        }
    }

    #[must_use]
    pub const fn n_clusters(&self) -> usize {
        self.cluster_rows.len()
    }

    #[must_use]
    pub const fn n_rows(&self) -> usize {
        self.row_to_cluster.len()
    }

    #[must_use]
    pub fn cluster_of(&self, row: usize) -> usize {
        self.row_to_cluster[row]
    }

    #[must_use]
    pub fn rows(&self, cluster: usize) -> &[usize] {
        &self.cluster_rows[cluster]
    }
}
