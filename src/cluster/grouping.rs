//! Grouping by a token embedded in the region identifier

use crate::hierarchy::{AggregationLevel, Cluster};

/// Group regions sharing the `position`-th token of their id split on
/// `separator`, e.g. `"01_es"` with `"_"` and position 1 groups under `"es"`.
///
/// Ids without that token form a group keyed by the full id. Groups appear in
/// first-seen order and are labelled by the token.
pub fn group_by_id_token(region_ids: &[String], separator: &str, position: usize) -> AggregationLevel {
    let mut groups: Vec<Cluster> = Vec::new();

    for id in region_ids {
        let token = id.split(separator).nth(position).unwrap_or(id.as_str());
        match groups.iter_mut().find(|c| c.id == token) {
            Some(cluster) => cluster.members.push(id.clone()),
            None => groups.push(Cluster {
                id: token.to_string(),
                members: vec![id.clone()],
                parents: None,
            }),
        }
    }

    log::info!("Grouped {} regions into {} id-token groups", region_ids.len(), groups.len());
    AggregationLevel::new(groups.len(), groups)
}
