use crate::data::Dataset;
use crate::hash::{hash2, hash_str};
use crate::plot::catalog::Label;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

static NULL_LABEL: Label = None;

/// One renderable protein. Identity is `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRecord {
    pub id: Arc<str>,
    pub x: f64,
    pub y: f64,
    pub labels: BTreeMap<Arc<str>, Label>,
    /// Row of this protein in the dataset
    pub source_index: usize,
}

impl PointRecord {
    /// Label for `feature`; unknown features read as null
    pub fn label(&self, feature: &str) -> &Label {
        self.labels.get(feature).unwrap_or(&NULL_LABEL)
    }
}

/// Ordered chain of committed id-sets. Visible ids are the intersection of all
/// entries; an empty history filters nothing.
#[derive(Debug, Clone, Default)]
pub struct SplitHistory {
    splits: Vec<Arc<HashSet<Arc<str>>>>,
    signature: u64,
}

impl SplitHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a split. Entries are never modified afterwards.
    pub fn push(&mut self, ids: impl IntoIterator<Item = Arc<str>>) {
        let set: HashSet<Arc<str>> = ids.into_iter().collect();
        // Order-independent digest of the set
        let digest = set.iter().fold(set.len() as u64, |acc, id| acc ^ hash_str(id));
        self.signature = hash2(self.signature ^ 0x9e37_79b9, digest);
        self.splits.push(Arc::new(set));
    }

    /// Drop the most recent split
    pub fn pop(&mut self) -> bool {
        if self.splits.pop().is_none() {
            return false;
        }
        let splits = std::mem::take(&mut self.splits);
        self.signature = 0;
        for split in splits {
            self.push(split.iter().cloned());
        }
        true
    }

    pub fn clear(&mut self) {
        self.splits.clear();
        self.signature = 0;
    }

    pub fn len(&self) -> usize {
        self.splits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }

    /// Cache key component; equal histories produce equal signatures
    pub fn signature(&self) -> u64 {
        self.signature
    }

    /// True if both histories hold the same splits in the same order
    pub fn same_splits(&self, other: &SplitHistory) -> bool {
        self.splits == other.splits
    }

    /// True if `id` is in every split
    pub fn admits(&self, id: &str) -> bool {
        self.splits.iter().all(|split| split.contains(id))
    }
}

/// Build point records for one projection, keeping dataset order.
/// A missing projection yields an empty list.
pub fn filter_points(
    dataset: &Dataset,
    projection_index: usize,
    history: &SplitHistory,
) -> Vec<PointRecord> {
    let Some(projection) = dataset.projections.get(projection_index) else {
        return Vec::new();
    };

    dataset
        .ids
        .par_iter()
        .enumerate()
        .filter_map(|(row, id)| {
            let coord = projection.coordinates.get(row).copied().flatten()?;
            if !history.admits(id) {
                return None;
            }
            let labels = dataset
                .features
                .iter()
                .map(|f| (f.name.clone(), f.label_for(row)))
                .collect();
            Some(PointRecord {
                id: id.clone(),
                x: coord.x,
                y: coord.y,
                labels,
                source_index: row,
            })
        })
        .collect()
}

/// Caches filtered point lists per (projection, split history signature).
/// Each entry keeps the history it was built from; a hit whose splits differ
/// is a signature collision and gets rebuilt.
#[derive(Debug, Default)]
pub struct ProjectionFilter {
    cache: HashMap<(usize, u64), (SplitHistory, Arc<[PointRecord]>)>,
}

impl ProjectionFilter {
    const MAX_ENTRIES: usize = 16;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(
        &mut self,
        dataset: &Dataset,
        projection_index: usize,
        history: &SplitHistory,
    ) -> Arc<[PointRecord]> {
        let key = (projection_index, history.signature());
        match self.cache.get(&key) {
            Some((cached, points)) if cached.same_splits(history) => {
                log::debug!("projection cache hit for {:?}", key);
                return points.clone();
            }
            Some(_) => log::warn!("split signature collision for {:?}", key),
            None => {}
        }

        let points: Arc<[PointRecord]> = filter_points(dataset, projection_index, history).into();
        log::debug!(
            "projection {} filtered to {} points (split depth {})",
            projection_index,
            points.len(),
            history.len()
        );

        if self.cache.len() >= Self::MAX_ENTRIES {
            self.cache.clear();
        }
        self.cache.insert(key, (history.clone(), points.clone()));
        points
    }
}
