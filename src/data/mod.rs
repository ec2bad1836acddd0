use crate::error::{Result, ViewerError};
use crate::hash::{hash3, rand_simple};
use crate::plot::catalog::{FeatureCatalog, Label};
use glam::DVec2;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// One projection as found in the dataset file
#[derive(Debug, Clone, Deserialize)]
pub struct RawProjection {
    pub name: String,
    /// Per-id coordinates; extra dimensions beyond x/y are ignored
    #[serde(alias = "data", default)]
    pub coordinates: Vec<Vec<f64>>,
}

/// One feature's label catalog as found in the dataset file
#[derive(Debug, Clone, Deserialize)]
pub struct RawFeature {
    #[serde(alias = "values", default)]
    pub labels: Vec<Option<String>>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub shapes: Vec<String>,
}

/// The loader's data contract, before validation
#[derive(Debug, Clone, Deserialize)]
pub struct RawDataset {
    #[serde(alias = "protein_ids")]
    pub ids: Vec<String>,
    #[serde(default)]
    pub projections: Vec<RawProjection>,
    #[serde(default)]
    pub features: BTreeMap<String, RawFeature>,
    #[serde(alias = "feature_data", alias = "featureIndices", default)]
    pub feature_indices: BTreeMap<String, Vec<Option<i64>>>,
}

/// A named 2-D projection. `None` marks ids without a usable coordinate.
#[derive(Debug, Clone)]
pub struct Projection {
    pub name: String,
    pub coordinates: Vec<Option<DVec2>>,
}

/// A categorical feature with its validated catalog and per-id label indices
#[derive(Debug, Clone)]
pub struct Feature {
    pub name: Arc<str>,
    pub catalog: FeatureCatalog,
    /// Raw index into the catalog per id; negative means missing
    pub indices: Vec<i64>,
}

impl Feature {
    /// Label of the id at `row`; missing or out-of-range indices are null
    pub fn label_for(&self, row: usize) -> Label {
        self.indices
            .get(row)
            .and_then(|&i| self.catalog.label_at(i))
    }
}

/// Validated dataset handed to the plot core
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub ids: Vec<Arc<str>>,
    pub projections: Vec<Projection>,
    pub features: Vec<Feature>,
}

impl Dataset {
    /// Validate a raw dataset. Never fails; malformed parts become defaults.
    pub fn from_raw(raw: RawDataset) -> Self {
        let ids: Vec<Arc<str>> = raw.ids.into_iter().map(Arc::from).collect();

        let projections = raw
            .projections
            .into_iter()
            .map(|p| {
                if p.coordinates.len() < ids.len() {
                    log::warn!(
                        "projection '{}' has {} coordinates for {} ids",
                        p.name,
                        p.coordinates.len(),
                        ids.len()
                    );
                }
                let coordinates = p
                    .coordinates
                    .iter()
                    .map(|c| match c.as_slice() {
                        [x, y, ..] if x.is_finite() && y.is_finite() => Some(DVec2::new(*x, *y)),
                        _ => None,
                    })
                    .collect();
                Projection {
                    name: p.name,
                    coordinates,
                }
            })
            .collect();

        let mut feature_indices = raw.feature_indices;
        let features = raw
            .features
            .into_iter()
            .map(|(name, f)| {
                let labels: Vec<Label> = f.labels.into_iter().map(|l| l.map(Arc::from)).collect();
                let catalog = FeatureCatalog::from_raw(&name, labels, &f.colors, &f.shapes);
                let indices = feature_indices
                    .remove(&name)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|i| i.unwrap_or(-1))
                    .collect();
                Feature {
                    name: Arc::from(name.as_str()),
                    catalog,
                    indices,
                }
            })
            .collect();

        Self {
            ids,
            projections,
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.features.iter().find(|f| &*f.name == name)
    }

    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| &*f.name == name)
    }
}

/// Load a dataset from a JSON file following the dataset contract
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let mut bytes = fs::read(path).map_err(|e| ViewerError::io(path, e))?;
    let raw: RawDataset = simd_json::serde::from_slice(&mut bytes)?;
    let dataset = Dataset::from_raw(raw);
    log::info!(
        "loaded {} proteins, {} projections, {} features from {}",
        dataset.len(),
        dataset.projections.len(),
        dataset.features.len(),
        path.display()
    );
    Ok(dataset)
}

const FAMILY_COLORS: [&str; 14] = [
    "#e6194b", "#3cb44b", "#ffe119", "#4363d8", "#f58231", "#911eb4", "#46f0f0",
    "#f032e6", "#bcf60c", "#fabebe", "#008080", "#e6beff", "#9a6324", "#fffac8",
];
const FAMILY_SHAPES: [&str; 7] = ["circle", "square", "diamond", "triangle", "star", "cross", "wye"];

/// Generate a deterministic clustered dataset for when no file is given
pub fn generate_demo_dataset(n: usize) -> Dataset {
    let families = FAMILY_COLORS.len();

    // Cluster centers on a loose spiral
    let centers: Vec<DVec2> = (0..families)
        .map(|k| {
            let t = k as f64 * 0.9;
            DVec2::new((1.0 + t) * t.cos(), (1.0 + t) * t.sin()) * 3.0
        })
        .collect();

    let mut ids = Vec::with_capacity(n);
    let mut umap = Vec::with_capacity(n);
    let mut pca = Vec::with_capacity(n);
    let mut family_idx = Vec::with_capacity(n);
    let mut kingdom_idx = Vec::with_capacity(n);

    for i in 0..n {
        let seed = i as u64;
        ids.push(format!("P{:05}", i));

        // Skewed family distribution: low indices are much more common
        let r = rand_simple(hash3(seed, 1, 0));
        let family = ((r * r * families as f64) as usize).min(families - 1);

        // Box-Muller for roughly gaussian spread
        let u1 = rand_simple(hash3(seed, 2, 0)).max(1e-12);
        let u2 = rand_simple(hash3(seed, 3, 0));
        let mag = (-2.0 * u1.ln()).sqrt() * 1.2;
        let angle = u2 * std::f64::consts::TAU;
        let p = centers[family] + DVec2::new(mag * angle.cos(), mag * angle.sin());
        umap.push(vec![p.x, p.y]);
        pca.push(vec![p.x * 0.7 + p.y * 0.3, p.y * 0.5 - p.x * 0.2]);

        // ~5% of proteins have no family annotation
        let missing = rand_simple(hash3(seed, 4, 0)) < 0.05;
        family_idx.push(if missing { Some(families as i64) } else { Some(family as i64) });
        kingdom_idx.push(Some((family % 3) as i64 + i64::from(rand_simple(hash3(seed, 5, 0)) < 0.1)));
    }

    let mut family_labels: Vec<Option<String>> =
        (0..families).map(|k| Some(format!("PF{:05}", 100 + k * 37))).collect();
    family_labels.push(None);
    let mut family_colors: Vec<String> = FAMILY_COLORS.iter().map(|c| c.to_string()).collect();
    family_colors.push("#cccccc".to_string());
    let family_shapes: Vec<String> = (0..=families)
        .map(|k| FAMILY_SHAPES[k % FAMILY_SHAPES.len()].to_string())
        .collect();

    let raw = RawDataset {
        ids,
        projections: vec![
            RawProjection {
                name: "UMAP".to_string(),
                coordinates: umap,
            },
            RawProjection {
                name: "PCA".to_string(),
                coordinates: pca,
            },
        ],
        features: BTreeMap::from([
            (
                "family".to_string(),
                RawFeature {
                    labels: family_labels,
                    colors: family_colors,
                    shapes: family_shapes,
                },
            ),
            (
                "kingdom".to_string(),
                RawFeature {
                    labels: vec![
                        Some("Bacteria".to_string()),
                        Some("Archaea".to_string()),
                        Some("Eukaryota".to_string()),
                        Some("Viruses".to_string()),
                    ],
                    colors: vec![
                        "#1f77b4".to_string(),
                        "#ff7f0e".to_string(),
                        "#2ca02c".to_string(),
                        "#d62728".to_string(),
                    ],
                    shapes: vec![
                        "circle".to_string(),
                        "square".to_string(),
                        "triangle".to_string(),
                        "diamond".to_string(),
                    ],
                },
            ),
        ]),
        feature_indices: BTreeMap::from([
            ("family".to_string(), family_idx),
            ("kingdom".to_string(), kingdom_idx),
        ]),
    };

    Dataset::from_raw(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"{
        "protein_ids": ["A", "B", "C"],
        "projections": [{"name": "UMAP", "data": [[0.0, 1.0], [2.0, 3.0, 9.0], [4.0]]}],
        "features": {
            "family": {"values": ["f1", null], "colors": ["#ff0000", "#00ff00"], "shapes": ["circle", "square"]}
        },
        "feature_data": {"family": [0, 1, 7]}
    }"##;

    #[test]
    fn test_parse_contract_with_aliases() {
        let mut bytes = SAMPLE.as_bytes().to_vec();
        let raw: RawDataset = simd_json::serde::from_slice(&mut bytes).unwrap();
        let ds = Dataset::from_raw(raw);

        assert_eq!(ds.len(), 3);
        assert_eq!(ds.projections[0].coordinates[1], Some(DVec2::new(2.0, 3.0)));
        assert_eq!(ds.projections[0].coordinates[2], None);

        let family = ds.feature("family").unwrap();
        assert_eq!(family.label_for(0).as_deref(), Some("f1"));
        assert_eq!(family.label_for(1), None);
        // Out-of-range index resolves to null
        assert_eq!(family.label_for(2), None);
        // Missing row resolves to null
        assert_eq!(family.label_for(99), None);
    }

    #[test]
    fn test_missing_feature_indices_are_null() {
        let raw = RawDataset {
            ids: vec!["A".to_string()],
            projections: vec![],
            features: BTreeMap::from([(
                "family".to_string(),
                RawFeature {
                    labels: vec![Some("x".to_string())],
                    colors: vec![],
                    shapes: vec![],
                },
            )]),
            feature_indices: BTreeMap::new(),
        };
        let ds = Dataset::from_raw(raw);
        assert_eq!(ds.features[0].label_for(0), None);
    }

    #[test]
    fn test_demo_dataset_is_deterministic() {
        let a = generate_demo_dataset(500);
        let b = generate_demo_dataset(500);
        assert_eq!(a.ids, b.ids);
        assert_eq!(a.projections[0].coordinates, b.projections[0].coordinates);
        assert_eq!(a.projections.len(), 2);
        assert!(a.feature("family").is_some());
        assert!(a.feature("kingdom").is_some());
    }
}
