use crate::data::Feature;
use crate::plot::catalog::{label_text, Label, Swatch};
use crate::plot::filter::PointRecord;
use crate::plot::style::HiddenLabels;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Value a legend row stands for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LegendValue {
    Label(Label),
    Other,
}

impl fmt::Display for LegendValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegendValue::Label(label) => f.write_str(label_text(label)),
            LegendValue::Other => f.write_str("Other"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendItem {
    pub value: LegendValue,
    pub swatch: Swatch,
    pub count: usize,
    pub is_visible: bool,
    /// 0 is the first row and paints on top
    pub z_order: usize,
    pub extracted_from_other: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LegendSettings {
    /// Labels shown individually before the rest fold into Other
    #[serde(default = "default_max_visible")]
    pub max_visible: usize,

    #[serde(default = "default_true")]
    pub include_other: bool,
}

fn default_max_visible() -> usize { 10 }
fn default_true() -> bool { true }

impl Default for LegendSettings {
    fn default() -> Self {
        Self {
            max_visible: default_max_visible(),
            include_other: true,
        }
    }
}

/// User decisions that survive re-aggregation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegendMemory {
    /// Labels pulled out of Other, in extraction order
    pub extracted: Vec<Label>,
    /// Row order from the last drag-reorder, keyed by value
    pub order: Option<Vec<LegendValue>>,
}

/// One aggregation result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    /// Rows sorted by z-order
    pub items: Vec<LegendItem>,
    /// Labels folded into Other with their counts, most frequent first
    pub other_members: Vec<(Label, usize)>,
    /// Every label in the point stream with its count, most frequent first
    pub counts: Vec<(Label, usize)>,
}

/// Label frequencies, most frequent first; ties keep first-appearance order
pub fn count_labels(points: &[PointRecord], feature: &str) -> Vec<(Label, usize)> {
    let mut slots: HashMap<&Label, usize> = HashMap::new();
    let mut counts: Vec<(Label, usize)> = Vec::new();
    for p in points {
        let label = p.label(feature);
        match slots.get(label) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                slots.insert(label, counts.len());
                counts.push((label.clone(), 1));
            }
        }
    }
    // Stable sort keeps first appearance among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Build legend rows for the active feature over `points`
pub fn aggregate(
    points: &[PointRecord],
    feature: Option<&Feature>,
    settings: &LegendSettings,
    memory: &LegendMemory,
    hidden: &HiddenLabels,
) -> Aggregate {
    let Some(feature) = feature else {
        return Aggregate::default();
    };
    let counts = count_labels(points, &feature.name);
    if counts.is_empty() {
        return Aggregate::default();
    }

    let cutoff = settings.max_visible.min(counts.len());
    let (top, rest) = counts.split_at(cutoff);

    let row = |label: &Label, count: usize, extracted: bool| LegendItem {
        value: LegendValue::Label(label.clone()),
        swatch: feature.catalog.swatch(label),
        count,
        is_visible: !hidden.contains(label),
        z_order: 0,
        extracted_from_other: extracted,
    };

    let mut items: Vec<LegendItem> = top.iter().map(|(l, c)| row(l, *c, false)).collect();

    // Null below the cutoff gets its own row only when there is no Other
    if !settings.include_other {
        if let Some((label, count)) = rest.iter().find(|(l, _)| l.is_none()) {
            items.push(row(label, *count, false));
        }
    }

    // Extracted labels bypass the cutoff; absent ones simply have no row
    let mut extracted_rows: HashSet<&Label> = HashSet::new();
    for label in &memory.extracted {
        if let Some((_, count)) = rest.iter().find(|(l, _)| l == label) {
            if extracted_rows.insert(label) && !items.iter().any(|i| i.value == LegendValue::Label(label.clone())) {
                items.push(row(label, *count, true));
            }
        }
    }

    let mut other_members: Vec<(Label, usize)> = Vec::new();
    if settings.include_other {
        other_members = rest
            .iter()
            .filter(|(l, _)| !extracted_rows.contains(l))
            .cloned()
            .collect();
        let other_count: usize = other_members.iter().map(|(_, c)| c).sum();
        if other_count > 0 {
            let all_hidden = other_members.iter().all(|(l, _)| hidden.contains(l));
            items.push(LegendItem {
                value: LegendValue::Other,
                swatch: Swatch::NEUTRAL,
                count: other_count,
                is_visible: !all_hidden,
                z_order: 0,
                extracted_from_other: false,
            });
        }
    }

    if let Some(order) = &memory.order {
        let position: HashMap<&LegendValue, usize> =
            order.iter().enumerate().map(|(i, v)| (v, i)).collect();
        items.sort_by_key(|item| position.get(&item.value).copied().unwrap_or(usize::MAX));
    }
    for (z, item) in items.iter_mut().enumerate() {
        item.z_order = z;
    }

    log::debug!(
        "legend for '{}': {} rows, {} labels in Other",
        feature.name,
        items.len(),
        other_members.len()
    );

    Aggregate {
        items,
        other_members,
        counts,
    }
}

/// Move `dragged` to `target`'s position and renumber every z-order.
/// Unknown values leave the order unchanged.
pub fn reorder(items: &[LegendItem], dragged: &LegendValue, target: &LegendValue) -> Vec<LegendItem> {
    let mut out = items.to_vec();
    let from = items.iter().position(|i| &i.value == dragged);
    let to = items.iter().position(|i| &i.value == target);
    if let (Some(from), Some(to)) = (from, to) {
        let moved = out.remove(from);
        out.insert(to, moved);
    }
    for (z, item) in out.iter_mut().enumerate() {
        item.z_order = z;
    }
    out
}

impl Aggregate {
    pub fn item(&self, value: &LegendValue) -> Option<&LegendItem> {
        self.items.iter().find(|i| &i.value == value)
    }

    /// Sum of all row counts
    pub fn total(&self) -> usize {
        self.items.iter().map(|i| i.count).sum()
    }

    /// Labels currently folded into Other
    pub fn other_set(&self) -> HashSet<Label> {
        self.other_members.iter().map(|(l, _)| l.clone()).collect()
    }

    /// Paint layer per label. Other members share the Other row's z-order;
    /// labels without a row are absent.
    pub fn z_order_map(&self) -> HashMap<Label, usize> {
        let mut map = HashMap::with_capacity(self.items.len() + self.other_members.len());
        for item in &self.items {
            match &item.value {
                LegendValue::Label(label) => {
                    map.insert(label.clone(), item.z_order);
                }
                LegendValue::Other => {
                    for (label, _) in &self.other_members {
                        map.insert(label.clone(), item.z_order);
                    }
                }
            }
        }
        map
    }

    /// Labels a row stands for
    fn labels_of(&self, value: &LegendValue) -> Vec<Label> {
        match value {
            LegendValue::Label(label) => vec![label.clone()],
            LegendValue::Other => self.other_members.iter().map(|(l, _)| l.clone()).collect(),
        }
    }

    /// Single click: flip a row. Other flips all its members together: if most
    /// are hidden they are all shown, otherwise all hidden.
    pub fn toggle(&self, value: &LegendValue, hidden: &mut HiddenLabels) {
        match value {
            LegendValue::Label(label) => {
                hidden.toggle(label);
            }
            LegendValue::Other => {
                let members = self.labels_of(value);
                if members.is_empty() {
                    return;
                }
                let hidden_count = members.iter().filter(|l| hidden.contains(l)).count();
                if hidden_count * 2 > members.len() {
                    for label in &members {
                        hidden.remove(label);
                    }
                } else {
                    hidden.extend(members);
                }
            }
        }
    }

    /// Double click: show only this row, or everything again if it already is
    /// the only visible row.
    pub fn isolate(&self, value: &LegendValue, hidden: &mut HiddenLabels) {
        if self.item(value).is_none() {
            return;
        }
        let mut visible = self.items.iter().filter(|i| i.is_visible);
        let only_visible = matches!(
            (visible.next(), visible.next()),
            (Some(item), None) if &item.value == value
        );

        if only_visible {
            hidden.clear();
            return;
        }

        let keep: HashSet<Label> = self.labels_of(value).into_iter().collect();
        hidden.clear();
        hidden.extend(
            self.counts
                .iter()
                .map(|(l, _)| l)
                .filter(|l| !keep.contains(*l))
                .cloned(),
        );
    }
}

/// Legend state: settings, remembered user decisions and the latest aggregate
#[derive(Debug, Clone, Default)]
pub struct Legend {
    pub settings: LegendSettings,
    memory: LegendMemory,
    current: Aggregate,
}

impl Legend {
    pub fn new(settings: LegendSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Re-aggregate from the current point stream
    pub fn recompute(&mut self, points: &[PointRecord], feature: Option<&Feature>, hidden: &HiddenLabels) {
        self.current = aggregate(points, feature, &self.settings, &self.memory, hidden);
    }

    pub fn current(&self) -> &Aggregate {
        &self.current
    }

    pub fn items(&self) -> &[LegendItem] {
        &self.current.items
    }

    pub fn memory(&self) -> &LegendMemory {
        &self.memory
    }

    /// Forget extractions and custom order, e.g. on feature change
    pub fn forget(&mut self) {
        self.memory = LegendMemory::default();
    }

    /// Promote an Other member to its own row. Takes effect on the next
    /// [`Legend::recompute`]. Returns false if `label` is not in Other.
    pub fn extract(&mut self, label: &Label) -> bool {
        if !self.current.other_members.iter().any(|(l, _)| l == label) {
            return false;
        }
        self.memory.extracted.push(label.clone());
        true
    }

    /// Undo an extraction. Takes effect on the next recompute.
    pub fn return_to_other(&mut self, label: &Label) -> bool {
        let before = self.memory.extracted.len();
        self.memory.extracted.retain(|l| l != label);
        if let Some(order) = &mut self.memory.order {
            order.retain(|v| v != &LegendValue::Label(label.clone()));
        }
        self.memory.extracted.len() != before
    }

    /// Drag-reorder; applied immediately and remembered
    pub fn reorder(&mut self, dragged: &LegendValue, target: &LegendValue) {
        self.current.items = reorder(&self.current.items, dragged, target);
        self.memory.order = Some(self.current.items.iter().map(|i| i.value.clone()).collect());
    }
}
