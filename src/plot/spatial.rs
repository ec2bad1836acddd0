use glam::DVec2;

/// Items per leaf before it splits
const LEAF_CAPACITY: usize = 8;
/// Coincident points stop splitting here
const MAX_DEPTH: usize = 16;

#[derive(Debug)]
enum NodeKind {
    Leaf(Vec<usize>),
    /// Children ordered top-left, top-right, bottom-left, bottom-right
    Branch([usize; 4]),
}

#[derive(Debug)]
struct Node {
    min: DVec2,
    max: DVec2,
    kind: NodeKind,
}

impl Node {
    /// Squared distance from `p` to this node's bounds (0 inside)
    #[inline(always)]
    fn distance_sq(&self, p: DVec2) -> f64 {
        let clamped = p.clamp(self.min, self.max);
        p.distance_squared(clamped)
    }

    #[inline(always)]
    fn intersects(&self, min: DVec2, max: DVec2) -> bool {
        self.min.x <= max.x && self.max.x >= min.x && self.min.y <= max.y && self.max.y >= min.y
    }
}

/// Static point quadtree over screen-space positions.
/// Built once per visible point set and never mutated; rebuild instead.
/// Queries return indices into the item list handed to [`Quadtree::build`].
#[derive(Debug)]
pub struct Quadtree<T> {
    items: Vec<(DVec2, T)>,
    nodes: Vec<Node>,
}

impl<T> Quadtree<T> {
    /// Build over `(position, payload)` pairs
    pub fn build(items: impl IntoIterator<Item = (DVec2, T)>) -> Self {
        let items: Vec<(DVec2, T)> = items.into_iter().collect();
        let mut tree = Self {
            items,
            nodes: Vec::new(),
        };
        if tree.items.is_empty() {
            return tree;
        }

        let (min, max) = tree.items.iter().fold(
            (DVec2::splat(f64::INFINITY), DVec2::splat(f64::NEG_INFINITY)),
            |(min, max), (p, _)| (min.min(*p), max.max(*p)),
        );
        let members = (0..tree.items.len()).collect();
        tree.build_node(min, max, members, 0);
        log::debug!("quadtree built: {} items, {} nodes", tree.items.len(), tree.nodes.len());
        tree
    }

    fn build_node(&mut self, min: DVec2, max: DVec2, members: Vec<usize>, depth: usize) -> usize {
        let id = self.nodes.len();
        if members.len() <= LEAF_CAPACITY || depth >= MAX_DEPTH {
            self.nodes.push(Node {
                min,
                max,
                kind: NodeKind::Leaf(members),
            });
            return id;
        }

        self.nodes.push(Node {
            min,
            max,
            kind: NodeKind::Leaf(Vec::new()),
        });

        let mid = (min + max) * 0.5;
        let mut quads: [Vec<usize>; 4] = Default::default();
        for i in members {
            let p = self.items[i].0;
            let q = usize::from(p.x >= mid.x) + 2 * usize::from(p.y >= mid.y);
            quads[q].push(i);
        }

        let mut children = [0usize; 4];
        for (q, bucket) in quads.into_iter().enumerate() {
            let right = q & 1 != 0;
            let bottom = q & 2 != 0;
            let cmin = DVec2::new(if right { mid.x } else { min.x }, if bottom { mid.y } else { min.y });
            let cmax = DVec2::new(if right { max.x } else { mid.x }, if bottom { max.y } else { mid.y });
            children[q] = self.build_node(cmin, cmax, bucket, depth + 1);
        }
        self.nodes[id].kind = NodeKind::Branch(children);
        id
    }

    /// Nearest item within `radius` of `(x, y)`, inclusive
    pub fn find_nearest(&self, x: f64, y: f64, radius: f64) -> Option<usize> {
        if self.nodes.is_empty() || !(radius >= 0.0) {
            return None;
        }
        let target = DVec2::new(x, y);
        let mut best: Option<usize> = None;
        let mut best_d2 = radius * radius;
        let mut stack = vec![0usize];

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if node.distance_sq(target) > best_d2 {
                continue;
            }
            match &node.kind {
                NodeKind::Leaf(members) => {
                    for &i in members {
                        let d2 = self.items[i].0.distance_squared(target);
                        if d2 < best_d2 || (best.is_none() && d2 <= best_d2) {
                            best = Some(i);
                            best_d2 = d2;
                        }
                    }
                }
                NodeKind::Branch(children) => {
                    // Closest child last so it is popped first
                    let mut ordered = *children;
                    ordered.sort_by(|a, b| {
                        let da = self.nodes[*a].distance_sq(target);
                        let db = self.nodes[*b].distance_sq(target);
                        db.total_cmp(&da)
                    });
                    stack.extend_from_slice(&ordered);
                }
            }
        }
        best
    }

    /// All items inside the rectangle, bounds inclusive and in either corner
    /// order. Results come back in tree traversal order.
    pub fn query_rect(&self, x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<usize> {
        let mut results = Vec::new();
        if self.nodes.is_empty() {
            return results;
        }
        let min = DVec2::new(x0.min(x1), y0.min(y1));
        let max = DVec2::new(x0.max(x1), y0.max(y1));
        let mut stack = vec![0usize];

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if !node.intersects(min, max) {
                continue;
            }
            match &node.kind {
                NodeKind::Leaf(members) => {
                    results.extend(members.iter().copied().filter(|&i| {
                        let p = self.items[i].0;
                        p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y
                    }));
                }
                NodeKind::Branch(children) => {
                    stack.extend(children.iter().rev());
                }
            }
        }
        results
    }

    /// Get item by index
    #[inline(always)]
    pub fn get(&self, idx: usize) -> Option<&(DVec2, T)> {
        self.items.get(idx)
    }

    #[inline(always)]
    pub fn items(&self) -> &[(DVec2, T)] {
        &self.items
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for Quadtree<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            nodes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{hash2, rand_simple};

    fn scattered(n: usize) -> Vec<(DVec2, usize)> {
        (0..n)
            .map(|i| {
                let x = rand_simple(hash2(i as u64, 11)) * 400.0;
                let y = rand_simple(hash2(i as u64, 29)) * 300.0;
                (DVec2::new(x, y), i)
            })
            .collect()
    }

    fn brute_nearest(items: &[(DVec2, usize)], p: DVec2, radius: f64) -> Option<f64> {
        items
            .iter()
            .map(|(q, _)| q.distance(p))
            .filter(|d| *d <= radius)
            .min_by(|a, b| a.total_cmp(b))
    }

    #[test]
    fn test_empty_tree() {
        let tree: Quadtree<usize> = Quadtree::build(Vec::new());
        assert!(tree.is_empty());
        assert_eq!(tree.find_nearest(0.0, 0.0, 100.0), None);
        assert!(tree.query_rect(-1.0, -1.0, 1.0, 1.0).is_empty());
    }

    #[test]
    fn test_find_nearest_matches_brute_force() {
        let items = scattered(2000);
        let tree = Quadtree::build(items.clone());
        for i in 0..200u64 {
            let p = DVec2::new(rand_simple(hash2(i, 3)) * 400.0, rand_simple(hash2(i, 5)) * 300.0);
            let found = tree
                .find_nearest(p.x, p.y, 6.0)
                .map(|idx| tree.get(idx).unwrap().0.distance(p));
            let expected = brute_nearest(&items, p, 6.0);
            match (found, expected) {
                (Some(a), Some(b)) => assert!((a - b).abs() < 1e-9),
                (None, None) => {}
                other => panic!("mismatch at {:?}: {:?}", p, other),
            }
        }
    }

    #[test]
    fn test_query_rect_matches_brute_force() {
        let items = scattered(1500);
        let tree = Quadtree::build(items.clone());
        let mut got = tree.query_rect(250.0, 40.0, 100.0, 180.0);
        got.sort_unstable();
        let expected: Vec<usize> = items
            .iter()
            .filter(|(p, _)| p.x >= 100.0 && p.x <= 250.0 && p.y >= 40.0 && p.y <= 180.0)
            .map(|(_, i)| *i)
            .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_hit_test_symmetry() {
        let items = scattered(800);
        let tree = Quadtree::build(items);
        let r = 4.0;
        for i in 0..100u64 {
            let x = rand_simple(hash2(i, 7)) * 400.0;
            let y = rand_simple(hash2(i, 13)) * 300.0;
            let in_rect = tree.query_rect(x - r, y - r, x + r, y + r);
            match tree.find_nearest(x, y, r) {
                Some(idx) => assert!(in_rect.contains(&idx)),
                // Nothing in the circle: anything in the square lies in a corner
                None => assert!(in_rect
                    .iter()
                    .all(|&j| tree.get(j).unwrap().0.distance(DVec2::new(x, y)) > r)),
            }
        }
    }

    #[test]
    fn test_every_rect_hit_is_nearest_at_its_own_position() {
        let tree = Quadtree::build(scattered(800));
        for i in 0..50u64 {
            let x = rand_simple(hash2(i, 3)) * 360.0;
            let y = rand_simple(hash2(i, 5)) * 260.0;
            let hits = tree.query_rect(x, y, x + 40.0, y + 40.0);
            for idx in hits {
                let pos = tree.get(idx).unwrap().0;
                let found = tree.find_nearest(pos.x, pos.y, 1e-9).unwrap();
                assert_eq!(tree.get(found).unwrap().0, pos);
            }
        }
    }

    #[test]
    fn test_coincident_points_do_not_recurse_forever() {
        let items: Vec<(DVec2, usize)> = (0..100).map(|i| (DVec2::new(5.0, 5.0), i)).collect();
        let tree = Quadtree::build(items);
        assert_eq!(tree.query_rect(5.0, 5.0, 5.0, 5.0).len(), 100);
        assert!(tree.find_nearest(5.0, 5.0, 0.0).is_some());
    }

    #[test]
    fn test_brush_around_two_points() {
        // P0..P9 on a diagonal, with P3 and P7 pulled into one corner
        let mut items: Vec<(DVec2, usize)> =
            (0..10).map(|i| (DVec2::new(i as f64 * 10.0, i as f64 * 10.0), i)).collect();
        items[3].0 = DVec2::new(200.0, 20.0);
        items[7].0 = DVec2::new(210.0, 30.0);
        let tree = Quadtree::build(items);

        let hits = tree.query_rect(195.0, 15.0, 215.0, 35.0);
        let mut ids: Vec<usize> = hits.iter().map(|&h| tree.get(h).unwrap().1).collect();
        assert_eq!(ids.len(), 2);
        ids.sort_unstable();
        assert_eq!(ids, vec![3, 7]);
    }
}
