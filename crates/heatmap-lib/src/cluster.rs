//! Cluster tree for incremental point aggregation
//!
//! Points are inserted one at a time. A point closer than the configured distance
//! limit to the node occupying a slot is merged into it: the occupant is superseded
//! by a node at the midpoint of both, carrying the occupant's children and weight + 1.
//! Otherwise the point descends into the child slot given by [`Quadrant::relative_to`].
//!
//! The tree is not balanced and its shape depends on the insertion order. Quadrants
//! are relative to the *current* position of the parent, which moves when the parent
//! absorbs points, so they do not describe a fixed spatial partition.

use crate::utils::{flat_distance_km, midpoint};
use crate::{DataError, Result};
use geo::Point;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default merge threshold in kilometers
pub const DEFAULT_DISTANCE_LIMIT_KM: f64 = 50.0;

/// Configuration of the clustering
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterConfig {
    /// Points closer than this (in kilometers, see [`flat_distance_km`]) to a slot
    /// occupant are merged into it. Default: 50 km
    pub distance_limit_km: f64,
}

impl ClusterConfig {
    /// Create a validated configuration
    ///
    /// A limit of zero is accepted and disables merging entirely.
    pub fn new(distance_limit_km: f64) -> Result<Self> {
        if !distance_limit_km.is_finite() || distance_limit_km < 0.0 {
            return Err(DataError::InvalidConfig(format!(
                "distance limit must be a finite, non-negative number of kilometers, got {distance_limit_km}"
            )));
        }
        Ok(Self { distance_limit_km })
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            distance_limit_km: DEFAULT_DISTANCE_LIMIT_KM,
        }
    }
}

/// Child slot of a [`ClusterNode`], chosen relative to the parent's current position
///
/// | point.lat > parent.lat | point.lon > parent.lon | slot        |
/// |------------------------|------------------------|-------------|
/// | no                     | no                     | `NorthWest` |
/// | no                     | yes                    | `NorthEast` |
/// | yes                    | no                     | `SouthWest` |
/// | yes                    | yes                    | `SouthEast` |
///
/// Note that a *greater* latitude selects a "South" slot. The names are slot labels,
/// not compass directions, and are kept this way so outputs stay comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Quadrant {
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
}

impl Quadrant {
    /// All quadrants in serialization order
    pub const ALL: [Quadrant; 4] = [
        Quadrant::NorthWest,
        Quadrant::NorthEast,
        Quadrant::SouthWest,
        Quadrant::SouthEast,
    ];

    /// Slot for `point` below a parent currently positioned at `parent`
    #[inline]
    pub fn relative_to(parent: Point<f64>, point: Point<f64>) -> Self {
        let south = point.y() > parent.y();
        let east = point.x() > parent.x();
        match (south, east) {
            (false, false) => Quadrant::NorthWest,
            (false, true) => Quadrant::NorthEast,
            (true, false) => Quadrant::SouthWest,
            (true, true) => Quadrant::SouthEast,
        }
    }

    /// Position of this quadrant in a node's child array
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Quadrant::NorthWest => 0,
            Quadrant::NorthEast => 1,
            Quadrant::SouthWest => 2,
            Quadrant::SouthEast => 3,
        }
    }
}

/// An aggregate point in the cluster tree
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterNode {
    /// Current position (x = longitude, y = latitude)
    position: Point<f64>,
    /// Number of input points folded into this node
    weight: u32,
    /// Child slots indexed by [`Quadrant::index`]
    children: [Option<Box<ClusterNode>>; 4],
}

/// A serialized tree node
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WeightedPoint {
    pub lat: f64,
    pub lon: f64,
    pub weight: u32,
}

/// Outcome of a single insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The point became a new leaf at `depth` (0 = root)
    Leaf { depth: usize },
    /// The point was merged into the node at `depth`, which now has `weight`
    Merged { depth: usize, weight: u32 },
}

impl Placement {
    pub fn depth(self) -> usize {
        match self {
            Placement::Leaf { depth } | Placement::Merged { depth, .. } => depth,
        }
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ClusterNode {
    /// A node for a single point, with weight 1 and no children
    pub fn leaf(position: Point<f64>) -> Self {
        Self {
            position,
            weight: 1,
            children: Default::default(),
        }
    }

    /// Consume this node and return the node superseding it after absorbing `point`
    ///
    /// The new node sits at the midpoint and inherits all four child slots unchanged.
    fn merged(mut self: Box<Self>, point: Point<f64>) -> Box<Self> {
        Box::new(ClusterNode {
            position: midpoint(self.position, point),
            weight: self.weight.saturating_add(1),
            children: std::mem::take(&mut self.children),
        })
    }

    pub fn position(&self) -> Point<f64> {
        self.position
    }

    pub fn lat(&self) -> f64 {
        self.position.y()
    }

    pub fn lon(&self) -> f64 {
        self.position.x()
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Child occupying the given slot, if any
    pub fn child(&self, quadrant: Quadrant) -> Option<&ClusterNode> {
        self.children[quadrant.index()].as_deref()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }

    pub fn weighted_point(&self) -> WeightedPoint {
        WeightedPoint {
            lat: self.lat(),
            lon: self.lon(),
            weight: self.weight,
        }
    }
}

/// Decision taken at one slot while descending
enum Step {
    Vacant,
    Merge,
    Descend(Quadrant),
}

/// Place `point` below `slot`, descending iteratively
///
/// Equivalent to the recursive merge-or-descend formulation, but list-shaped trees
/// (e.g. sorted input) cannot exhaust the call stack.
fn place(
    slot: &mut Option<Box<ClusterNode>>,
    point: Point<f64>,
    distance_limit_km: f64,
) -> Placement {
    let mut slot = slot;
    let mut depth = 0;
    loop {
        let step = match slot.as_deref() {
            None => Step::Vacant,
            Some(node) if flat_distance_km(node.position, point) < distance_limit_km => {
                Step::Merge
            }
            Some(node) => Step::Descend(Quadrant::relative_to(node.position, point)),
        };

        match step {
            Step::Vacant => {
                *slot = Some(Box::new(ClusterNode::leaf(point)));
                return Placement::Leaf { depth };
            }
            Step::Merge => {
                // The occupant is superseded, not mutated: take it out and store its successor
                let merged = slot.take().map(|occupant| occupant.merged(point));
                let weight = merged.as_ref().map_or(1, |node| node.weight);
                *slot = merged;
                return Placement::Merged { depth, weight };
            }
            Step::Descend(quadrant) => {
                if let Some(node) = slot {
                    slot = &mut node.children[quadrant.index()];
                    depth += 1;
                }
            }
        }
    }
}

/// Insert `point` below `root` and return the node now occupying the root position
///
/// The returned node may be a different node than `root` (when the point is merged
/// into it), so callers must replace the root they hold with the result.
pub fn insert(
    root: Option<Box<ClusterNode>>,
    point: Point<f64>,
    distance_limit_km: f64,
) -> Box<ClusterNode> {
    let mut slot = root;
    place(&mut slot, point, distance_limit_km);
    slot.unwrap_or_else(|| Box::new(ClusterNode::leaf(point)))
}

/// Statistics collected while building a tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterStats {
    /// Number of points handed to [`ClusterTree::insert`]
    pub points_inserted: usize,
    /// Number of insertions that merged into an existing node
    pub merges: usize,
    /// Number of nodes created as new leaves (equals the node count)
    pub leaves: usize,
    /// Deepest slot reached by an insertion (0 = root)
    pub max_depth: usize,
}

/// Cluster tree owning its root, configuration and build statistics
#[derive(Debug, Default)]
pub struct ClusterTree {
    root: Option<Box<ClusterNode>>,
    config: ClusterConfig,
    stats: ClusterStats,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ClusterTree {
    /// Create an empty tree
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            root: None,
            config,
            stats: ClusterStats::default(),
        }
    }

    /// Insert a single point
    pub fn insert(&mut self, point: Point<f64>) -> Placement {
        let placement = place(&mut self.root, point, self.config.distance_limit_km);

        self.stats.points_inserted += 1;
        match placement {
            Placement::Leaf { .. } => self.stats.leaves += 1,
            Placement::Merged { .. } => self.stats.merges += 1,
        }
        self.stats.max_depth = self.stats.max_depth.max(placement.depth());

        tracing::trace!(
            lat = point.y(),
            lon = point.x(),
            ?placement,
            "Inserted point"
        );
        placement
    }

    /// Pre-order traversal of the tree
    ///
    /// Each node is yielded before its children, which are visited in
    /// [`Quadrant::ALL`] order. A new traversal can be started at any time.
    pub fn traverse(&self) -> Traversal<'_> {
        Traversal {
            stack: self.root.as_deref().into_iter().collect(),
        }
    }

    pub fn root(&self) -> Option<&ClusterNode> {
        self.root.as_deref()
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn stats(&self) -> ClusterStats {
        self.stats
    }

    /// Number of nodes in the tree (and of rows a traversal yields)
    pub fn node_count(&self) -> usize {
        self.stats.leaves
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}

impl Extend<Point<f64>> for ClusterTree {
    fn extend<T: IntoIterator<Item = Point<f64>>>(&mut self, iter: T) {
        for point in iter {
            self.insert(point);
        }
    }
}

impl Drop for ClusterNode {
    fn drop(&mut self) {
        // Unlink descendants iteratively so deep chains do not recurse in `Box` drop
        let mut pending: Vec<Box<ClusterNode>> =
            self.children.iter_mut().filter_map(Option::take).collect();
        while let Some(mut node) = pending.pop() {
            pending.extend(node.children.iter_mut().filter_map(Option::take));
        }
    }
}

/// Lazy pre-order iterator over a [`ClusterTree`]
#[derive(Debug, Clone)]
pub struct Traversal<'a> {
    stack: Vec<&'a ClusterNode>,
}

impl Iterator for Traversal<'_> {
    type Item = WeightedPoint;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Pushed in reverse so that NorthWest is popped first
        self.stack.extend(
            Quadrant::ALL
                .iter()
                .rev()
                .filter_map(|&quadrant| node.child(quadrant)),
        );
        Some(node.weighted_point())
    }
}

impl<'a> IntoIterator for &'a ClusterTree {
    type Item = WeightedPoint;
    type IntoIter = Traversal<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.traverse()
    }
}
