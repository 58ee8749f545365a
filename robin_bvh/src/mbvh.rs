// Copyright 2025 the Robin BVH Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The wide Robin BVH: construction, refitting and coefficient updates.

use alloc::vec::Vec;
use core::fmt;

use smallvec::SmallVec;

use crate::bound::RadiusBound;
use crate::cone::BoundingCone;
use crate::error::Error;
use crate::primitive::RobinPrimitive;
use crate::scalar::{ScalarNodeKind, ScalarTree};
use crate::types::{BoundingBox, Vector};
use crate::wide::{LeafRange, LeafRecord, WideNode, to_i32};

/// Default batch width: four children per node, four faces per leaf record.
pub const DEFAULT_WIDTH: usize = 4;

/// A `W`-wide bounding volume hierarchy over Robin boundary primitives.
///
/// Every child slot of an internal node carries the box, normal cone and
/// Robin coefficient range of its subtree, so a query can bound the star
/// radius of a whole subtree without descending into it.
///
/// The tree owns its primitives. Move geometry through
/// [`RobinMbvh::primitives_mut`] followed by [`RobinMbvh::refit`]; change
/// coefficients through [`RobinMbvh::update_robin_coefficients`].
pub struct RobinMbvh<V: Vector, P, const W: usize = DEFAULT_WIDTH> {
    pub(crate) nodes: Vec<WideNode<V, W>>,
    pub(crate) leaf_records: Vec<LeafRecord<V, W>>,
    pub(crate) primitives: Vec<P>,
    pub(crate) bound: RadiusBound,
    pub(crate) batch_queries: bool,
    max_depth: usize,
}

/// Summary of a tree's shape.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MbvhStats {
    /// Batch width.
    pub width: usize,
    /// Total nodes.
    pub nodes: usize,
    /// Nodes that store a primitive range.
    pub leaf_nodes: usize,
    /// Leaf records (zero when primitives are evaluated one at a time).
    pub leaf_records: usize,
    /// Primitives.
    pub primitives: usize,
    /// Depth of the deepest node, root at 0.
    pub max_depth: usize,
}

impl fmt::Display for MbvhStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-wide BVH: {} nodes ({} leaves), {} leaf records, {} primitives, max depth {}",
            self.width,
            self.nodes,
            self.leaf_nodes,
            self.leaf_records,
            self.primitives,
            self.max_depth
        )
    }
}

impl<V: Vector, P: RobinPrimitive<V>, const W: usize> RobinMbvh<V, P, W> {
    /// Collapses `scalar` into a `W`-wide tree over `primitives`.
    ///
    /// `primitives` must be ordered the way `scalar`'s leaves refer to them.
    /// Returns `Ok(None)` when there are no primitives.
    pub fn new(scalar: &ScalarTree<V>, primitives: Vec<P>) -> Result<Option<Self>, Error> {
        let bound = RadiusBound::for_dimension(V::DIM)?;
        if W < 4 {
            return Err(Error::UnsupportedWidth(W));
        }
        if primitives.is_empty() {
            return Ok(None);
        }
        if scalar.is_empty() {
            return Err(Error::MissingHierarchy(primitives.len()));
        }
        if primitives.len().max(scalar.len()) >= i32::MAX as usize {
            return Err(Error::TooManyPrimitives(primitives.len()));
        }

        let _span = tracing::debug_span!("robin_mbvh_build", primitives = primitives.len(), width = W)
            .entered();
        let batch_queries = P::SUPPORTS_BATCH_QUERIES && primitives.iter().all(|p| p.face().is_some());
        let mut mbvh = Self {
            nodes: Vec::with_capacity(scalar.len()),
            leaf_records: Vec::with_capacity(primitives.len().div_ceil(W)),
            primitives,
            bound,
            batch_queries,
            max_depth: 0,
        };
        mbvh.collapse(scalar, 0, 0)?;
        mbvh.populate_leaf_records();
        tracing::debug!(
            nodes = mbvh.nodes.len(),
            leaf_records = mbvh.leaf_records.len(),
            max_depth = mbvh.max_depth,
            batch_queries,
            "collapsed scalar hierarchy"
        );
        Ok(Some(mbvh))
    }

    /// Like [`RobinMbvh::new`], optionally logging build time and
    /// [`MbvhStats`] at `info` level.
    pub fn create(
        scalar: &ScalarTree<V>,
        primitives: Vec<P>,
        report_stats: bool,
    ) -> Result<Option<Self>, Error> {
        #[cfg(feature = "std")]
        let start = std::time::Instant::now();
        let mbvh = Self::new(scalar, primitives)?;
        if report_stats && let Some(m) = &mbvh {
            #[cfg(feature = "std")]
            tracing::info!(
                elapsed_ms = start.elapsed().as_secs_f64() * 1e3,
                "built wide Robin BVH"
            );
            tracing::info!("{}", m.stats());
        }
        Ok(mbvh)
    }

    /// Builds the wide node for scalar node `scalar_index` and its subtree.
    ///
    /// Internal nodes absorb grandchildren by repeatedly opening the frontier
    /// node with the largest surface area until `W` slots are used.
    fn collapse(
        &mut self,
        scalar: &ScalarTree<V>,
        scalar_index: usize,
        depth: usize,
    ) -> Result<usize, Error> {
        let index = self.nodes.len();
        self.nodes.push(WideNode::default());
        self.max_depth = self.max_depth.max(depth);

        let nodes = scalar.nodes();
        match &nodes[scalar_index].kind {
            ScalarNodeKind::Leaf { offset, count } => {
                let leaf_offset = self.leaf_records.len();
                let leaf_count = if self.batch_queries {
                    count.div_ceil(W)
                } else {
                    0
                };
                self.leaf_records
                    .resize_with(leaf_offset + leaf_count, LeafRecord::default);
                self.nodes[index].set_leaf(LeafRange {
                    leaf_offset,
                    leaf_count,
                    reference_offset: *offset,
                    reference_count: *count,
                });
            }
            ScalarNodeKind::Internal { children } => {
                if children.len() > W {
                    return Err(Error::TooManyChildren {
                        node: scalar_index,
                        children: children.len(),
                        width: W,
                    });
                }

                let mut frontier: SmallVec<[usize; 8]> = children.iter().copied().collect();
                while frontier.len() < W {
                    let candidate = frontier
                        .iter()
                        .enumerate()
                        .filter_map(|(i, &c)| match &nodes[c].kind {
                            ScalarNodeKind::Internal { children }
                                if frontier.len() - 1 + children.len() <= W =>
                            {
                                Some((i, nodes[c].bounding_box.half_surface_area()))
                            }
                            _ => None,
                        })
                        .max_by(|a, b| a.1.total_cmp(&b.1));
                    let Some((i, _)) = candidate else {
                        break;
                    };
                    let opened = frontier.remove(i);
                    if let ScalarNodeKind::Internal { children } = &nodes[opened].kind {
                        frontier.extend(children.iter().copied());
                    }
                }

                for (w, &c) in frontier.iter().enumerate() {
                    let child = self.collapse(scalar, c, depth + 1)?;
                    let source = &nodes[c];
                    let node = &mut self.nodes[index];
                    node.child[w] = to_i32(child);
                    node.set_slot_bounds(w, &source.bounding_box, &source.cone);
                    node.set_slot_coeffs(w, source.min_robin_coeff, source.max_robin_coeff);
                }
            }
        }
        Ok(index)
    }

    /// Copies every leaf's primitives into its leaf records.
    fn populate_leaf_records(&mut self) {
        if !self.batch_queries {
            return;
        }
        for node in self.nodes.iter().filter(|n| n.is_leaf()) {
            let range = node.leaf_range();
            let prims = &self.primitives[range.reference_offset..][..range.reference_count];
            for (p, prim) in prims.iter().enumerate() {
                if let Some(face) = prim.face() {
                    self.leaf_records[range.leaf_offset + p / W].set_lane(p % W, face);
                }
            }
        }
    }

    /// Recomputes every box and cone after primitives moved.
    ///
    /// Leaf records are repacked from the primitives, then bounds are rebuilt
    /// bottom-up. Topology and coefficient ranges are kept.
    pub fn refit(&mut self) {
        let _span = tracing::debug_span!("robin_mbvh_refit", nodes = self.nodes.len()).entered();
        self.populate_leaf_records();
        if !self.nodes.is_empty() {
            self.refit_recursive(0);
        }
    }

    /// Refits the subtree at `index`, returning its box and cone.
    fn refit_recursive(&mut self, index: usize) -> (BoundingBox<V>, BoundingCone<V>) {
        if self.nodes[index].is_leaf() {
            let range = self.nodes[index].leaf_range();
            let prims = &self.primitives[range.reference_offset..][..range.reference_count];
            let mut bbox = BoundingBox::empty();
            for p in prims {
                bbox.expand_to_include(&p.bounding_box());
            }
            return (bbox, BoundingCone::for_primitives(prims, bbox.centroid()));
        }

        let mut bbox = BoundingBox::empty();
        let mut cone = BoundingCone::invalid();
        for w in 0..W {
            if self.nodes[index].is_absent(w) {
                continue;
            }
            let child = self.nodes[index].child_index(w);
            let (child_box, child_cone) = self.refit_recursive(child);
            self.nodes[index].set_slot_bounds(w, &child_box, &child_cone);

            let merged = bbox.union(&child_box);
            cone = BoundingCone::merge(
                &cone,
                &child_cone,
                bbox.centroid(),
                child_box.centroid(),
                merged.centroid(),
            );
            bbox = merged;
        }
        (bbox, cone)
    }

    /// Replaces primitive coefficients and refreshes every coefficient range.
    ///
    /// Both slices are indexed by [`RobinPrimitive::index`] and must cover
    /// every primitive's index. Geometry is not touched.
    pub fn update_robin_coefficients(&mut self, min_values: &[f32], max_values: &[f32]) {
        let _span = tracing::debug_span!("robin_mbvh_update_coefficients").entered();
        for node in self.nodes.iter().filter(|n| n.is_leaf()) {
            let range = node.leaf_range();
            let prims = &mut self.primitives[range.reference_offset..][..range.reference_count];
            for (p, prim) in prims.iter_mut().enumerate() {
                let i = prim.index();
                prim.set_robin_coeffs(min_values[i], max_values[i]);
                if self.batch_queries {
                    let record = &mut self.leaf_records[range.leaf_offset + p / W];
                    debug_assert_eq!(record.primitive_index[p % W], i, "stale leaf record");
                    record.max_robin_coeff[p % W] = max_values[i];
                }
            }
        }
        if !self.nodes.is_empty() {
            self.update_coefficients_recursive(0);
        }
    }

    /// Refreshes slot coefficient ranges below `index`, returning its range.
    fn update_coefficients_recursive(&mut self, index: usize) -> (f32, f32) {
        if self.nodes[index].is_leaf() {
            let range = self.nodes[index].leaf_range();
            let prims = &self.primitives[range.reference_offset..][..range.reference_count];
            return prims.iter().fold((f32::MAX, -f32::MAX), |(lo, hi), p| {
                let (min_coeff, max_coeff) = p.robin_coeffs();
                (lo.min(min_coeff), hi.max(max_coeff))
            });
        }

        for w in 0..W {
            if self.nodes[index].is_absent(w) {
                continue;
            }
            let child = self.nodes[index].child_index(w);
            let (lo, hi) = self.update_coefficients_recursive(child);
            self.nodes[index].set_slot_coeffs(w, lo, hi);
        }
        self.nodes[index].coeff_range()
    }

    /// Primitives in tree order.
    pub fn primitives(&self) -> &[P] {
        &self.primitives
    }

    /// Mutable primitives; call [`RobinMbvh::refit`] after moving any of them.
    pub fn primitives_mut(&mut self) -> &mut [P] {
        &mut self.primitives
    }

    /// Takes the primitives back.
    pub fn into_primitives(self) -> Vec<P> {
        self.primitives
    }

    /// Bound formulas chosen for this dimension.
    pub fn radius_bound(&self) -> RadiusBound {
        self.bound
    }

    /// Whether leaves are evaluated through packed leaf records.
    pub fn supports_batch_queries(&self) -> bool {
        self.batch_queries
    }

    /// Bounds of the whole tree.
    pub fn bounding_box(&self) -> BoundingBox<V> {
        match self.nodes.first() {
            Some(root) if !root.is_leaf() => root.bounding_box(),
            _ => {
                let mut b = BoundingBox::empty();
                for p in &self.primitives {
                    b.expand_to_include(&p.bounding_box());
                }
                b
            }
        }
    }

    /// Shape summary.
    pub fn stats(&self) -> MbvhStats {
        MbvhStats {
            width: W,
            nodes: self.nodes.len(),
            leaf_nodes: self.nodes.iter().filter(|n| n.is_leaf()).count(),
            leaf_records: self.leaf_records.len(),
            primitives: self.primitives.len(),
            max_depth: self.max_depth,
        }
    }
}

impl<V: Vector, P, const W: usize> fmt::Debug for RobinMbvh<V, P, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RobinMbvh")
            .field("width", &W)
            .field("nodes", &self.nodes.len())
            .field("leaf_records", &self.leaf_records.len())
            .field("primitives", &self.primitives.len())
            .field("bound", &self.bound)
            .field("batch_queries", &self.batch_queries)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

/// Builds a [`DEFAULT_WIDTH`]-wide tree; see [`RobinMbvh::create`].
pub fn create_vectorized_robin_bvh<V: Vector, P: RobinPrimitive<V>>(
    scalar: &ScalarTree<V>,
    primitives: Vec<P>,
    report_stats: bool,
) -> Result<Option<RobinMbvh<V, P>>, Error> {
    RobinMbvh::create(scalar, primitives, report_stats)
}
