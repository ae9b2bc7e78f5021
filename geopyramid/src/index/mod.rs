//! Spatial index over feature bounding boxes.
//!
//! A read-only R-tree built once per vector job. Queries are a bounding-box
//! prefilter only; callers re-test exact intersection.

use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use crate::coord::GeoBounds;
use crate::dataset::VectorDataset;

type IndexedBox = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// R-tree of `(bbox, feature index)` pairs in web-mercator meters.
#[derive(Debug)]
pub struct SpatialIndex {
    tree: RTree<IndexedBox>,
}

impl SpatialIndex {
    /// Bulk-loads the boxes of every feature that has one.
    pub fn build(dataset: &VectorDataset) -> Self {
        let boxes = dataset
            .features()
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.bounds().map(|b| (i, b)));
        Self::from_bounds(boxes)
    }

    pub fn from_bounds<I>(boxes: I) -> Self
    where
        I: IntoIterator<Item = (usize, GeoBounds)>,
    {
        let entries: Vec<IndexedBox> = boxes
            .into_iter()
            .filter(|(_, b)| b.is_valid())
            .map(|(i, b)| {
                GeomWithData::new(Rectangle::from_corners([b.minx, b.miny], [b.maxx, b.maxy]), i)
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Indices of features whose box intersects `bbox`, in no particular order.
    pub fn candidates<'a>(&'a self, bbox: &GeoBounds) -> impl Iterator<Item = usize> + 'a {
        let envelope = bbox
            .is_valid()
            .then(|| AABB::from_corners([bbox.minx, bbox.miny], [bbox.maxx, bbox.maxy]));
        envelope
            .into_iter()
            .flat_map(move |env| self.tree.locate_in_envelope_intersecting(&env).map(|entry| entry.data))
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
