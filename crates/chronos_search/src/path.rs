//! Path records and the per-vertex path store.
//!
//! A path record holds one tagged arrival at a vertex plus the link to the
//! path it extends. Records live in per-vertex arrays whose length always
//! equals the size of the vertex's current tag group: "the i-th path at
//! this vertex has the group's i-th tag". Because arrays are reallocated
//! whenever a vertex's tag set changes, links are (vertex, index) pairs
//! rather than pointers.

use crate::tag::TagId;
use chronos_common::{Arrival, Required};
use chronos_graph::{EdgeId, VertexId};
use serde::{Deserialize, Serialize};

/// A stable reference to one path record at a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathRef {
    /// The vertex holding the record.
    pub vertex: VertexId,
    /// The record's index in the vertex's path array.
    pub index: u32,
}

/// The link from a path to the path it extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrevPath {
    /// The previous path record.
    pub path: PathRef,
    /// The edge traversed from the previous vertex.
    pub edge: EdgeId,
    /// The arc within the edge's arc set, packed small.
    pub arc_idx: u8,
}

/// One tagged arrival at a vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    /// The tag discriminating this arrival.
    pub tag: TagId,
    /// The arrival time.
    pub arrival: Arrival,
    /// The required time; `None` until the backward search fills it, and
    /// for vertices no endpoint reaches ("no required").
    pub required: Option<Required>,
    /// Link to the previous path; `None` for search head records.
    pub prev: Option<PrevPath>,
    /// Set by path enumeration to suppress re-expansion of copied paths.
    pub is_enum: bool,
}

impl Path {
    /// A head record with no predecessor.
    pub fn head(tag: TagId, arrival: Arrival) -> Self {
        Self {
            tag,
            arrival,
            required: None,
            prev: None,
            is_enum: false,
        }
    }
}

/// Owns every vertex's path array.
///
/// Arrays are indexed by vertex id; absent arrays mean "no arrivals yet".
/// Everything is released in batch by [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct PathStore {
    arrays: Vec<Vec<Path>>,
}

impl PathStore {
    /// Creates a store sized for `vertex_count` vertices.
    pub fn new(vertex_count: usize) -> Self {
        Self {
            arrays: vec![Vec::new(); vertex_count],
        }
    }

    /// Grows the store to cover `vertex_count` vertices.
    pub fn resize(&mut self, vertex_count: usize) {
        if vertex_count > self.arrays.len() {
            self.arrays.resize(vertex_count, Vec::new());
        }
    }

    /// The paths at a vertex.
    pub fn paths(&self, vertex: VertexId) -> &[Path] {
        self.arrays
            .get(vertex.as_usize())
            .map_or(&[], |v| v.as_slice())
    }

    /// Mutable access to the paths at a vertex.
    pub fn paths_mut(&mut self, vertex: VertexId) -> &mut [Path] {
        self.arrays[vertex.as_usize()].as_mut_slice()
    }

    /// Replaces a vertex's path array.
    pub fn make_paths(&mut self, vertex: VertexId, paths: Vec<Path>) {
        self.arrays[vertex.as_usize()] = paths;
    }

    /// Deletes a vertex's paths.
    pub fn delete_paths(&mut self, vertex: VertexId) {
        self.arrays[vertex.as_usize()].clear();
    }

    /// Resolves a path reference.
    pub fn path(&self, path_ref: PathRef) -> Option<&Path> {
        self.arrays
            .get(path_ref.vertex.as_usize())?
            .get(path_ref.index as usize)
    }

    /// Total number of live path records.
    pub fn path_count(&self) -> usize {
        self.arrays.iter().map(|a| a.len()).sum()
    }

    /// Releases all path arrays in batch.
    pub fn clear(&mut self) {
        for array in &mut self.arrays {
            array.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(n: u32) -> VertexId {
        VertexId::from_raw(n)
    }

    #[test]
    fn empty_store() {
        let store = PathStore::new(4);
        assert!(store.paths(vertex(0)).is_empty());
        assert_eq!(store.path_count(), 0);
    }

    #[test]
    fn make_and_read_paths() {
        let mut store = PathStore::new(2);
        store.make_paths(
            vertex(1),
            vec![
                Path::head(TagId::from_raw(0), 1.5),
                Path::head(TagId::from_raw(1), 2.5),
            ],
        );
        assert_eq!(store.paths(vertex(1)).len(), 2);
        assert_eq!(store.paths(vertex(1))[1].arrival, 2.5);
        assert_eq!(store.path_count(), 2);
    }

    #[test]
    fn path_ref_resolution() {
        let mut store = PathStore::new(2);
        store.make_paths(vertex(0), vec![Path::head(TagId::from_raw(7), 0.25)]);
        let found = store
            .path(PathRef {
                vertex: vertex(0),
                index: 0,
            })
            .unwrap();
        assert_eq!(found.tag, TagId::from_raw(7));
        assert!(store
            .path(PathRef {
                vertex: vertex(0),
                index: 5,
            })
            .is_none());
    }

    #[test]
    fn prev_links() {
        let mut store = PathStore::new(2);
        store.make_paths(vertex(0), vec![Path::head(TagId::from_raw(0), 0.0)]);
        let mut continued = Path::head(TagId::from_raw(1), 0.4);
        continued.prev = Some(PrevPath {
            path: PathRef {
                vertex: vertex(0),
                index: 0,
            },
            edge: EdgeId::from_raw(3),
            arc_idx: 1,
        });
        store.make_paths(vertex(1), vec![continued]);
        let prev = store.paths(vertex(1))[0].prev.unwrap();
        assert_eq!(prev.path.vertex, vertex(0));
        assert_eq!(prev.arc_idx, 1);
        assert_eq!(store.path(prev.path).unwrap().arrival, 0.0);
    }

    #[test]
    fn delete_and_clear() {
        let mut store = PathStore::new(2);
        store.make_paths(vertex(0), vec![Path::head(TagId::from_raw(0), 0.0)]);
        store.make_paths(vertex(1), vec![Path::head(TagId::from_raw(1), 1.0)]);
        store.delete_paths(vertex(0));
        assert!(store.paths(vertex(0)).is_empty());
        assert_eq!(store.path_count(), 1);
        store.clear();
        assert_eq!(store.path_count(), 0);
    }

    #[test]
    fn resize_preserves_existing() {
        let mut store = PathStore::new(1);
        store.make_paths(vertex(0), vec![Path::head(TagId::from_raw(0), 0.5)]);
        store.resize(4);
        assert_eq!(store.paths(vertex(0)).len(), 1);
        assert!(store.paths(vertex(3)).is_empty());
    }
}
