//! Tags, clock infos, tag groups, and their intern tables.
//!
//! A tag is the discriminator that lets a vertex hold many concurrent
//! arrivals: same transition and analysis point but different launching
//! clock or exception state means different tags, and therefore separate
//! path slots. Tags, clock infos, and tag groups are intern-unique; the
//! tables hand out dense ids and are shared by parallel search workers
//! behind read/write locks with double-checked insertion.

use crate::path::PathRef;
use chronos_common::{MinMax, RiseFall};
use chronos_netlist::PinId;
use chronos_sdc::{ClockEdge, ExceptionState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};
use xxhash_rust::xxh3::Xxh3Builder;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an id from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }

            /// Returns the index as `usize`.
            pub fn as_usize(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_id!(
    /// An interned tag.
    TagId
);

define_id!(
    /// An interned clock info.
    ClkInfoId
);

define_id!(
    /// An interned tag group.
    TagGroupId
);

/// The launching clock context of a tag.
///
/// Two clock infos are equal iff every field matches; delay fields compare
/// bitwise so interning stays exact.
#[derive(Debug, Clone)]
pub struct ClkInfo {
    /// The launching clock edge; `None` for unclocked arrivals.
    pub clk_edge: Option<ClockEdge>,
    /// The clock source pin the arrival was seeded from.
    pub clk_src: Option<PinId>,
    /// Clock-tree latency is propagated rather than ideal.
    pub is_propagated: bool,
    /// The path is the source path of a generated clock.
    pub is_gen_clk_src_path: bool,
    /// Pulse-clock sense, when the clock is a pulse clock.
    pub pulse_sense: Option<RiseFall>,
    /// Source insertion delay folded into the seed arrival.
    pub insertion: f64,
    /// Ideal latency folded into the seed arrival.
    pub latency: f64,
    /// The analysis pole the clock was expanded for.
    pub min_max: MinMax,
    /// The clock-path prefix used for CRPR common-pin matching.
    pub crpr_clk_path: Option<PathRef>,
}

impl ClkInfo {
    /// An unclocked context for the given pole.
    pub fn unclocked(min_max: MinMax) -> Self {
        Self {
            clk_edge: None,
            clk_src: None,
            is_propagated: false,
            is_gen_clk_src_path: false,
            pulse_sense: None,
            insertion: 0.0,
            latency: 0.0,
            min_max,
            crpr_clk_path: None,
        }
    }
}

impl PartialEq for ClkInfo {
    fn eq(&self, other: &Self) -> bool {
        self.clk_edge == other.clk_edge
            && self.clk_src == other.clk_src
            && self.is_propagated == other.is_propagated
            && self.is_gen_clk_src_path == other.is_gen_clk_src_path
            && self.pulse_sense == other.pulse_sense
            && self.insertion.to_bits() == other.insertion.to_bits()
            && self.latency.to_bits() == other.latency.to_bits()
            && self.min_max == other.min_max
            && self.crpr_clk_path == other.crpr_clk_path
    }
}

impl Eq for ClkInfo {}

impl Hash for ClkInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.clk_edge.hash(state);
        self.clk_src.hash(state);
        self.is_propagated.hash(state);
        self.is_gen_clk_src_path.hash(state);
        self.pulse_sense.hash(state);
        self.insertion.to_bits().hash(state);
        self.latency.to_bits().hash(state);
        self.min_max.hash(state);
        self.crpr_clk_path.hash(state);
    }
}

/// A tag: the intern-unique label discriminating concurrent arrivals at a
/// vertex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    /// Transition at the tagged vertex.
    pub rf: RiseFall,
    /// The analysis pole of the path.
    pub min_max: MinMax,
    /// The analysis point index.
    pub ap_index: usize,
    /// The launching clock context.
    pub clk_info: ClkInfoId,
    /// The path is still inside the clock network.
    pub is_clk: bool,
    /// Index of the input-delay constraint the path was seeded from.
    pub input_delay: Option<u32>,
    /// The path starts a constrained segment (e.g. a latch data output).
    pub is_segment_start: bool,
    /// Active exception states, sorted for canonical equality.
    pub states: Vec<ExceptionState>,
}

impl Tag {
    /// True if two tags match for CRPR purposes: equal in everything but
    /// the clock-path prefix recorded in their clock infos.
    pub fn match_crpr_clk_pin(&self, other: &Tag, db: &TagDb) -> bool {
        if self.rf != other.rf
            || self.min_max != other.min_max
            || self.ap_index != other.ap_index
            || self.is_clk != other.is_clk
            || self.input_delay != other.input_delay
            || self.is_segment_start != other.is_segment_start
            || self.states != other.states
        {
            return false;
        }
        let a = db.clk_info(self.clk_info);
        let b = db.clk_info(other.clk_info);
        a.clk_edge == b.clk_edge && a.clk_src == b.clk_src && a.min_max == b.min_max
    }
}

/// An intern-unique ordered set of tag ids. The i-th path at a vertex
/// carries the i-th tag of the vertex's group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagGroup {
    /// Sorted, duplicate-free tag ids.
    pub tags: Vec<TagId>,
}

impl TagGroup {
    /// Number of tags, and therefore paths, in the group.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// True for the empty group.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// The position of a tag within the group.
    pub fn index_of(&self, tag: TagId) -> Option<usize> {
        self.tags.binary_search(&tag).ok()
    }
}

// One intern table: dense id vector plus reverse map, xxh3-hashed.
struct InternTable<T> {
    items: Vec<Arc<T>>,
    index: HashMap<Arc<T>, u32, Xxh3Builder>,
}

impl<T: Eq + Hash> InternTable<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::with_hasher(Xxh3Builder::new()),
        }
    }

    fn lookup(&self, value: &T) -> Option<u32> {
        self.index.get(value).copied()
    }

    fn insert(&mut self, value: T) -> u32 {
        // Double-check under the write lock.
        if let Some(id) = self.index.get(&value) {
            return *id;
        }
        let id = self.items.len() as u32;
        let arc = Arc::new(value);
        self.items.push(Arc::clone(&arc));
        self.index.insert(arc, id);
        id
    }

    fn get(&self, id: u32) -> Arc<T> {
        Arc::clone(&self.items[id as usize])
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// The intern tables for tags, clock infos, and tag groups.
///
/// Thread-safe: parallel search workers intern through shared references.
/// Lookups take only the read lock; insertion upgrades and re-checks.
/// Everything is released in batch by [`clear`](Self::clear).
pub struct TagDb {
    tags: RwLock<InternTable<Tag>>,
    clk_infos: RwLock<InternTable<ClkInfo>>,
    tag_groups: RwLock<InternTable<TagGroup>>,
}

impl TagDb {
    /// Creates empty tables.
    pub fn new() -> Self {
        Self {
            tags: RwLock::new(InternTable::new()),
            clk_infos: RwLock::new(InternTable::new()),
            tag_groups: RwLock::new(InternTable::new()),
        }
    }

    /// Interns a tag.
    pub fn intern_tag(&self, tag: Tag) -> TagId {
        if let Some(id) = self.tags.read().unwrap().lookup(&tag) {
            return TagId::from_raw(id);
        }
        TagId::from_raw(self.tags.write().unwrap().insert(tag))
    }

    /// The tag with the given id.
    pub fn tag(&self, id: TagId) -> Arc<Tag> {
        self.tags.read().unwrap().get(id.as_raw())
    }

    /// Interns a clock info.
    pub fn intern_clk_info(&self, clk_info: ClkInfo) -> ClkInfoId {
        if let Some(id) = self.clk_infos.read().unwrap().lookup(&clk_info) {
            return ClkInfoId::from_raw(id);
        }
        ClkInfoId::from_raw(self.clk_infos.write().unwrap().insert(clk_info))
    }

    /// The clock info with the given id.
    pub fn clk_info(&self, id: ClkInfoId) -> Arc<ClkInfo> {
        self.clk_infos.read().unwrap().get(id.as_raw())
    }

    /// Interns a tag group. The tag list must be sorted and unique.
    pub fn intern_tag_group(&self, group: TagGroup) -> TagGroupId {
        debug_assert!(group.tags.windows(2).all(|w| w[0] < w[1]));
        if let Some(id) = self.tag_groups.read().unwrap().lookup(&group) {
            return TagGroupId::from_raw(id);
        }
        TagGroupId::from_raw(self.tag_groups.write().unwrap().insert(group))
    }

    /// The tag group with the given id.
    pub fn tag_group(&self, id: TagGroupId) -> Arc<TagGroup> {
        self.tag_groups.read().unwrap().get(id.as_raw())
    }

    /// Number of interned tags.
    pub fn tag_count(&self) -> usize {
        self.tags.read().unwrap().len()
    }

    /// Number of interned clock infos.
    pub fn clk_info_count(&self) -> usize {
        self.clk_infos.read().unwrap().len()
    }

    /// Number of interned tag groups.
    pub fn tag_group_count(&self) -> usize {
        self.tag_groups.read().unwrap().len()
    }

    /// Releases all interned objects in batch.
    pub fn clear(&self) {
        *self.tags.write().unwrap() = InternTable::new();
        *self.clk_infos.write().unwrap() = InternTable::new();
        *self.tag_groups.write().unwrap() = InternTable::new();
    }
}

impl Default for TagDb {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronos_sdc::{ClockId, ExceptionId};

    fn data_tag(db: &TagDb, rf: RiseFall, ap_index: usize) -> Tag {
        let clk_info = db.intern_clk_info(ClkInfo::unclocked(MinMax::Max));
        Tag {
            rf,
            min_max: MinMax::Max,
            ap_index,
            clk_info,
            is_clk: false,
            input_delay: None,
            is_segment_start: false,
            states: Vec::new(),
        }
    }

    #[test]
    fn tag_interning_is_unique() {
        let db = TagDb::new();
        let a = db.intern_tag(data_tag(&db, RiseFall::Rise, 0));
        let b = db.intern_tag(data_tag(&db, RiseFall::Rise, 0));
        let c = db.intern_tag(data_tag(&db, RiseFall::Fall, 0));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(db.tag_count(), 2);
    }

    #[test]
    fn distinct_tags_differ_in_some_field() {
        let db = TagDb::new();
        db.intern_tag(data_tag(&db, RiseFall::Rise, 0));
        db.intern_tag(data_tag(&db, RiseFall::Rise, 1));
        db.intern_tag(data_tag(&db, RiseFall::Fall, 0));
        let count = db.tag_count();
        for i in 0..count {
            for j in (i + 1)..count {
                let a = db.tag(TagId::from_raw(i as u32));
                let b = db.tag(TagId::from_raw(j as u32));
                assert_ne!(*a, *b);
            }
        }
    }

    #[test]
    fn clk_info_interning_compares_delays_bitwise() {
        let db = TagDb::new();
        let mut info = ClkInfo::unclocked(MinMax::Max);
        info.insertion = 0.5;
        let a = db.intern_clk_info(info.clone());
        let b = db.intern_clk_info(info.clone());
        info.insertion = 0.25;
        let c = db.intern_clk_info(info);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(db.clk_info_count(), 2);
    }

    #[test]
    fn exception_states_distinguish_tags() {
        let db = TagDb::new();
        let mut tag = data_tag(&db, RiseFall::Rise, 0);
        let plain = db.intern_tag(tag.clone());
        tag.states = vec![ExceptionState::initial(ExceptionId::from_raw(0))];
        let with_state = db.intern_tag(tag);
        assert_ne!(plain, with_state);
    }

    #[test]
    fn tag_group_interning_and_index() {
        let db = TagDb::new();
        let t0 = db.intern_tag(data_tag(&db, RiseFall::Rise, 0));
        let t1 = db.intern_tag(data_tag(&db, RiseFall::Fall, 0));
        let mut tags = vec![t0, t1];
        tags.sort();
        let g1 = db.intern_tag_group(TagGroup { tags: tags.clone() });
        let g2 = db.intern_tag_group(TagGroup { tags });
        assert_eq!(g1, g2);
        let group = db.tag_group(g1);
        assert_eq!(group.len(), 2);
        assert_eq!(group.index_of(t0), Some(group.tags.binary_search(&t0).unwrap()));
        assert_eq!(group.index_of(TagId::from_raw(999)), None);
    }

    #[test]
    fn match_crpr_clk_pin_ignores_clk_path_prefix() {
        let db = TagDb::new();
        let edge = ClockEdge::new(ClockId::from_raw(0), RiseFall::Rise);
        let mut info = ClkInfo::unclocked(MinMax::Max);
        info.clk_edge = Some(edge);
        info.clk_src = Some(PinId::from_raw(3));
        let plain_info = db.intern_clk_info(info.clone());
        info.crpr_clk_path = Some(PathRef {
            vertex: chronos_graph::VertexId::from_raw(9),
            index: 1,
        });
        let prefixed_info = db.intern_clk_info(info);
        assert_ne!(plain_info, prefixed_info);

        let make = |clk_info| Tag {
            rf: RiseFall::Rise,
            min_max: MinMax::Max,
            ap_index: 0,
            clk_info,
            is_clk: true,
            input_delay: None,
            is_segment_start: false,
            states: Vec::new(),
        };
        let a = make(plain_info);
        let b = make(prefixed_info);
        assert_ne!(a, b);
        assert!(a.match_crpr_clk_pin(&b, &db));
    }

    #[test]
    fn clear_releases_everything() {
        let db = TagDb::new();
        db.intern_tag(data_tag(&db, RiseFall::Rise, 0));
        db.clear();
        assert_eq!(db.tag_count(), 0);
        assert_eq!(db.clk_info_count(), 0);
        assert_eq!(db.tag_group_count(), 0);
    }

    #[test]
    fn concurrent_interning() {
        use std::sync::Arc as StdArc;
        use std::thread;

        let db = StdArc::new(TagDb::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = StdArc::clone(&db);
            handles.push(thread::spawn(move || {
                for ap in 0..4 {
                    let clk_info = db.intern_clk_info(ClkInfo::unclocked(MinMax::Max));
                    db.intern_tag(Tag {
                        rf: RiseFall::Rise,
                        min_max: MinMax::Max,
                        ap_index: ap,
                        clk_info,
                        is_clk: false,
                        input_delay: None,
                        is_segment_start: false,
                        states: Vec::new(),
                    });
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        // Double-checked insertion: four distinct tags total.
        assert_eq!(db.tag_count(), 4);
        assert_eq!(db.clk_info_count(), 1);
    }
}
