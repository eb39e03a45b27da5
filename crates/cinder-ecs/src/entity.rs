//! Entity identifiers, allocation, and the per-entity directory record.
//!
//! An [`EntityId`] is a 64-bit handle handed out by a monotonically increasing
//! counter. Identifiers are never recycled, so a stale id can never alias a
//! newer entity: once destroyed, an id simply stops resolving.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::component::ComponentTypeId;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// An opaque, never-reused entity identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// The null id. Never returned by an [`EntityAllocator`].
    pub const NULL: EntityId = EntityId(0);

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Whether this is [`EntityId::NULL`].
    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Hands out fresh [`EntityId`]s. Ids start at 1 and only ever grow.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    last: u64,
}

impl EntityAllocator {
    /// Create a new allocator.
    pub fn new() -> Self {
        Self { last: 0 }
    }

    /// Allocate the next id.
    pub fn allocate(&mut self) -> EntityId {
        self.last += 1;
        EntityId(self.last)
    }

    /// Number of ids handed out so far (alive or not).
    pub fn allocated_count(&self) -> u64 {
        self.last
    }
}

// ---------------------------------------------------------------------------
// EntityRecord
// ---------------------------------------------------------------------------

/// Directory entry kept by the entity manager for every live entity.
#[derive(Debug, Clone, Default)]
pub struct EntityRecord {
    /// Display name; empty means unnamed.
    pub name: String,
    /// Component types currently attached, in ascending type-id order.
    pub components: BTreeSet<ComponentTypeId>,
    /// Set while the entity is being torn down; attaching is refused then.
    pub(crate) destroying: bool,
    /// Types whose delete hook is running. They stay attached until it returns.
    pub(crate) deleting: BTreeSet<ComponentTypeId>,
}

impl EntityRecord {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            components: BTreeSet::new(),
            destroying: false,
            deleting: BTreeSet::new(),
        }
    }

    /// Whether the entity has a display name.
    pub fn is_named(&self) -> bool {
        !self.name.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_unique_increasing_ids() {
        let mut alloc = EntityAllocator::new();
        let ids: Vec<EntityId> = (0..100).map(|_| alloc.allocate()).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(alloc.allocated_count(), 100);
    }

    #[test]
    fn null_is_never_allocated() {
        let mut alloc = EntityAllocator::new();
        let first = alloc.allocate();
        assert!(!first.is_null());
        assert_eq!(first.to_raw(), 1);
        assert!(EntityId::NULL.is_null());
    }

    #[test]
    fn entity_id_roundtrip_and_display() {
        let id = EntityId::from_raw(42);
        assert_eq!(id.to_raw(), 42);
        assert_eq!(format!("{id}"), "#42");
        assert_eq!(format!("{id:?}"), "EntityId(42)");
    }

    #[test]
    fn record_name_flag() {
        assert!(!EntityRecord::new("").is_named());
        assert!(EntityRecord::new("Player").is_named());
    }
}
