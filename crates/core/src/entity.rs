//! Entity trait: identity + continuity across state changes.

use uuid::Uuid;

/// Entity marker + minimal interface.
///
/// Every persisted document is an entity: it lives in a named collection and
/// is addressed by a UUID-backed identifier.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display + Into<Uuid>;

    /// Collection (document table) name.
    const COLLECTION: &'static str;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
