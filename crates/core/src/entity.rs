//! Entity trait: identity that survives state changes.

/// Minimal interface for identified domain records (equipment items, loans).
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
