//! Patches: append-only deltas the journal stages between broadcasts.
//!
//! A patch always names the entity it concerns via [`EntityId`], which
//! spans the three id spaces a broadcast's alive-set filter has to reason
//! about (actors, ground items, effect instances).

use std::collections::HashMap;

use crate::geom::{Facing, Vec2};
use crate::world::{ActorId, GroundItemId};

/// Identifies the entity a [`Patch`] concerns, across the three id spaces
/// the alive-set filter (spec.md §4.5 step 7) has to reason about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntityId {
    /// A player or NPC (they share the actor id space).
    Actor(ActorId),
    /// A ground item.
    GroundItem(GroundItemId),
    /// A live effect instance. Carried as a raw `u64` rather than
    /// `arena_effects::EffectInstanceId` to keep `arena-core` free of a
    /// dependency on `arena-effects`.
    Effect(u64),
}

/// A single slot in an actor's equipment loadout, referenced opaquely since
/// the equipment module itself is out of scope (spec.md §1).
pub type EquipmentSlot = u16;

/// A typed delta to one entity's attribute (spec.md §3 "Journal State").
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PatchKind {
    /// Resolved position after movement/collision for this tick.
    Position(Vec2),
    /// Facing changed independent of position (e.g. the `face` action).
    Facing(Facing),
    /// The actor's last-applied movement intent, distinct from the
    /// collision-resolved `Position` patch above.
    Intent {
        /// Requested movement delta before collision resolution.
        delta: Vec2,
    },
    /// Health changed.
    Health {
        /// Current health.
        health: f32,
        /// Maximum health.
        max_health: f32,
    },
    /// An inventory slot's contents changed. The inventory module's own
    /// layout/business rules are out of scope; this carries only what a
    /// replication client needs to redraw a slot.
    Inventory {
        /// Slot index.
        slot: u16,
        /// Item type reference, or `None` if the slot emptied.
        item_id: Option<u64>,
        /// Stack quantity.
        quantity: u32,
    },
    /// An equipment slot's contents changed.
    Equipment {
        /// Slot index.
        slot: EquipmentSlot,
        /// Item type reference, or `None` if unequipped.
        item_id: Option<u64>,
    },
    /// An effect instance's geometry moved.
    EffectPosition(Vec2),
    /// An effect instance's numeric parameters changed.
    EffectParams(HashMap<String, f32>),
    /// A ground item's stack quantity changed; `0` is a terminal marker
    /// (the item was fully picked up or despawned).
    GroundItemQuantity(u32),
    /// A ground item's position changed (e.g. it was knocked).
    GroundItemPosition(Vec2),
    /// The player left the world (disconnect or defeat). Terminal.
    PlayerRemoved,
    /// The NPC left the world (defeat). Terminal.
    NpcRemoved,
}

/// One staged delta, produced by the world step and consumed by a
/// broadcast assembly pass.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Patch {
    /// Entity this patch concerns.
    pub entity_id: EntityId,
    /// The delta itself.
    pub kind: PatchKind,
}

impl Patch {
    /// Convenience constructor.
    #[must_use]
    pub fn new(entity_id: EntityId, kind: PatchKind) -> Self {
        Self { entity_id, kind }
    }

    /// True for patches that describe an entity's removal (or a ground
    /// item's terminal zero-quantity), which the alive-set filter must let
    /// through even though the entity is no longer present (spec.md §4.5
    /// step 7: "unless it is a terminal marker").
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            PatchKind::PlayerRemoved | PatchKind::NpcRemoved | PatchKind::GroundItemQuantity(0)
        )
    }
}
