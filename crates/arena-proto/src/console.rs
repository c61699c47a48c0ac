//! Debug console commands and their fixed ack-reason vocabulary (spec.md §6
//! "Console commands"). The inventory/economy business logic these commands
//! front is out of scope; this only defines the request/response shape the
//! core's command handlers are held to.

use serde::{Deserialize, Serialize};

use arena_core::world::{ActorId, GroundItemId};

/// One debug console operation a privileged caller may issue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ConsoleCommand {
    /// Drops `quantity` gold from `actor`'s inventory onto the ground.
    DropGold {
        /// Actor whose gold is dropped.
        actor: ActorId,
        /// Amount to drop.
        quantity: u32,
    },
    /// Equips whatever occupies `inventory_slot` into `equip_slot`.
    EquipSlot {
        /// Actor performing the equip.
        actor: ActorId,
        /// Source inventory slot.
        inventory_slot: u16,
        /// Destination equipment slot.
        equip_slot: u16,
    },
    /// Unequips whatever occupies `equip_slot` back into the inventory.
    UnequipSlot {
        /// Actor performing the unequip.
        actor: ActorId,
        /// Equipment slot to clear.
        equip_slot: u16,
    },
    /// Picks up a ground-item gold stack into `actor`'s inventory.
    PickupGold {
        /// Actor performing the pickup.
        actor: ActorId,
        /// Ground item to pick up.
        ground_item: GroundItemId,
    },
}

/// The fixed reason vocabulary every console-command ack is drawn from
/// (spec.md §6). Never extended ad hoc by a handler; unmapped failures use
/// [`AckReason::InternalError`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AckReason {
    /// The command succeeded.
    Ok,
    /// A requested quantity was zero, negative, or exceeded the stack.
    InvalidQuantity,
    /// The named actor does not exist.
    UnknownActor,
    /// The actor does not have enough gold.
    InsufficientGold,
    /// The inventory module rejected the operation.
    InventoryError,
    /// The named inventory slot index is out of range.
    InvalidInventorySlot,
    /// The named equipment slot index is out of range.
    InvalidEquipSlot,
    /// The source slot named has nothing in it.
    EmptySlot,
    /// The item cannot be equipped in the requested slot.
    NotEquippable,
    /// The destination equipment slot is already empty (nothing to clear).
    SlotEmpty,
    /// The actor is too far from the ground item.
    OutOfRange,
    /// The named ground item does not exist.
    NotFound,
    /// The command name did not resolve to a known operation.
    UnknownCommand,
    /// An unmapped failure occurred handling the command.
    InternalError,
}

/// The response to a [`ConsoleCommand`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsoleAck {
    /// Why the command succeeded or failed.
    pub reason: AckReason,
}

impl ConsoleAck {
    /// Convenience constructor for a successful ack.
    #[must_use]
    pub fn ok() -> Self {
        Self { reason: AckReason::Ok }
    }

    /// Convenience constructor for a failed ack.
    #[must_use]
    pub fn failed(reason: AckReason) -> Self {
        debug_assert!(reason != AckReason::Ok, "failed() called with AckReason::Ok");
        Self { reason }
    }

    /// `true` for [`AckReason::Ok`].
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.reason == AckReason::Ok
    }
}
