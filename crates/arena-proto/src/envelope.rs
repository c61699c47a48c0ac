//! The join handshake and the per-tick state stream envelope (spec.md §6).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use arena_core::world::{ActorId, GroundItem, Npc, Obstacle, Player, WorldConfig};
use arena_core::{Patch, Tick, Vec2};
use arena_effects::instance::EffectInstanceId;
use arena_journal::EffectEvent;

/// Wire protocol version. Bumped on any breaking envelope/message change.
pub const PROTOCOL_VERSION: u32 = 1;

/// A lightweight one-shot notification for an `EndPolicy::Instant` effect
/// (spec.md §6 "State stream" — `effect-triggers (one-shots)`): fires and
/// resolves within the same tick it spawned on, so a client that doesn't
/// track the full effect lifecycle still gets to play the cosmetic/impact
/// cue. Emitted alongside (not instead of) that effect's entries in
/// `effect_spawned`/`effect_ended`, for clients that do track lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EffectTrigger {
    /// The instance this trigger fired for.
    pub instance_id: EffectInstanceId,
    /// Designer-facing effect type, e.g. `"area-burst"`.
    pub type_id: String,
    /// Tick the trigger fired on.
    pub tick: Tick,
    /// The actor that caused this effect to spawn.
    pub owner_actor_id: ActorId,
    /// Position the effect resolved at.
    pub position: Vec2,
}

/// Response to a client's join handshake. Lifecycle event arrays are
/// deliberately absent here; the first state broadcast carries the initial
/// keyframe (spec.md §6 "Join").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinAck {
    /// Wire protocol version.
    pub protocol_version: u32,
    /// The actor id assigned to this connection.
    pub actor_id: ActorId,
    /// The joining player's initial state.
    pub actor_snapshot: Player,
    /// Static obstacle layout.
    pub obstacles: Vec<Obstacle>,
    /// Ground items present at join time.
    pub ground_items: Vec<GroundItem>,
    /// World tunables.
    pub world_config: WorldConfig,
    /// Always `true`: a join is itself a resync.
    pub resync: bool,
    /// Current keyframe cadence, in ticks.
    pub keyframe_interval: u32,
}

/// The full-snapshot payload carried only on a keyframe tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StateSnapshot {
    /// All connected players.
    pub players: Vec<Player>,
    /// All live NPCs.
    pub npcs: Vec<Npc>,
    /// Static obstacle layout.
    pub obstacles: Vec<Obstacle>,
    /// Ground items present at snapshot time.
    pub ground_items: Vec<GroundItem>,
    /// World tunables.
    pub world_config: WorldConfig,
}

/// The header every state envelope carries, regardless of what else is
/// populated (spec.md §6 "State stream").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvelopeHeader {
    /// Wire protocol version.
    pub version: u32,
    /// Simulation tick this envelope was produced for.
    pub tick: Tick,
    /// Broadcast sequence, strictly increasing by one per envelope.
    pub sequence: u64,
    /// Sequence of the most recently recorded keyframe at assembly time.
    pub keyframe_sequence: u64,
    /// Wall-clock time (ms since epoch) this envelope was assembled.
    pub server_time_ms: u64,
    /// Set when the journal's resync hint was consumed for this envelope.
    pub resync: bool,
    /// Current keyframe cadence, in ticks.
    pub keyframe_interval: u32,
}

/// The full per-tick state message (spec.md §6 "State stream").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateEnvelope {
    /// Always present.
    pub header: EnvelopeHeader,
    /// Present only on a keyframe tick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<StateSnapshot>,
    /// Patches staged since the previous broadcast; may be empty.
    pub patches: Vec<Patch>,
    /// One-shot triggers for `EndPolicy::Instant` effects staged this tick;
    /// always present, may be empty.
    pub effect_triggers: Vec<EffectTrigger>,
    /// Spawn lifecycle events staged since the previous broadcast.
    pub effect_spawned: Vec<EffectEvent>,
    /// Update lifecycle events staged since the previous broadcast.
    pub effect_update: Vec<EffectEvent>,
    /// End lifecycle events staged since the previous broadcast.
    pub effect_ended: Vec<EffectEvent>,
    /// Last sequence assigned per effect instance id, drained this
    /// broadcast (spec.md §6).
    pub effect_seq_cursors: HashMap<EffectInstanceId, u64>,
}

impl StateEnvelope {
    /// `true` once this envelope's header carries a keyframe.
    #[must_use]
    pub fn is_keyframe(&self) -> bool {
        self.snapshot.is_some()
    }
}
