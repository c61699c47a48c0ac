//! Effect definitions: the immutable, designer-authored behavior table an
//! [`crate::instance::EffectInstance`] is stamped from.
//!
//! Definitions are authored as YAML, mirroring `arena-ai`'s archetype
//! documents (which in turn mirror the teacher's HTN `Method` authoring
//! format): a flat, `#[serde(default)]`-heavy struct parsed once at startup
//! and validated into the strict internal enums below.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use arena_core::Vec2;

use crate::error::EffectError;

/// How an effect is delivered into the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeliveryKind {
    /// Affects every actor within a geometry at a fixed location.
    Area,
    /// Tracks a single target actor.
    Target,
    /// Purely cosmetic; never resolves hits.
    Visual,
}

/// Effect footprint shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GeometryShape {
    /// A circle.
    Circle,
    /// An axis-aligned rectangle.
    Rect,
    /// A circular sector.
    Arc,
    /// A line segment.
    Segment,
    /// A capsule (segment with radius).
    Capsule,
}

/// Concrete geometry, sized per shape.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Geometry {
    /// See [`GeometryShape::Circle`].
    Circle {
        /// Circle radius.
        radius: f32,
    },
    /// See [`GeometryShape::Rect`].
    Rect {
        /// Half-extents on each axis.
        half_extents: Vec2,
    },
    /// See [`GeometryShape::Arc`].
    Arc {
        /// Arc radius.
        radius: f32,
        /// Arc sweep, in degrees.
        angle_degrees: f32,
    },
    /// See [`GeometryShape::Segment`].
    Segment {
        /// Segment length.
        length: f32,
    },
    /// See [`GeometryShape::Capsule`].
    Capsule {
        /// Capsule radius.
        radius: f32,
        /// Capsule length.
        length: f32,
    },
}

impl Geometry {
    /// This geometry's shape discriminant.
    #[must_use]
    pub fn shape(&self) -> GeometryShape {
        match self {
            Self::Circle { .. } => GeometryShape::Circle,
            Self::Rect { .. } => GeometryShape::Rect,
            Self::Arc { .. } => GeometryShape::Arc,
            Self::Segment { .. } => GeometryShape::Segment,
            Self::Capsule { .. } => GeometryShape::Capsule,
        }
    }
}

/// How an instance's delivery geometry moves over its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MotionProfile {
    /// Stationary.
    None,
    /// Applied once, no travel (e.g. a melee swing).
    Instant,
    /// Constant-velocity travel.
    Linear,
    /// Gravity-affected arc.
    Parabolic,
    /// Tracks an attached actor every tick.
    Follow,
}

/// How an instance resolves collisions along its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImpactPolicy {
    /// Ends on the first actor hit.
    FirstHit,
    /// Hits every actor in its path, once each.
    AllInPath,
    /// Hits up to `pierce_count` actors before ending.
    Pierce,
    /// Never resolves hits (visual-only).
    None,
}

/// `delivery-state.follow-mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FollowMode {
    /// Not attached to any actor.
    #[default]
    None,
    /// Follows the spawning (owner) actor.
    Owner,
    /// Follows the intent's target actor.
    Target,
}

/// A condition under `EndPolicy::Condition` that can terminate an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EndCondition {
    /// The owner unequips the item that spawned this effect. Resolved by the
    /// host folding the unequip signal into [`crate::hooks::EffectHost::cancel_requested`];
    /// the manager does not model equipment state itself.
    OnUnequip,
    /// The owner actor has died.
    OnOwnerDeath,
    /// The owner actor can no longer be found (disconnected/removed).
    OnOwnerLost,
    /// The owner has changed zones/maps.
    OnZoneChange,
    /// An explicit cancel signal was raised for this instance.
    OnExplicitCancel,
}

/// When/why an instance's lifetime ends.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EndPolicy {
    /// Ends when `ticks-remaining` reaches zero.
    Duration,
    /// Ends in the same tick after applying once.
    Instant,
    /// Ends when any listed condition holds.
    Condition(Vec<EndCondition>),
}

/// Booleans gating which lifecycle events reach the wire, plus an optional
/// update field whitelist.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReplicationSpec {
    /// Emit a spawn event.
    pub send_spawn: bool,
    /// Emit update events.
    pub send_updates: bool,
    /// Emit an end event.
    pub send_end: bool,
    /// The client simulates this effect locally; the server only confirms.
    pub managed_by_client: bool,
    /// When set, only these field names are included in update payloads.
    pub field_whitelist: Option<Vec<String>>,
}

/// Hook names resolved against a [`crate::hooks::HookRegistry`] at spawn
/// time. All four are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HookNames {
    /// `on-spawn` hook name.
    pub on_spawn: Option<String>,
    /// `on-tick` hook name.
    pub on_tick: Option<String>,
    /// `on-hit` hook name.
    pub on_hit: Option<String>,
    /// `on-expire` hook name.
    pub on_expire: Option<String>,
}

/// An immutable, designer-authored effect behavior table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EffectDefinition {
    /// Unique designer-facing identifier, e.g. `"goblin-club-smash"`.
    pub type_id: String,
    /// Delivery kind.
    pub delivery_kind: DeliveryKind,
    /// Default geometry (an intent may override it).
    pub geometry: Geometry,
    /// Motion profile.
    pub motion_profile: MotionProfile,
    /// Impact policy.
    pub impact_policy: ImpactPolicy,
    /// Default lifetime, in ticks (an intent may override it).
    pub lifetime_ticks: u32,
    /// Maximum actors hit under `ImpactPolicy::Pierce`.
    pub pierce_count: u32,
    /// Replication gating.
    pub replication: ReplicationSpec,
    /// End policy.
    pub end_policy: EndPolicy,
    /// Hook names.
    pub hooks: HookNames,
    /// Designer-authored numeric parameters (damage, speed, etc).
    pub params: HashMap<String, f32>,
}

/// Raw, serde-friendly authoring form of [`EffectDefinition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectDefinitionDoc {
    pub type_id: String,
    pub delivery_kind: String,
    pub geometry: GeometryDoc,
    #[serde(default)]
    pub motion_profile: Option<String>,
    #[serde(default)]
    pub impact_policy: Option<String>,
    #[serde(default)]
    pub lifetime_ticks: Option<u32>,
    #[serde(default)]
    pub pierce_count: Option<u32>,
    #[serde(default)]
    pub end_policy: Option<String>,
    #[serde(default)]
    pub end_conditions: Vec<String>,
    #[serde(default)]
    pub replication: ReplicationDoc,
    #[serde(default)]
    pub hooks: HookNamesDoc,
    #[serde(default)]
    pub params: HashMap<String, f32>,
}

/// Raw geometry authoring form; exactly one shape's fields should be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeometryDoc {
    pub shape: String,
    #[serde(default)]
    pub radius: Option<f32>,
    #[serde(default)]
    pub half_extents: Option<[f32; 2]>,
    #[serde(default)]
    pub angle_degrees: Option<f32>,
    #[serde(default)]
    pub length: Option<f32>,
}

/// Raw replication authoring form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplicationDoc {
    #[serde(default)]
    pub send_spawn: bool,
    #[serde(default)]
    pub send_updates: bool,
    #[serde(default)]
    pub send_end: bool,
    #[serde(default)]
    pub managed_by_client: bool,
    #[serde(default)]
    pub field_whitelist: Option<Vec<String>>,
}

/// Raw hook-name authoring form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookNamesDoc {
    #[serde(default)]
    pub on_spawn: Option<String>,
    #[serde(default)]
    pub on_tick: Option<String>,
    #[serde(default)]
    pub on_hit: Option<String>,
    #[serde(default)]
    pub on_expire: Option<String>,
}

/// One or more definitions authored together under a `definitions:` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectDefinitionsDoc {
    pub definitions: Vec<EffectDefinitionDoc>,
}

fn parse_geometry(doc: &GeometryDoc) -> Result<Geometry, EffectError> {
    match doc.shape.to_lowercase().as_str() {
        "circle" => Ok(Geometry::Circle {
            radius: doc.radius.unwrap_or(1.0),
        }),
        "rect" => {
            let [x, y] = doc.half_extents.unwrap_or([1.0, 1.0]);
            Ok(Geometry::Rect {
                half_extents: Vec2::new(x, y),
            })
        }
        "arc" => Ok(Geometry::Arc {
            radius: doc.radius.unwrap_or(1.0),
            angle_degrees: doc.angle_degrees.unwrap_or(90.0),
        }),
        "segment" => Ok(Geometry::Segment {
            length: doc.length.unwrap_or(1.0),
        }),
        "capsule" => Ok(Geometry::Capsule {
            radius: doc.radius.unwrap_or(1.0),
            length: doc.length.unwrap_or(1.0),
        }),
        other => Err(EffectError::UnknownGeometryShape(other.to_string())),
    }
}

fn parse_end_policy(doc: &EffectDefinitionDoc) -> Result<EndPolicy, EffectError> {
    match doc.end_policy.as_deref().unwrap_or("duration").to_lowercase().as_str() {
        "duration" => Ok(EndPolicy::Duration),
        "instant" => Ok(EndPolicy::Instant),
        "condition" => {
            let conditions = doc
                .end_conditions
                .iter()
                .map(|c| match c.to_lowercase().as_str() {
                    "on-unequip" => Ok(EndCondition::OnUnequip),
                    "on-owner-death" => Ok(EndCondition::OnOwnerDeath),
                    "on-owner-lost" => Ok(EndCondition::OnOwnerLost),
                    "on-zone-change" => Ok(EndCondition::OnZoneChange),
                    "on-explicit-cancel" => Ok(EndCondition::OnExplicitCancel),
                    other => Err(EffectError::UnknownEndCondition(other.to_string())),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(EndPolicy::Condition(conditions))
        }
        other => Err(EffectError::UnknownEndPolicy(other.to_string())),
    }
}

/// Compiles one authored definition document into its validated internal
/// form.
///
/// # Errors
/// Returns an [`EffectError`] on any unrecognized enum value.
pub fn compile_definition(doc: &EffectDefinitionDoc) -> Result<EffectDefinition, EffectError> {
    let delivery_kind = match doc.delivery_kind.to_lowercase().as_str() {
        "area" => DeliveryKind::Area,
        "target" => DeliveryKind::Target,
        "visual" => DeliveryKind::Visual,
        other => return Err(EffectError::UnknownDeliveryKind(other.to_string())),
    };
    let motion_profile = match doc.motion_profile.as_deref().unwrap_or("none").to_lowercase().as_str() {
        "none" => MotionProfile::None,
        "instant" => MotionProfile::Instant,
        "linear" => MotionProfile::Linear,
        "parabolic" => MotionProfile::Parabolic,
        "follow" => MotionProfile::Follow,
        other => return Err(EffectError::UnknownMotionProfile(other.to_string())),
    };
    let impact_policy = match doc.impact_policy.as_deref().unwrap_or("none").to_lowercase().as_str() {
        "first-hit" => ImpactPolicy::FirstHit,
        "all-in-path" => ImpactPolicy::AllInPath,
        "pierce" => ImpactPolicy::Pierce,
        "none" => ImpactPolicy::None,
        other => return Err(EffectError::UnknownImpactPolicy(other.to_string())),
    };

    Ok(EffectDefinition {
        type_id: doc.type_id.clone(),
        delivery_kind,
        geometry: parse_geometry(&doc.geometry)?,
        motion_profile,
        impact_policy,
        lifetime_ticks: doc.lifetime_ticks.unwrap_or(0),
        pierce_count: doc.pierce_count.unwrap_or(0),
        replication: ReplicationSpec {
            send_spawn: doc.replication.send_spawn,
            send_updates: doc.replication.send_updates,
            send_end: doc.replication.send_end,
            managed_by_client: doc.replication.managed_by_client,
            field_whitelist: doc.replication.field_whitelist.clone(),
        },
        end_policy: parse_end_policy(doc)?,
        hooks: HookNames {
            on_spawn: doc.hooks.on_spawn.clone(),
            on_tick: doc.hooks.on_tick.clone(),
            on_hit: doc.hooks.on_hit.clone(),
            on_expire: doc.hooks.on_expire.clone(),
        },
        params: doc.params.clone(),
    })
}

/// Parses and compiles every definition in a `definitions:`-keyed YAML
/// document.
///
/// # Errors
/// Returns [`EffectError::InvalidDocument`] on a YAML/schema mismatch, or the
/// first compile failure.
pub fn load_definitions(raw: &str) -> Result<Vec<EffectDefinition>, EffectError> {
    let doc: EffectDefinitionsDoc = serde_yaml::from_str(raw)?;
    doc.definitions.iter().map(compile_definition).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn embedded_definitions_compile() {
        let definitions = load_definitions(crate::EMBEDDED_DEFINITIONS).unwrap();
        assert!(definitions.iter().any(|d| d.type_id == "area-burst"));
        assert!(definitions.iter().any(|d| d.type_id == "goblin-club-smash"));
    }

    #[test]
    fn unknown_delivery_kind_is_rejected() {
        let raw = r#"
definitions:
  - type_id: broken
    delivery_kind: teleport
    geometry:
      shape: circle
      radius: 1.0
"#;
        let err = load_definitions(raw).unwrap_err();
        assert!(matches!(err, EffectError::UnknownDeliveryKind(_)));
    }
}
