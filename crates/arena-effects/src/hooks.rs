//! The four-hook contract and its registry.
//!
//! Hooks are registered by name (resolved from each definition's
//! [`crate::definition::HookNames`]) against a host trait that stands in for
//! the out-of-scope world/movement collaborators. A panicking hook is caught
//! with `catch_unwind` so one misbehaving effect never aborts a tick.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use tracing::error;

use arena_core::telemetry::Telemetry;
use arena_core::world::ActorId;
use arena_core::Tick;

use crate::instance::{EffectInstance, EffectInstanceId};

/// Host-supplied world queries the effect manager needs but does not own:
/// actor liveness/position, and the handful of predicates a `condition` end
/// policy consults.
pub trait EffectHost {
    /// Current position of `actor_id`, if it still exists.
    fn actor_position(&self, actor_id: ActorId) -> Option<arena_core::Vec2>;
    /// True if `actor_id` exists and is not defeated.
    fn actor_alive(&self, actor_id: ActorId) -> bool;
    /// True if an explicit cancel signal is pending for `instance_id`.
    fn cancel_requested(&self, instance_id: EffectInstanceId) -> bool;
    /// True if the owning actor has changed zones since spawn.
    fn zone_changed(&self, instance_id: EffectInstanceId) -> bool;
}

/// `on-spawn`/`on-tick`/`on-expire` share this signature.
pub type LifecycleHook = Box<dyn Fn(&mut dyn EffectHost, &mut EffectInstance, Tick, u64) + Send + Sync>;
/// `on-hit` additionally receives the actor that was hit.
pub type HitHook = Box<dyn Fn(&mut dyn EffectHost, &mut EffectInstance, ActorId, Tick, u64) + Send + Sync>;

/// A name-addressed table of hook implementations, resolved against
/// definitions at spawn time.
#[derive(Default)]
pub struct HookRegistry {
    on_spawn: HashMap<String, LifecycleHook>,
    on_tick: HashMap<String, LifecycleHook>,
    on_hit: HashMap<String, HitHook>,
    on_expire: HashMap<String, LifecycleHook>,
}

impl HookRegistry {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an `on-spawn` hook under `name`.
    pub fn register_on_spawn(&mut self, name: impl Into<String>, hook: LifecycleHook) {
        self.on_spawn.insert(name.into(), hook);
    }

    /// Registers an `on-tick` hook under `name`.
    pub fn register_on_tick(&mut self, name: impl Into<String>, hook: LifecycleHook) {
        self.on_tick.insert(name.into(), hook);
    }

    /// Registers an `on-hit` hook under `name`.
    pub fn register_on_hit(&mut self, name: impl Into<String>, hook: HitHook) {
        self.on_hit.insert(name.into(), hook);
    }

    /// Registers an `on-expire` hook under `name`.
    pub fn register_on_expire(&mut self, name: impl Into<String>, hook: LifecycleHook) {
        self.on_expire.insert(name.into(), hook);
    }

    fn run_lifecycle(
        table: &HashMap<String, LifecycleHook>,
        name: Option<&str>,
        host: &mut dyn EffectHost,
        instance: &mut EffectInstance,
        tick: Tick,
        now_ms: u64,
        telemetry: &Telemetry,
        hook_kind: &'static str,
    ) {
        let Some(name) = name else { return };
        let Some(hook) = table.get(name) else { return };
        let result = panic::catch_unwind(AssertUnwindSafe(|| hook(host, instance, tick, now_ms)));
        if result.is_err() {
            telemetry.update(|t| t.effects_hook_panics += 1);
            error!(hook = hook_kind, name, instance = instance.id.0, "effect hook panicked, treating as absent this tick");
        }
    }

    /// Runs the `on-spawn` hook named `name`, if registered. Panics are
    /// caught and counted.
    pub fn run_on_spawn(
        &self,
        name: Option<&str>,
        host: &mut dyn EffectHost,
        instance: &mut EffectInstance,
        tick: Tick,
        now_ms: u64,
        telemetry: &Telemetry,
    ) {
        Self::run_lifecycle(&self.on_spawn, name, host, instance, tick, now_ms, telemetry, "on-spawn");
    }

    /// Runs the `on-tick` hook named `name`, if registered. Panics are
    /// caught and counted.
    pub fn run_on_tick(
        &self,
        name: Option<&str>,
        host: &mut dyn EffectHost,
        instance: &mut EffectInstance,
        tick: Tick,
        now_ms: u64,
        telemetry: &Telemetry,
    ) {
        Self::run_lifecycle(&self.on_tick, name, host, instance, tick, now_ms, telemetry, "on-tick");
    }

    /// Runs the `on-expire` hook named `name`, if registered. Panics are
    /// caught and counted.
    pub fn run_on_expire(
        &self,
        name: Option<&str>,
        host: &mut dyn EffectHost,
        instance: &mut EffectInstance,
        tick: Tick,
        now_ms: u64,
        telemetry: &Telemetry,
    ) {
        Self::run_lifecycle(&self.on_expire, name, host, instance, tick, now_ms, telemetry, "on-expire");
    }

    /// Runs the `on-hit` hook named `name`, if registered. Panics are caught
    /// and counted.
    pub fn run_on_hit(
        &self,
        name: Option<&str>,
        host: &mut dyn EffectHost,
        instance: &mut EffectInstance,
        actor_id: ActorId,
        tick: Tick,
        now_ms: u64,
        telemetry: &Telemetry,
    ) {
        let Some(name) = name else { return };
        let Some(hook) = self.on_hit.get(name) else { return };
        let result = panic::catch_unwind(AssertUnwindSafe(|| hook(host, instance, actor_id, tick, now_ms)));
        if result.is_err() {
            telemetry.update(|t| t.effects_hook_panics += 1);
            error!(hook = "on-hit", name, instance = instance.id.0, "effect hook panicked, treating as absent this tick");
        }
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("on_spawn", &self.on_spawn.keys().collect::<Vec<_>>())
            .field("on_tick", &self.on_tick.keys().collect::<Vec<_>>())
            .field("on_hit", &self.on_hit.keys().collect::<Vec<_>>())
            .field("on_expire", &self.on_expire.keys().collect::<Vec<_>>())
            .finish()
    }
}
