//! Lifecycle hook dispatch.
//!
//! Every registered type gets a monomorphized [`dispatch`] entry stored on its
//! descriptor. The entity manager walks a snapshot of `(type, entity)` pairs
//! and calls the entry for each; the entry checks the instance out of its
//! pool, runs the hook with full mutable access to the manager, and checks it
//! back in. The delete hook runs the same way, with the slot still in its
//! pool, and the slot is removed once the hook returns. An instance destroyed
//! while checked out (typically by its own hook) comes back as an orphan and
//! receives its delete hook at that point.

use std::ops::{Deref, DerefMut};

use crate::component::{Component, ComponentTypeId};
use crate::entity::EntityId;
use crate::manager::EntityManager;
use crate::pool::SlotFilter;

/// The four lifecycle callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// [`Component::start`].
    Start,
    /// [`Component::update`].
    Update,
    /// [`Component::fixed_update`].
    FixedUpdate,
    /// [`Component::on_delete`].
    Delete,
}

impl Hook {
    /// Which instances a pass for this hook visits.
    pub(crate) fn filter(self) -> SlotFilter {
        match self {
            Hook::Start => SlotFilter::Pending,
            Hook::Update | Hook::FixedUpdate => SlotFilter::Started,
            Hook::Delete => SlotFilter::All,
        }
    }
}

/// Per-type dispatch entry: runs `hook` on `entity`'s instance of the type.
/// Returns whether a hook ran.
pub(crate) type HookFn = fn(&mut EntityManager, ComponentTypeId, EntityId, Hook) -> bool;

/// Frame timing published by the frame driver and read by hooks.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTime {
    /// Seconds since the previous frame.
    pub delta: f64,
    /// Seconds per fixed step.
    pub fixed_delta: f64,
    /// Seconds since the driver started.
    pub elapsed: f64,
    /// Frames completed so far.
    pub frame: u64,
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// What a hook sees: the owning entity plus the whole manager.
///
/// Dereferences to [`EntityManager`], so hooks call `ctx.add::<T>(..)`,
/// `ctx.destroy_entity(other)` and friends directly.
pub struct Context<'a> {
    manager: &'a mut EntityManager,
    entity: EntityId,
    component: ComponentTypeId,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        manager: &'a mut EntityManager,
        entity: EntityId,
        component: ComponentTypeId,
    ) -> Self {
        Self {
            manager,
            entity,
            component,
        }
    }

    /// The entity owning the component whose hook is running.
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// The type of the component whose hook is running.
    pub fn component_type(&self) -> ComponentTypeId {
        self.component
    }

    /// Current frame timing.
    pub fn time(&self) -> FrameTime {
        self.manager.frame_time()
    }

    /// Destroy the component whose hook is running. Its `on_delete` runs once
    /// the current hook returns.
    pub fn destroy_self(&mut self) -> bool {
        self.manager.destroy_component(self.entity, self.component)
    }

    /// Destroy the owning entity and all of its components.
    pub fn destroy_owner(&mut self) -> bool {
        self.manager.destroy_entity(self.entity)
    }
}

impl Deref for Context<'_> {
    type Target = EntityManager;

    fn deref(&self) -> &EntityManager {
        &*self.manager
    }
}

impl DerefMut for Context<'_> {
    fn deref_mut(&mut self) -> &mut EntityManager {
        &mut *self.manager
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

fn invoke<T: Component>(value: &mut T, hook: Hook, ctx: &mut Context<'_>) {
    match hook {
        Hook::Start => value.start(ctx),
        Hook::Update => value.update(ctx),
        Hook::FixedUpdate => value.fixed_update(ctx),
        Hook::Delete => value.on_delete(ctx),
    }
}

/// The [`HookFn`] for component type `T`.
pub(crate) fn dispatch<T: Component>(
    manager: &mut EntityManager,
    type_id: ComponentTypeId,
    entity: EntityId,
    hook: Hook,
) -> bool {
    if hook == Hook::Delete {
        let Some(pool) = manager.memory_mut().pool_by_id_mut::<T>(type_id) else {
            return false;
        };
        let Some(mut checkout) = pool.check_out(entity, SlotFilter::All) else {
            // Already out: its running hook gets the orphan back at check-in
            // and runs the delete hook then.
            return pool.take(entity).is_some();
        };
        // The slot stays in place while the delete hook runs.
        invoke(
            &mut checkout.value,
            Hook::Delete,
            &mut Context::new(manager, entity, type_id),
        );
        if let Some(pool) = manager.memory_mut().pool_by_id_mut::<T>(type_id) {
            pool.retire(checkout);
        }
        return true;
    }

    let Some(pool) = manager.memory_mut().pool_by_id_mut::<T>(type_id) else {
        return false;
    };
    let Some(mut checkout) = pool.check_out(entity, hook.filter()) else {
        return false;
    };

    invoke(
        &mut checkout.value,
        hook,
        &mut Context::new(manager, entity, type_id),
    );

    let orphan = match manager.memory_mut().pool_by_id_mut::<T>(type_id) {
        Some(pool) => pool.check_in(checkout),
        None => Some(checkout.value),
    };
    if let Some(mut orphan) = orphan {
        tracing::debug!(
            entity = %entity,
            hook = ?hook,
            "component destroyed during its own hook"
        );
        invoke(&mut orphan, Hook::Delete, &mut Context::new(manager, entity, type_id));
    }
    true
}

/// Checkout-based visit used by [`EntityManager::for_each`].
pub(crate) fn visit<T: Component>(
    manager: &mut EntityManager,
    type_id: ComponentTypeId,
    entity: EntityId,
    f: &mut dyn FnMut(&mut T, &mut Context<'_>),
) -> bool {
    let Some(pool) = manager.memory_mut().pool_by_id_mut::<T>(type_id) else {
        return false;
    };
    let Some(mut checkout) = pool.check_out(entity, SlotFilter::All) else {
        return false;
    };

    f(&mut checkout.value, &mut Context::new(manager, entity, type_id));

    let orphan = match manager.memory_mut().pool_by_id_mut::<T>(type_id) {
        Some(pool) => pool.check_in(checkout),
        None => Some(checkout.value),
    };
    if let Some(mut orphan) = orphan {
        invoke(&mut orphan, Hook::Delete, &mut Context::new(manager, entity, type_id));
    }
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
