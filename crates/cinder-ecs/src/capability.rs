//! Capability views: "every component that can act as `C`".
//!
//! A capability is any `?Sized` type, normally a trait object such as
//! `dyn Renderable`. A component type opts in at registration time by
//! supplying a cast `fn(&mut T) -> &mut C`. The memory manager resolves, once
//! per pool, which pools expose which capability, so a capability query never
//! inspects individual instances to decide whether they qualify.

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::rc::Rc;

use crate::component::Component;
use crate::entity::EntityId;
use crate::pool::{AnyPool, ComponentPool};

/// Visits every instance of one pool through capability `C`.
pub(crate) trait CapabilityVisitor<C: ?Sized> {
    fn visit(&self, pool: &mut dyn AnyPool, f: &mut dyn FnMut(EntityId, &mut C)) -> usize;
}

/// The [`CapabilityVisitor`] for component type `T`.
struct Caster<T, C: ?Sized + 'static> {
    cast: fn(&mut T) -> &mut C,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Component, C: ?Sized + 'static> CapabilityVisitor<C> for Caster<T, C> {
    fn visit(&self, pool: &mut dyn AnyPool, f: &mut dyn FnMut(EntityId, &mut C)) -> usize {
        let Some(pool) = pool.as_any_mut().downcast_mut::<ComponentPool<T>>() else {
            tracing::error!(
                component = %std::any::type_name::<T>(),
                "capability visitor attached to a pool of a different type"
            );
            return 0;
        };
        let mut visited = 0;
        pool.for_each_mut(|entity, value| {
            f(entity, (self.cast)(value));
            visited += 1;
        });
        visited
    }
}

/// A type-erased capability declaration stored on a component descriptor.
///
/// `visitor` holds a `Box<dyn CapabilityVisitor<C>>` behind `dyn Any`, keyed
/// by `TypeId::of::<C>()`.
#[derive(Clone)]
pub(crate) struct CapabilityEntry {
    pub capability: TypeId,
    pub capability_name: &'static str,
    visitor: Rc<dyn Any>,
}

impl CapabilityEntry {
    pub fn new<T: Component, C: ?Sized + 'static>(cast: fn(&mut T) -> &mut C) -> Self {
        let visitor: Box<dyn CapabilityVisitor<C>> = Box::new(Caster {
            cast,
            _marker: PhantomData,
        });
        Self {
            capability: TypeId::of::<C>(),
            capability_name: std::any::type_name::<C>(),
            visitor: Rc::new(visitor),
        }
    }

    /// Recover the typed visitor, if this entry is for capability `C`.
    pub fn visitor<C: ?Sized + 'static>(&self) -> Option<&dyn CapabilityVisitor<C>> {
        self.visitor
            .downcast_ref::<Box<dyn CapabilityVisitor<C>>>()
            .map(|boxed| boxed.as_ref())
    }
}

impl std::fmt::Debug for CapabilityEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityEntry")
            .field("capability", &self.capability_name)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
