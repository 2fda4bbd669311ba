/// Registry - sparse entity/component storage with destruction signals.
///
/// Entities are slotmap keys: stable and generation-checked, so a destroyed
/// entity's id never aliases a live one. Each component type lives in its
/// own sparse map. Observers registered with `on_destroy::<T>()` are called
/// synchronously, before the component is dropped, whenever a `T` leaves an
/// entity (explicit `remove`, or `destroy` of the entity).

use std::any::{Any, TypeId};
use std::sync::{Arc, Weak};
use rustc_hash::{FxBuildHasher, FxHashMap};
use slotmap::{new_key_type, SlotMap, SparseSecondaryMap};
use crate::error::{Error, Result};

new_key_type! {
    /// Opaque entity identifier
    pub struct Entity;
}

/// Marker for types that can be attached to entities
pub trait Component: Any + Send + Sync {}

impl<T: Any + Send + Sync> Component for T {}

/// Destruction observer
pub type DestroyCallback = Arc<dyn Fn(&Registry, Entity) + Send + Sync>;

/// Liveness token of an owned observer (see `Registry::on_destroy_owned`)
pub type ObserverOwner = Weak<dyn Any + Send + Sync>;

struct Observer {
    id: u64,
    callback: DestroyCallback,
    owner: Option<ObserverOwner>,
}

impl Observer {
    fn is_live(&self) -> bool {
        self.owner.as_ref().map_or(true, |owner| owner.strong_count() > 0)
    }
}

/// Handle returned by `on_destroy`, used to disconnect the observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection {
    id: u64,
    component: TypeId,
}

// ============================================================================
// Type-erased component storage
// ============================================================================

trait ComponentStorage: Send + Sync {
    fn contains(&self, entity: Entity) -> bool;
    fn remove_entity(&mut self, entity: Entity);
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Storage<T: Component> {
    components: SparseSecondaryMap<Entity, T, FxBuildHasher>,
}

impl<T: Component> ComponentStorage for Storage<T> {
    fn contains(&self, entity: Entity) -> bool {
        self.components.contains_key(entity)
    }

    fn remove_entity(&mut self, entity: Entity) {
        self.components.remove(entity);
    }

    fn len(&self) -> usize {
        self.components.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Default)]
pub struct Registry {
    entities: SlotMap<Entity, ()>,
    storages: FxHashMap<TypeId, Box<dyn ComponentStorage>>,
    destroy_signals: FxHashMap<TypeId, Vec<Observer>>,
    next_connection: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== ENTITIES =====

    /// Create a new entity without components
    pub fn create(&mut self) -> Entity {
        self.entities.insert(())
    }

    /// Destroy an entity and all of its components
    ///
    /// Destruction observers fire once per component type the entity holds.
    /// Returns false if the entity was not alive.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if !self.entities.contains_key(entity) {
            return false;
        }

        let held: Vec<TypeId> = self
            .storages
            .iter()
            .filter(|(_, storage)| storage.contains(entity))
            .map(|(type_id, _)| *type_id)
            .collect();

        for type_id in held {
            self.notify_destroy(type_id, entity);
            if let Some(storage) = self.storages.get_mut(&type_id) {
                storage.remove_entity(entity);
            }
        }

        self.entities.remove(entity);
        true
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.contains_key(entity)
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate over all live entities
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.keys()
    }

    /// Destroy every entity, firing destruction observers
    pub fn clear(&mut self) {
        let entities: Vec<Entity> = self.entities.keys().collect();
        for entity in entities {
            self.destroy(entity);
        }
    }

    // ===== COMPONENTS =====

    /// Attach a component to an entity
    ///
    /// # Errors
    ///
    /// `InvalidResource` if the entity is not alive or already holds a `T`
    pub fn emplace<T: Component>(&mut self, entity: Entity, component: T) -> Result<()> {
        if !self.is_alive(entity) {
            return Err(Error::InvalidResource(format!("entity {:?} is not alive", entity)));
        }
        let storage = self.storage_mut::<T>();
        if storage.components.contains_key(entity) {
            return Err(Error::InvalidResource(format!(
                "entity {:?} already has a {}",
                entity,
                std::any::type_name::<T>()
            )));
        }
        storage.components.insert(entity, component);
        Ok(())
    }

    /// Replace an existing component in place
    ///
    /// No destruction signal is emitted: the component is updated, not removed.
    pub fn replace<T: Component>(&mut self, entity: Entity, component: T) -> Result<()> {
        match self.get_mut::<T>(entity) {
            Some(slot) => {
                *slot = component;
                Ok(())
            }
            None => Err(Error::InvalidResource(format!(
                "entity {:?} has no {}",
                entity,
                std::any::type_name::<T>()
            ))),
        }
    }

    /// Detach a component, firing destruction observers first
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        if !self.has::<T>(entity) {
            return None;
        }
        let type_id = TypeId::of::<T>();
        self.notify_destroy(type_id, entity);
        self.storage_mut::<T>().components.remove(entity)
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.storage::<T>()
            .map_or(false, |s| s.components.contains_key(entity))
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>()?.components.get(entity)
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.storages
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<Storage<T>>()?
            .components
            .get_mut(entity)
    }

    /// Number of entities holding a `T`
    pub fn count<T: Component>(&self) -> usize {
        self.storage::<T>().map_or(0, |s| s.len())
    }

    // ===== VIEWS =====

    /// Iterate over every entity holding a `T` (unspecified order)
    pub fn view<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.storage::<T>()
            .into_iter()
            .flat_map(|s| s.components.iter())
    }

    /// Iterate over every entity holding both an `A` and a `B`
    pub fn view2<A: Component, B: Component>(&self) -> impl Iterator<Item = (Entity, &A, &B)> + '_ {
        let others = self.storage::<B>();
        self.view::<A>().filter_map(move |(entity, a)| {
            others
                .and_then(|s| s.components.get(entity))
                .map(|b| (entity, a, b))
        })
    }

    // ===== SIGNALS =====

    /// Register an observer called whenever a `T` is removed from an entity
    ///
    /// The observer stays connected until `disconnect`.
    pub fn on_destroy<T: Component>(&mut self, callback: DestroyCallback) -> Connection {
        self.connect_observer::<T>(callback, None)
    }

    /// Like `on_destroy`, but the observer lives only as long as `owner`
    ///
    /// Once every strong reference to the owner is gone the observer is no
    /// longer called and is discarded at the next dispatch, so an owner
    /// dropped without calling `disconnect` leaves nothing behind.
    pub fn on_destroy_owned<T: Component>(
        &mut self,
        owner: ObserverOwner,
        callback: DestroyCallback,
    ) -> Connection {
        self.connect_observer::<T>(callback, Some(owner))
    }

    fn connect_observer<T: Component>(
        &mut self,
        callback: DestroyCallback,
        owner: Option<ObserverOwner>,
    ) -> Connection {
        self.next_connection += 1;
        let connection = Connection {
            id: self.next_connection,
            component: TypeId::of::<T>(),
        };
        self.destroy_signals
            .entry(connection.component)
            .or_default()
            .push(Observer {
                id: connection.id,
                callback,
                owner,
            });

        crate::engine_debug!(
            "continuum::Registry",
            "Destruction observer #{} connected for {}",
            connection.id,
            std::any::type_name::<T>()
        );
        connection
    }

    /// Remove an observer. Returns false if it was already disconnected.
    pub fn disconnect(&mut self, connection: Connection) -> bool {
        let Some(observers) = self.destroy_signals.get_mut(&connection.component) else {
            return false;
        };
        let before = observers.len();
        observers.retain(|observer| observer.id != connection.id);
        let removed = observers.len() != before;
        if removed {
            crate::engine_debug!(
                "continuum::Registry",
                "Destruction observer #{} disconnected",
                connection.id
            );
        }
        removed
    }

    /// Number of live observers connected for `T`
    pub fn observer_count<T: Component>(&self) -> usize {
        self.destroy_signals
            .get(&TypeId::of::<T>())
            .map_or(0, |observers| observers.iter().filter(|o| o.is_live()).count())
    }

    // ===== INTERNALS =====

    fn storage<T: Component>(&self) -> Option<&Storage<T>> {
        self.storages
            .get(&TypeId::of::<T>())?
            .as_any()
            .downcast_ref::<Storage<T>>()
    }

    fn storage_mut<T: Component>(&mut self) -> &mut Storage<T> {
        self.storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                Box::new(Storage::<T> {
                    components: SparseSecondaryMap::default(),
                })
            })
            .as_any_mut()
            .downcast_mut::<Storage<T>>()
            .unwrap_or_else(|| unreachable!("storage registered under a foreign TypeId"))
    }

    fn notify_destroy(&mut self, type_id: TypeId, entity: Entity) {
        let Some(list) = self.destroy_signals.get_mut(&type_id) else {
            return;
        };
        let before = list.len();
        list.retain(Observer::is_live);
        if list.len() != before {
            crate::engine_debug!(
                "continuum::Registry",
                "Discarded {} observer(s) whose owner was dropped",
                before - list.len()
            );
        }

        // Snapshot so observers can't be invalidated mid-dispatch
        let observers: Vec<DestroyCallback> =
            list.iter().map(|observer| Arc::clone(&observer.callback)).collect();
        for callback in observers {
            callback(self, entity);
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
