//! Minimal entity store
//!
//! Entities are generational slotmap keys with no data of their own. Each
//! component type gets its own sparse column keyed by entity, looked up by
//! `TypeId`, so attach/has/get/remove are all typed and there is no runtime
//! reflection beyond the column downcast.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use slotmap::{SecondaryMap, SlotMap, new_key_type};

new_key_type! {
    /// Opaque entity handle; stale handles are rejected after removal
    pub struct Entity;
}

/// Marker trait for anything that can be attached to an entity
pub trait Component: 'static {}

trait Column {
    fn remove_entity(&mut self, entity: Entity);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> Column for SecondaryMap<Entity, T> {
    fn remove_entity(&mut self, entity: Entity) {
        self.remove(entity);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Owns every entity and all of their components
#[derive(Default)]
pub struct EntityStore {
    entities: SlotMap<Entity, ()>,
    columns: HashMap<TypeId, Box<dyn Column>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entity with no components
    pub fn spawn(&mut self) -> Entity {
        self.entities.insert(())
    }

    /// Destroy an entity and drop all of its components
    ///
    /// Returns false if the handle was already stale.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if self.entities.remove(entity).is_none() {
            return false;
        }
        for column in self.columns.values_mut() {
            column.remove_entity(entity);
        }
        true
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains_key(entity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Snapshot of all live handles, safe to iterate while mutating the store
    pub fn entities(&self) -> Vec<Entity> {
        self.entities.keys().collect()
    }

    /// Attach a component, returning the one it replaced
    ///
    /// Attaching to a stale handle drops the component.
    pub fn insert<T: Component>(&mut self, entity: Entity, component: T) -> Option<T> {
        if !self.contains(entity) {
            log::warn!("ignoring component attach to stale entity {:?}", entity);
            return None;
        }
        self.column_mut::<T>().insert(entity, component)
    }

    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.columns
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<SecondaryMap<Entity, T>>()?
            .remove(entity)
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.get::<T>(entity).is_some()
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.column::<T>()?.get(entity)
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.columns
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<SecondaryMap<Entity, T>>()?
            .get_mut(entity)
    }

    /// Every entity carrying a `T`, with the component
    pub fn iter<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.column::<T>().into_iter().flat_map(|column| column.iter())
    }

    /// Snapshot of the entities carrying a `T`
    pub fn with<T: Component>(&self) -> Vec<Entity> {
        self.iter::<T>().map(|(entity, _)| entity).collect()
    }

    fn column<T: Component>(&self) -> Option<&SecondaryMap<Entity, T>> {
        self.columns
            .get(&TypeId::of::<T>())?
            .as_any()
            .downcast_ref::<SecondaryMap<Entity, T>>()
    }

    fn column_mut<T: Component>(&mut self) -> &mut SecondaryMap<Entity, T> {
        self.columns
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(SecondaryMap::<Entity, T>::new()))
            .as_any_mut()
            .downcast_mut::<SecondaryMap<Entity, T>>()
            .expect("column registered under its own TypeId")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Mass(f32);
    impl Component for Mass {}

    #[derive(Debug, PartialEq)]
    struct Tag;
    impl Component for Tag {}

    #[test]
    fn test_attach_get_remove() {
        let mut store = EntityStore::new();
        let e = store.spawn();
        assert!(!store.has::<Mass>(e));

        assert_eq!(store.insert(e, Mass(2.0)), None);
        assert_eq!(store.insert(e, Mass(3.0)), Some(Mass(2.0)));
        assert_eq!(store.get::<Mass>(e), Some(&Mass(3.0)));

        store.get_mut::<Mass>(e).unwrap().0 = 4.0;
        assert_eq!(store.remove::<Mass>(e), Some(Mass(4.0)));
        assert!(!store.has::<Mass>(e));
    }

    #[test]
    fn test_despawn_drops_components_and_invalidates_handle() {
        let mut store = EntityStore::new();
        let e = store.spawn();
        store.insert(e, Mass(1.0));
        store.insert(e, Tag);

        assert!(store.despawn(e));
        assert!(!store.contains(e));
        assert!(store.get::<Mass>(e).is_none());
        assert!(!store.despawn(e));

        // Reused slot must not resurrect the old components
        let f = store.spawn();
        assert_ne!(e, f);
        assert!(!store.has::<Tag>(f));
        assert!(store.insert(e, Tag).is_none());
        assert!(!store.has::<Tag>(f));
    }

    #[test]
    fn test_with_filters_by_component() {
        let mut store = EntityStore::new();
        let a = store.spawn();
        let b = store.spawn();
        store.insert(a, Tag);
        store.insert(b, Mass(1.0));

        assert_eq!(store.with::<Tag>(), vec![a]);
        assert_eq!(store.iter::<Mass>().count(), 1);
        assert_eq!(store.len(), 2);
    }
}
