//! Unit tests for Registry

use super::*;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
struct Position(f32);

#[derive(Debug, Clone, PartialEq)]
struct Radius(f32);

fn recording_observer(log: &Arc<Mutex<Vec<Entity>>>) -> DestroyCallback {
    let log = Arc::clone(log);
    Arc::new(move |_registry: &Registry, entity: Entity| {
        log.lock().unwrap().push(entity);
    })
}

// ============================================================================
// ENTITY TESTS
// ============================================================================

#[test]
fn test_create_and_destroy_entity() {
    let mut registry = Registry::new();
    let e = registry.create();

    assert!(registry.is_alive(e));
    assert_eq!(registry.len(), 1);

    assert!(registry.destroy(e));
    assert!(!registry.is_alive(e));
    assert!(registry.is_empty());
    assert!(!registry.destroy(e));
}

#[test]
fn test_destroyed_entity_id_is_not_reused() {
    let mut registry = Registry::new();
    let old = registry.create();
    registry.destroy(old);
    let new = registry.create();

    assert_ne!(old, new);
    assert!(!registry.is_alive(old));
}

// ============================================================================
// COMPONENT TESTS
// ============================================================================

#[test]
fn test_emplace_get_has() {
    let mut registry = Registry::new();
    let e = registry.create();

    registry.emplace(e, Position(1.0)).unwrap();

    assert!(registry.has::<Position>(e));
    assert!(!registry.has::<Radius>(e));
    assert_eq!(registry.get::<Position>(e), Some(&Position(1.0)));
    assert_eq!(registry.count::<Position>(), 1);
    assert_eq!(registry.count::<Radius>(), 0);
}

#[test]
fn test_emplace_twice_fails() {
    let mut registry = Registry::new();
    let e = registry.create();

    registry.emplace(e, Position(1.0)).unwrap();
    assert!(matches!(registry.emplace(e, Position(2.0)), Err(Error::InvalidResource(_))));
    assert_eq!(registry.get::<Position>(e), Some(&Position(1.0)));
}

#[test]
fn test_emplace_on_dead_entity_fails() {
    let mut registry = Registry::new();
    let e = registry.create();
    registry.destroy(e);

    assert!(registry.emplace(e, Position(1.0)).is_err());
}

#[test]
fn test_get_mut_and_replace() {
    let mut registry = Registry::new();
    let e = registry.create();
    registry.emplace(e, Radius(1.0)).unwrap();

    registry.get_mut::<Radius>(e).unwrap().0 = 3.0;
    assert_eq!(registry.get::<Radius>(e), Some(&Radius(3.0)));

    registry.replace(e, Radius(5.0)).unwrap();
    assert_eq!(registry.get::<Radius>(e), Some(&Radius(5.0)));

    let other = registry.create();
    assert!(registry.replace(other, Radius(1.0)).is_err());
}

#[test]
fn test_remove_returns_component() {
    let mut registry = Registry::new();
    let e = registry.create();
    registry.emplace(e, Radius(2.0)).unwrap();

    assert_eq!(registry.remove::<Radius>(e), Some(Radius(2.0)));
    assert_eq!(registry.remove::<Radius>(e), None);
    assert!(registry.is_alive(e));
}

// ============================================================================
// VIEW TESTS
// ============================================================================

#[test]
fn test_view_visits_only_holders() {
    let mut registry = Registry::new();
    let a = registry.create();
    let b = registry.create();
    let _c = registry.create();
    registry.emplace(a, Radius(1.0)).unwrap();
    registry.emplace(b, Radius(2.0)).unwrap();

    let mut seen: Vec<(Entity, f32)> = registry.view::<Radius>().map(|(e, r)| (e, r.0)).collect();
    seen.sort_by(|x, y| x.1.partial_cmp(&y.1).unwrap());

    assert_eq!(seen, vec![(a, 1.0), (b, 2.0)]);
}

#[test]
fn test_view_of_unknown_type_is_empty() {
    let registry = Registry::new();
    assert_eq!(registry.view::<Radius>().count(), 0);
}

#[test]
fn test_view2_intersects() {
    let mut registry = Registry::new();
    let both = registry.create();
    let only_radius = registry.create();
    registry.emplace(both, Radius(1.0)).unwrap();
    registry.emplace(both, Position(9.0)).unwrap();
    registry.emplace(only_radius, Radius(2.0)).unwrap();

    let hits: Vec<_> = registry.view2::<Radius, Position>().collect();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, both);
    assert_eq!(hits[0].2, &Position(9.0));
}

// ============================================================================
// DESTRUCTION SIGNAL TESTS
// ============================================================================

#[test]
fn test_on_destroy_fires_on_remove() {
    let mut registry = Registry::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    registry.on_destroy::<Radius>(recording_observer(&log));

    let e = registry.create();
    registry.emplace(e, Radius(1.0)).unwrap();
    registry.remove::<Radius>(e);

    assert_eq!(*log.lock().unwrap(), vec![e]);
}

#[test]
fn test_on_destroy_fires_on_entity_destroy() {
    let mut registry = Registry::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    registry.on_destroy::<Radius>(recording_observer(&log));

    let with = registry.create();
    let without = registry.create();
    registry.emplace(with, Radius(1.0)).unwrap();
    registry.emplace(without, Position(0.0)).unwrap();

    registry.destroy(with);
    registry.destroy(without);

    assert_eq!(*log.lock().unwrap(), vec![with]);
}

#[test]
fn test_on_destroy_not_fired_by_replace() {
    let mut registry = Registry::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    registry.on_destroy::<Radius>(recording_observer(&log));

    let e = registry.create();
    registry.emplace(e, Radius(1.0)).unwrap();
    registry.replace(e, Radius(2.0)).unwrap();

    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_observer_sees_component_before_drop() {
    let mut registry = Registry::new();
    let seen = Arc::new(Mutex::new(None));
    let seen_cb = Arc::clone(&seen);
    registry.on_destroy::<Radius>(Arc::new(move |registry: &Registry, entity: Entity| {
        *seen_cb.lock().unwrap() = registry.get::<Radius>(entity).cloned();
    }));

    let e = registry.create();
    registry.emplace(e, Radius(4.0)).unwrap();
    registry.destroy(e);

    assert_eq!(*seen.lock().unwrap(), Some(Radius(4.0)));
}

#[test]
fn test_disconnect_stops_notifications() {
    let mut registry = Registry::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let connection = registry.on_destroy::<Radius>(recording_observer(&log));
    assert_eq!(registry.observer_count::<Radius>(), 1);

    assert!(registry.disconnect(connection));
    assert!(!registry.disconnect(connection));
    assert_eq!(registry.observer_count::<Radius>(), 0);

    let e = registry.create();
    registry.emplace(e, Radius(1.0)).unwrap();
    registry.remove::<Radius>(e);

    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_owned_observer_fires_while_owner_alive() {
    let mut registry = Registry::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let owner: Arc<dyn Any + Send + Sync> = Arc::new(());
    registry.on_destroy_owned::<Radius>(Arc::downgrade(&owner), recording_observer(&log));

    let e = registry.create();
    registry.emplace(e, Radius(1.0)).unwrap();
    registry.remove::<Radius>(e);

    assert_eq!(*log.lock().unwrap(), vec![e]);
    assert_eq!(registry.observer_count::<Radius>(), 1);
}

#[test]
fn test_owned_observer_discarded_after_owner_drop() {
    let mut registry = Registry::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let owner: Arc<dyn Any + Send + Sync> = Arc::new(());
    registry.on_destroy_owned::<Radius>(Arc::downgrade(&owner), recording_observer(&log));
    registry.on_destroy::<Radius>(recording_observer(&log));
    drop(owner);

    assert_eq!(registry.observer_count::<Radius>(), 1);

    let e = registry.create();
    registry.emplace(e, Radius(1.0)).unwrap();
    registry.destroy(e);

    // Only the unowned observer fired, and the dead one is gone for good
    assert_eq!(*log.lock().unwrap(), vec![e]);
    assert_eq!(registry.destroy_signals[&TypeId::of::<Radius>()].len(), 1);
}

#[test]
fn test_clear_destroys_all_and_notifies() {
    let mut registry = Registry::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    registry.on_destroy::<Radius>(recording_observer(&log));

    for i in 0..3 {
        let e = registry.create();
        registry.emplace(e, Radius(i as f32)).unwrap();
    }
    registry.clear();

    assert!(registry.is_empty());
    assert_eq!(registry.count::<Radius>(), 0);
    assert_eq!(log.lock().unwrap().len(), 3);
}
