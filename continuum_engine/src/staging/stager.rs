/// Stager - keeps one render packet per bounding-volume entity.
///
/// Every frame `stage()` walks the entities holding a `BoundingVolume`:
/// entities without a packet get one built, entities with one get a
/// `smart_refit`. Packets leave the map only when the registry reports that
/// the bounding volume (or its entity) was destroyed, through the observer
/// installed by `connect()`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::graphics_device::GpuContext;
use crate::registry::{Connection, Entity, ObserverOwner, Registry};
use crate::staging::{create_render_packet, BoundingVolume, RenderPacket, DEFAULT_REFIT_TOLERANCE};

type PacketMap = FxHashMap<Entity, Box<dyn RenderPacket>>;

/// Packet map shared with the registry's destruction observer
struct SharedPackets {
    map: Mutex<PacketMap>,
    /// Destruction notices that arrived while the map was locked
    pending: Mutex<Vec<Entity>>,
}

impl SharedPackets {
    fn new() -> Self {
        Self {
            map: Mutex::new(FxHashMap::default()),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Lock the map, applying any deferred releases first
    fn lock(&self) -> MutexGuard<'_, PacketMap> {
        // A panic mid-update leaves at worst a stale packet, which the next
        // stage() refits or prune_orphans() releases
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        let pending = std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
        for entity in pending {
            if map.remove(&entity).is_some() {
                crate::engine_debug!("continuum::Stager", "Released packet of {:?} (deferred)", entity);
            }
        }
        map
    }

    /// Drop the packet of `entity` without ever blocking
    ///
    /// If the map is locked (a `PacketsView` is alive on this thread, for
    /// instance) the release is queued and applied by the next `lock()`.
    /// Returns true if a packet was released or the release was queued.
    fn release(&self, entity: Entity) -> bool {
        let mut map = match self.map.try_lock() {
            Ok(map) => map,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                self.pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(entity);
                crate::engine_debug!("continuum::Stager", "Packet map busy, release of {:?} deferred", entity);
                return true;
            }
        };
        let removed = map.remove(&entity).is_some();
        if removed {
            crate::engine_debug!("continuum::Stager", "Released packet of {:?}", entity);
        }
        removed
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// What `stage()` does when one entity's packet cannot be built or refitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StagingFailurePolicy {
    /// Stop the pass and return the error
    #[default]
    Abort,
    /// Log, drop that entity's packet and continue with the others.
    /// Fatal errors (see `Error::is_fatal`) still abort.
    SkipEntity,
}

/// Stager configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StagerConfig {
    /// Per-scalar bounds change under which refits are skipped
    pub refit_tolerance: f32,
    pub failure_policy: StagingFailurePolicy,
}

impl Default for StagerConfig {
    fn default() -> Self {
        Self {
            refit_tolerance: DEFAULT_REFIT_TOLERANCE,
            failure_policy: StagingFailurePolicy::Abort,
        }
    }
}

/// What one `stage()` pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageReport {
    /// Packets built this pass
    pub created: usize,
    /// Packets refitted this pass
    pub refitted: usize,
    /// Packets whose bounds were within tolerance
    pub unchanged: usize,
    /// Entities dropped under `StagingFailurePolicy::SkipEntity`
    pub skipped: usize,
}

impl StageReport {
    /// Number of bounding-volume entities visited
    pub fn visited(&self) -> usize {
        self.created + self.refitted + self.unchanged + self.skipped
    }
}

enum StageOutcome {
    Created,
    Refitted,
    Unchanged,
}

// ============================================================================
// Stager
// ============================================================================

pub struct Stager {
    packets: Arc<SharedPackets>,
    config: StagerConfig,
    connection: Option<Connection>,
}

impl Default for Stager {
    fn default() -> Self {
        Self::new(StagerConfig::default())
    }
}

impl Stager {
    pub fn new(config: StagerConfig) -> Self {
        Self {
            packets: Arc::new(SharedPackets::new()),
            config,
            connection: None,
        }
    }

    pub fn config(&self) -> &StagerConfig {
        &self.config
    }

    // ===== DESTRUCTION OBSERVER =====

    /// Install the `BoundingVolume` destruction observer on `registry`
    ///
    /// The observer only holds a weak reference to the packet map: once the
    /// stager is dropped it does nothing, and the registry discards it the
    /// next time it dispatches. Connecting twice replaces nothing and
    /// returns false.
    pub fn connect(&mut self, registry: &mut Registry) -> bool {
        if self.connection.is_some() {
            crate::engine_warn!("continuum::Stager", "Stager already connected to a registry");
            return false;
        }

        let packets: Weak<SharedPackets> = Arc::downgrade(&self.packets);
        let owner: ObserverOwner = packets.clone();
        let connection = registry.on_destroy_owned::<BoundingVolume>(
            owner,
            Arc::new(move |_registry: &Registry, entity: Entity| {
                if let Some(packets) = packets.upgrade() {
                    packets.release(entity);
                }
            }),
        );

        self.connection = Some(connection);
        crate::engine_debug!("continuum::Stager", "Connected to registry");
        true
    }

    /// Remove the observer installed by `connect`
    pub fn disconnect(&mut self, registry: &mut Registry) -> bool {
        match self.connection.take() {
            Some(connection) => {
                let removed = registry.disconnect(connection);
                crate::engine_debug!("continuum::Stager", "Disconnected from registry");
                removed
            }
            None => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Drop the packet of an entity whose bounding volume was destroyed
    ///
    /// Never blocks: while a `PacketsView` is alive the release is queued
    /// and applied when the view is gone. Returns false if the entity had
    /// no packet.
    pub fn on_bounds_destroyed(&self, entity: Entity) -> bool {
        self.packets.release(entity)
    }

    // ===== STAGING =====

    /// Build or refit the packet of every bounding-volume entity
    ///
    /// Commands are recorded into `context.encoder`; nothing is submitted.
    /// An entity whose packet fails to build or refit never keeps a packet.
    ///
    /// # Errors
    ///
    /// - `InvalidShape` for an unknown bounding volume style (always)
    /// - any GPU error, unless `failure_policy` is `SkipEntity`
    pub fn stage(&mut self, registry: &Registry, context: &mut GpuContext) -> Result<StageReport> {
        let mut packets = self.packets.lock();
        let mut report = StageReport::default();

        for (entity, volume) in registry.view::<BoundingVolume>() {
            let outcome = if let Some(packet) = packets.get_mut(&entity) {
                packet.smart_refit(context, volume).map(|refitted| {
                    if refitted {
                        StageOutcome::Refitted
                    } else {
                        StageOutcome::Unchanged
                    }
                })
            } else {
                create_render_packet(context, volume, self.config.refit_tolerance).map(|packet| {
                    packets.insert(entity, packet);
                    StageOutcome::Created
                })
            };

            match outcome {
                Ok(StageOutcome::Created) => report.created += 1,
                Ok(StageOutcome::Refitted) => report.refitted += 1,
                Ok(StageOutcome::Unchanged) => report.unchanged += 1,
                Err(err) => {
                    packets.remove(&entity);
                    Self::handle_failure(self.config.failure_policy, entity, err)?;
                    report.skipped += 1;
                }
            }
        }

        crate::engine_trace!(
            "continuum::Stager",
            "Staged {} entities: {} created, {} refitted, {} unchanged, {} skipped",
            report.visited(),
            report.created,
            report.refitted,
            report.unchanged,
            report.skipped
        );

        Ok(report)
    }

    fn handle_failure(policy: StagingFailurePolicy, entity: Entity, err: Error) -> Result<()> {
        if policy == StagingFailurePolicy::SkipEntity && !err.is_fatal() {
            crate::engine_warn!("continuum::Stager", "Skipping {:?}: {}", entity, err);
            return Ok(());
        }
        crate::engine_error!("continuum::Stager", "Staging aborted at {:?}: {}", entity, err);
        Err(err)
    }

    // ===== ACCESS =====

    /// Read-only view of the packets
    ///
    /// The view locks the map. Destruction notices received while it is
    /// alive are applied once it is dropped, so the view may still show a
    /// packet whose bounding volume is already gone.
    pub fn get_packets(&self) -> PacketsView<'_> {
        PacketsView {
            packets: self.packets.lock(),
        }
    }

    /// Release packets whose entity lost its bounding volume without notice
    ///
    /// Returns the number of packets released.
    pub fn prune_orphans(&mut self, registry: &Registry) -> usize {
        let mut packets = self.packets.lock();
        let before = packets.len();
        packets.retain(|entity, _| {
            let staged = registry.has::<BoundingVolume>(*entity);
            if !staged {
                crate::engine_warn!(
                    "continuum::Stager",
                    "Releasing orphan packet of {:?} (no destruction notice received)",
                    entity
                );
            }
            staged
        });
        before - packets.len()
    }

    /// Release every packet
    pub fn clear(&mut self) -> usize {
        let mut packets = self.packets.lock();
        let count = packets.len();
        packets.clear();
        count
    }
}

// ============================================================================
// PacketsView
// ============================================================================

/// Read-only access to the staged packets
pub struct PacketsView<'a> {
    packets: MutexGuard<'a, PacketMap>,
}

impl<'a> PacketsView<'a> {
    pub fn get(&self, entity: Entity) -> Option<&dyn RenderPacket> {
        self.packets.get(&entity).map(|p| p.as_ref())
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.packets.contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Iterate over `(entity, packet)` pairs (unspecified order)
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &dyn RenderPacket)> + '_ {
        self.packets.iter().map(|(entity, packet)| (*entity, packet.as_ref()))
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.packets.keys().copied()
    }
}

#[cfg(test)]
#[path = "stager_tests.rs"]
mod tests;
