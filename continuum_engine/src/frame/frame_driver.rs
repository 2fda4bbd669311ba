/// Frame driver - one staging pass and one submission per frame
///
/// Owns the frame's command list and the stager. Each `render_frame()`:
/// begin, stage, walk the packets, end, submit, and (optionally) wait.

use std::sync::{Arc, Mutex, MutexGuard};
use crate::error::{Error, Result};
use crate::graphics_device::{CommandList, GpuContext, GraphicsDevice};
use crate::registry::Registry;
use crate::staging::{StageReport, Stager};

/// Frame driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Block until the GPU finished the frame (debug builds by default)
    pub wait_for_completion: bool,
    /// Release packets of entities that lost their bounding volume without
    /// the registry notifying the stager
    pub prune_orphans: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            wait_for_completion: cfg!(debug_assertions),
            prune_orphans: true,
        }
    }
}

/// Result of one rendered frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// 0 for the first frame
    pub frame_index: u64,
    /// Packets staged after this frame
    pub packets: usize,
    /// Bytes of acceleration structures referenced by this frame
    pub acceleration_structure_bytes: u64,
    /// What staging did
    pub report: StageReport,
    /// Orphan packets released this frame
    pub orphans_released: usize,
}

pub struct FrameDriver {
    device: Arc<Mutex<dyn GraphicsDevice>>,
    command_list: Box<dyn CommandList>,
    stager: Stager,
    config: FrameConfig,
    frame_count: u64,
}

impl FrameDriver {
    /// Create a driver and its command list
    ///
    /// The stager should already be connected to the registry it will stage.
    pub fn new(
        device: Arc<Mutex<dyn GraphicsDevice>>,
        stager: Stager,
        config: FrameConfig,
    ) -> Result<Self> {
        let command_list = Self::lock_device(&device)?.create_command_list()?;

        crate::engine_debug!(
            "continuum::FrameDriver",
            "Frame driver created (wait_for_completion: {}, prune_orphans: {})",
            config.wait_for_completion,
            config.prune_orphans
        );

        Ok(Self {
            device,
            command_list,
            stager,
            config,
            frame_count: 0,
        })
    }

    /// Stage `registry` and submit the recorded builds and refits
    ///
    /// # Errors
    ///
    /// If staging, closing the command list or submitting it fails, the
    /// frame is aborted: nothing it recorded reaches the GPU, every staged
    /// packet is released and the error is returned. No partial frame
    /// survives, so the next frame rebuilds from scratch.
    pub fn render_frame(&mut self, registry: &Registry) -> Result<FrameStats> {
        let device = Self::lock_device(&self.device)?;

        self.command_list.begin()?;

        let staged = {
            let mut context = GpuContext::new(&*device, self.command_list.as_mut());
            self.stager.stage(registry, &mut context)
        };

        let report = match staged {
            Ok(report) => report,
            Err(err) => {
                let list = Some(&mut self.command_list);
                return Err(Self::abort_frame(list, &mut self.stager, self.frame_count, err));
            }
        };

        let orphans_released = if self.config.prune_orphans {
            self.stager.prune_orphans(registry)
        } else {
            0
        };

        let (packets, acceleration_structure_bytes) = {
            let view = self.stager.get_packets();
            let bytes = view.iter().map(|(_, packet)| packet.handle().size()).sum();
            (view.len(), bytes)
        };

        // Once end() was attempted the list is not reopened
        if let Err(err) = self.command_list.end() {
            return Err(Self::abort_frame(None, &mut self.stager, self.frame_count, err));
        }
        if let Err(err) = device.submit(&[self.command_list.as_ref()]) {
            return Err(Self::abort_frame(None, &mut self.stager, self.frame_count, err));
        }

        if self.config.wait_for_completion {
            device.wait_idle()?;
        }

        let stats = FrameStats {
            frame_index: self.frame_count,
            packets,
            acceleration_structure_bytes,
            report,
            orphans_released,
        };
        self.frame_count += 1;

        crate::engine_trace!("continuum::FrameDriver", "Frame {:?}", stats);
        Ok(stats)
    }

    /// Drop everything the current frame staged and hand back `err`
    ///
    /// `open_list`, if given, is still recording and gets ended first.
    fn abort_frame(
        open_list: Option<&mut Box<dyn CommandList>>,
        stager: &mut Stager,
        frame_index: u64,
        err: Error,
    ) -> Error {
        crate::engine_error!(
            "continuum::FrameDriver",
            "Frame {} aborted: {}",
            frame_index,
            err
        );
        if let Some(list) = open_list {
            if let Err(end_err) = list.end() {
                crate::engine_warn!(
                    "continuum::FrameDriver",
                    "Failed to close aborted command list: {}",
                    end_err
                );
            }
        }
        let released = stager.clear();
        crate::engine_debug!(
            "continuum::FrameDriver",
            "Released {} packets after aborted frame",
            released
        );
        err
    }

    /// Wait for the GPU, detach the stager from `registry` and release all packets
    pub fn shutdown(&mut self, registry: &mut Registry) -> Result<()> {
        Self::lock_device(&self.device)?.wait_idle()?;
        self.stager.disconnect(registry);
        let released = self.stager.clear();

        crate::engine_info!(
            "continuum::FrameDriver",
            "Shut down after {} frames ({} packets released)",
            self.frame_count,
            released
        );
        Ok(())
    }

    /// Frames successfully submitted
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn stager(&self) -> &Stager {
        &self.stager
    }

    pub fn stager_mut(&mut self) -> &mut Stager {
        &mut self.stager
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn lock_device(
        device: &Arc<Mutex<dyn GraphicsDevice>>,
    ) -> Result<MutexGuard<'_, dyn GraphicsDevice + 'static>> {
        device
            .lock()
            .map_err(|_| crate::engine_err!("continuum::FrameDriver", "Graphics device lock poisoned"))
    }
}

#[cfg(test)]
#[path = "frame_driver_tests.rs"]
mod tests;
