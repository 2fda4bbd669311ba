/// Mock graphics device for unit tests (no GPU required)
///
/// Records every command into a log shared between the device and the
/// command lists it creates, so tests can inspect what a frame recorded.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::graphics_device::{
    AccelerationStructure, AccelerationStructureSizes, AccelerationStructureUsage, Buffer,
    BufferDesc, BufferUsage, CommandList, DeviceStats, GraphicsDevice,
    PrimitiveAccelerationStructureDesc,
};

// ============================================================================
// Shared counters
// ============================================================================

#[derive(Debug, Default)]
pub struct MockCounters {
    pub buffers: AtomicU64,
    pub structures: AtomicU64,
    pub builds: AtomicU64,
    pub refits: AtomicU64,
    pub submits: AtomicU64,
    pub wait_idles: AtomicU64,
    next_structure_id: AtomicU64,
}

impl MockCounters {
    fn next_id(&self) -> u64 {
        self.next_structure_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Sizes reported by the mock for `count` boxes
pub fn mock_sizes(count: u64) -> AccelerationStructureSizes {
    AccelerationStructureSizes {
        structure_size: 256 + 64 * count,
        build_scratch_size: 128 * count,
        refit_scratch_size: 64 * count,
    }
}

// ============================================================================
// Mock Buffer
// ============================================================================

#[derive(Debug)]
pub struct MockBuffer {
    pub size: u64,
    pub usage: BufferUsage,
    data: Mutex<Vec<u8>>,
}

impl MockBuffer {
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            size,
            usage,
            data: Mutex::new(vec![0; size as usize]),
        }
    }

    /// Copy of the current buffer contents
    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }
}

impl Buffer for MockBuffer {
    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        if !self.usage.is_host_visible() {
            return Err(Error::InvalidResource(format!(
                "{:?} buffer is not host-visible",
                self.usage
            )));
        }
        let end = offset + data.len() as u64;
        if end > self.size {
            return Err(Error::InvalidResource(format!(
                "write of {} bytes at offset {} exceeds buffer size {}",
                data.len(),
                offset,
                self.size
            )));
        }
        self.data.lock().unwrap()[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }
}

// ============================================================================
// Mock AccelerationStructure
// ============================================================================

#[derive(Debug)]
pub struct MockAccelerationStructure {
    /// Unique per structure created by one device (refits create new ids)
    pub id: u64,
    pub size: u64,
}

impl AccelerationStructure for MockAccelerationStructure {
    fn size(&self) -> u64 {
        self.size
    }
}

// ============================================================================
// Mock CommandList
// ============================================================================

pub struct MockCommandList {
    pub commands: Arc<Mutex<Vec<String>>>,
    pub is_recording: bool,
    counters: Arc<MockCounters>,
}

impl MockCommandList {
    pub fn new(commands: Arc<Mutex<Vec<String>>>, counters: Arc<MockCounters>) -> Self {
        Self {
            commands,
            is_recording: false,
            counters,
        }
    }

    fn record(&self, command: &str) {
        self.commands.lock().unwrap().push(command.to_string());
    }

    fn check_recording(&self) -> Result<()> {
        if !self.is_recording {
            return Err(Error::BackendError("Command list not recording".to_string()));
        }
        Ok(())
    }

    fn check_scratch(scratch: &Arc<dyn Buffer>, needed: u64) -> Result<()> {
        if scratch.usage() != BufferUsage::Scratch || scratch.size() < needed {
            return Err(Error::InvalidResource(format!(
                "scratch buffer of {} bytes ({:?}) cannot hold {} bytes",
                scratch.size(),
                scratch.usage(),
                needed
            )));
        }
        Ok(())
    }
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        self.is_recording = true;
        self.record("begin");
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.check_recording()?;
        self.is_recording = false;
        self.record("end");
        Ok(())
    }

    fn build_acceleration_structure(
        &mut self,
        _structure: &Arc<dyn AccelerationStructure>,
        desc: &PrimitiveAccelerationStructureDesc,
        scratch: &Arc<dyn Buffer>,
    ) -> Result<()> {
        self.check_recording()?;
        Self::check_scratch(scratch, mock_sizes(desc.primitive_count()).build_scratch_size)?;
        self.counters.builds.fetch_add(1, Ordering::Relaxed);
        self.record("build_acceleration_structure");
        Ok(())
    }

    fn refit_acceleration_structure(
        &mut self,
        source: &Arc<dyn AccelerationStructure>,
        desc: &PrimitiveAccelerationStructureDesc,
        scratch: &Arc<dyn Buffer>,
    ) -> Result<Arc<dyn AccelerationStructure>> {
        self.check_recording()?;
        if !desc.usage.contains(AccelerationStructureUsage::REFIT) {
            return Err(Error::InvalidResource(
                "refit requires AccelerationStructureUsage::REFIT".to_string(),
            ));
        }
        Self::check_scratch(scratch, mock_sizes(desc.primitive_count()).refit_scratch_size)?;
        self.counters.refits.fetch_add(1, Ordering::Relaxed);
        self.record("refit_acceleration_structure");
        Ok(Arc::new(MockAccelerationStructure {
            id: self.counters.next_id(),
            size: source.size(),
        }))
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

pub struct MockGraphicsDevice {
    pub commands: Arc<Mutex<Vec<String>>>,
    pub counters: Arc<MockCounters>,
    buffers: Mutex<Vec<Arc<MockBuffer>>>,
    fail_allocations: AtomicBool,
    fail_submit: AtomicBool,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self {
            commands: Arc::new(Mutex::new(Vec::new())),
            counters: Arc::new(MockCounters::default()),
            buffers: Mutex::new(Vec::new()),
            fail_allocations: AtomicBool::new(false),
            fail_submit: AtomicBool::new(false),
        }
    }

    /// Make every following buffer/structure creation fail
    pub fn set_fail_allocations(&self, fail: bool) {
        self.fail_allocations.store(fail, Ordering::Relaxed);
    }

    /// Make every following `submit` fail as if the device was lost
    pub fn set_fail_submit(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::Relaxed);
    }

    /// Commands recorded so far by every list of this device
    pub fn recorded_commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Every buffer created so far, in creation order
    pub fn buffers(&self) -> Vec<Arc<MockBuffer>> {
        self.buffers.lock().unwrap().clone()
    }

    pub fn count_commands(&self, name: &str) -> usize {
        self.commands.lock().unwrap().iter().filter(|c| *c == name).count()
    }

    pub fn clear_commands(&self) {
        self.commands.lock().unwrap().clear();
    }

    fn check_allocation(&self, what: &str, size: u64) -> Result<()> {
        if self.fail_allocations.load(Ordering::Relaxed) {
            return Err(Error::ResourceAllocation(format!("{} of {} bytes", what, size)));
        }
        Ok(())
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_buffer(&self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        self.check_allocation("buffer", desc.size)?;
        self.counters.buffers.fetch_add(1, Ordering::Relaxed);
        let buffer = Arc::new(MockBuffer::new(desc.size, desc.usage));
        self.buffers.lock().unwrap().push(Arc::clone(&buffer));
        Ok(buffer)
    }

    fn acceleration_structure_sizes(
        &self,
        desc: &PrimitiveAccelerationStructureDesc,
    ) -> Result<AccelerationStructureSizes> {
        if desc.geometries.is_empty() {
            return Err(Error::InvalidResource("no geometry to size".to_string()));
        }
        Ok(mock_sizes(desc.primitive_count()))
    }

    fn create_acceleration_structure(&self, size: u64) -> Result<Arc<dyn AccelerationStructure>> {
        self.check_allocation("acceleration structure", size)?;
        self.counters.structures.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(MockAccelerationStructure {
            id: self.counters.next_id(),
            size,
        }))
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(MockCommandList::new(
            Arc::clone(&self.commands),
            Arc::clone(&self.counters),
        )))
    }

    fn submit(&self, commands: &[&dyn CommandList]) -> Result<()> {
        if self.fail_submit.load(Ordering::Relaxed) {
            return Err(Error::BackendError("device lost".to_string()));
        }
        self.counters.submits.fetch_add(1, Ordering::Relaxed);
        self.commands
            .lock()
            .unwrap()
            .push(format!("submit({})", commands.len()));
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.counters.wait_idles.fetch_add(1, Ordering::Relaxed);
        self.commands.lock().unwrap().push("wait_idle".to_string());
        Ok(())
    }

    fn stats(&self) -> DeviceStats {
        DeviceStats {
            buffers_created: self.counters.buffers.load(Ordering::Relaxed),
            acceleration_structures_created: self.counters.structures.load(Ordering::Relaxed),
            builds: self.counters.builds.load(Ordering::Relaxed),
            refits: self.counters.refits.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
