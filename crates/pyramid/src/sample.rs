//! Sample types and decoded host buffers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Storage type of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    /// 2-byte signed integer
    I16,
    /// 4-byte IEEE float
    F32,
}

impl SampleType {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleType::I16 => 2,
            SampleType::F32 => 4,
        }
    }
}

/// Byte order of samples in a backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleOrder {
    LittleEndian,
    BigEndian,
}

/// Vertical units of the samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataUnits {
    #[default]
    Meters,
}

/// Decoded samples, in native byte order.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleData {
    I16(Vec<i16>),
    F32(Vec<f32>),
}

impl SampleData {
    pub fn sample_type(&self) -> SampleType {
        match self {
            SampleData::I16(_) => SampleType::I16,
            SampleData::F32(_) => SampleType::F32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SampleData::I16(v) => v.len(),
            SampleData::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Native-endian bytes, ready for a texture upload.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            SampleData::I16(v) => bytemuck::cast_slice(v),
            SampleData::F32(v) => bytemuck::cast_slice(v),
        }
    }

    /// Sample at `index`, widened to f64.
    pub fn value(&self, index: usize) -> Option<f64> {
        match self {
            SampleData::I16(v) => v.get(index).map(|&s| f64::from(s)),
            SampleData::F32(v) => v.get(index).map(|&s| f64::from(s)),
        }
    }
}

/// Counts host buffers allocated and released by one level.
///
/// Every [`SampleBuffer`] registers on creation and deregisters exactly once
/// when dropped, so `live()` is the number of host buffers still resident.
#[derive(Debug, Default)]
pub struct BufferLedger {
    allocated: AtomicUsize,
    released: AtomicUsize,
}

impl BufferLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::Acquire)
    }

    pub fn live(&self) -> usize {
        self.allocated().saturating_sub(self.released())
    }
}

/// A decoded host buffer, tracked by the [`BufferLedger`] of its level.
#[derive(Debug)]
pub struct SampleBuffer {
    data: SampleData,
    ledger: Arc<BufferLedger>,
}

impl SampleBuffer {
    pub fn new(data: SampleData, ledger: &Arc<BufferLedger>) -> Self {
        ledger.allocated.fetch_add(1, Ordering::AcqRel);
        Self {
            data,
            ledger: Arc::clone(ledger),
        }
    }

    pub fn data(&self) -> &SampleData {
        &self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the decoded samples in bytes
    pub fn memory_size(&self) -> usize {
        self.data.as_bytes().len()
    }
}

impl Drop for SampleBuffer {
    fn drop(&mut self) {
        self.ledger.released.fetch_add(1, Ordering::AcqRel);
    }
}
