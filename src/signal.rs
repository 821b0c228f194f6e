//! Typed block-oriented signals connecting one producer to any number of consumers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use crate::error::{ConfigError, SimError};
use crate::model::ModelId;
use num_complex::Complex32;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::marker::PhantomData;

/// Element type tag carried by every signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    /// Single bits (`bool`)
    Bit,
    /// Bytes, e.g. symbol indices (`u8`)
    Byte,
    /// Integers (`i32`)
    Int,
    /// Real samples (`f32`)
    Float,
    /// Complex baseband samples (`Complex32`)
    Complex,
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SampleKind::Bit => "bit",
            SampleKind::Byte => "byte",
            SampleKind::Int => "int",
            SampleKind::Float => "float",
            SampleKind::Complex => "complex",
        };
        f.write_str(s)
    }
}

/// Type-tagged sample storage for one signal.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleStore {
    /// Bit samples
    Bit(Vec<bool>),
    /// Byte samples
    Byte(Vec<u8>),
    /// Integer samples
    Int(Vec<i32>),
    /// Real samples
    Float(Vec<f32>),
    /// Complex samples
    Complex(Vec<Complex32>),
}

impl SampleStore {
    /// The element tag of this store.
    pub fn kind(&self) -> SampleKind {
        match self {
            SampleStore::Bit(_) => SampleKind::Bit,
            SampleStore::Byte(_) => SampleKind::Byte,
            SampleStore::Int(_) => SampleKind::Int,
            SampleStore::Float(_) => SampleKind::Float,
            SampleStore::Complex(_) => SampleKind::Complex,
        }
    }

    /// Number of allocated samples.
    pub fn len(&self) -> usize {
        match self {
            SampleStore::Bit(v) => v.len(),
            SampleStore::Byte(v) => v.len(),
            SampleStore::Int(v) => v.len(),
            SampleStore::Float(v) => v.len(),
            SampleStore::Complex(v) => v.len(),
        }
    }

    /// True before allocation.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn allocate(&mut self, len: usize) {
        match self {
            SampleStore::Bit(v) => v.resize(len, false),
            SampleStore::Byte(v) => v.resize(len, 0),
            SampleStore::Int(v) => v.resize(len, 0),
            SampleStore::Float(v) => v.resize(len, 0.0),
            SampleStore::Complex(v) => v.resize(len, Complex32::new(0.0, 0.0)),
        }
    }
}

/// A sample type that can flow through a [`Signal`].
pub trait Sample: Copy + Default + PartialEq + fmt::Debug + 'static {
    /// Tag stored alongside the buffer.
    const KIND: SampleKind;

    /// An unallocated store of this element type.
    fn empty_store() -> SampleStore;

    /// Borrow the samples if the store holds this type.
    fn slice(store: &SampleStore) -> Option<&[Self]>;

    /// Mutably borrow the samples if the store holds this type.
    fn slice_mut(store: &mut SampleStore) -> Option<&mut [Self]>;
}

macro_rules! impl_sample {
    ($ty:ty, $variant:ident) => {
        impl Sample for $ty {
            const KIND: SampleKind = SampleKind::$variant;

            fn empty_store() -> SampleStore {
                SampleStore::$variant(Vec::new())
            }

            fn slice(store: &SampleStore) -> Option<&[Self]> {
                match store {
                    SampleStore::$variant(v) => Some(v.as_slice()),
                    _ => None,
                }
            }

            fn slice_mut(store: &mut SampleStore) -> Option<&mut [Self]> {
                match store {
                    SampleStore::$variant(v) => Some(v.as_mut_slice()),
                    _ => None,
                }
            }
        }
    };
}

impl_sample!(bool, Bit);
impl_sample!(u8, Byte);
impl_sample!(i32, Int);
impl_sample!(f32, Float);
impl_sample!(Complex32, Complex);

/// Index of a signal inside its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(pub usize);

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Typed, non-owning handle to a signal owned by a [`ModelGraph`](crate::graph::ModelGraph).
pub struct Signal<T> {
    id: SignalId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Signal<T> {
    pub(crate) fn new(id: SignalId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// The untyped id.
    pub fn id(&self) -> SignalId {
        self.id
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Signal<T> {}

impl<T> PartialEq for Signal<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Signal<T> {}

impl<T: Sample> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signal<{}>({})", T::KIND, self.id.0)
    }
}

/// Storage and bookkeeping for one signal.
///
/// The buffer is sized to the maximum block size once that size is known.
/// The valid length and the cycle stamp live outside the buffer cell so a
/// producer can report its valid length while still holding its write view.
#[derive(Debug)]
pub struct SignalSlot {
    id: SignalId,
    name: String,
    kind: SampleKind,
    max_block_size: Option<usize>,
    samp_intvl: Option<f64>,
    anchored: bool,
    // the producer fixed these itself during initialize
    sized_by_producer: bool,
    timed_by_producer: bool,
    producer: Option<ModelId>,
    rejected_producers: Vec<ModelId>,
    consumers: Vec<ModelId>,
    valid_len: Cell<usize>,
    // cycle + 1 of the last set_valid_length; 0 means never produced
    stamp: Cell<u64>,
    data: RefCell<SampleStore>,
}

impl SignalSlot {
    pub(crate) fn new(id: SignalId, name: &str, store: SampleStore) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind: store.kind(),
            max_block_size: None,
            samp_intvl: None,
            anchored: false,
            sized_by_producer: false,
            timed_by_producer: false,
            producer: None,
            rejected_producers: Vec::new(),
            consumers: Vec::new(),
            valid_len: Cell::new(0),
            stamp: Cell::new(0),
            data: RefCell::new(store),
        }
    }

    /// Signal id.
    pub fn id(&self) -> SignalId {
        self.id
    }

    /// Diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element tag.
    pub fn kind(&self) -> SampleKind {
        self.kind
    }

    /// Maximum samples per cycle, once known.
    pub fn max_block_size(&self) -> Option<usize> {
        self.max_block_size
    }

    /// Seconds between samples, once known.
    pub fn samp_intvl(&self) -> Option<f64> {
        self.samp_intvl
    }

    /// True if the size was pinned at topology construction.
    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    /// The registered producer.
    pub fn producer(&self) -> Option<ModelId> {
        self.producer
    }

    /// Producers that tried to register after the first one.
    pub fn rejected_producers(&self) -> &[ModelId] {
        &self.rejected_producers
    }

    /// Registered consumers in declaration order.
    pub fn consumers(&self) -> &[ModelId] {
        &self.consumers
    }

    /// Number of samples valid in the current cycle.
    pub fn valid_length(&self) -> usize {
        self.valid_len.get()
    }

    /// True if the producer reported a valid length during `cycle`.
    pub fn produced_in(&self, cycle: u64) -> bool {
        self.stamp.get() == cycle + 1
    }

    /// Register the sole producer; returns the existing producer on conflict.
    pub(crate) fn declare_producer(&mut self, model: ModelId) -> Result<(), ModelId> {
        match self.producer {
            None => {
                self.producer = Some(model);
                Ok(())
            }
            Some(existing) => {
                self.rejected_producers.push(model);
                Err(existing)
            }
        }
    }

    pub(crate) fn declare_consumer(&mut self, model: ModelId) {
        self.consumers.push(model);
    }

    pub(crate) fn anchor(&mut self, samp_intvl: f64, block_size: usize) {
        self.samp_intvl = Some(samp_intvl);
        self.max_block_size = Some(block_size);
        self.anchored = true;
    }

    /// Fix the block size; returns the existing value when it disagrees.
    pub(crate) fn fix_block_size(&mut self, block_size: usize) -> Result<(), usize> {
        match self.max_block_size {
            Some(existing) if existing != block_size => Err(existing),
            _ => {
                self.max_block_size = Some(block_size);
                Ok(())
            }
        }
    }

    /// Fix the block size on behalf of the producer.
    pub(crate) fn size_by_producer(&mut self, block_size: usize) -> Result<(), usize> {
        self.fix_block_size(block_size)?;
        self.sized_by_producer = true;
        Ok(())
    }

    /// Fix the sample interval on behalf of the producer.
    pub(crate) fn time_by_producer(&mut self, samp_intvl: f64) -> Result<(), f64> {
        self.fix_samp_intvl(samp_intvl)?;
        self.timed_by_producer = true;
        Ok(())
    }

    /// True if the producer set the block size during initialize.
    pub(crate) fn is_sized_by_producer(&self) -> bool {
        self.sized_by_producer
    }

    /// True if the producer set the sample interval during initialize.
    pub(crate) fn is_timed_by_producer(&self) -> bool {
        self.timed_by_producer
    }

    /// Fix the sample interval; returns the existing value when it disagrees.
    pub(crate) fn fix_samp_intvl(&mut self, samp_intvl: f64) -> Result<(), f64> {
        match self.samp_intvl {
            Some(existing) if (existing - samp_intvl).abs() > existing.abs() * 1e-9 => {
                Err(existing)
            }
            _ => {
                self.samp_intvl = Some(samp_intvl);
                Ok(())
            }
        }
    }

    /// Allocate the buffer to the maximum block size.
    pub(crate) fn allocate(&mut self) -> Result<(), ConfigError> {
        let len = self.max_block_size.ok_or_else(|| ConfigError::UnsizedSignal {
            signal: self.name.clone(),
            producer: "<none>".to_string(),
        })?;
        self.data.get_mut().allocate(len);
        Ok(())
    }

    /// Number of allocated samples.
    pub fn allocated_len(&self) -> usize {
        self.data.borrow().len()
    }

    /// Record the valid length for `cycle`.
    ///
    /// Leaves the stored length untouched when `n` exceeds the maximum.
    pub fn set_valid_length(&self, n: usize, cycle: u64) -> Result<(), SimError> {
        let max = self.max_block_size.unwrap_or(0);
        if n > max {
            return Err(SimError::BlockSizeExceeded {
                signal: self.name.clone(),
                requested: n,
                max,
            });
        }
        self.valid_len.set(n);
        self.stamp.set(cycle + 1);
        Ok(())
    }

    /// Shared view of the valid samples.
    pub fn read_view<T: Sample>(&self) -> Result<Ref<'_, [T]>, SimError> {
        let valid = self.valid_len.get();
        let data = self.data.try_borrow().map_err(|_| SimError::BufferBusy {
            signal: self.name.clone(),
        })?;
        Ref::filter_map(data, |store| T::slice(store).map(|s| &s[..valid.min(s.len())]))
            .map_err(|_| SimError::Config(ConfigError::UnknownSignal(self.id.0)))
    }

    /// Mutable view of the whole buffer (maximum block size).
    pub fn write_view<T: Sample>(&self) -> Result<RefMut<'_, [T]>, SimError> {
        let data = self
            .data
            .try_borrow_mut()
            .map_err(|_| SimError::BufferBusy {
                signal: self.name.clone(),
            })?;
        RefMut::filter_map(data, |store| T::slice_mut(store))
            .map_err(|_| SimError::Config(ConfigError::UnknownSignal(self.id.0)))
    }
}
