//! Fixed-size byte buffers holding tensor data, and the per-model cache of
//! them.

use tracing::debug;

use crate::dtype::Element;
use crate::io_list::{Io, IoList};
use crate::layer::{LayerInterface, Mode};

/// A fixed-size byte buffer with a read/write cursor.
///
/// Values are written and read sequentially from the cursor. The size is set
/// at creation and never changes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TensorBuffer {
    data: Vec<u8>,
    position: usize,
}

impl TensorBuffer {
    /// Create a zero-filled buffer of `len` bytes.
    pub fn new(len: usize) -> TensorBuffer {
        TensorBuffer {
            data: vec![0; len],
            position: 0,
        }
    }

    /// Wrap existing bytes, for example the output of a backend.
    pub fn from_bytes(data: Vec<u8>) -> TensorBuffer {
        TensorBuffer { data, position: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current cursor position in bytes.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of bytes between the cursor and the end.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Move the cursor back to the start.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Write `value` at the cursor and advance it.
    ///
    /// Panics if fewer than `T::SIZE` bytes remain. Converters check buffer
    /// sizes before writing.
    pub fn put<T: Element>(&mut self, value: T) {
        let end = self.position + T::SIZE;
        value.write_ne(&mut self.data[self.position..end]);
        self.position = end;
    }

    /// Write each element of `values` at the cursor.
    pub fn put_slice<T: Element>(&mut self, values: &[T]) {
        for &value in values {
            self.put(value);
        }
    }

    /// Read a value at the cursor and advance it.
    ///
    /// Panics if fewer than `T::SIZE` bytes remain.
    pub fn get<T: Element>(&mut self) -> T {
        let end = self.position + T::SIZE;
        let value = T::read_ne(&self.data[self.position..end]);
        self.position = end;
        value
    }

    /// Read `len` values of type `T` from the start of the buffer, without
    /// moving the cursor.
    pub fn read_vec<T: Element>(&self, len: usize) -> Vec<T> {
        self.data
            .chunks_exact(T::SIZE)
            .take(len)
            .map(T::read_ne)
            .collect()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Preallocated buffers for each layer of a loaded model.
///
/// Buffers are stored in the declaration order of their layer list, so the
/// buffer for a layer is found via the list's index. The cache is owned by a
/// single model and is not shared between threads.
#[derive(Debug, Default)]
pub struct BufferCache {
    pub(crate) inputs: Vec<TensorBuffer>,
    pub(crate) outputs: Vec<TensorBuffer>,
    pub(crate) placeholders: Vec<TensorBuffer>,
}

fn allocate(list: &IoList) -> Vec<TensorBuffer> {
    list.iter()
        .map(|layer| {
            let len = layer.byte_len();
            debug!(layer = layer.name(), mode = %layer.mode(), bytes = len, "allocating buffer");
            TensorBuffer::new(len)
        })
        .collect()
}

impl BufferCache {
    /// Allocate one buffer per layer, sized to that layer's description.
    pub fn new(io: &Io) -> BufferCache {
        BufferCache {
            inputs: allocate(&io.inputs),
            outputs: allocate(&io.outputs),
            placeholders: allocate(&io.placeholders),
        }
    }

    fn buffers(&self, mode: Mode) -> &[TensorBuffer] {
        match mode {
            Mode::Input => &self.inputs,
            Mode::Output => &self.outputs,
            Mode::Placeholder => &self.placeholders,
        }
    }

    fn buffers_mut(&mut self, mode: Mode) -> &mut [TensorBuffer] {
        match mode {
            Mode::Input => &mut self.inputs,
            Mode::Output => &mut self.outputs,
            Mode::Placeholder => &mut self.placeholders,
        }
    }

    /// Return the buffer at `index` in the list for `mode`.
    pub fn get(&self, mode: Mode, index: usize) -> Option<&TensorBuffer> {
        self.buffers(mode).get(index)
    }

    /// Return the buffer at `index` in the list for `mode`, rewound so that
    /// it is ready to be written or read from the start.
    pub fn get_mut(&mut self, mode: Mode, index: usize) -> Option<&mut TensorBuffer> {
        let buf = self.buffers_mut(mode).get_mut(index)?;
        buf.rewind();
        Some(buf)
    }

    /// Return the buffer for `layer`, given its list `io`.
    pub fn for_layer(&mut self, io: &Io, layer: &LayerInterface) -> Option<&mut TensorBuffer> {
        let list = match layer.mode() {
            Mode::Input => &io.inputs,
            Mode::Output => &io.outputs,
            Mode::Placeholder => &io.placeholders,
        };
        let index = list.index_for(layer.name())?;
        self.get_mut(layer.mode(), index)
    }

    /// Total number of buffers in the cache.
    pub fn len(&self) -> usize {
        self.inputs.len() + self.outputs.len() + self.placeholders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total size of all buffers in bytes.
    pub fn total_bytes(&self) -> usize {
        [&self.inputs, &self.outputs, &self.placeholders]
            .into_iter()
            .flatten()
            .map(|buf| buf.len())
            .sum()
    }
}
