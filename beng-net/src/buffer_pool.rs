use slab::Slab;

const SLAB_SIZE: usize = 4096;

/// A shared pool of fixed-size 4 KiB slabs backing every connection's
/// input FIFO (§4.2, §5). Buffers are borrowed for a connection's
/// lifetime and returned to the pool on close, instead of allocating and
/// freeing per-request.
#[derive(Default)]
pub struct SlabPool {
    slabs: Slab<Box<[u8; SLAB_SIZE]>>,
    free: Vec<usize>,
}

pub struct SlabHandle(usize);

impl SlabPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self) -> (SlabHandle, &mut [u8; SLAB_SIZE]) {
        let key = if let Some(key) = self.free.pop() {
            key
        } else {
            self.slabs.insert(Box::new([0u8; SLAB_SIZE]))
        };
        (SlabHandle(key), self.slabs.get_mut(key).unwrap())
    }

    pub fn get_mut(&mut self, handle: &SlabHandle) -> &mut [u8; SLAB_SIZE] {
        self.slabs.get_mut(handle.0).expect("slab handle outlived its pool")
    }

    pub fn release(&mut self, handle: SlabHandle) {
        self.free.push(handle.0);
    }

    pub fn len(&self) -> usize {
        self.slabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slabs.is_empty()
    }
}
