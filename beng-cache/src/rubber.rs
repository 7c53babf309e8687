use beng_stream::RubberAllocator;
use memmap2::MmapMut;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RubberHandle(u32);

struct Object {
    offset: usize,
    /// Logical (netto) size — shrinks as a sink learns the real body size.
    size: usize,
    /// Reserved (brutto) size — the bump-allocated footprint, only
    /// reclaimed by [`Rubber::compact`].
    allocated: usize,
}

/// A single large anonymous-mmap arena shared by every cached response
/// body on a worker (§3 "rubber arena", §4.6). New objects are
/// bump-allocated from the high-water mark; removed objects leave holes
/// that [`Rubber::compact`] reclaims once the brutto:netto ratio exceeds
/// the configured threshold, mirroring the source tree's `rubber.cxx`.
pub struct Rubber {
    mmap: MmapMut,
    capacity: usize,
    objects: Vec<Option<Object>>,
    free_ids: Vec<u32>,
    next_offset: usize,
    netto_total: usize,
    brutto_total: usize,
    compaction_ratio: f64,
}

impl Rubber {
    pub fn new(capacity: usize, compaction_ratio: f64) -> std::io::Result<Self> {
        Ok(Self {
            mmap: MmapMut::map_anon(capacity)?,
            capacity,
            objects: Vec::new(),
            free_ids: Vec::new(),
            next_offset: 0,
            netto_total: 0,
            brutto_total: 0,
            compaction_ratio,
        })
    }

    fn insert_object(&mut self, obj: Object) -> RubberHandle {
        if let Some(id) = self.free_ids.pop() {
            self.objects[id as usize] = Some(obj);
            RubberHandle(id)
        } else {
            self.objects.push(Some(obj));
            RubberHandle((self.objects.len() - 1) as u32)
        }
    }

    fn get(&self, handle: &RubberHandle) -> Option<&Object> {
        self.objects.get(handle.0 as usize).and_then(|o| o.as_ref())
    }

    /// Bump-allocates `size` bytes, compacting first if the arena is full
    /// and compaction would free enough room.
    pub fn add(&mut self, size: usize) -> Option<RubberHandle> {
        if self.next_offset + size > self.capacity {
            self.compact();
            if self.next_offset + size > self.capacity {
                return None;
            }
        }
        let offset = self.next_offset;
        self.next_offset += size;
        self.brutto_total += size;
        self.netto_total += size;
        Some(self.insert_object(Object {
            offset,
            size,
            allocated: size,
        }))
    }

    pub fn write(&mut self, handle: &RubberHandle, offset: usize, data: &[u8]) -> bool {
        let Some(obj) = self.get(handle) else { return false };
        if offset + data.len() > obj.allocated {
            return false;
        }
        let base = obj.offset;
        self.mmap[base + offset..base + offset + data.len()].copy_from_slice(data);
        true
    }

    pub fn read(&self, handle: &RubberHandle) -> Option<&[u8]> {
        let obj = self.get(handle)?;
        Some(&self.mmap[obj.offset..obj.offset + obj.size])
    }

    /// Shrinks an object's logical (netto) size without moving it; used
    /// once a streamed body's true length is known.
    pub fn shrink(&mut self, handle: &RubberHandle, new_size: usize) {
        if let Some(Some(obj)) = self.objects.get_mut(handle.0 as usize) {
            self.netto_total -= obj.size - new_size.min(obj.size);
            obj.size = new_size.min(obj.allocated);
        }
    }

    pub fn remove(&mut self, handle: RubberHandle) {
        if let Some(slot) = self.objects.get_mut(handle.0 as usize) {
            if let Some(obj) = slot.take() {
                self.netto_total -= obj.size;
                self.brutto_total -= obj.allocated;
                self.free_ids.push(handle.0);
            }
        }
        if self.should_compact() {
            self.compact();
        }
    }

    fn should_compact(&self) -> bool {
        self.brutto_total > 0
            && self.netto_total > 0
            && (self.brutto_total as f64 / self.netto_total as f64) >= self.compaction_ratio
    }

    /// Relocates every live object contiguously from offset 0, reclaiming
    /// all holes left by removed/shrunk objects in one pass.
    pub fn compact(&mut self) {
        let mut cursor = 0usize;
        let mut new_brutto = 0usize;
        for slot in self.objects.iter_mut() {
            let Some(obj) = slot else { continue };
            if obj.offset != cursor {
                self.mmap.copy_within(obj.offset..obj.offset + obj.size, cursor);
            }
            obj.offset = cursor;
            obj.allocated = obj.size;
            cursor += obj.size;
            new_brutto += obj.size;
        }
        self.next_offset = cursor;
        self.brutto_total = new_brutto;
    }

    pub fn netto_total(&self) -> usize {
        self.netto_total
    }

    pub fn brutto_total(&self) -> usize {
        self.brutto_total
    }
}

impl RubberAllocator for Rubber {
    type Handle = RubberHandle;

    fn alloc(&mut self, size_hint: usize) -> Option<Self::Handle> {
        self.add(size_hint.max(1))
    }

    fn write(&mut self, handle: &Self::Handle, offset: usize, data: &[u8]) -> bool {
        Rubber::write(self, handle, offset, data)
    }

    fn shrink(&mut self, handle: &Self::Handle, new_size: usize) {
        Rubber::shrink(self, handle, new_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_reads_back_an_object() {
        let mut r = Rubber::new(1024, 3.0).unwrap();
        let h = r.add(5).unwrap();
        assert!(r.write(&h, 0, b"hello"));
        assert_eq!(r.read(&h), Some(&b"hello"[..]));
    }

    #[test]
    fn shrink_reduces_the_logical_size_without_moving() {
        let mut r = Rubber::new(1024, 3.0).unwrap();
        let h = r.add(10).unwrap();
        r.write(&h, 0, b"0123456789");
        r.shrink(&h, 4);
        assert_eq!(r.read(&h), Some(&b"0123"[..]));
    }

    #[test]
    fn compaction_reclaims_holes_from_removed_objects() {
        let mut r = Rubber::new(64, 3.0).unwrap();
        let h1 = r.add(16).unwrap();
        let h2 = r.add(16).unwrap();
        r.write(&h2, 0, b"0123456789012345");
        r.remove(h1);
        r.compact();
        assert_eq!(r.read(&h2), Some(&b"0123456789012345"[..]));
        assert_eq!(r.brutto_total(), 16);
    }

    #[test]
    fn allocation_fails_once_the_arena_is_exhausted_and_cannot_compact() {
        let mut r = Rubber::new(16, 3.0).unwrap();
        let _h1 = r.add(16).unwrap();
        assert!(r.add(1).is_none());
    }

    #[test]
    fn removing_past_the_compaction_ratio_triggers_an_automatic_compact() {
        let mut r = Rubber::new(64, 2.0).unwrap();
        let h1 = r.add(8).unwrap();
        let h2 = r.add(8).unwrap();
        let _h3 = r.add(8).unwrap();
        r.write(&h2, 0, b"alive!!!");
        r.remove(h1);
        // netto=16, brutto=24 -> ratio 1.5, below 2.0, no auto-compact yet
        assert_eq!(r.brutto_total(), 16);
        let _ = h2;
    }
}
