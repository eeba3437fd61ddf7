//! Circular bucket queue for small integer priorities.
//!
//! The path solver keys pixels by their cumulative cost modulo
//! [`BUCKET_COUNT`]. Each bucket is an unordered growable array; callers
//! remember the slot returned by [`BucketQueue::add`] so an element can
//! be moved to another bucket when its cost decreases.

/// Number of buckets. Edge costs never exceed `BUCKET_COUNT - 1`.
pub const BUCKET_COUNT: usize = 256;

/// Initial capacity of each bucket.
const BUCKET_CAPACITY: usize = 40;

/// Array of `u32` buckets addressed by an 8-bit key.
#[derive(Debug, Clone)]
pub struct BucketQueue {
    buckets: Vec<Vec<u32>>,
    len: usize,
}

impl Default for BucketQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl BucketQueue {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: (0..BUCKET_COUNT)
                .map(|_| Vec::with_capacity(BUCKET_CAPACITY))
                .collect(),
            len: 0,
        }
    }

    /// Append `value` to `bucket`, returning its slot.
    pub fn add(&mut self, bucket: u8, value: u32) -> usize {
        let items = &mut self.buckets[usize::from(bucket)];
        items.push(value);
        self.len += 1;
        items.len() - 1
    }

    /// Pop the most recently added element of `bucket`.
    pub fn remove(&mut self, bucket: u8) -> Option<u32> {
        let value = self.buckets[usize::from(bucket)].pop()?;
        self.len -= 1;
        Some(value)
    }

    /// Remove the element at `slot` of `bucket`, moving the bucket's last
    /// element into the vacated slot.
    ///
    /// The caller must re-index the moved element, which is now found at
    /// `get(bucket, slot)` unless `slot` was the last one.
    pub fn remove_at(&mut self, bucket: u8, slot: usize) -> Option<u32> {
        let items = &mut self.buckets[usize::from(bucket)];
        if slot >= items.len() {
            return None;
        }
        self.len -= 1;
        Some(items.swap_remove(slot))
    }

    /// Element at `slot` of `bucket`.
    #[must_use]
    pub fn get(&self, bucket: u8, slot: usize) -> Option<u32> {
        self.buckets[usize::from(bucket)].get(slot).copied()
    }

    /// Number of elements in `bucket`.
    #[must_use]
    pub fn size(&self, bucket: u8) -> usize {
        self.buckets[usize::from(bucket)].len()
    }

    /// Total number of queued elements.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether every bucket is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Empty every bucket, keeping allocations.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.len = 0;
    }
}
