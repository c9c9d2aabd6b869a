use std::sync::atomic::{AtomicU64, Ordering};

/// Event counter for one time bucket (normally an epoch second).
///
/// The count only means something together with its bucket: asking about
/// any other bucket yields 0. Bucket and count share one atomic word, so a
/// rollover and a concurrent increment never lose each other. Buckets are
/// compared on their low 32 bits.
#[derive(Debug, Default)]
pub struct Throttle {
    state: AtomicU64,
}

fn key(bucket: i64) -> u32 {
    bucket as u32
}

fn pack(bucket: u32, n: u32) -> u64 {
    (u64::from(bucket) << 32) | u64::from(n)
}

fn unpack(state: u64) -> (u32, u32) {
    ((state >> 32) as u32, state as u32)
}

impl Throttle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts counting at `bucket` with zero events.
    pub fn starting_at(bucket: i64) -> Self {
        Self { state: AtomicU64::new(pack(key(bucket), 0)) }
    }

    /// Count for `bucket`, 0 if the stored bucket is a different one.
    pub fn get(&self, bucket: i64) -> u32 {
        let (b, n) = unpack(self.state.load(Ordering::Acquire));
        if b != key(bucket) {
            return 0;
        }
        n
    }

    pub fn bucket(&self) -> i64 {
        i64::from(unpack(self.state.load(Ordering::Acquire)).0)
    }

    /// Counts one event in `bucket`. A new bucket resets the count to 0 and
    /// becomes the stored bucket.
    pub fn update(&self, bucket: i64) {
        let k = key(bucket);
        let _ = self.state.fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
            let (b, n) = unpack(s);
            Some(if b != k { pack(k, 0) } else { pack(b, n.saturating_add(1)) })
        });
    }

    /// Counts one event in `bucket` unless `limit` events are already there.
    /// A stale bucket counts as empty. On refusal returns the count found.
    pub fn try_acquire(&self, bucket: i64, limit: u32) -> Result<(), u32> {
        let k = key(bucket);
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                let (b, n) = unpack(s);
                let n = if b == k { n } else { 0 };
                (n < limit).then(|| pack(k, n + 1))
            })
            .map(|_| ())
            .map_err(|s| unpack(s).1)
    }

    /// Gives back an event taken with [`try_acquire`](Self::try_acquire).
    /// No-op once the bucket has moved on.
    pub(crate) fn release(&self, bucket: i64) {
        let k = key(bucket);
        let _ = self.state.fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
            let (b, n) = unpack(s);
            (b == k && n > 0).then(|| pack(b, n - 1))
        });
    }
}
