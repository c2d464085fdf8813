//! Buffer pool (C3).
//!
//! Two process-wide pools of reusable growable byte buffers: `blob` (small,
//! per-metric staging during encode) and `blob_set` (large, per-materialized
//! view). Grounded in the teacher's `config.rs` style of plain `pub const`
//! tunables (`CLEVEL_DEFAULT`, `NB_WORKERS_DEFAULT`) rather than a runtime
//! configuration layer — these sizes are compile-time constants, not
//! environment- or file-driven (spec §6: no env vars / filesystem in the
//! core contract).
//!
//! Internally synchronized with a `Mutex<Vec<Buffer>>` so `acquire`/`release`
//! are safe to call from independent concurrent callers (spec §5).

use std::sync::{Mutex, OnceLock};

/// Default capacity for a freshly allocated `blob` pool buffer.
pub const BLOB_POOL_DEFAULT: usize = 16 * 1024;
/// A `blob` pool buffer grown past this size is dropped instead of returned.
pub const BLOB_POOL_MAX: usize = 128 * 1024;
/// Default capacity for a freshly allocated `blob_set` pool buffer.
pub const BLOB_SET_POOL_DEFAULT: usize = 1024 * 1024;
/// A `blob_set` pool buffer grown past this size is dropped instead of returned.
pub const BLOB_SET_POOL_MAX: usize = 8 * 1024 * 1024;

/// A reusable growable byte buffer drawn from a [`Pool`].
pub struct Buffer {
    bytes: Vec<u8>,
    default_size: usize,
    max_size: usize,
}

impl Buffer {
    fn new(default_size: usize, max_size: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(default_size),
            default_size,
            max_size,
        }
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Truncates length to zero; capacity (and thus any prior growth) is
    /// preserved. Called on release back to the pool.
    #[inline]
    pub fn reset(&mut self) {
        self.bytes.clear();
    }

    pub fn append(&mut self, data: &[u8]) {
        self.extend_or_grow(data.len());
        self.bytes.extend_from_slice(data);
    }

    /// Ensures at least `additional` more bytes of spare capacity, growing by
    /// `default_size`-sized steps below `4 * default_size` total capacity,
    /// and by +25% of current capacity above that threshold.
    pub fn extend_or_grow(&mut self, additional: usize) {
        let needed = self.bytes.len() + additional;
        let mut cap = self.bytes.capacity();
        while cap < needed {
            cap = if cap < 4 * self.default_size {
                cap + self.default_size
            } else {
                cap + cap / 4
            };
        }
        if cap > self.bytes.capacity() {
            self.bytes.reserve(cap - self.bytes.len());
        }
    }

    /// Whether this buffer has grown past its pool's drop threshold and
    /// should be discarded rather than returned on release.
    fn oversize(&self) -> bool {
        self.bytes.capacity() > self.max_size
    }
}

/// A mutual-exclusion pool of [`Buffer`]s sized for one usage class.
pub struct Pool {
    default_size: usize,
    max_size: usize,
    free: Mutex<Vec<Buffer>>,
}

impl Pool {
    const fn new(default_size: usize, max_size: usize) -> Self {
        Self {
            default_size,
            max_size,
            free: Mutex::new(Vec::new()),
        }
    }

    /// Acquires a buffer, reusing a released one if available, otherwise
    /// allocating fresh at `default_size`.
    pub fn acquire(&self) -> Buffer {
        let mut free = self.free.lock().unwrap();
        free.pop()
            .unwrap_or_else(|| Buffer::new(self.default_size, self.max_size))
    }

    /// Returns a buffer to the pool: length is reset to zero and capacity is
    /// kept, unless the buffer grew past this pool's threshold, in which case
    /// it is dropped instead.
    pub fn release(&self, mut buf: Buffer) {
        buf.reset();
        if buf.oversize() {
            return;
        }
        self.free.lock().unwrap().push(buf);
    }
}

static BLOB_POOL: OnceLock<Pool> = OnceLock::new();
static BLOB_SET_POOL: OnceLock<Pool> = OnceLock::new();

/// The process-wide pool used for per-metric encoder staging buffers.
pub fn blob_pool() -> &'static Pool {
    BLOB_POOL.get_or_init(|| Pool::new(BLOB_POOL_DEFAULT, BLOB_POOL_MAX))
}

/// The process-wide pool used for materialized blob-set buffers.
pub fn blob_set_pool() -> &'static Pool {
    BLOB_SET_POOL.get_or_init(|| Pool::new(BLOB_SET_POOL_DEFAULT, BLOB_SET_POOL_MAX))
}
