/// Options for a [`BipBuffer`](super::BipBuffer).
///
/// # Zero fill on init
///
/// Wipes the whole backing store when the buffer is built. Heap stores are
/// always zeroed already; this matters for mapped files and caller-owned
/// memory that may hold stale bytes.
///
/// # Zero fill on consume
///
/// Makes every [`read_release`](super::BipBuffer::read_release) wipe the
/// consumed bytes before they become free space again, so stale data cannot
/// leak into a later reservation. Off by default.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BufferOptions {
    pub zero_fill_on_init: bool,
    pub zero_fill_on_consume: bool,
}

impl BufferOptions {
    pub const fn new() -> Self {
        Self {
            zero_fill_on_init: false,
            zero_fill_on_consume: false,
        }
    }

    /// Options with both zero-fill behaviors switched on.
    pub const fn zeroing() -> Self {
        Self {
            zero_fill_on_init: true,
            zero_fill_on_consume: true,
        }
    }

    pub const fn zero_fill_on_init(mut self, value: bool) -> Self {
        self.zero_fill_on_init = value;
        self
    }

    pub const fn zero_fill_on_consume(mut self, value: bool) -> Self {
        self.zero_fill_on_consume = value;
        self
    }
}
