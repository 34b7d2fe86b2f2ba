//! Hard limits on payload shapes. Kept in one place so the boundary checks
//! and the tests agree on the numbers.

/// Cancellation passwords are exactly five ASCII digits.
pub const PASSWORD_LEN: usize = 5;

/// Half-hour grid: 48 slots per day.
pub const SLOTS_PER_DAY: usize = 48;

/// Minutes per slot.
pub const SLOT_MINUTES: u32 = 30;

/// Condition-evidence photos per item per return event.
pub const MAX_PHOTOS_PER_ITEM: usize = 4;

/// Client-side compression targets 100-300 KB per image. The lower bound is
/// a target, not a floor, so only an upper bound is enforced here, with
/// headroom for compressors that overshoot.
pub const MAX_IMAGE_KB: usize = 600;

/// Newest return events kept in the local history view. The remote keeps
/// its own retention window.
pub const HISTORY_CAP: usize = 100;
