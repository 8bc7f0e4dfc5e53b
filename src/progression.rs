//! Cursor progression for page and khatma-part rotations.
//!
//! Pure functions, no clock and no I/O. The scheduler calls these after a
//! successful send; nothing here is allowed to fail.

/// Number of pages in the mushaf.
pub const MUSHAF_PAGES: u16 = 604;

/// Pages sent per delivery.
pub const PAGES_PER_DELIVERY: u16 = 2;

/// Parts in one khatma reading cycle.
pub const KHATMA_PARTS: u8 = 30;

/// Result of advancing the page cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageAdvance {
    /// Next page to deliver.
    pub next: u16,
    /// Whether this advance wrapped past the last page (mushaf completed).
    pub wrapped: bool,
}

/// Result of advancing the khatma part cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartAdvance {
    /// Next part to deliver.
    pub next: u8,
    /// Whether the part that was just delivered finished the cycle.
    pub completed: bool,
}

/// Clamp a page cursor loaded from disk into the valid range.
///
/// Out-of-range values (corrupted or hand-edited state) reset to page 1
/// rather than propagating an invalid cursor forever.
pub fn normalize_page(page: u16) -> u16 {
    if (1..=MUSHAF_PAGES).contains(&page) {
        page
    } else {
        1
    }
}

/// Clamp a part cursor into [1, 30]. Same self-healing as [`normalize_page`].
pub fn normalize_part(part: u8) -> u8 {
    if (1..=KHATMA_PARTS).contains(&part) {
        part
    } else {
        1
    }
}

/// Advance the page cursor by one delivery (two pages), wrapping to page 1
/// once the cursor would move past the last page.
pub fn advance_page(current: u16) -> PageAdvance {
    let current = normalize_page(current);
    let next = current + PAGES_PER_DELIVERY;
    if next > MUSHAF_PAGES {
        PageAdvance {
            next: 1,
            wrapped: true,
        }
    } else {
        PageAdvance {
            next,
            wrapped: false,
        }
    }
}

/// Advance the khatma part cursor by one, reporting completion when the
/// part that was just delivered was the final one.
pub fn advance_part(current: u8) -> PartAdvance {
    let current = normalize_part(current);
    PartAdvance {
        next: current % KHATMA_PARTS + 1,
        completed: current == KHATMA_PARTS,
    }
}
