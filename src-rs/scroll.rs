use crate::geom::Point;

/// A scroll the caller must issue before acting on the returned row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollRequest {
    pub amount: i32,
    pub at: Point,
    pub rows: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InView {
    pub row_in_view: u32,
    pub position: Point,
    pub scroll: Option<ScrollRequest>,
}

/// Number of whole rows between the first list row and the bottom of the screen.
pub fn visible_rows(screen_height: i32, list_start_y: i32, row_height: i32) -> u32 {
    let rows = (i64::from(screen_height) - i64::from(list_start_y))
        .div_euclid(i64::from(row_height.max(1)));
    rows.clamp(1, i64::from(u32::MAX)) as u32
}

/// Maps logical list indices onto the visible window. Only ever scrolls
/// forward: the list is assumed not to lose rows above the window mid-run.
#[derive(Debug, Clone)]
pub struct ViewportScroller {
    list_start: Point,
    row_height: i32,
    capacity: u32,
    clicks_per_row: i32,
    consumed: u64,
}

impl ViewportScroller {
    pub fn new(list_start: Point, row_height: i32, capacity: u32, clicks_per_row: i32) -> Self {
        Self {
            list_start,
            row_height,
            capacity: capacity.max(1),
            clicks_per_row,
            consumed: 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Bring `index` into view, returning its in-view slot and the scroll (if
    /// any) that makes it so. `index` must not be lower than any previous call.
    pub fn ensure_visible(&mut self, index: u64) -> InView {
        let capacity = u64::from(self.capacity);
        let mut offset = index.saturating_sub(self.consumed);
        let mut scroll = None;

        if offset >= capacity {
            let rows = offset - capacity + 1;
            let amount = -(i64::from(self.clicks_per_row) * rows as i64);
            scroll = Some(ScrollRequest {
                amount: amount.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
                at: self.list_start,
                rows,
            });
            self.consumed += rows;
            offset = index - self.consumed;
        }

        let row_in_view = offset as u32;
        InView {
            row_in_view,
            position: self.list_start.offset(
                0,
                i32::try_from(row_in_view)
                    .unwrap_or(i32::MAX)
                    .saturating_mul(self.row_height),
            ),
            scroll,
        }
    }
}
