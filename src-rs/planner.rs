use crate::geom::Point;

/// Lays placements out left to right, wrapping every `per_row` into a new row.
#[derive(Debug, Clone, Copy)]
pub struct PlacementPlanner {
    origin: Point,
    spacing: i32,
    per_row: u32,
}

impl PlacementPlanner {
    pub fn new(origin: Point, spacing: i32, per_row: u32) -> Self {
        Self {
            origin,
            spacing,
            per_row: per_row.max(1),
        }
    }

    pub fn position_for(&self, placed: u32) -> Point {
        let col = i32::try_from(placed % self.per_row).unwrap_or(i32::MAX);
        let row = i32::try_from(placed / self.per_row).unwrap_or(i32::MAX);
        self.origin
            .offset(col.saturating_mul(self.spacing), row.saturating_mul(self.spacing))
    }
}
