use crate::config::{ColorProbe, PlacementConfig};
use crate::geom::Point;
use crate::vision::VisionProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Category,
    MissingItemSignal,
    Valid,
}

pub struct RowClassifier<'a> {
    category: Option<&'a ColorProbe>,
    item: Option<&'a ColorProbe>,
}

impl<'a> RowClassifier<'a> {
    pub fn new(cfg: &'a PlacementConfig) -> Self {
        Self {
            category: cfg.category.as_ref(),
            item: cfg.required_item_probe(),
        }
    }

    /// Classify the row whose label starts at `row`. The category check runs
    /// first and short-circuits the item check.
    pub fn classify(&self, vision: &dyn VisionProvider, row: Point) -> RowKind {
        if let Some(probe) = self.category {
            if sample(vision, probe, row) {
                return RowKind::Category;
            }
        }
        if let Some(probe) = self.item {
            if !sample(vision, probe, row) {
                return RowKind::MissingItemSignal;
            }
        }
        RowKind::Valid
    }
}

/// Read failures count as "no match".
fn sample(vision: &dyn VisionProvider, probe: &ColorProbe, row: Point) -> bool {
    let at = probe.sample_point(row);
    match vision.pixel_matches(at, probe.color, probe.tolerance) {
        Ok(matched) => matched,
        Err(err) => {
            tracing::debug!(%at, error = %err, "pixel sample failed");
            false
        }
    }
}
