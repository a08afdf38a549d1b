use crate::geom::{Point, Rgb};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SCREEN_HEIGHT: i32 = 1080;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("row height must be positive, got {0}")]
    RowHeight(i32),
    #[error("per-row must be at least 1")]
    PerRow,
    #[error("confidence must be within [0, 1], got {0}")]
    Confidence(f32),
    #[error("{name} must be a finite, non-negative number of seconds, got {value}")]
    Delay { name: &'static str, value: f64 },
    #[error("{name} expects {expected} values, got {got}")]
    Arity {
        name: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Where to sample a row and what color to expect there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorProbe {
    pub color: Rgb,
    pub tolerance: u8,
    pub offset_x: i32,
    pub offset_y: i32,
}

impl ColorProbe {
    pub fn sample_point(&self, row: Point) -> Point {
        row.offset(self.offset_x, self.offset_y)
    }
}

#[derive(Debug, Clone)]
pub struct PlacementConfig {
    pub anchor_template: PathBuf,
    pub row_height: i32,
    pub list_offset_x: i32,
    pub list_offset_y: i32,
    pub screen_height: Option<i32>,
    pub spacing: i32,
    pub per_row: u32,
    pub click_delay: Duration,
    pub place_delay: Duration,
    pub scroll_clicks_per_row: i32,
    pub scroll_delay: Duration,
    pub limit: Option<u32>,
    pub confidence: f32,
    pub origin: Option<Point>,
    pub category: Option<ColorProbe>,
    pub item: Option<ColorProbe>,
    pub require_item_color: bool,
    pub stop_after_misses: Option<u32>,
    pub failsafe: bool,
    pub dry_run: bool,
}

impl PlacementConfig {
    /// Defaults matching the stock object browser at 1920x1080.
    pub fn new(anchor_template: impl Into<PathBuf>) -> Self {
        Self {
            anchor_template: anchor_template.into(),
            row_height: 26,
            list_offset_x: 10,
            list_offset_y: 40,
            screen_height: None,
            spacing: 120,
            per_row: 15,
            click_delay: Duration::from_millis(50),
            place_delay: Duration::from_millis(100),
            scroll_clicks_per_row: 3,
            scroll_delay: Duration::from_millis(150),
            limit: None,
            confidence: 0.9,
            origin: None,
            category: None,
            item: Some(ColorProbe {
                color: Rgb(142, 125, 18),
                tolerance: 10,
                offset_x: 26,
                offset_y: 12,
            }),
            require_item_color: true,
            stop_after_misses: None,
            failsafe: true,
            dry_run: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.row_height <= 0 {
            return Err(ConfigError::RowHeight(self.row_height));
        }
        if self.per_row == 0 {
            return Err(ConfigError::PerRow);
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ConfigError::Confidence(self.confidence));
        }
        Ok(())
    }

    /// Item probe that must match for a row to be placeable, if any.
    pub fn required_item_probe(&self) -> Option<&ColorProbe> {
        if self.require_item_color {
            self.item.as_ref()
        } else {
            None
        }
    }
}

pub fn seconds(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Delay { name, value });
    }
    Ok(Duration::from_secs_f64(value))
}

pub fn rgb_triple(name: &'static str, values: &[u8]) -> Result<Rgb, ConfigError> {
    match values {
        [r, g, b] => Ok(Rgb(*r, *g, *b)),
        _ => Err(ConfigError::Arity {
            name,
            expected: 3,
            got: values.len(),
        }),
    }
}

pub fn point_pair(name: &'static str, values: &[i32]) -> Result<Point, ConfigError> {
    match values {
        [x, y] => Ok(Point::new(*x, *y)),
        _ => Err(ConfigError::Arity {
            name,
            expected: 2,
            got: values.len(),
        }),
    }
}
