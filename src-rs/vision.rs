use crate::geom::{Point, Rect, Rgb};
use image::{DynamicImage, GrayImage, RgbaImage};
use std::path::Path;
use thiserror::Error;
use xcap::Monitor;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("screen capture failed: {0}")]
    Capture(String),
    #[error("no monitor available")]
    NoMonitor,
    #[error("pixel {0} is outside the captured screen")]
    OffScreen(Point),
    #[error("failed to read template {path}: {source}")]
    Template {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Read-only view of the live screen.
pub trait VisionProvider {
    /// Bounding box of the best match for `template`, if it scores at least `confidence`.
    fn find_on_screen(
        &self,
        template: &GrayImage,
        confidence: f32,
    ) -> Result<Option<Rect>, VisionError>;

    fn pixel_matches(&self, at: Point, color: Rgb, tolerance: u8) -> Result<bool, VisionError>;

    fn screen_size(&self) -> Result<(u32, u32), VisionError>;
}

pub fn load_template(path: &Path) -> Result<GrayImage, VisionError> {
    let img = image::open(path).map_err(|source| VisionError::Template {
        path: path.display().to_string(),
        source,
    })?;
    Ok(img.to_luma8())
}

/// Primary-monitor capture through xcap. Every call takes a fresh screenshot so
/// that samples always reflect what the UI currently shows.
pub struct ScreenVision {
    monitor: Monitor,
}

impl ScreenVision {
    pub fn primary() -> Result<Self, VisionError> {
        let monitors = Monitor::all().map_err(|e| VisionError::Capture(e.to_string()))?;
        let index = monitors
            .iter()
            .position(|m| m.is_primary().unwrap_or(false))
            .unwrap_or(0);
        let monitor = monitors
            .into_iter()
            .nth(index)
            .ok_or(VisionError::NoMonitor)?;
        Ok(Self { monitor })
    }

    fn capture(&self) -> Result<RgbaImage, VisionError> {
        self.monitor
            .capture_image()
            .map_err(|e| VisionError::Capture(e.to_string()))
    }

    fn origin(&self) -> Result<Point, VisionError> {
        let x = self
            .monitor
            .x()
            .map_err(|e| VisionError::Capture(e.to_string()))?;
        let y = self
            .monitor
            .y()
            .map_err(|e| VisionError::Capture(e.to_string()))?;
        Ok(Point::new(x, y))
    }
}

impl VisionProvider for ScreenVision {
    fn find_on_screen(
        &self,
        template: &GrayImage,
        confidence: f32,
    ) -> Result<Option<Rect>, VisionError> {
        let screen = DynamicImage::ImageRgba8(self.capture()?).to_luma8();
        let origin = self.origin()?;
        Ok(locate_template(&screen, template, confidence).map(|(rect, score)| {
            tracing::debug!(score, ?rect, "template match");
            Rect {
                left: rect.left + origin.x,
                top: rect.top + origin.y,
                ..rect
            }
        }))
    }

    fn pixel_matches(&self, at: Point, color: Rgb, tolerance: u8) -> Result<bool, VisionError> {
        let screen = self.capture()?;
        let origin = self.origin()?;
        let (lx, ly) = (at.x - origin.x, at.y - origin.y);
        if lx < 0 || ly < 0 || lx as u32 >= screen.width() || ly as u32 >= screen.height() {
            return Err(VisionError::OffScreen(at));
        }
        let px = screen.get_pixel(lx as u32, ly as u32).0;
        Ok(Rgb(px[0], px[1], px[2]).within(color, tolerance))
    }

    fn screen_size(&self) -> Result<(u32, u32), VisionError> {
        let w = self
            .monitor
            .width()
            .map_err(|e| VisionError::Capture(e.to_string()))?;
        let h = self
            .monitor
            .height()
            .map_err(|e| VisionError::Capture(e.to_string()))?;
        Ok((w, h))
    }
}

/// Exhaustive sum-of-absolute-differences search over `screen`.
///
/// Score is `1 - mean|delta| / 255`. A candidate is abandoned as soon as its
/// running difference exceeds both the confidence budget and the best total
/// seen so far, which keeps the scan cheap for confident thresholds.
pub fn locate_template(
    screen: &GrayImage,
    template: &GrayImage,
    confidence: f32,
) -> Option<(Rect, f32)> {
    let (sw, sh) = screen.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || tw > sw || th > sh {
        return None;
    }

    let n = u64::from(tw) * u64::from(th);
    let budget = ((1.0 - f64::from(confidence.clamp(0.0, 1.0))) * 255.0 * n as f64) as u64;
    let screen_raw = screen.as_raw();
    let tpl_raw = template.as_raw();
    let (sw, tw_us) = (sw as usize, tw as usize);

    let mut best: Option<(u32, u32, u64)> = None;
    for y in 0..=(sh - th) {
        for x in 0..=(sw as u32 - tw) {
            let cutoff = best.map_or(budget, |(_, _, s)| s.min(budget));
            let mut sum: u64 = 0;
            let mut rejected = false;
            for ty in 0..th as usize {
                let s_start = (y as usize + ty) * sw + x as usize;
                let s_row = &screen_raw[s_start..s_start + tw_us];
                let t_row = &tpl_raw[ty * tw_us..(ty + 1) * tw_us];
                sum += s_row
                    .iter()
                    .zip(t_row)
                    .map(|(a, b)| u64::from(a.abs_diff(*b)))
                    .sum::<u64>();
                if sum > cutoff {
                    rejected = true;
                    break;
                }
            }
            if rejected {
                continue;
            }
            if best.map_or(true, |(_, _, s)| sum < s) {
                best = Some((x, y, sum));
            }
        }
    }

    let (x, y, sum) = best?;
    let score = 1.0 - (sum as f64 / (255.0 * n as f64)) as f32;
    if score < confidence {
        return None;
    }
    Some((
        Rect {
            left: x as i32,
            top: y as i32,
            width: tw,
            height: th,
        },
        score,
    ))
}
