use crate::geom::Point;
use enigo::{Axis, Button, Coordinate, Direction, Enigo, Mouse, Settings};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to connect to the input backend: {0}")]
    Connect(String),
    #[error("input backend error: {0}")]
    Backend(String),
    #[error("fail-safe triggered: pointer parked in a screen corner at {0}")]
    FailSafe(Point),
}

/// Pointer control. Scroll amounts use the list's convention: negative moves
/// the content down (towards later rows).
pub trait InputDriver {
    fn move_to(&mut self, at: Point) -> Result<(), InputError>;
    fn click(&mut self) -> Result<(), InputError>;
    fn scroll(&mut self, amount: i32, at: Point) -> Result<(), InputError>;
    fn pointer_position(&self) -> Result<Point, InputError>;
}

pub struct EnigoDriver {
    enigo: Enigo,
    failsafe: bool,
}

impl EnigoDriver {
    /// With `failsafe` on, every action first refuses to run while the
    /// pointer sits in one of the four screen corners.
    pub fn new(failsafe: bool) -> Result<Self, InputError> {
        let enigo =
            Enigo::new(&Settings::default()).map_err(|e| InputError::Connect(e.to_string()))?;
        Ok(Self { enigo, failsafe })
    }

    fn check_failsafe(&self) -> Result<(), InputError> {
        if !self.failsafe {
            return Ok(());
        }
        let (w, h) = self
            .enigo
            .main_display()
            .map_err(|e| InputError::Backend(e.to_string()))?;
        let at = self.pointer_position()?;
        if in_corner(at, w, h) {
            return Err(InputError::FailSafe(at));
        }
        Ok(())
    }
}

impl InputDriver for EnigoDriver {
    fn move_to(&mut self, at: Point) -> Result<(), InputError> {
        self.check_failsafe()?;
        self.enigo
            .move_mouse(at.x, at.y, Coordinate::Abs)
            .map_err(|e| InputError::Backend(e.to_string()))
    }

    fn click(&mut self) -> Result<(), InputError> {
        self.check_failsafe()?;
        self.enigo
            .button(Button::Left, Direction::Click)
            .map_err(|e| InputError::Backend(e.to_string()))
    }

    fn scroll(&mut self, amount: i32, at: Point) -> Result<(), InputError> {
        self.move_to(at)?;
        // enigo scrolls down for positive lengths.
        self.enigo
            .scroll(-amount, Axis::Vertical)
            .map_err(|e| InputError::Backend(e.to_string()))
    }

    fn pointer_position(&self) -> Result<Point, InputError> {
        let (x, y) = self
            .enigo
            .location()
            .map_err(|e| InputError::Backend(e.to_string()))?;
        Ok(Point::new(x, y))
    }
}

fn in_corner(at: Point, width: i32, height: i32) -> bool {
    let (right, bottom) = (width - 1, height - 1);
    (at.x <= 0 || at.x >= right) && (at.y <= 0 || at.y >= bottom)
}
