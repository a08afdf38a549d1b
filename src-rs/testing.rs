//! Scripted stand-ins for the screen and the pointer.

use crate::classify::RowKind;
use crate::engine::StopFlag;
use crate::geom::{Point, Rect, Rgb};
use crate::input::{InputDriver, InputError};
use crate::vision::{VisionError, VisionProvider};
use image::GrayImage;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

pub const CATEGORY_ICON: Rgb = Rgb(210, 210, 210);
pub const ITEM_TEXT: Rgb = Rgb(142, 125, 18);
pub const BACKGROUND: Rgb = Rgb(30, 30, 30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Move(Point),
    Click,
    Scroll { amount: i32, at: Point },
}

/// A scrollable list rendered row by row. Pixels left of the label column
/// show the category icon; pixels right of it show the item text color.
#[derive(Debug)]
pub struct SimList {
    pub list_start: Point,
    pub row_height: i32,
    pub clicks_per_row: i32,
    pub rows: Vec<RowKind>,
    pub scroll_top: u64,
}

impl SimList {
    pub fn new(list_start: Point, row_height: i32, clicks_per_row: i32, rows: Vec<RowKind>) -> Self {
        Self {
            list_start,
            row_height,
            clicks_per_row,
            rows,
            scroll_top: 0,
        }
    }

    fn color_at(&self, at: Point) -> Rgb {
        let slot = (at.y - self.list_start.y).div_euclid(self.row_height);
        if slot < 0 {
            return BACKGROUND;
        }
        let logical = self.scroll_top + slot as u64;
        let kind = usize::try_from(logical)
            .ok()
            .and_then(|i| self.rows.get(i).copied());
        match kind {
            Some(RowKind::Category) if at.x < self.list_start.x => CATEGORY_ICON,
            Some(RowKind::Valid) if at.x > self.list_start.x => ITEM_TEXT,
            _ => BACKGROUND,
        }
    }

    /// Logical row currently drawn at screen position `at`.
    pub fn logical_at(&self, at: Point) -> u64 {
        self.scroll_top + (at.y - self.list_start.y).div_euclid(self.row_height) as u64
    }
}

#[derive(Default)]
pub struct FakeVision {
    painted: HashMap<Point, Rgb>,
    list: Option<Rc<RefCell<SimList>>>,
    anchor: Option<Rect>,
    screen: Option<(u32, u32)>,
    failing: bool,
    samples: Cell<usize>,
    searches: Cell<usize>,
}

impl FakeVision {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paint(mut self, at: Point, color: Rgb) -> Self {
        self.painted.insert(at, color);
        self
    }

    pub fn showing(mut self, list: Rc<RefCell<SimList>>) -> Self {
        self.list = Some(list);
        self
    }

    pub fn with_anchor(mut self, anchor: Rect) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn with_screen(mut self, width: u32, height: u32) -> Self {
        self.screen = Some((width, height));
        self
    }

    /// Every pixel read errors out.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn samples(&self) -> usize {
        self.samples.get()
    }

    pub fn searches(&self) -> usize {
        self.searches.get()
    }
}

impl VisionProvider for FakeVision {
    fn find_on_screen(
        &self,
        _template: &GrayImage,
        _confidence: f32,
    ) -> Result<Option<Rect>, VisionError> {
        self.searches.set(self.searches.get() + 1);
        Ok(self.anchor)
    }

    fn pixel_matches(&self, at: Point, color: Rgb, tolerance: u8) -> Result<bool, VisionError> {
        self.samples.set(self.samples.get() + 1);
        if self.failing {
            return Err(VisionError::OffScreen(at));
        }
        let actual = match (self.painted.get(&at), &self.list) {
            (Some(c), _) => *c,
            (None, Some(list)) => list.borrow().color_at(at),
            (None, None) => BACKGROUND,
        };
        Ok(actual.within(color, tolerance))
    }

    fn screen_size(&self) -> Result<(u32, u32), VisionError> {
        self.screen
            .ok_or_else(|| VisionError::Capture("no display".to_string()))
    }
}

#[derive(Default)]
pub struct FakeInput {
    pub actions: Vec<Action>,
    pointer: Point,
    list: Option<Rc<RefCell<SimList>>>,
    failsafe_after_clicks: Option<usize>,
    stop_after_clicks: Option<(usize, StopFlag)>,
    clicks: usize,
}

impl FakeInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, pointer: Point) -> Self {
        self.pointer = pointer;
        self
    }

    pub fn scrolling(mut self, list: Rc<RefCell<SimList>>) -> Self {
        self.list = Some(list);
        self
    }

    /// Simulates the operator slamming the pointer into a corner after `n` clicks.
    pub fn failsafe_after(mut self, n: usize) -> Self {
        self.failsafe_after_clicks = Some(n);
        self
    }

    /// Raises `flag` once `n` clicks have gone through, like a Ctrl-C mid-run.
    pub fn stop_after(mut self, n: usize, flag: StopFlag) -> Self {
        self.stop_after_clicks = Some((n, flag));
        self
    }

    /// Where each click landed, in order.
    pub fn clicked_points(&self) -> Vec<Point> {
        let mut at = Point::default();
        let mut out = Vec::new();
        for action in &self.actions {
            match action {
                Action::Move(p) | Action::Scroll { at: p, .. } => at = *p,
                Action::Click => out.push(at),
            }
        }
        out
    }

    pub fn scrolls(&self) -> Vec<i32> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Action::Scroll { amount, .. } => Some(*amount),
                _ => None,
            })
            .collect()
    }
}

impl InputDriver for FakeInput {
    fn move_to(&mut self, at: Point) -> Result<(), InputError> {
        self.pointer = at;
        self.actions.push(Action::Move(at));
        Ok(())
    }

    fn click(&mut self) -> Result<(), InputError> {
        if self.failsafe_after_clicks == Some(self.clicks) {
            return Err(InputError::FailSafe(Point::new(0, 0)));
        }
        self.clicks += 1;
        self.actions.push(Action::Click);
        if let Some((n, flag)) = &self.stop_after_clicks {
            if self.clicks >= *n {
                flag.stop();
            }
        }
        Ok(())
    }

    fn scroll(&mut self, amount: i32, at: Point) -> Result<(), InputError> {
        self.pointer = at;
        self.actions.push(Action::Scroll { amount, at });
        if let Some(list) = &self.list {
            let mut list = list.borrow_mut();
            let rows = (-amount / list.clicks_per_row.max(1)).max(0);
            list.scroll_top += rows as u64;
        }
        Ok(())
    }

    fn pointer_position(&self) -> Result<Point, InputError> {
        Ok(self.pointer)
    }
}
