//! The capability a target exposes to steps.
//!
//! A `Driver` is one live UI session. How it talks to the browser is up to the
//! implementation; the engine only needs the operations below. Drivers are
//! shared with every step of a sequence through an `Arc`, so methods take
//! `&self` and implementations synchronize internally.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

mod memory;

pub use memory::{MemoryDriver, MemoryDriverFactory, MemoryElement};

/// Opaque handle to an element found by a driver
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef(pub String);

/// Element bounding box in page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Rect snapped to whole pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Both corners of `other` lie inside `self`
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Location floored, size rounded up
    pub fn pixel_box(&self) -> PixelBox {
        PixelBox {
            x: self.x.floor() as i64,
            y: self.y.floor() as i64,
            width: self.width.max(0.0).ceil() as u32,
            height: self.height.max(0.0).ceil() as u32,
        }
    }
}

pub trait Driver: Send + Sync {
    /// Target name reports are attributed to
    fn name(&self) -> &str;

    fn current_url(&self) -> Result<String>;
    fn navigate_to(&self, url: &str) -> Result<()>;
    fn back(&self) -> Result<()>;
    fn forward(&self) -> Result<()>;
    fn refresh(&self) -> Result<()>;

    /// Every element matching an XPath, in document order
    fn find_elements(&self, xpath: &str) -> Result<Vec<ElementRef>>;
    fn click(&self, element: &ElementRef) -> Result<()>;
    fn clear(&self, element: &ElementRef) -> Result<()>;
    fn send_keys(&self, element: &ElementRef, keys: &str) -> Result<()>;
    fn hover(&self, element: &ElementRef) -> Result<()>;
    fn text(&self, element: &ElementRef) -> Result<String>;
    fn is_displayed(&self, element: &ElementRef) -> Result<bool>;
    fn property(&self, element: &ElementRef, name: &str) -> Result<Option<Value>>;
    fn attribute(&self, element: &ElementRef, name: &str) -> Result<Option<String>>;
    fn rect(&self, element: &ElementRef) -> Result<Rect>;
    /// PNG screenshot of the element's bounding box
    fn screenshot(&self, element: &ElementRef) -> Result<Vec<u8>>;

    fn set_window_size(&self, width: u32, height: u32) -> Result<()>;
    fn add_cookie(&self, cookie: &Value) -> Result<()>;
    fn delete_cookie(&self, name: &str) -> Result<()>;
    fn delete_all_cookies(&self) -> Result<()>;
    fn execute_script(&self, script: &str) -> Result<()>;

    fn quit(&self) -> Result<()>;

    fn find_element(&self, xpath: &str) -> Result<ElementRef> {
        self.find_elements(xpath)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::ElementNotFound(xpath.to_string()).into())
    }
}

/// Opens one driver per target name
pub trait DriverFactory: Send + Sync {
    fn open(&self, target: &str) -> Result<Arc<dyn Driver>>;
}
