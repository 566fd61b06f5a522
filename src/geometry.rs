//! Bounding-box geometry shared by every conversion pipeline.
//!
//! All operations here are pure functions over small value types: computing a
//! box from polygon vertices, normalizing it to YOLO center/size form,
//! expanding it around its center, and moving it into the frame of a crop.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Image coordinate in pixels, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to `other`.
    pub fn distance_squared(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Width and height of the image a set of coordinates is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageFrame {
    width: u32,
    height: u32,
}

impl ImageFrame {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidAnnotation(format!(
                "image frame must have positive size, got {}x{}",
                width, height
            )));
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The whole frame as a box.
    pub fn bounds(&self) -> BBox {
        BBox {
            x_min: 0.0,
            y_min: 0.0,
            x_max: self.width as f64,
            y_max: self.height as f64,
        }
    }
}

/// Axis-aligned box in pixel corner form.
///
/// `x_min <= x_max` and `y_min <= y_max` always hold; zero-area boxes are
/// allowed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    x_min: f64,
    y_min: f64,
    x_max: f64,
    y_max: f64,
}

impl BBox {
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Self> {
        let coords = [x_min, y_min, x_max, y_max];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(Error::InvalidGeometry(format!(
                "box coordinates must be finite, got {:?}",
                coords
            )));
        }
        if x_min > x_max || y_min > y_max {
            return Err(Error::InvalidGeometry(format!(
                "box corners out of order: ({}, {}) > ({}, {})",
                x_min, y_min, x_max, y_max
            )));
        }
        Ok(Self {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    /// Tightest box around a vertex list. Vertex order does not matter.
    pub fn from_points(points: &[Point]) -> Result<Self> {
        if points.len() < 2 {
            return Err(Error::InvalidGeometry(format!(
                "a box needs at least 2 points, got {}",
                points.len()
            )));
        }

        let (x_min, y_min, x_max, y_max) = points.iter().fold(
            (
                f64::INFINITY,
                f64::INFINITY,
                f64::NEG_INFINITY,
                f64::NEG_INFINITY,
            ),
            |(x_min, y_min, x_max, y_max), p| {
                (x_min.min(p.x), y_min.min(p.y), x_max.max(p.x), y_max.max(p.y))
            },
        );

        Self::new(x_min, y_min, x_max, y_max)
    }

    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    pub fn y_min(&self) -> f64 {
        self.y_min
    }

    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    pub fn y_max(&self) -> f64 {
        self.y_max
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    /// Smallest box covering both `self` and `other`.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }

    /// True when `other` lies entirely inside `self`, edges included.
    pub fn contains(&self, other: &BBox) -> bool {
        other.x_min >= self.x_min
            && other.y_min >= self.y_min
            && other.x_max <= self.x_max
            && other.y_max <= self.y_max
    }

    /// COCO `[x, y, width, height]`.
    pub fn to_xywh(&self) -> [f64; 4] {
        [self.x_min, self.y_min, self.width(), self.height()]
    }

    /// Normalize against `frame` and tag with `class_id`.
    ///
    /// Returns `None` when the box does not survive `validity`.
    pub fn normalize(
        &self,
        class_id: u32,
        frame: ImageFrame,
        validity: Validity,
    ) -> Option<NormalizedBox> {
        let w = frame.width as f64;
        let h = frame.height as f64;
        let normalized = NormalizedBox {
            class_id,
            cx: (self.x_min + self.x_max) / 2.0 / w,
            cy: (self.y_min + self.y_max) / 2.0 / h,
            w: (self.x_max - self.x_min) / w,
            h: (self.y_max - self.y_min) / h,
        };
        validity.accepts(&normalized).then_some(normalized)
    }

    /// Scale around the center by `expansion`, then clamp into `frame`.
    ///
    /// Clamping happens after scaling and per coordinate, so an edge that
    /// would leave the frame is cut at the border while the opposite edge
    /// keeps its scaled position.
    pub fn expand(&self, expansion: Expansion, frame: ImageFrame) -> BBox {
        let center = self.center();
        let half_w = self.width() * expansion.width / 2.0;
        let half_h = self.height() * expansion.height / 2.0;
        let (fw, fh) = (frame.width as f64, frame.height as f64);

        BBox {
            x_min: (center.x - half_w).clamp(0.0, fw),
            y_min: (center.y - half_h).clamp(0.0, fh),
            x_max: (center.x + half_w).clamp(0.0, fw),
            y_max: (center.y + half_h).clamp(0.0, fh),
        }
    }

    /// Express this box in the local frame of `region`.
    ///
    /// Pure translation; the result may have negative or over-range
    /// coordinates when the box is not inside the region.
    pub fn translate_into(&self, region: &CropRegion) -> BBox {
        let origin = region.origin();
        self.offset(-origin.x, -origin.y)
    }

    /// Inverse of [`BBox::translate_into`].
    pub fn translate_from(&self, region: &CropRegion) -> BBox {
        let origin = region.origin();
        self.offset(origin.x, origin.y)
    }

    fn offset(&self, dx: f64, dy: f64) -> BBox {
        BBox {
            x_min: self.x_min + dx,
            y_min: self.y_min + dy,
            x_max: self.x_max + dx,
            y_max: self.y_max + dy,
        }
    }
}

/// YOLO box: class and center/size as fractions of the reference frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub class_id: u32,
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

impl NormalizedBox {
    /// Back to pixel corners in `frame`.
    pub fn denormalize(&self, frame: ImageFrame) -> Result<BBox> {
        let fw = frame.width as f64;
        let fh = frame.height as f64;
        let (cx, cy) = (self.cx * fw, self.cy * fh);
        let (half_w, half_h) = (self.w * fw / 2.0, self.h * fh / 2.0);
        BBox::new(cx - half_w, cy - half_h, cx + half_w, cy + half_h)
    }
}

/// Which normalized boxes are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validity {
    /// Drop boxes with zero or negative width or height.
    #[default]
    Lenient,
    /// Additionally drop boxes whose center or size leaves `[0, 1]`.
    Strict,
}

impl Validity {
    pub fn accepts(&self, b: &NormalizedBox) -> bool {
        if !(b.w > 0.0 && b.h > 0.0) {
            return false;
        }
        match self {
            Validity::Lenient => true,
            Validity::Strict => [b.cx, b.cy, b.w, b.h]
                .iter()
                .all(|v| (0.0..=1.0).contains(v)),
        }
    }
}

/// Independent width and height multipliers for [`BBox::expand`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Expansion {
    width: f64,
    height: f64,
}

impl Expansion {
    pub const IDENTITY: Expansion = Expansion {
        width: 1.0,
        height: 1.0,
    };

    pub fn new(width: f64, height: f64) -> Result<Self> {
        if !(width.is_finite() && width > 0.0 && height.is_finite() && height > 0.0) {
            return Err(Error::InvalidGeometry(format!(
                "expansion factors must be positive, got {} x {}",
                width, height
            )));
        }
        Ok(Self { width, height })
    }

    pub fn uniform(factor: f64) -> Result<Self> {
        Self::new(factor, factor)
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }
}

/// Sub-rectangle of a source image kept after cropping.
///
/// Its top-left corner is the origin of the cropped image's coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRegion {
    bounds: BBox,
}

impl CropRegion {
    pub fn new(bounds: BBox) -> Self {
        Self { bounds }
    }

    /// Region truncated onto the integer pixel grid, matching what slicing
    /// `image[y_min as usize..y_max as usize, x_min as usize..x_max as usize]`
    /// keeps. Coordinates are expected to be non-negative (clamped).
    pub fn snapped(bounds: BBox) -> Self {
        Self {
            bounds: BBox {
                x_min: bounds.x_min.trunc(),
                y_min: bounds.y_min.trunc(),
                x_max: bounds.x_max.trunc(),
                y_max: bounds.y_max.trunc(),
            },
        }
    }

    pub fn bounds(&self) -> &BBox {
        &self.bounds
    }

    pub fn origin(&self) -> Point {
        Point::new(self.bounds.x_min, self.bounds.y_min)
    }

    /// Frame of the cropped image, in whole pixels.
    pub fn frame(&self) -> Result<ImageFrame> {
        let width = (self.bounds.x_max.floor() - self.bounds.x_min.ceil()).max(0.0);
        let height = (self.bounds.y_max.floor() - self.bounds.y_min.ceil()).max(0.0);
        ImageFrame::new(width as u32, height as u32)
            .map_err(|_| Error::InvalidGeometry(format!("empty crop region {:?}", self.bounds)))
    }

    /// Pixel rectangle `(x, y, width, height)` for image cropping.
    pub fn pixel_rect(&self) -> Result<(u32, u32, u32, u32)> {
        let frame = self.frame()?;
        Ok((
            self.bounds.x_min.ceil() as u32,
            self.bounds.y_min.ceil() as u32,
            frame.width(),
            frame.height(),
        ))
    }
}

/// A parent detection and the crop region derived from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParentRegion {
    /// Box as annotated, used for containment tests.
    pub original: BBox,
    /// Expanded and clamped region the child is translated into.
    pub region: CropRegion,
}

/// Outcome of assigning a child box to one of several parent regions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Assignment {
    /// Child lies inside `parents[parent].original`; `local` is in the
    /// coordinates of that parent's crop.
    Contained { parent: usize, local: BBox },
    /// No parent contains the child; the box is returned unchanged, still in
    /// source-image coordinates.
    Unassigned(BBox),
}

/// Assign `child` to the first parent whose original box fully contains it.
///
/// The child's edges keep their fractional position inside the original
/// parent box; that position is rescaled onto the expanded region and then
/// translated into the region's local frame. A zero-sized parent dimension
/// maps every fraction on that axis to 0.
pub fn assign_by_containment(child: &BBox, parents: &[ParentRegion]) -> Assignment {
    for (index, parent) in parents.iter().enumerate() {
        if !parent.original.contains(child) {
            continue;
        }
        let p = &parent.original;
        let r = parent.region.bounds();
        let fraction = |value: f64, start: f64, extent: f64| {
            if extent > 0.0 {
                (value - start) / extent
            } else {
                0.0
            }
        };
        let (pw, ph) = (p.width(), p.height());
        let (rw, rh) = (r.width(), r.height());

        let mapped = BBox {
            x_min: r.x_min + fraction(child.x_min, p.x_min, pw) * rw,
            y_min: r.y_min + fraction(child.y_min, p.y_min, ph) * rh,
            x_max: r.x_min + fraction(child.x_max, p.x_min, pw) * rw,
            y_max: r.y_min + fraction(child.y_max, p.y_min, ph) * rh,
        };
        return Assignment::Contained {
            parent: index,
            local: mapped.translate_into(&parent.region),
        };
    }
    Assignment::Unassigned(*child)
}
