//! YOLO label lines.
//!
//! One line per object, `class cx cy w h` for boxes or `class x1 y1 x2 y2 ...`
//! for segments, all values relative to the image size and printed the way
//! C's `%g` prints them.

use std::fmt;

use crate::geometry::{ImageFrame, NormalizedBox, Point};

/// Boxes for one image, deduplicated, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YoloLabelSet {
    boxes: Vec<NormalizedBox>,
}

impl YoloLabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `b` unless an identical box is already present. Returns whether it
    /// was added.
    pub fn insert(&mut self, b: NormalizedBox) -> bool {
        if self.boxes.contains(&b) {
            return false;
        }
        self.boxes.push(b);
        true
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NormalizedBox> {
        self.boxes.iter()
    }

    /// All lines, each newline-terminated.
    pub fn to_lines(&self) -> String {
        let mut out = String::with_capacity(self.boxes.len() * 48);
        for b in &self.boxes {
            out.push_str(&b.to_string());
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for NormalizedBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.class_id,
            format_general(self.cx),
            format_general(self.cy),
            format_general(self.w),
            format_general(self.h)
        )
    }
}

/// A polygon outline in normalized coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct YoloSegment {
    pub class_id: u32,
    pub points: Vec<Point>,
}

impl YoloSegment {
    /// Normalize pixel `points` against `frame`.
    pub fn from_pixels(class_id: u32, points: &[Point], frame: ImageFrame) -> Self {
        let (w, h) = (frame.width() as f64, frame.height() as f64);
        Self {
            class_id,
            points: points.iter().map(|p| Point::new(p.x / w, p.y / h)).collect(),
        }
    }
}

impl fmt::Display for YoloSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class_id)?;
        for p in &self.points {
            write!(f, " {} {}", format_general(p.x), format_general(p.y))?;
        }
        Ok(())
    }
}

const SIGNIFICANT_DIGITS: i32 = 6;

/// Format like C `printf("%g")`: six significant digits, trailing zeros
/// removed, scientific notation for exponents below -4 or from 6 up.
pub fn format_general(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Round to the target precision first; the exponent may shift (9.999995 -> 1e+01).
    let sci = format!("{:.*e}", (SIGNIFICANT_DIGITS - 1) as usize, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exponent < -4 || exponent >= SIGNIFICANT_DIGITS {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.abs()
        )
    } else {
        let decimals = (SIGNIFICANT_DIGITS - 1 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
