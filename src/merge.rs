//! Merging of instances annotated as several disconnected polygons.
//!
//! Adjacent segments are bridged at their closest vertex pair and walked
//! forward and then backward so the result is one closed contour. The bridges
//! are thin two-way edges, good enough for area and mask computation.

use crate::error::{Error, Result};
use crate::geometry::Point;

/// Indices `(i, j)` of the closest pair `a[i]`, `b[j]` by squared distance.
///
/// Brute force over all pairs. Ties keep the first pair found scanning `a`
/// in order and, within it, `b` in order.
pub fn nearest_pair(a: &[Point], b: &[Point]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize, f64)> = None;
    for (i, p) in a.iter().enumerate() {
        for (j, q) in b.iter().enumerate() {
            let d = p.distance_squared(q);
            if best.map_or(true, |(_, _, bd)| d < bd) {
                best = Some((i, j, d));
            }
        }
    }
    best.map(|(i, j, _)| (i, j))
}

/// Merge an ordered group of segments into one closed contour.
///
/// The first and last segments are rotated to start at their bridge vertex
/// and closed by repeating it. Each interior segment is rotated to start at
/// its bridge to the previous segment (reversed first when that bridge comes
/// after the bridge to the next segment) and split at its bridge to the next
/// segment: the span up to that bridge is emitted on the forward walk, the
/// remainder on the way back.
///
/// Output order: first segment, interior forward spans, last segment,
/// interior return spans from the last interior segment down to the first.
/// A single segment is returned unchanged.
pub fn merge_segments(segments: &[Vec<Point>]) -> Result<Vec<Point>> {
    if segments.is_empty() {
        return Err(Error::InvalidGeometry(
            "cannot merge an empty segment group".to_string(),
        ));
    }
    if let Some((i, s)) = segments.iter().enumerate().find(|(_, s)| s.len() < 2) {
        return Err(Error::InvalidGeometry(format!(
            "segment {} has {} points, at least 2 required",
            i,
            s.len()
        )));
    }
    if segments.len() == 1 {
        return Ok(segments[0].clone());
    }

    // bridges[i] = (vertex joined to segment i-1, vertex joined to segment i+1)
    let mut bridges: Vec<(Option<usize>, Option<usize>)> = vec![(None, None); segments.len()];
    for i in 1..segments.len() {
        if let Some((prev, next)) = nearest_pair(&segments[i - 1], &segments[i]) {
            bridges[i - 1].1 = Some(prev);
            bridges[i].0 = Some(next);
        }
    }

    let mut forward = Vec::new();
    let mut returns: Vec<Vec<Point>> = Vec::new();

    for (i, segment) in segments.iter().enumerate() {
        match bridges[i] {
            (None, Some(start)) | (Some(start), None) => {
                let ring = closed_ring(segment, start);
                forward.extend_from_slice(&ring);
            }
            (Some(prev), Some(next)) => {
                let n = segment.len();
                let (ordered, prev, next) = if prev > next {
                    let reversed: Vec<Point> = segment.iter().rev().copied().collect();
                    (reversed, n - 1 - prev, n - 1 - next)
                } else {
                    (segment.clone(), prev, next)
                };
                let ring = closed_ring(&ordered, prev);
                let split = next - prev;
                forward.extend_from_slice(&ring[..=split]);
                returns.push(ring[split..].to_vec());
            }
            (None, None) => {
                return Err(Error::InvalidGeometry(format!(
                    "segment {} could not be bridged",
                    i
                )));
            }
        }
    }

    for span in returns.into_iter().rev() {
        forward.extend(span);
    }
    Ok(forward)
}

/// Merge segments given as flat `[x0, y0, x1, y1, ...]` lists.
pub fn merge_flat_segments(segments: &[Vec<f64>]) -> Result<Vec<f64>> {
    let polygons = segments
        .iter()
        .enumerate()
        .map(|(i, flat)| {
            if flat.len() % 2 != 0 {
                return Err(Error::InvalidGeometry(format!(
                    "segment {} has an odd number of coordinates ({})",
                    i,
                    flat.len()
                )));
            }
            Ok(flat
                .chunks_exact(2)
                .map(|xy| Point::new(xy[0], xy[1]))
                .collect::<Vec<_>>())
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(merge_segments(&polygons)?
        .into_iter()
        .flat_map(|p| [p.x, p.y])
        .collect())
}

/// `points` rotated to start at `start`, with that vertex repeated at the end.
fn closed_ring(points: &[Point], start: usize) -> Vec<Point> {
    let mut ring = Vec::with_capacity(points.len() + 1);
    ring.extend_from_slice(&points[start..]);
    ring.extend_from_slice(&points[..start]);
    ring.push(points[start]);
    ring
}
