//! Moving-average smoothing and down-sampling of extracted paths.
//!
//! Raw shortest paths follow the pixel grid and therefore zig-zag. Before
//! a candidate segment is shown it is smoothed with a uniform kernel and
//! only every n-th smoothed point is kept. The two endpoints are never
//! moved so consecutive segments stay connected.

use crate::types::Point;

/// Smooth `points` with a `2 * half_range + 1` box kernel and keep every
/// `subsample`-th point.
///
/// The path is padded with `half_range` copies of its first and last
/// point. The output always starts with the first and ends with the last
/// input point. A `subsample` of zero is treated as one.
///
/// # Examples
///
/// ```
/// use wiretrace_core::Point;
/// use wiretrace_core::smoothing::smooth_and_subsample;
///
/// let path: Vec<Point> = (0..=10).map(|x| Point::new(x, 0)).collect();
/// let result = smooth_and_subsample(&path, 1, 5);
/// assert_eq!(result, vec![Point::new(0, 0), Point::new(5, 0), Point::new(10, 0)]);
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn smooth_and_subsample(points: &[Point], half_range: usize, subsample: usize) -> Vec<Point> {
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return Vec::new();
    };
    let h = half_range;
    let step = subsample.max(1);

    let mut padded = Vec::with_capacity(points.len() + 2 * h);
    padded.extend(std::iter::repeat_n(first, h));
    padded.extend_from_slice(points);
    padded.extend(std::iter::repeat_n(last, h));

    let end = points.len() - 1 + h;
    let weight = (2 * h + 1) as f64;
    let mut result = vec![first];
    let mut pos = h + step;
    while pos < end {
        let (sx, sy) = padded[pos - h..=pos + h]
            .iter()
            .fold((0_i64, 0_i64), |(sx, sy), p| {
                (sx + i64::from(p.x), sy + i64::from(p.y))
            });
        result.push(Point::new(
            (sx as f64 / weight + 0.5).floor() as i32,
            (sy as f64 / weight + 0.5).floor() as i32,
        ));
        pos += step;
    }
    result.push(last);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: i32) -> Vec<Point> {
        (0..n).map(|x| Point::new(x, 0)).collect()
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(smooth_and_subsample(&[], 5, 5).is_empty());
    }

    #[test]
    fn single_point_is_duplicated() {
        let p = Point::new(3, 4);
        assert_eq!(smooth_and_subsample(&[p], 2, 2), vec![p, p]);
    }

    #[test]
    fn endpoints_are_preserved() {
        let path: Vec<Point> = (0..40).map(|i| Point::new(i, (i * 7) % 5)).collect();
        for (h, s) in [(0, 1), (3, 2), (5, 5), (10, 10)] {
            let out = smooth_and_subsample(&path, h, s);
            assert_eq!(out.first(), path.first());
            assert_eq!(out.last(), path.last());
        }
    }

    #[test]
    fn identity_without_smoothing_or_subsampling() {
        let path: Vec<Point> = (0..6).map(|i| Point::new(i, i * i)).collect();
        assert_eq!(smooth_and_subsample(&path, 0, 1), path);
    }

    #[test]
    fn output_length_follows_subsample_factor() {
        // Interior positions h+s, h+2s, ... below n-1+h.
        let path = line(21);
        assert_eq!(smooth_and_subsample(&path, 2, 5).len(), 2 + 3);
        assert_eq!(smooth_and_subsample(&path, 2, 1).len(), 2 + 19);
        assert_eq!(smooth_and_subsample(&path, 2, 30).len(), 2);
    }

    #[test]
    fn corner_is_rounded() {
        let mut path: Vec<Point> = (0..=4).map(|x| Point::new(x, 0)).collect();
        path.extend((1..=4).map(|y| Point::new(4, y)));
        let out = smooth_and_subsample(&path, 1, 4);
        // Sample at the corner averages (3,0), (4,0), (4,1).
        assert_eq!(out, vec![Point::new(0, 0), Point::new(4, 0), Point::new(4, 4)]);
    }

    #[test]
    fn padding_pulls_samples_towards_endpoints() {
        // Padded: [0,0,0, 0,1,2,3, 3,3,3]; pos 4 averages 9/7, pos 5 averages 12/7.
        let path = line(4);
        assert_eq!(
            smooth_and_subsample(&path, 3, 0),
            vec![
                Point::new(0, 0),
                Point::new(1, 0),
                Point::new(2, 0),
                Point::new(3, 0)
            ]
        );
    }
}
