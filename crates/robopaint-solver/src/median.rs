//! Weighted geometric median of 4-D color points.
//!
//! Uses the Vardi-Zhang modification of Weiszfeld's iteration, which stays
//! well defined when the running estimate lands exactly on a sample. The
//! input order is part of the result's identity: callers pass points in a
//! fixed order (sorted histograms) so the same region always yields the same
//! estimate.

use crate::types::Color;

/// Hard cap on iterations. Weiszfeld converges linearly, so real inputs stop
/// far earlier; the cap only bounds pathological cases.
pub const MAX_ITERATIONS: usize = 1_000;

/// A weighted 4-D point.
pub type WeightedPoint = ([f64; 4], f64);

fn distance(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(p, q)| (p - q) * (p - q))
        .sum::<f64>()
        .sqrt()
}

fn weighted_mean(points: &[WeightedPoint]) -> Option<[f64; 4]> {
    let total: f64 = points.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return None;
    }
    let mut mean = [0.0; 4];
    for (p, w) in points {
        for (m, v) in mean.iter_mut().zip(p) {
            *m += v * w;
        }
    }
    Some(mean.map(|m| m / total))
}

/// Weighted geometric median of `points`, iterated until successive
/// estimates move less than `epsilon`.
///
/// Points with non-positive weight are ignored. Returns `None` when no point
/// carries weight.
#[must_use]
pub fn weighted_geometric_median(points: &[WeightedPoint], epsilon: f64) -> Option<[f64; 4]> {
    let points: Vec<WeightedPoint> = points.iter().copied().filter(|(_, w)| *w > 0.0).collect();
    let mut y = weighted_mean(&points)?;
    if points.len() == 1 {
        return Some(y);
    }

    for _ in 0..MAX_ITERATIONS {
        let mut coincident = 0.0;
        let mut inverse_sum = 0.0;
        let mut t = [0.0; 4];
        for (p, w) in &points {
            let d = distance(p, &y);
            if d == 0.0 {
                coincident += w;
                continue;
            }
            let inv = w / d;
            inverse_sum += inv;
            for (acc, v) in t.iter_mut().zip(p) {
                *acc += v * inv;
            }
        }

        // Every sample sits on the estimate.
        if inverse_sum == 0.0 {
            return Some(y);
        }
        let t = t.map(|v| v / inverse_sum);

        let next = if coincident == 0.0 {
            t
        } else {
            let r: [f64; 4] = std::array::from_fn(|i| (t[i] - y[i]) * inverse_sum);
            let norm = r.iter().map(|v| v * v).sum::<f64>().sqrt();
            let rinv = if norm == 0.0 { 0.0 } else { coincident / norm };
            let keep = (1.0 - rinv).max(0.0);
            let stay = rinv.min(1.0);
            std::array::from_fn(|i| keep * t[i] + stay * y[i])
        };

        if distance(&y, &next) < epsilon {
            return Some(next);
        }
        y = next;
    }
    Some(y)
}

/// Geometric median of a color histogram, rounded to the nearest color.
///
/// `histogram` pairs each distinct color with its pixel count; each color is
/// weighted by its count, which gives the same median as iterating over every
/// pixel. Returns `None` for an empty histogram.
#[must_use]
pub fn geometric_median(histogram: &[(Color, u64)], epsilon: f64) -> Option<Color> {
    #[allow(clippy::cast_precision_loss)]
    let points: Vec<WeightedPoint> = histogram
        .iter()
        .map(|&(color, count)| (color.to_f64(), count as f64))
        .collect();
    weighted_geometric_median(&points, epsilon).map(Color::from_rounded)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn empty_input_has_no_median() {
        assert_eq!(geometric_median(&[], 0.5), None);
        assert_eq!(weighted_geometric_median(&[([1.0; 4], 0.0)], 0.5), None);
    }

    #[test]
    fn repeated_color_returns_itself() {
        let c = Color::new(12, 200, 7, 255);
        assert_eq!(geometric_median(&[(c, 50)], 0.5), Some(c));
    }

    #[test]
    fn two_equal_colors_give_midpoint() {
        let hist = [(Color::new(0, 0, 0, 255), 3), (Color::new(100, 0, 0, 255), 3)];
        assert_eq!(geometric_median(&hist, 0.5), Some(Color::new(50, 0, 0, 255)));
    }

    #[test]
    fn majority_color_wins_over_outliers() {
        // Mean would be pulled far toward the outlier; the median stays put.
        let hist = [(Color::WHITE, 90), (Color::BLACK, 10)];
        let median = geometric_median(&hist, 0.01).unwrap();
        assert!(median.distance(Color::WHITE) < 2.0, "got {median}");
    }

    #[test]
    fn estimate_on_a_sample_does_not_divide_by_zero() {
        // Weighted mean lands exactly on the middle sample.
        let points = [
            ([0.0, 0.0, 0.0, 0.0], 1.0),
            ([10.0, 0.0, 0.0, 0.0], 1.0),
            ([20.0, 0.0, 0.0, 0.0], 1.0),
        ];
        let y = weighted_geometric_median(&points, 1e-6).unwrap();
        assert!(y.iter().all(|v| v.is_finite()));
        assert!((y[0] - 10.0).abs() < 1e-6);
    }

    #[test]
    fn deterministic_for_identical_input() {
        let hist = [
            (Color::new(3, 4, 5, 255), 7),
            (Color::new(200, 10, 90, 255), 2),
            (Color::new(30, 40, 50, 128), 5),
        ];
        assert_eq!(geometric_median(&hist, 0.5), geometric_median(&hist, 0.5));
    }

    proptest! {
        #[test]
        fn two_point_median_lies_on_segment(
            a in prop::array::uniform4(0u8..=255),
            b in prop::array::uniform4(0u8..=255),
        ) {
            let pa = Color(a).to_f64();
            let pb = Color(b).to_f64();
            let y = weighted_geometric_median(&[(pa, 1.0), (pb, 1.0)], 1e-3).unwrap();
            let total = distance(&pa, &pb);
            let via = distance(&pa, &y) + distance(&y, &pb);
            prop_assert!((via - total).abs() < 1e-6);
        }

        #[test]
        fn median_stays_inside_channel_bounds(
            colors in prop::collection::vec((prop::array::uniform4(0u8..=255), 1u64..20), 1..12),
        ) {
            let hist: Vec<(Color, u64)> = colors.into_iter().map(|(c, n)| (Color(c), n)).collect();
            let points: Vec<WeightedPoint> = hist
                .iter()
                .map(|&(c, n)| (c.to_f64(), n as f64))
                .collect();
            let y = weighted_geometric_median(&points, 0.5).unwrap();
            for (i, v) in y.iter().enumerate() {
                let lo = hist.iter().map(|(c, _)| f64::from(c.0[i])).fold(f64::INFINITY, f64::min);
                let hi = hist.iter().map(|(c, _)| f64::from(c.0[i])).fold(f64::NEG_INFINITY, f64::max);
                prop_assert!(*v >= lo - 1e-9 && *v <= hi + 1e-9);
            }
        }
    }
}
