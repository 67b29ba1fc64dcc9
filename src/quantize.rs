//! Color quantization by k-means clustering.
//!
//! Pixel colors are clustered with `kmeans_colors`, either directly in sRGB
//! or in CIE Lab. Each of the `restarts` runs is seeded with
//! `seed + run`, and the run with the lowest score wins, so identical
//! input always yields identical centers and labels.

use std::collections::HashMap;

use image::RgbImage;
use kmeans_colors::{Calculate, Kmeans, get_kmeans};
use palette::{FromColor, IntoColor, Lab, Srgb};

use crate::error::PatternError;
use crate::options::{ColorSpace, MAX_SUPPORTED_COLORS, PatternOptions};

/// Result of clustering N colors into k groups.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// k centroids as real-valued RGB in 0..=255 units. They may coincide,
    /// and may fall slightly outside the channel range.
    pub centers: Vec<[f32; 3]>,
    /// One cluster index per input color, each `< centers.len()`.
    pub labels: Vec<u8>,
    /// Inertia: sum of squared distances from each color to its assigned
    /// centroid, in the units of the clustering color space.
    pub score: f64,
}

/// Flatten `img` row-major and cluster its pixels.
///
/// # Errors
///
/// See [`cluster`].
pub fn quantize(img: &RgbImage, opts: &PatternOptions) -> Result<Clustering, PatternError> {
    let points: Vec<[u8; 3]> = img.pixels().map(|p| p.0).collect();
    cluster(&points, opts.num_colors, opts)
}

/// Partition `points` into exactly `k` clusters.
///
/// When the input has no more than `k` distinct colors the exact solution
/// is returned without running k-means: each distinct color becomes a
/// center in order of first appearance, and the remaining slots repeat
/// center 0.
///
/// # Errors
///
/// Returns [`PatternError::InvalidParameter`] if `k` is zero, larger than
/// the number of points, or larger than 256. Returns
/// [`PatternError::Processing`] if clustering produced non-finite values or
/// inconsistent labels.
pub fn cluster(
    points: &[[u8; 3]],
    k: usize,
    opts: &PatternOptions,
) -> Result<Clustering, PatternError> {
    if k == 0 {
        return Err(PatternError::InvalidParameter(
            "color count must be a positive integer".into(),
        ));
    }
    if k > points.len() {
        return Err(PatternError::InvalidParameter(format!(
            "color count {k} exceeds pixel count {}",
            points.len()
        )));
    }
    if k > MAX_SUPPORTED_COLORS {
        return Err(PatternError::InvalidParameter(format!(
            "color count {k} exceeds the maximum of {MAX_SUPPORTED_COLORS}"
        )));
    }

    if let Some(exact) = exact_clustering(points, k) {
        tracing::debug!(k, "Image has at most k distinct colors, skipping k-means");
        return Ok(exact);
    }

    let clustering = match opts.color_space {
        ColorSpace::Rgb => {
            let buf: Vec<Srgb> = points
                .iter()
                .map(|&[r, g, b]| Srgb::new(r, g, b).into_format())
                .collect();
            let (run, inertia, result) = best_of_restarts(&buf, k, opts);
            tracing::debug!(run, inertia, "Selected k-means run");
            to_clustering(result, inertia, |c| c)
        }
        ColorSpace::Lab => {
            let buf: Vec<Lab> = points
                .iter()
                .map(|&[r, g, b]| Srgb::new(r, g, b).into_format::<f32>().into_color())
                .collect();
            let (run, inertia, result) = best_of_restarts(&buf, k, opts);
            tracing::debug!(run, inertia, "Selected k-means run");
            to_clustering(result, inertia, |lab: Lab| Srgb::from_color(lab))
        }
    };

    check(&clustering, points.len(), k)?;
    Ok(clustering)
}

// ------------------------------------------------------------
// k-means driver
// ------------------------------------------------------------

/// Run k-means `opts.restarts` times and keep the lowest-inertia result.
/// Ties keep the earliest run.
fn best_of_restarts<C: Calculate + Clone>(
    buf: &[C],
    k: usize,
    opts: &PatternOptions,
) -> (u32, f64, Kmeans<C>) {
    let mut best: Option<(u32, f64, Kmeans<C>)> = None;
    for run in 0..opts.restarts {
        let seed = opts.seed.wrapping_add(u64::from(run));
        let result = get_kmeans(k, opts.max_iterations, opts.convergence, false, buf, seed);
        let inertia = sum_of_squares(buf, &result);
        tracing::trace!(run, seed, inertia, shift = result.score, "k-means run finished");

        let better = best.as_ref().is_none_or(|&(_, current, _)| {
            inertia < current || (!current.is_finite() && inertia.is_finite())
        });
        if better {
            best = Some((run, inertia, result));
        }
    }
    // restarts >= 1 is checked by PatternOptions::validate; fall back to a
    // single run if a caller skipped it.
    best.unwrap_or_else(|| {
        let result = get_kmeans(k, opts.max_iterations, opts.convergence, false, buf, opts.seed);
        (0, sum_of_squares(buf, &result), result)
    })
}

/// Within-cluster sum of squared distances. `Kmeans::score` only measures
/// the last centroid shift, so runs are ranked by this instead.
fn sum_of_squares<C: Calculate>(buf: &[C], result: &Kmeans<C>) -> f64 {
    if buf.len() != result.indices.len() {
        return f64::NAN;
    }
    buf.iter()
        .zip(&result.indices)
        .map(|(color, &label)| {
            result
                .centroids
                .get(usize::from(label))
                .map_or(f64::NAN, |centroid| f64::from(C::difference(color, centroid)))
        })
        .sum()
}

fn to_clustering<C: Calculate>(
    result: Kmeans<C>,
    inertia: f64,
    to_srgb: impl Fn(C) -> Srgb,
) -> Clustering {
    let centers = result
        .centroids
        .into_iter()
        .map(|c| {
            let rgb = to_srgb(c);
            [rgb.red * 255.0, rgb.green * 255.0, rgb.blue * 255.0]
        })
        .collect();
    Clustering {
        centers,
        labels: result.indices,
        score: inertia,
    }
}

fn check(clustering: &Clustering, n: usize, k: usize) -> Result<(), PatternError> {
    let fail = |detail: String| Err(PatternError::processing(detail));

    if clustering.centers.len() != k {
        return fail(format!(
            "expected {k} centers, clustering returned {}",
            clustering.centers.len()
        ));
    }
    if clustering.labels.len() != n {
        return fail(format!(
            "expected {n} labels, clustering returned {}",
            clustering.labels.len()
        ));
    }
    if let Some(i) = clustering
        .centers
        .iter()
        .position(|c| c.iter().any(|v| !v.is_finite()))
    {
        return fail(format!("center {i} is not finite: {:?}", clustering.centers[i]));
    }
    if !clustering.score.is_finite() {
        return fail(format!("clustering score is not finite: {}", clustering.score));
    }
    if let Some(label) = clustering.labels.iter().find(|&&l| usize::from(l) >= k) {
        return fail(format!("label {label} is out of range for {k} clusters"));
    }
    Ok(())
}

// ------------------------------------------------------------
// Exact solution for images with few colors
// ------------------------------------------------------------

fn exact_clustering(points: &[[u8; 3]], k: usize) -> Option<Clustering> {
    let mut slots: HashMap<[u8; 3], u8> = HashMap::with_capacity(k);
    let mut centers: Vec<[f32; 3]> = Vec::with_capacity(k);
    let mut labels = Vec::with_capacity(points.len());

    for &color in points {
        let label = match slots.get(&color) {
            Some(&label) => label,
            None => {
                if centers.len() == k {
                    return None;
                }
                let label = u8::try_from(centers.len()).ok()?;
                slots.insert(color, label);
                centers.push(color.map(f32::from));
                label
            }
        };
        labels.push(label);
    }

    let first = *centers.first()?;
    centers.resize(k, first);
    Some(Clustering {
        centers,
        labels,
        score: 0.0,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn opts(k: usize) -> PatternOptions {
        PatternOptions {
            num_colors: k,
            ..PatternOptions::default()
        }
    }

    /// Three well separated color blobs with a little noise.
    fn three_blobs() -> Vec<[u8; 3]> {
        let bases = [[220u8, 30, 30], [30, 200, 40], [20, 40, 210]];
        (0..90u8)
            .map(|i| {
                let [r, g, b] = bases[usize::from(i % 3)];
                let d = i % 7;
                [r.saturating_add(d), g.saturating_sub(d), b.saturating_add(d / 2)]
            })
            .collect()
    }

    /// Pseudo-random colors spread over the whole cube, so k-means has
    /// several local minima and restarts land in different ones.
    fn scattered(n: usize) -> Vec<[u8; 3]> {
        let mut state: u32 = 0x2545_f491;
        let mut next = move || {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        };
        (0..n).map(|_| [next(), next(), next()]).collect()
    }

    #[test]
    fn zero_clusters_is_invalid_parameter() {
        let err = cluster(&[[0, 0, 0]], 0, &opts(0)).unwrap_err();
        assert!(matches!(err, PatternError::InvalidParameter(_)));
    }

    #[test]
    fn more_clusters_than_points_is_invalid_parameter() {
        let err = cluster(&[[0, 0, 0], [1, 1, 1]], 3, &opts(3)).unwrap_err();
        assert!(err.to_string().contains("exceeds pixel count"));
    }

    #[test]
    fn single_color_yields_exact_center() {
        let points = vec![[255, 0, 0]; 50];
        let c = cluster(&points, 1, &opts(1)).unwrap();
        assert_eq!(c.centers, vec![[255.0, 0.0, 0.0]]);
        assert!(c.labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn surplus_clusters_repeat_first_center() {
        let points = vec![[1, 2, 3], [4, 5, 6], [1, 2, 3], [4, 5, 6]];
        let c = cluster(&points, 3, &opts(3)).unwrap();
        assert_eq!(
            c.centers,
            vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [1.0, 2.0, 3.0]]
        );
        assert_eq!(c.labels, vec![0, 1, 0, 1]);
    }

    #[test]
    fn kmeans_separates_blobs() {
        let points = three_blobs();
        let c = cluster(&points, 3, &opts(3)).unwrap();
        assert_eq!(c.centers.len(), 3);
        assert_eq!(c.labels.len(), points.len());

        // Points from the same base color share a label, different bases differ.
        for base in 0..3 {
            let label = c.labels[base];
            for i in (base..points.len()).step_by(3) {
                assert_eq!(c.labels[i], label, "point {i}");
            }
        }
        assert_ne!(c.labels[0], c.labels[1]);
        assert_ne!(c.labels[1], c.labels[2]);
        assert_ne!(c.labels[0], c.labels[2]);

        // Centers sit near the base colors.
        let red = c.centers[usize::from(c.labels[0])];
        assert!((red[0] - 223.0).abs() < 5.0, "{red:?}");
    }

    #[test]
    fn kmeans_is_deterministic() {
        let points = three_blobs();
        let a = cluster(&points, 4, &opts(4)).unwrap();
        let b = cluster(&points, 4, &opts(4)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn restarts_keep_lowest_inertia_run() {
        let points = scattered(400);
        for k in [3, 8, 12] {
            let base = opts(k);
            let chosen = cluster(&points, k, &base).unwrap();

            let singles: Vec<f64> = (0..base.restarts)
                .map(|run| {
                    let single = PatternOptions {
                        seed: base.seed + u64::from(run),
                        restarts: 1,
                        ..base.clone()
                    };
                    cluster(&points, k, &single).unwrap().score
                })
                .collect();
            let lowest = singles.iter().copied().fold(f64::INFINITY, f64::min);

            assert!(
                chosen.score <= lowest,
                "k={k}: chosen inertia {} above best run {lowest}",
                chosen.score
            );
            assert!(singles.contains(&chosen.score), "k={k}");
        }
    }

    #[test]
    fn score_is_within_cluster_sum_of_squares() {
        let points = scattered(300);
        let c = cluster(&points, 5, &opts(5)).unwrap();

        // Srgb clustering works on channels scaled to 0..1.
        let recomputed: f64 = points
            .iter()
            .zip(&c.labels)
            .map(|(p, &l)| {
                let center = c.centers[usize::from(l)];
                (0..3)
                    .map(|i| {
                        let d = (f64::from(p[i]) - f64::from(center[i])) / 255.0;
                        d * d
                    })
                    .sum::<f64>()
            })
            .sum();
        assert!(
            (recomputed - c.score).abs() <= 1e-3 * recomputed.max(1.0),
            "recomputed {recomputed}, reported {}",
            c.score
        );
    }

    #[test]
    fn lab_space_clusters_too() {
        let points = three_blobs();
        let options = PatternOptions {
            color_space: ColorSpace::Lab,
            ..opts(3)
        };
        let c = cluster(&points, 3, &options).unwrap();
        assert_eq!(c.centers.len(), 3);
        assert!(c.labels.iter().all(|&l| l < 3));
        assert_ne!(c.labels[0], c.labels[1]);
    }

    #[test]
    fn quantize_flattens_row_major() {
        let img = RgbImage::from_fn(2, 2, |x, y| {
            if y == 0 && x == 1 { image::Rgb([9, 9, 9]) } else { image::Rgb([0, 0, 0]) }
        });
        let c = quantize(&img, &opts(2)).unwrap();
        assert_eq!(c.labels, vec![0, 1, 0, 0]);
    }

    #[test]
    fn check_rejects_non_finite_centers() {
        let bad = Clustering {
            centers: vec![[f32::NAN, 0.0, 0.0]],
            labels: vec![0],
            score: 0.0,
        };
        let err = check(&bad, 1, 1).unwrap_err();
        assert!(matches!(err, PatternError::Processing(_)));
    }

    #[test]
    fn check_rejects_out_of_range_labels() {
        let bad = Clustering {
            centers: vec![[0.0; 3], [1.0; 3]],
            labels: vec![0, 2],
            score: 0.0,
        };
        assert!(matches!(check(&bad, 2, 2), Err(PatternError::Processing(_))));
    }
}
