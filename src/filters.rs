//! Raster smoothing used before thresholding the flag tests.
use std::collections::VecDeque;

use ndarray::{Array2, Axis};

/// Replaces every NaN with the value of the nearest valid pixel, distance
/// counted in 8-connected steps. A raster without any valid pixel is returned
/// unchanged.
pub fn fill_nan(data: &Array2<f32>) -> Array2<f32> {
    let (rows, cols) = data.dim();
    let mut filled = data.clone();
    let mut visited = data.mapv(|v| !v.is_nan());
    let mut queue: VecDeque<(usize, usize)> = data
        .indexed_iter()
        .filter(|(_, v)| !v.is_nan())
        .map(|(idx, _)| idx)
        .collect();

    if queue.is_empty() {
        return filled;
    }

    // Breadth-first from all valid pixels at once
    while let Some((r, c)) = queue.pop_front() {
        let value = filled[(r, c)];
        for dr in -1isize..=1 {
            for dc in -1isize..=1 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let nr = r as isize + dr;
                let nc = c as isize + dc;
                if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                    continue;
                }
                let idx = (nr as usize, nc as usize);
                if !visited[idx] {
                    visited[idx] = true;
                    filled[idx] = value;
                    queue.push_back(idx);
                }
            }
        }
    }

    filled
}

/// Normalised 1-D Gaussian kernel truncated at 4 sigma.
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (4.0 * sigma + 0.5) as usize;
    let weights: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-0.5 * (x / sigma).powi(2)).exp()
        })
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Mirrors an out-of-range index back into `0..len`, edge pixel repeated
/// (`d c b a | a b c d | d c b a`).
fn reflect_index(index: isize, len: usize) -> usize {
    let period = 2 * len as isize;
    let i = index.rem_euclid(period);
    if i < len as isize {
        i as usize
    } else {
        (period - 1 - i) as usize
    }
}

fn convolve_axis(data: &Array2<f64>, kernel: &[f64], axis: Axis) -> Array2<f64> {
    let radius = (kernel.len() / 2) as isize;
    let mut out = Array2::zeros(data.dim());

    for (lane_in, mut lane_out) in data.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        let len = lane_in.len();
        for i in 0..len {
            lane_out[i] = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * lane_in[reflect_index(i as isize + k as isize - radius, len)])
                .sum();
        }
    }

    out
}

/// Separable Gaussian blur with reflective boundaries, computed in f64.
pub fn gaussian_filter(data: &Array2<f32>, sigma: f64) -> Array2<f32> {
    if data.is_empty() {
        return data.clone();
    }

    let kernel = gaussian_kernel(sigma);
    let data = data.mapv(f64::from);
    let rows_done = convolve_axis(&data, &kernel, Axis(0));
    convolve_axis(&rows_done, &kernel, Axis(1)).mapv(|v| v as f32)
}

/// NaN fill followed by the Gaussian blur.
pub fn smooth(data: &Array2<f32>, sigma: f64) -> Array2<f32> {
    gaussian_filter(&fill_nan(data), sigma)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_fill_nan_uses_nearest_valid() {
        let data = array![
            [1.0, f32::NAN, f32::NAN, f32::NAN],
            [f32::NAN, f32::NAN, f32::NAN, 5.0],
        ];
        let filled = fill_nan(&data);

        assert_eq!(filled[(0, 0)], 1.0);
        assert_eq!(filled[(0, 1)], 1.0);
        assert_eq!(filled[(1, 1)], 1.0);
        assert_eq!(filled[(0, 3)], 5.0);
        assert_eq!(filled[(1, 2)], 5.0);
        assert!(filled.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_fill_nan_all_invalid() {
        let data = Array2::from_elem((2, 2), f32::NAN);
        assert!(fill_nan(&data).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_kernel() {
        let kernel = gaussian_kernel(1.0);
        assert_eq!(kernel.len(), 9);
        assert_relative_eq!(kernel.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(kernel[0], kernel[8]);
        assert!(kernel[4] > kernel[3]);
    }

    #[test]
    fn test_reflect_index() {
        assert_eq!(reflect_index(-1, 4), 0);
        assert_eq!(reflect_index(-2, 4), 1);
        assert_eq!(reflect_index(4, 4), 3);
        assert_eq!(reflect_index(5, 4), 2);
        assert_eq!(reflect_index(2, 4), 2);
        assert_eq!(reflect_index(-5, 4), 3);
    }

    #[test]
    fn test_constant_raster_is_unchanged() {
        let data = Array2::from_elem((5, 7), 0.25f32);
        let smoothed = gaussian_filter(&data, 3.0);
        for v in smoothed.iter() {
            assert_relative_eq!(*v, 0.25, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_blur_preserves_mass_and_spreads_peak() {
        let mut data = Array2::zeros((21, 21));
        data[(10, 10)] = 1.0f32;
        let smoothed = gaussian_filter(&data, 1.0);

        assert_relative_eq!(smoothed.sum(), 1.0, epsilon = 1e-5);
        assert!(smoothed[(10, 10)] < 1.0);
        assert!(smoothed[(10, 11)] > 0.0);
        assert_relative_eq!(smoothed[(9, 10)], smoothed[(11, 10)], epsilon = 1e-7);
    }
}
