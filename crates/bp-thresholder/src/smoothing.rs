//! Isotropic (per-axis) Gaussian smoothing of one probability channel
//! (`spec.md` §4.7 step 2), expressed as a separable convolution over an
//! `ndarray::Array3<f32>` laid out `(x, y, z)`.

use ndarray::Array3;

/// Builds a normalized discrete Gaussian kernel truncated at `3 * sigma`
/// (0 sigma collapses to the identity kernel `[1.0]`, i.e. no smoothing on
/// that axis — used for the degenerate `z` axis in 2-D volumes).
fn kernel_1d(sigma: f32) -> Vec<f32> {
    if sigma <= 0.0 {
        return vec![1.0];
    }
    let radius = (3.0 * sigma).ceil() as i64;
    let mut k: Vec<f32> = (-radius..=radius)
        .map(|i| {
            let x = i as f32;
            (-0.5 * (x * x) / (sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = k.iter().sum();
    for v in &mut k {
        *v /= sum;
    }
    k
}

fn convolve_axis(vol: &Array3<f32>, axis: usize, kernel: &[f32]) -> Array3<f32> {
    if kernel.len() == 1 {
        return vol.clone();
    }
    let radius = (kernel.len() / 2) as i64;
    let shape = vol.dim();
    let mut out = Array3::<f32>::zeros(shape);
    let len = [shape.0 as i64, shape.1 as i64, shape.2 as i64][axis];

    ndarray::Zip::indexed(&mut out).for_each(|(x, y, z), o| {
        let idx = [x as i64, y as i64, z as i64];
        let mut acc = 0.0f32;
        for (k_i, &k_v) in kernel.iter().enumerate() {
            let offset = k_i as i64 - radius;
            let mut sample = idx;
            let mut pos = idx[axis] + offset;
            pos = pos.clamp(0, len - 1); // edge-replicate, matches a border-aware blur
            sample[axis] = pos;
            acc += k_v * vol[[sample[0] as usize, sample[1] as usize, sample[2] as usize]];
        }
        *o = acc;
    });
    out
}

/// Separable Gaussian blur with one sigma per spatial axis `(x, y, z)`.
pub fn gaussian_smooth(vol: &Array3<f32>, sigmas: [f32; 3]) -> Array3<f32> {
    let kx = kernel_1d(sigmas[0]);
    let ky = kernel_1d(sigmas[1]);
    let kz = kernel_1d(sigmas[2]);
    let after_x = convolve_axis(vol, 0, &kx);
    let after_y = convolve_axis(&after_x, 1, &ky);
    convolve_axis(&after_y, 2, &kz)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sigma_is_a_no_op() {
        let vol = Array3::from_shape_fn((4, 4, 1), |(x, _, _)| x as f32);
        let smoothed = gaussian_smooth(&vol, [0.0, 0.0, 0.0]);
        assert_eq!(vol, smoothed);
    }

    #[test]
    fn smoothing_preserves_a_flat_field() {
        let vol = Array3::from_elem((8, 8, 1), 5.0f32);
        let smoothed = gaussian_smooth(&vol, [1.0, 1.0, 0.0]);
        for v in smoothed.iter() {
            assert!((v - 5.0).abs() < 1e-4);
        }
    }
}
