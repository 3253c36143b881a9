use std::f64::consts::PI;

/// Mean Earth radius used for the smoothing kernel [km].
const EARTH_RADIUS_KM: f64 = 6371.0;
const CUTOFF: f64 = 1e-10;

/// Degree weights of a Gaussian averaging kernel with half-width `radius_km`.
///
/// Follows the Jekeli (1981) recursion as given by Wahr et al. (1998),
/// normalized so that `w[0] == 1`. Weights are set to zero from the first
/// degree that drops below the cutoff. A non-positive radius disables
/// smoothing and returns all ones.
pub fn gauss_weights(radius_km: f64, lmax: usize) -> Vec<f64> {
    let mut weights = vec![0.0; lmax + 1];
    if radius_km <= 0.0 {
        weights.fill(1.0);
        return weights;
    }

    let b = 2.0_f64.ln() / (1.0 - (radius_km / EARTH_RADIUS_KM).cos());
    weights[0] = 1.0 / (2.0 * PI);
    if lmax >= 1 {
        let decay = (-2.0 * b).exp();
        weights[1] = weights[0] * ((1.0 + decay) / (1.0 - decay) - 1.0 / b);
    }
    let mut last = if weights.len() > 1 && weights[1] * 2.0 * PI < CUTOFF {
        1
    } else {
        lmax + 1
    };
    for l in 2..=lmax {
        if last <= l {
            break;
        }
        let value = (1.0 - 2.0 * l as f64) / b * weights[l - 1] + weights[l - 2];
        if value * 2.0 * PI < CUTOFF {
            last = l;
            break;
        }
        weights[l] = value;
    }
    for (l, weight) in weights.iter_mut().enumerate() {
        *weight = if l < last { *weight * 2.0 * PI } else { 0.0 };
    }
    weights
}
