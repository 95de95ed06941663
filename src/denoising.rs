//! Total variation denoising
//!
//! Solves, for an input series `y` and a regularization parameter `lambda`:
//!
//! min_x ½ Σ (y_i - x_i)² + lambda Σ |x_i+1 - x_i|
//!
//! The solution is piecewise constant: noise is suppressed while
//! discontinuities (cycle slips) are preserved. Exact, linear time
//! direct algorithm (L. Condat, "A Direct Algorithm for 1D Total Variation
//! Denoising", IEEE Signal Processing Letters, 2013).

/// Denoises `input` with regularization parameter `lambda`.
/// Returns a series of identical length.
pub fn total_variation_denoising(input: &[f64], lambda: f64) -> Vec<f64> {
    let width = input.len();
    let mut output = vec![0.0_f64; width];

    if width == 0 {
        return output;
    }

    if lambda <= 0.0 {
        output.copy_from_slice(input);
        return output;
    }

    let (mut k, mut k0) = (0_usize, 0_usize);
    let (mut kplus, mut kminus) = (0_usize, 0_usize);

    let two_lambda = 2.0 * lambda;
    let min_lambda = -lambda;

    let (mut umin, mut umax) = (lambda, min_lambda);
    let (mut vmin, mut vmax) = (input[0] - lambda, input[0] + lambda);

    loop {
        while k == width - 1 {
            if umin < 0.0 {
                // negative jump necessary
                loop {
                    output[k0] = vmin;
                    k0 += 1;
                    if k0 > kminus {
                        break;
                    }
                }
                k = k0;
                kminus = k0;
                vmin = input[k0];
                umin = lambda;
                umax = vmin + umin - vmax;
            } else if umax > 0.0 {
                // positive jump necessary
                loop {
                    output[k0] = vmax;
                    k0 += 1;
                    if k0 > kplus {
                        break;
                    }
                }
                k = k0;
                kplus = k0;
                vmax = input[k0];
                umax = min_lambda;
                umin = vmax + umax - vmin;
            } else {
                vmin += umin / (k - k0 + 1) as f64;
                loop {
                    output[k0] = vmin;
                    k0 += 1;
                    if k0 > k {
                        break;
                    }
                }
                return output;
            }
        }

        umin += input[k + 1] - vmin;
        if umin < min_lambda {
            // negative jump necessary
            loop {
                output[k0] = vmin;
                k0 += 1;
                if k0 > kminus {
                    break;
                }
            }
            k = k0;
            kplus = k0;
            kminus = k0;
            vmin = input[k0];
            vmax = vmin + two_lambda;
            umin = lambda;
            umax = min_lambda;
            continue;
        }

        umax += input[k + 1] - vmax;
        if umax > lambda {
            // positive jump necessary
            loop {
                output[k0] = vmax;
                k0 += 1;
                if k0 > kplus {
                    break;
                }
            }
            k = k0;
            kplus = k0;
            kminus = k0;
            vmax = input[k0];
            vmin = vmax - two_lambda;
            umin = lambda;
            umax = min_lambda;
            continue;
        }

        // no jump necessary, we continue
        k += 1;
        if umin >= lambda {
            // update of vmin
            kminus = k;
            vmin += (umin - lambda) / (kminus - k0 + 1) as f64;
            umin = lambda;
        }
        if umax <= min_lambda {
            // update of vmax
            kplus = k;
            vmax += (umax + lambda) / (kplus - k0 + 1) as f64;
            umax = min_lambda;
        }
    }
}
