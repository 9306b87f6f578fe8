//! Hann 窗移动平均平滑与中心差分梯度.

use super::FittedCurve;
use ndarray::ArrayView1;

/// Hann 窗权重. `len >= 2` 时两端为 0.
fn hann_window(len: usize) -> Vec<f64> {
    use std::f64::consts::PI;
    if len < 2 {
        return vec![1.0; len];
    }
    (0..len)
        .map(|j| 0.5 * (1.0 - (2.0 * PI * j as f64 / (len - 1) as f64).cos()))
        .collect()
}

/// 以 Hann 窗移动平均平滑 `y`, 再以中心差分 (间距 1) 求梯度.
///
/// 序列边缘使用截断并重新归一化的窗口; `window_length` 为偶数时加 1 取奇.
pub(crate) fn smooth_and_gradient(y: ArrayView1<f64>, window_length: usize) -> FittedCurve {
    let n = y.len();
    let values = if window_length < 3 || n < 3 {
        y.to_vec()
    } else {
        // 窗口长度取奇, 且不超过序列本身.
        let len = {
            let odd = window_length | 1;
            odd.min(if n % 2 == 1 { n } else { n - 1 })
        };
        let weights = hann_window(len);
        let half = len / 2;

        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let (mut acc, mut norm) = (0.0f64, 0.0f64);
            for (j, &wgt) in weights.iter().enumerate() {
                // 窗口中第 j 个权重对应序列位置 i + j - half.
                let Some(pos) = (i + j).checked_sub(half) else {
                    continue;
                };
                if pos >= n {
                    continue;
                }
                acc += wgt * y[pos];
                norm += wgt;
            }
            debug_assert!(norm > 0.0);
            out.push(acc / norm);
        }
        out
    };

    let derivs = gradient(&values);
    FittedCurve { values, derivs }
}

/// 中心差分梯度, 端点使用单侧差分 (间距 1).
fn gradient(y: &[f64]) -> Vec<f64> {
    let n = y.len();
    match n {
        0 => vec![],
        1 => vec![0.0],
        _ => {
            let mut g = Vec::with_capacity(n);
            g.push(y[1] - y[0]);
            for i in 1..(n - 1) {
                g.push((y[i + 1] - y[i - 1]) / 2.0);
            }
            g.push(y[n - 1] - y[n - 2]);
            g
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array1;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-8
    }

    /// 常数序列平滑后不变, 梯度为 0.
    #[test]
    fn test_constant_series() {
        let y = Array1::from_elem(20, 4.5);
        let curve = crate::fitting::hann_smooth_f64(y.view(), 7);
        assert!(curve.values.iter().all(|&v| f64_eq(v, 4.5)));
        assert!(curve.derivs.iter().all(|&d| f64_eq(d, 0.0)));
    }

    /// 不平滑时, 线性序列的梯度处处为斜率.
    #[test]
    fn test_linear_gradient() {
        let y = Array1::from_iter((0..10).map(|v| 2.0 * v as f64));
        let curve = crate::fitting::hann_smooth_f64(y.view(), 0);
        assert!(curve.derivs.iter().all(|&d| f64_eq(d, 2.0)));
    }

    /// 短序列不会因窗口过长而越界.
    #[test]
    fn test_short_series() {
        let y = Array1::from_vec(vec![1.0, 2.0, 3.0]);
        let curve = crate::fitting::hann_smooth_f64(y.view(), 51);
        assert_eq!(curve.values.len(), 3);
        assert_eq!(curve.derivs.len(), 3);
    }
}
