//! 三次样条曲线 (自然边界条件).

use super::{FitError, FitResult, FittedCurve};
use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use ndarray_linalg::Solve;

pub(crate) struct CubicSplineImp<'a> {
    x: ArrayView1<'a, f64>,
    y: ArrayView1<'a, f64>,
}

impl<'a> CubicSplineImp<'a> {
    /// 采样点不足 3 个时返回 `Err`.
    pub fn new(x: ArrayView1<'a, f64>, y: ArrayView1<'a, f64>) -> FitResult<Self> {
        assert_eq!(x.len(), y.len(), "x 值和 y 值必须一一对应");
        assert!(
            x.windows(2).into_iter().all(|v| v[0] < v[1]),
            "x 值必须严格递增"
        );
        if x.len() < 3 {
            return Err(FitError::TooFewSamples(x.len() as u32, 3));
        }
        Ok(Self { x, y })
    }

    /// 样条严格插值所有节点, 因此曲线值就是 `y` 本身;
    /// 导数从每段的三次多项式系数解析求得.
    pub fn make_curve(&self) -> FitResult<FittedCurve> {
        let len = self.x.len();
        let coe = self.spline_coefficient()?;

        let mut derivs = Vec::with_capacity(len);
        // 节点 i (i < len - 1) 处的导数来自其右侧区间段的左端点.
        for i in 0..(len - 1) {
            derivs.push(coe[(i, 0)]);
        }
        // 最后一个节点处的导数来自最后一个区间段的右端点.
        let last = len - 2;
        let dx = self.x[len - 1] - self.x[last];
        derivs.push(coe[(last, 0)] + 2.0 * coe[(last, 1)] * dx + 3.0 * coe[(last, 2)] * dx * dx);

        Ok(FittedCurve {
            values: self.y.to_vec(),
            derivs,
        })
    }

    fn array1_diff(arr: ArrayView1<f64>) -> Array1<f64> {
        let vector: Vec<f64> = arr.windows(2).into_iter().map(|v| v[1] - v[0]).collect();
        Array1::from_vec(vector)
    }

    /// 每个区间段 `[x_i, x_{i+1})` 上,
    /// `s(x) = y_i + c0 * dx + c1 * dx^2 + c2 * dx^3` (`dx = x - x_i`).
    /// 返回形状为 `(len - 1, 3)` 的系数矩阵, 每行为 `(c0, c1, c2)`.
    fn spline_coefficient(&self) -> FitResult<Array2<f64>> {
        let len = self.x.len();
        let mut a = Array2::<f64>::zeros((len, len));
        let mut r = Array1::<f64>::zeros(len);
        let dx = Self::array1_diff(self.x);
        let dy = Self::array1_diff(self.y);
        for i in 1..(len - 1) {
            let mut a_slice = a.slice_mut(s!(i, (i - 1)..=(i + 1)));
            a_slice.assign(&ArrayView1::from(&[
                dx[i - 1],
                2.0 * (dx[i - 1] + dx[i]),
                dx[i],
            ]));
            r[i] = 3.0 * (dy[i] / dx[i] - dy[i - 1] / dx[i - 1]);
        }
        *a.first_mut().unwrap() = 1.0;
        *a.last_mut().unwrap() = 1.0;

        let mut coe: Array2<f64> = Array2::zeros((len, 3));

        let c = a.solve(&r).map_err(|_| FitError::SingularSystem)?;
        coe.slice_mut(s!(.., 1)).assign(&c);

        for i in 0..(len - 1) {
            coe[(i, 2)] = (coe[(i + 1, 1)] - coe[(i, 1)]) / (3.0 * dx[i]);
            coe[(i, 0)] = dy[i] / dx[i] - dx[i] * (2.0 * coe[(i, 1)] + coe[(i + 1, 1)]) / 3.0;
        }
        coe.remove_index(Axis(0), coe.len_of(Axis(0)) - 1);
        Ok(coe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-8
    }

    /// 样条必须严格插值节点.
    #[test]
    fn test_interpolates_knots() {
        let x = Array1::from_vec(vec![0.0, 1.0, 2.5, 4.0, 5.0]);
        let y = Array1::from_vec(vec![1.0, -2.0, 0.5, 3.0, 3.0]);
        let curve = super::super::cubic_spline_f64(x.view(), y.view()).unwrap();
        for (v, expect) in curve.values.iter().zip(y.iter()) {
            assert!(f64_eq(*v, *expect));
        }
        assert_eq!(curve.derivs.len(), y.len());
    }

    /// 直线数据: 样条退化为直线, 导数处处为斜率.
    #[test]
    fn test_linear_data() {
        let x = Array1::from_iter((0..8).map(|v| v as f64));
        let y = x.mapv(|v| 3.0 * v - 1.0);
        let curve = super::super::cubic_spline_f64(x.view(), y.view()).unwrap();
        for d in curve.derivs {
            assert!(f64_eq(d, 3.0));
        }
    }

    #[test]
    fn test_too_few_samples() {
        let x = Array1::from_vec(vec![0.0, 1.0]);
        let y = Array1::from_vec(vec![0.0, 0.0]);
        let err = super::super::cubic_spline_f64(x.view(), y.view()).unwrap_err();
        assert_eq!(err, FitError::TooFewSamples(2, 3));
    }
}
