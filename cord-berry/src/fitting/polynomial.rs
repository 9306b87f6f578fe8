//! 多项式曲线.

use super::{FitError, FitResult, FittedCurve};
use ndarray::{Array1, Array2, ArrayView1};
use ndarray_linalg::Inverse;

/// 以升幂序存储系数的多项式.
struct Polynomial<T: num::Float>(Array1<T>);

impl Polynomial<f64> {
    /// Horner 法求值.
    pub fn eval(&self, x: f64) -> f64 {
        self.0.iter().rev().fold(0.0, |acc, &cur| acc * x + cur)
    }

    /// Horner 法求一阶导数值.
    pub fn eval_deriv(&self, x: f64) -> f64 {
        let mut acc = 0.0;
        for pow in (1..self.0.len()).rev() {
            acc = acc * x + pow as f64 * self.0[pow];
        }
        acc
    }
}

pub(crate) struct PolyImp<'a> {
    x: ArrayView1<'a, f64>,
    y: ArrayView1<'a, f64>,
    degree: u32,

    /// 自变量的均值. 拟合在 `x - x_mean` 上进行以改善数值条件;
    /// 一阶导数不受平移影响.
    x_mean: f64,
}

impl<'a> PolyImp<'a> {
    /// `degree` 是多项式次数 (>= 1). 采样点不足时返回 `Err`.
    pub fn new(x: ArrayView1<'a, f64>, y: ArrayView1<'a, f64>, degree: u32) -> FitResult<Self> {
        assert_eq!(x.len(), y.len(), "x 值和 y 值必须一一对应");
        assert_ne!(degree, 0, "拟合曲线的次数不能为 0");
        assert!(
            x.windows(2).into_iter().all(|v| v[0] < v[1]),
            "x 值必须严格递增"
        );

        let need = degree + 1;
        if (x.len() as u32) < need {
            return Err(FitError::TooFewSamples(x.len() as u32, need));
        }

        let x_mean = x.sum() / x.len() as f64;
        Ok(Self { x, y, degree, x_mean })
    }

    pub fn make_curve(&self) -> FitResult<FittedCurve> {
        let v_mat = self.vandermonde();
        let v_mat_t = v_mat.t();

        let theta = v_mat
            .t()
            .dot(&v_mat)
            .inv()
            .map_err(|_| FitError::SingularSystem)?
            .dot(&v_mat_t)
            .dot(&self.y);

        debug_assert_eq!(theta.len(), (self.degree + 1) as usize);

        let poly = Polynomial(theta);
        let mut values = Vec::with_capacity(self.x.len());
        let mut derivs = Vec::with_capacity(self.x.len());
        for &input in self.x.iter() {
            let xc = input - self.x_mean;
            values.push(poly.eval(xc));
            derivs.push(poly.eval_deriv(xc));
        }

        Ok(FittedCurve { values, derivs })
    }

    fn vandermonde(&self) -> Array2<f64> {
        // shape: (m, n); m = x.len(), n = self.degree + 1
        Array2::<f64>::from_shape_fn((self.x.len(), self.degree as usize + 1), |(m, n)| {
            (self.x[m] - self.x_mean).powi(n as i32)
        })
    }
}
