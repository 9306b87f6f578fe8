//! 曲线拟合.
//!
//! 给定一系列点 `(x, y)`, 该模块可以拟合出一条曲线,
//! 并在原采样位置上给出曲线值与一阶导数.

use ndarray::ArrayView1;

mod cubic_spline;
mod hanning;
mod polynomial;

/// 拟合运行时错误.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FitError {
    /// 采样点不足以做实际拟合工作.
    ///
    /// 第一个参数代表目前已有的点, 第二个参数代表实际拟合需要的最少点数.
    TooFewSamples(u32, u32),

    /// 拟合所需的线性方程组奇异, 无法求解.
    SingularSystem,
}

/// 拟合运行时结果.
pub type FitResult<T> = Result<T, FitError>;

/// 拟合结果: 在输入采样位置上的曲线值与一阶导数.
///
/// 两个数组与输入点一一对应, 长度一致.
#[derive(Debug, Clone)]
pub struct FittedCurve {
    /// 曲线值.
    pub values: Vec<f64>,

    /// 一阶导数值.
    pub derivs: Vec<f64>,
}

/// 曲线类型.
#[derive(Copy, Clone, Debug)]
pub enum CurveType {
    /// 多项式.
    Polynomial {
        /// 多项式的次数.
        degree: u32,
    },

    /// 三次样条曲线.
    CubicSpline,

    /// Hann 窗移动平均平滑 + 中心差分求导.
    Hanning {
        /// 窗口长度 (单位: 采样点个数).
        window_length: usize,
    },
}

/// 基于最小二乘法拟合 n 次多项式曲线, 并在每个 `x` 位置求值与求导.
///
/// `x` 是严格递增的自变量数组, `y` 是对应函数值, `degree` 是多项式次数
/// (最小为 1). 需要至少 `degree + 1` 个采样点.
pub fn polynomial_f64<'a>(x: ArrayView1<'a, f64>, y: ArrayView1<'a, f64>, degree: u32) -> FitResult<FittedCurve> {
    polynomial::PolyImp::new(x, y, degree)?.make_curve()
}

/// 以自然边界条件拟合三次样条曲线, 并在每个节点位置求值与求导.
///
/// `x` 是严格递增的自变量数组, `y` 是对应函数值. 需要至少 3 个采样点.
/// 样条严格插值所有节点.
pub fn cubic_spline_f64<'a>(x: ArrayView1<'a, f64>, y: ArrayView1<'a, f64>) -> FitResult<FittedCurve> {
    cubic_spline::CubicSplineImp::new(x, y)?.make_curve()
}

/// 以 Hann 窗移动平均平滑等距序列 `y`, 并以中心差分求导.
///
/// `window_length` 为窗口长度 (采样点个数); 小于 3 时不做平滑.
/// 序列边缘使用截断并重新归一化的窗口.
pub fn hann_smooth_f64(y: ArrayView1<f64>, window_length: usize) -> FittedCurve {
    hanning::smooth_and_gradient(y, window_length)
}
