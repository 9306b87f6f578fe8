//! 中线拟合.
//!
//! 从逐切片前景质心出发拟合脊髓中线, 得到每个深度位置上的中线点与一阶导数
//! (切向量的横截面分量). 拟合算法与参数由 [`FitConfig`] 给定,
//! 上层形态学管线不解释其内容, 仅透传到这里.

use crate::fitting::{self, CurveType, FitError, FittedCurve};
use crate::{CordSeg, Idx2dF};
use ndarray::Array1;

/// 中线拟合运行时错误. 对整条形态学管线而言都是致命错误.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CenterlineError {
    /// 分割中不存在任何前景体素.
    EmptyMask,

    /// 含前景的切片不足以做实际拟合工作.
    ///
    /// 第一个参数代表目前已有的切片数, 第二个参数代表拟合需要的最少切片数.
    TooFewSlices(u32, u32),

    /// 拟合所需的线性方程组奇异, 无法求解.
    SingularSystem,
}

impl From<FitError> for CenterlineError {
    fn from(e: FitError) -> Self {
        match e {
            FitError::TooFewSamples(have, need) => Self::TooFewSlices(have, need),
            FitError::SingularSystem => Self::SingularSystem,
        }
    }
}

/// 中线拟合运行时结果.
pub type CenterlineResult<T> = Result<T, CenterlineError>;

/// 中线拟合配置. 算法选择与平滑/窗口参数.
#[derive(Clone, Debug)]
pub struct FitConfig {
    /// 拟合曲线类型与其参数.
    pub algo: CurveType,
}

impl Default for FitConfig {
    /// 默认配置: Hann 窗平滑, 窗口长度 50 切片.
    fn default() -> Self {
        Self {
            algo: CurveType::Hanning { window_length: 50 },
        }
    }
}

/// 拟合好的中线: 深度范围内每个切片上的中线点 `(h, w)`
/// 与一阶导数 `(dh/dz, dw/dz)`.
#[derive(Debug, Clone)]
pub struct Centerline {
    min_z: usize,
    points: Vec<Idx2dF>,
    derivs: Vec<Idx2dF>,
}

impl Centerline {
    /// 直接初始化. `points` 与 `derivs` 必须非空且长度一致, 否则程序 panic.
    pub fn new(min_z: usize, points: Vec<Idx2dF>, derivs: Vec<Idx2dF>) -> Self {
        assert_eq!(points.len(), derivs.len(), "中线点与导数必须一一对应");
        assert!(!points.is_empty(), "中线不能为空");
        Self {
            min_z,
            points,
            derivs,
        }
    }

    /// 覆盖范围的最小深度索引 (包含).
    #[inline]
    pub fn min_z(&self) -> usize {
        self.min_z
    }

    /// 覆盖范围的最大深度索引 (包含).
    #[inline]
    pub fn max_z(&self) -> usize {
        self.min_z + self.points.len() - 1
    }

    /// 覆盖的切片个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 中线是否为空? 构造保证非空, 该方法总返回 `false`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 判断深度索引 `iz` 是否在覆盖范围内.
    #[inline]
    pub fn covers(&self, iz: usize) -> bool {
        (self.min_z()..=self.max_z()).contains(&iz)
    }

    /// 获取深度索引 `iz` 处的中线点 `(h, w)`.
    ///
    /// 当 `iz` 不在覆盖范围内时 panic.
    #[inline]
    pub fn point_at(&self, iz: usize) -> Idx2dF {
        self.points[iz - self.min_z]
    }

    /// 获取深度索引 `iz` 处的一阶导数 `(dh/dz, dw/dz)`.
    ///
    /// 当 `iz` 不在覆盖范围内时 panic.
    #[inline]
    pub fn deriv_at(&self, iz: usize) -> Idx2dF {
        self.derivs[iz - self.min_z]
    }
}

impl CordSeg {
    /// 在前景包含式深度范围上拟合中线.
    ///
    /// 逐切片取前景质心; 范围内部无前景的切片以相邻已知质心线性插值补齐,
    /// 然后按照 `cfg` 给定的算法拟合 `h(z)`, `w(z)` 并求一阶导数.
    pub fn centerline(&self, cfg: &FitConfig) -> CenterlineResult<Centerline> {
        let (min_z, max_z) = self.nonzero_z_range().ok_or(CenterlineError::EmptyMask)?;

        let raw: Vec<Option<Idx2dF>> = (min_z..=max_z).map(|z| self.slice_centroid(z)).collect();
        let known = raw.iter().filter(|c| c.is_some()).count();
        log::debug!(
            "中线拟合: 深度范围 [{min_z}, {max_z}], 已知质心 {known}/{} 个",
            raw.len()
        );

        let (hs, ws) = fill_gaps(&raw);
        let zs = Array1::from_iter((min_z..=max_z).map(|z| z as f64));

        let h_curve = fit_one(&zs, &hs, cfg)?;
        let w_curve = fit_one(&zs, &ws, cfg)?;

        let points = h_curve
            .values
            .iter()
            .zip(w_curve.values.iter())
            .map(|(&h, &w)| (h, w))
            .collect();
        let derivs = h_curve
            .derivs
            .iter()
            .zip(w_curve.derivs.iter())
            .map(|(&dh, &dw)| (dh, dw))
            .collect();
        Ok(Centerline::new(min_z, points, derivs))
    }
}

/// 按 `cfg` 对一维序列拟合.
fn fit_one(zs: &Array1<f64>, ys: &[f64], cfg: &FitConfig) -> CenterlineResult<FittedCurve> {
    let ys = Array1::from_vec(ys.to_vec());
    let curve = match cfg.algo {
        CurveType::Polynomial { degree } => fitting::polynomial_f64(zs.view(), ys.view(), degree)?,
        CurveType::CubicSpline => fitting::cubic_spline_f64(zs.view(), ys.view())?,
        CurveType::Hanning { window_length } => fitting::hann_smooth_f64(ys.view(), window_length),
    };
    Ok(curve)
}

/// 将质心序列的内部空缺以线性插值补齐, 返回稠密的 `(hs, ws)`.
///
/// 序列两端一定是已知质心 (由 `nonzero_z_range` 的定义保证).
fn fill_gaps(raw: &[Option<Idx2dF>]) -> (Vec<f64>, Vec<f64>) {
    debug_assert!(raw.first().is_some_and(Option::is_some));
    debug_assert!(raw.last().is_some_and(Option::is_some));

    let mut hs = Vec::with_capacity(raw.len());
    let mut ws = Vec::with_capacity(raw.len());

    let mut i = 0usize;
    while i < raw.len() {
        match raw[i] {
            Some((h, w)) => {
                hs.push(h);
                ws.push(w);
                i += 1;
            }
            None => {
                // [i, next) 是一段空缺; prev 与 next 都是已知质心.
                let prev = i - 1;
                let next = i + raw[i..].iter().position(Option::is_some).unwrap();
                let (ph, pw) = raw[prev].unwrap();
                let (nh, nw) = raw[next].unwrap();
                let span = (next - prev) as f64;
                for j in i..next {
                    let t = (j - prev) as f64 / span;
                    hs.push(ph + t * (nh - ph));
                    ws.push(pw + t * (nw - pw));
                }
                i = next;
            }
        }
    }
    (hs, ws)
}
