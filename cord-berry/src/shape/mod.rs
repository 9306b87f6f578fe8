//! 沿中线的横截面形态学分析管线.
//!
//! 对一个二值脊髓分割: 拟合中线, 逐深度提取 2D 切片, 按中线切向量
//! 做角度校正, 计算最大连通区域的形态学描述符, 指派 AP/RL 解剖直径,
//! 最后汇合成 8 个固定属性的全长度序列.
//!
//! # 深度范围约定
//!
//! 处理范围是 `[min_z, max_z - 2]` (包含两端), 其中 `(min_z, max_z)`
//! 是前景包围盒的包含式深度范围. 包围盒最后一个切片与其前一个切片
//! **有意** 不参与计算, 这是保留的既有边界策略; 对应输出位置保持缺失哨兵.
//!
//! # 缺失切片
//!
//! 无前景区域或切向量退化的切片会以 warn 级日志标出, 其所有属性
//! 在输出中保持 NaN. 一个深度位置的 8 个属性要么全部写入, 要么全部缺失.

use crate::centerline::{Centerline, CenterlineError, FitConfig};
use crate::consts::MISSING;
use crate::{CordSeg, Idx2dF, NiftiHeaderAttr};
use std::sync::atomic::{AtomicBool, Ordering};

pub mod angle;
pub mod axis;
pub mod region;

pub use axis::assign_ap_rl;
pub use region::{dominant_region_properties, label_foreground, ShapeProperties};

/// 形态学管线运行时错误.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// 分割中不存在任何前景体素.
    EmptySegmentation,

    /// 中线拟合失败. 不返回部分结果.
    Centerline(CenterlineError),

    /// 计算被协作式取消. 不返回部分结果.
    Cancelled,
}

impl From<CenterlineError> for ShapeError {
    fn from(e: CenterlineError) -> Self {
        Self::Centerline(e)
    }
}

/// 形态学管线运行时结果.
pub type ShapeResult<T> = Result<T, ShapeError>;

/// 形态学管线配置.
///
/// 所有配置显式传入, 不使用任何全局可变状态.
#[derive(Clone, Debug, Default)]
pub struct ShapeConfig {
    /// 中线拟合配置. 管线不解释其内容, 原样转交给中线拟合.
    pub fit: FitConfig,

    /// 是否输出逐切片的 debug 级日志.
    pub verbose: bool,
}

/// 输出的 8 个固定属性, 按固定顺序排列.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ShapeProperty {
    /// 区域面积.
    Area,

    /// 等效直径.
    EquivalentDiameter,

    /// 前后方向解剖直径.
    ApDiameter,

    /// 左右方向解剖直径.
    RlDiameter,

    /// 次轴长与主轴长之比.
    RatioMinorMajor,

    /// 偏心率.
    Eccentricity,

    /// 实心度.
    Solidity,

    /// 主轴方向角 (度).
    Orientation,
}

impl ShapeProperty {
    /// 全部属性, 按固定输出顺序.
    pub const ALL: [Self; 8] = [
        Self::Area,
        Self::EquivalentDiameter,
        Self::ApDiameter,
        Self::RlDiameter,
        Self::RatioMinorMajor,
        Self::Eccentricity,
        Self::Solidity,
        Self::Orientation,
    ];

    /// 属性的外部名称.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Area => "area",
            Self::EquivalentDiameter => "equivalent_diameter",
            Self::ApDiameter => "AP_diameter",
            Self::RlDiameter => "RL_diameter",
            Self::RatioMinorMajor => "ratio_minor_major",
            Self::Eccentricity => "eccentricity",
            Self::Solidity => "solidity",
            Self::Orientation => "orientation",
        }
    }

    /// 按外部名称查找属性.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// 从描述符记录中取出该属性的值.
    fn pick(self, p: &ShapeProperties) -> f64 {
        match self {
            Self::Area => p.area,
            Self::EquivalentDiameter => p.equivalent_diameter,
            Self::ApDiameter => p.ap_diameter,
            Self::RlDiameter => p.rl_diameter,
            Self::RatioMinorMajor => p.ratio_minor_major,
            Self::Eccentricity => p.eccentricity,
            Self::Solidity => p.solidity,
            Self::Orientation => p.orientation,
        }
    }
}

/// 逐切片属性序列: 每个属性一条与体数据深度等长的 `f64` 数组,
/// 未计算位置为缺失哨兵 (NaN).
#[derive(Debug, Clone)]
pub struct PropertySeries {
    values: [Vec<f64>; 8],
}

impl PropertySeries {
    /// 以缺失哨兵填满的序列.
    fn filled(len_z: usize) -> Self {
        Self {
            values: std::array::from_fn(|_| vec![MISSING; len_z]),
        }
    }

    /// 序列长度 (等于体数据的深度).
    #[inline]
    pub fn len_z(&self) -> usize {
        self.values[0].len()
    }

    /// 获取一个属性的整条数组.
    #[inline]
    pub fn get(&self, p: ShapeProperty) -> &[f64] {
        &self.values[p as usize]
    }

    /// 按外部名称获取一个属性的整条数组.
    pub fn get_by_name(&self, name: &str) -> Option<&[f64]> {
        ShapeProperty::from_name(name).map(|p| self.get(p))
    }

    /// 按固定顺序迭代 `(属性, 数组)` 对.
    pub fn iter(&self) -> impl Iterator<Item = (ShapeProperty, &[f64])> {
        ShapeProperty::ALL.into_iter().map(|p| (p, self.get(p)))
    }

    /// 判断深度位置 `iz` 是否缺失. 写入是全有或全无的,
    /// 因此检查任意一个属性即可.
    #[inline]
    pub fn is_missing(&self, iz: usize) -> bool {
        self.get(ShapeProperty::Area)[iz].is_nan()
    }

    /// 把一条描述符记录写入位置 `iz` 的所有属性.
    fn fill_row(&mut self, iz: usize, props: &ShapeProperties) {
        for p in ShapeProperty::ALL {
            self.values[p as usize][iz] = p.pick(props);
        }
    }
}

/// 单个深度位置的完整分析: 切向量, 角度校正, 区域描述符, 轴指派.
///
/// 切向量退化或切片无前景区域时返回 `None` 并发出 warn 级日志.
fn analyze_one(
    seg: &CordSeg,
    ctl: &Centerline,
    iz: usize,
    resolution: Idx2dF,
    pix_dim: [f64; 3],
    verbose: bool,
) -> Option<ShapeProperties> {
    let Some(tangent) = angle::unit_tangent(ctl.deriv_at(iz), pix_dim) else {
        log::warn!("切片 {iz}: 中线切向量退化 (零长或非有限), 该切片标记为缺失");
        return None;
    };

    // 工作切片与校正副本都只在本次迭代内存活.
    let patch = seg.slice_at(iz).to_patch();
    let corrected = angle::correct_patch(patch.view(), tangent);

    match region::dominant_region_properties(corrected.view(), Some(resolution)) {
        Some(mut props) => {
            props.assign_axis_diameters();
            if verbose {
                log::debug!(
                    "切片 {iz}: area = {:.3}, AP = {:.3}, RL = {:.3}",
                    props.area,
                    props.ap_diameter,
                    props.rl_diameter
                );
            }
            Some(props)
        }
        None => {
            log::warn!("切片 {iz}: 无前景区域");
            None
        }
    }
}

impl CordSeg {
    /// 沿中线计算横截面形态学属性序列.
    ///
    /// 先按 `cfg.fit` 拟合中线 (失败则整体失败, 不返回部分结果),
    /// 然后在 `[min_z, max_z - 2]` 上逐深度分析 (见模块文档的范围约定).
    pub fn shape_along_centerline(&self, cfg: &ShapeConfig) -> ShapeResult<PropertySeries> {
        let ctl = self.centerline(&cfg.fit)?;
        self.shape_with_centerline(&ctl, cfg)
    }

    /// 与 [`Self::shape_along_centerline`] 相同, 但支持协作式取消:
    /// 每个深度位置之间检查一次 `cancel`, 为 `true` 时返回
    /// [`ShapeError::Cancelled`], 不返回部分结果.
    pub fn shape_along_centerline_cancellable(
        &self,
        cfg: &ShapeConfig,
        cancel: &AtomicBool,
    ) -> ShapeResult<PropertySeries> {
        let ctl = self.centerline(&cfg.fit)?;
        self.shape_loop(&ctl, cfg, Some(cancel))
    }

    /// 以调用者提供的中线 (如外部拟合结果) 运行管线.
    ///
    /// `ctl` 必须覆盖 `[min_z, max_z - 2]` 的每个深度位置, 否则程序 panic.
    pub fn shape_with_centerline(
        &self,
        ctl: &Centerline,
        cfg: &ShapeConfig,
    ) -> ShapeResult<PropertySeries> {
        self.shape_loop(ctl, cfg, None)
    }

    /// 顺序主循环.
    fn shape_loop(
        &self,
        ctl: &Centerline,
        cfg: &ShapeConfig,
        cancel: Option<&AtomicBool>,
    ) -> ShapeResult<PropertySeries> {
        let (min_z, max_z) = self
            .nonzero_z_range()
            .ok_or(ShapeError::EmptySegmentation)?;
        let mut series = PropertySeries::filled(self.len_z());
        let pix_dim = self.pix_dim();
        let resolution = (self.width_mm(), self.height_mm());

        for iz in min_z..max_z.saturating_sub(1) {
            if let Some(flag) = cancel {
                if flag.load(Ordering::Acquire) {
                    return Err(ShapeError::Cancelled);
                }
            }
            if let Some(props) = analyze_one(self, ctl, iz, resolution, pix_dim, cfg.verbose) {
                series.fill_row(iz, &props);
            }
        }
        Ok(series)
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl CordSeg {
    /// 借助 `rayon`, 并行地运行 [`Self::shape_along_centerline`].
    ///
    /// 每个深度位置是独立工作单元, 由各 worker 独占; 结果行在并行映射
    /// 结束后统一写入, 不需要加锁. 输出与顺序版本完全一致.
    pub fn par_shape_along_centerline(&self, cfg: &ShapeConfig) -> ShapeResult<PropertySeries> {
        let ctl = self.centerline(&cfg.fit)?;
        let (min_z, max_z) = self
            .nonzero_z_range()
            .ok_or(ShapeError::EmptySegmentation)?;
        let pix_dim = self.pix_dim();
        let resolution = (self.width_mm(), self.height_mm());

        let rows: Vec<(usize, Option<ShapeProperties>)> = (min_z..max_z.saturating_sub(1))
            .into_par_iter()
            .map(|iz| (iz, analyze_one(self, &ctl, iz, resolution, pix_dim, cfg.verbose)))
            .collect();

        let mut series = PropertySeries::filled(self.len_z());
        for (iz, props) in rows {
            if let Some(p) = props {
                series.fill_row(iz, &p);
            }
        }
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::centerline::FitConfig;
    use crate::consts::gray::SEG_CORD;
    use crate::fitting::CurveType;
    use ndarray::Array3;

    /// 构造 \[w, h, z\] 格式的分割: 在 `z_fg` 中的每个切片画半径 5 的圆盘.
    fn disk_volume(len_z: usize, z_fg: &[usize]) -> CordSeg {
        let mut data = Array3::<u8>::zeros((32, 32, len_z));
        for &z in z_fg {
            for w in 0..32usize {
                for h in 0..32usize {
                    let (dw, dh) = (w as f64 - 16.0, h as f64 - 16.0);
                    if dw * dw + dh * dh <= 25.0 {
                        data[(w, h, z)] = SEG_CORD;
                    }
                }
            }
        }
        CordSeg::fake(data, [1.0, 1.0, 1.0])
    }

    fn poly1_cfg() -> ShapeConfig {
        ShapeConfig {
            fit: FitConfig {
                algo: CurveType::Polynomial { degree: 1 },
            },
            verbose: false,
        }
    }

    /// 端到端: 等圆盘堆叠, 中线与深度轴对齐, 无需角度校正.
    #[test]
    fn test_stacked_disks_end_to_end() {
        simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Warn)
            .init()
            .ok();

        let z_fg: Vec<usize> = (4..=14).collect();
        let seg = disk_volume(20, &z_fg);
        let series = seg.shape_along_centerline(&poly1_cfg()).unwrap();

        assert_eq!(series.len_z(), 20);

        // 处理范围 [4, 12]: 包围盒最后一个切片 (14) 与其前一个 (13) 被排除.
        for iz in 4..=12usize {
            assert!(!series.is_missing(iz), "切片 {iz} 不应缺失");
            let ap = series.get(ShapeProperty::ApDiameter)[iz];
            let rl = series.get(ShapeProperty::RlDiameter)[iz];
            let ecc = series.get(ShapeProperty::Eccentricity)[iz];
            assert!(ecc < 0.2);
            assert!((ap - 10.0).abs() < 0.8);
            assert!((rl - 10.0).abs() < 0.8);
            assert!((series.get(ShapeProperty::Area)[iz] - 81.0).abs() < 1e-9);
            assert!(series.get(ShapeProperty::RatioMinorMajor)[iz] > 0.9);
            assert!(series.get(ShapeProperty::Solidity)[iz] > 0.9);
        }
        for iz in [0, 1, 2, 3, 13, 14, 15, 19] {
            assert!(series.is_missing(iz), "切片 {iz} 应缺失");
        }

        // 全有或全无.
        for iz in 0..20 {
            let missing: Vec<bool> = series.iter().map(|(_, arr)| arr[iz].is_nan()).collect();
            assert!(missing.iter().all(|&m| m) || missing.iter().all(|&m| !m));
        }

        // 名称查找使用原始键名.
        assert!(series.get_by_name("AP_diameter").is_some());
        assert!(series.get_by_name("ratio_minor_major").is_some());
        assert_eq!(series.get_by_name("no_such_key"), None);
    }

    /// 范围内部无前景的切片: 发出警告并保持缺失, 整体调用不报错.
    #[test]
    fn test_missing_slice_in_range() {
        let z_fg: Vec<usize> = (4..=14).filter(|&z| z != 9).collect();
        let seg = disk_volume(20, &z_fg);
        let series = seg.shape_along_centerline(&poly1_cfg()).unwrap();

        assert!(series.is_missing(9));
        assert!(!series.is_missing(8));
        assert!(!series.is_missing(10));
    }

    #[test]
    fn test_empty_segmentation() {
        let seg = disk_volume(8, &[]);
        let err = seg.shape_along_centerline(&poly1_cfg()).unwrap_err();
        assert_eq!(
            err,
            ShapeError::Centerline(crate::centerline::CenterlineError::EmptyMask)
        );
    }

    #[test]
    fn test_cancellation() {
        let seg = disk_volume(20, &(4..=14).collect::<Vec<_>>());
        let cancel = AtomicBool::new(true);
        let err = seg
            .shape_along_centerline_cancellable(&poly1_cfg(), &cancel)
            .unwrap_err();
        assert_eq!(err, ShapeError::Cancelled);
    }

    /// 调用者提供的中线 (黑盒) 与内部拟合结果一致时, 输出一致.
    #[test]
    fn test_with_external_centerline() {
        let seg = disk_volume(20, &(4..=14).collect::<Vec<_>>());
        let ctl = Centerline::new(4, vec![(16.0, 16.0); 11], vec![(0.0, 0.0); 11]);
        let series = seg.shape_with_centerline(&ctl, &poly1_cfg()).unwrap();
        assert!(!series.is_missing(4));
        assert!(series.is_missing(13));
    }

    #[test]
    fn test_property_names_roundtrip() {
        for p in ShapeProperty::ALL {
            assert_eq!(ShapeProperty::from_name(p.name()), Some(p));
        }
    }

    /// 并行路径与顺序路径输出逐位一致.
    #[cfg(feature = "rayon")]
    #[test]
    fn test_par_matches_sequential() {
        let seg = disk_volume(20, &(4..=14).collect::<Vec<_>>());
        let cfg = poly1_cfg();
        let seq = seg.shape_along_centerline(&cfg).unwrap();
        let par = seg.par_shape_along_centerline(&cfg).unwrap();
        for (p, arr) in seq.iter() {
            let par_arr = par.get(p);
            for (a, b) in arr.iter().zip(par_arr.iter()) {
                assert_eq!(a.to_bits(), b.to_bits());
            }
        }
    }
}
