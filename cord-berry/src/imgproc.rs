//! 标量扫描二值化.
//!
//! 把标量 (如概率分割或对比度图) 扫描转换为二值脊髓分割,
//! 阈值可以固定给出, 也可以用 Otsu 法自动选取.

use crate::consts::gray::{SEG_BACKGROUND, SEG_CORD};
use crate::{CordSeg, MriScan, NiftiHeaderAttr};

/// 二值化阈值选择.
#[derive(Copy, Clone, Debug)]
pub enum Threshold {
    /// 固定阈值. 值大于等于阈值的体素为前景.
    Fixed(f32),

    /// Otsu 法: 在 256 级直方图上最大化类间方差.
    Otsu,
}

impl MriScan {
    /// 以 `threshold` 规则二值化, 返回共享同一 header 的分割体数据.
    ///
    /// 非有限体素值 (NaN, inf) 一律视为背景.
    pub fn binarize(&self, threshold: Threshold) -> CordSeg {
        let th = match threshold {
            Threshold::Fixed(v) => v,
            Threshold::Otsu => otsu_threshold(self),
        };
        log::debug!("二值化阈值: {th}");
        let data = self
            .data()
            .mapv(|v| if v.is_finite() && v >= th { SEG_CORD } else { SEG_BACKGROUND });
        CordSeg::from_canonical(Box::new(self.header().clone()), data)
    }
}

/// 直方图级数.
const OTSU_BINS: usize = 256;

/// 在有限值范围上以 256 级直方图求 Otsu 阈值.
///
/// 返回的阈值落在两类之间的级边界上; 全部体素同值时返回该值本身.
fn otsu_threshold(scan: &MriScan) -> f32 {
    let (mut lo, mut hi) = (f32::MAX, f32::MIN);
    for &v in scan.data().iter().filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if lo >= hi {
        // 空体数据或全同值: 没有可分的两类.
        return lo;
    }

    let width = (hi - lo) / OTSU_BINS as f32;
    let mut hist = [0u64; OTSU_BINS];
    for &v in scan.data().iter().filter(|v| v.is_finite()) {
        let bin = (((v - lo) / width) as usize).min(OTSU_BINS - 1);
        hist[bin] += 1;
    }

    let total: u64 = hist.iter().sum();
    let total_mean: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &n)| i as f64 * n as f64)
        .sum::<f64>()
        / total as f64;

    // 遍历所有切分位置, 最大化类间方差; 相同方差取第一个切分.
    let (mut best_bin, mut best_var) = (0usize, f64::MIN);
    let (mut w0, mut sum0) = (0u64, 0.0f64);
    for (i, &n) in hist.iter().enumerate().take(OTSU_BINS - 1) {
        w0 += n;
        sum0 += i as f64 * n as f64;
        let w1 = total - w0;
        if w0 == 0 || w1 == 0 {
            continue;
        }
        let mean0 = sum0 / w0 as f64;
        let mean1 = (total_mean * total as f64 - sum0) / w1 as f64;
        let var = w0 as f64 * w1 as f64 * (mean0 - mean1).powi(2);
        if var > best_var {
            (best_bin, best_var) = (i, var);
        }
    }

    // 阈值取最优切分的右边界: 该级以内为背景, 其上为前景.
    lo + (best_bin + 1) as f32 * width
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::gray::SEG_CORD;
    use ndarray::Array3;

    fn scan_from(values: &[f32]) -> MriScan {
        let n = values.len();
        let data = Array3::from_shape_vec((n, 1, 1), values.to_vec()).unwrap();
        MriScan::fake(data, [1.0, 1.0, 1.0])
    }

    #[test]
    fn test_fixed_threshold() {
        let scan = scan_from(&[0.0, 0.4, 0.5, 0.9, f32::NAN]);
        let seg = scan.binarize(Threshold::Fixed(0.5));
        // `>=` 比较: 恰好等于阈值的体素为前景; NaN 为背景.
        assert_eq!(seg.count(SEG_CORD), 2);
    }

    #[test]
    fn test_otsu_bimodal() {
        // 两簇明显可分的值: Otsu 阈值应落在两簇之间.
        let mut values = vec![0.0f32; 60];
        values.extend(std::iter::repeat(10.0f32).take(40));
        values[3] = 0.5;
        values[70] = 9.5;
        let scan = scan_from(&values);
        let seg = scan.binarize(Threshold::Otsu);
        assert_eq!(seg.count(SEG_CORD), 40);
    }

    #[test]
    fn test_otsu_constant_volume() {
        let scan = scan_from(&[3.0; 10]);
        // 全同值: 阈值为该值本身, `>=` 使全部体素为前景.
        let seg = scan.binarize(Threshold::Otsu);
        assert_eq!(seg.count(SEG_CORD), 10);
    }

    #[test]
    fn test_header_shared() {
        use crate::NiftiHeaderAttr;
        let scan = scan_from(&[0.0, 1.0, 2.0]);
        let seg = scan.binarize(Threshold::Fixed(1.5));
        assert_eq!(seg.shape(), scan.shape());
        assert_eq!(seg.pix_dim(), scan.pix_dim());
    }
}
