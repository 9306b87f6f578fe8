//! 切片角度校正.
//!
//! 中线在某个深度处的切向量一般不与切片法向 (深度轴) 平行.
//! 斜切会使横截面在切片上被拉长; 该模块按切向量与深度轴的夹角余弦,
//! 对切片做各向异性缩放重采样, 把被拉长的截面压缩回去.

use crate::Idx2dF;
use ndarray::{Array2, ArrayView2};

/// 把中线一阶导数 `(dh/dz, dw/dz)` 缩放到物理尺度并归一化,
/// 得到单位切向量 `[tz, th, tw]` (与 `pix_dim` 同序).
///
/// 切向量为零长或含非有限分量时没有定义, 返回 `None`.
/// 调用者应当跳过该切片而不是让未定义值向下传播.
pub fn unit_tangent((dh, dw): Idx2dF, [z_mm, h_mm, w_mm]: [f64; 3]) -> Option<[f64; 3]> {
    let t = [z_mm, dh * h_mm, dw * w_mm];
    let norm = (t[0] * t[0] + t[1] * t[1] + t[2] * t[2]).sqrt();
    if !norm.is_finite() || norm == 0.0 {
        return None;
    }
    Some([t[0] / norm, t[1] / norm, t[2] / norm])
}

/// 两个 2D 向量之间的有符号夹角, 取值范围 `(-pi, pi]`.
///
/// 以行列式与点积的二参数反正切求得.
#[inline]
pub fn angle_between_2d((a0, a1): Idx2dF, (b0, b1): Idx2dF) -> f64 {
    let det = a0 * b1 - a1 * b0;
    let dot = a0 * b0 + a1 * b1;
    det.atan2(dot)
}

/// 单位切向量 `[tz, th, tw]` 在两个深度平面上的投影与深度轴的夹角
/// `(angle_h, angle_w)`.
pub fn slice_angles([tz, th, tw]: [f64; 3]) -> Idx2dF {
    // 投影向量取 (横截面分量, 深度分量), 深度轴为 (0, 1).
    let angle_h = angle_between_2d((th, tz), (0.0, 1.0));
    let angle_w = angle_between_2d((tw, tz), (0.0, 1.0));
    (angle_h, angle_w)
}

/// 逆映射双线性重采样: `out(h, w) = in(h / scale_h, w / scale_w)`.
///
/// 输出形状与输入相同; 源坐标越界或非有限 (缩放因子趋于 0) 时填 0.
/// 缩放因子趋于 0 时输出会坍缩为近空图, 这是预期行为, 调用者必须容忍.
pub fn scale_warp(patch: ArrayView2<f64>, scale_h: f64, scale_w: f64) -> Array2<f64> {
    let &[h_len, w_len] = patch.shape() else {
        unreachable!()
    };
    let mut out = Array2::<f64>::zeros((h_len, w_len));
    for ((h, w), v) in out.indexed_iter_mut() {
        let src_h = h as f64 / scale_h;
        let src_w = w as f64 / scale_w;
        *v = bilinear(&patch, src_h, src_w);
    }
    out
}

/// 常数 0 边界的双线性采样.
fn bilinear(patch: &ArrayView2<f64>, src_h: f64, src_w: f64) -> f64 {
    if !src_h.is_finite() || !src_w.is_finite() {
        return 0.0;
    }
    let (h0, w0) = (src_h.floor(), src_w.floor());
    let (fh, fw) = (src_h - h0, src_w - w0);
    let (h0, w0) = (h0 as i64, w0 as i64);

    let at = |h: i64, w: i64| -> f64 {
        if h < 0 || w < 0 {
            return 0.0;
        }
        *patch.get((h as usize, w as usize)).unwrap_or(&0.0)
    };

    at(h0, w0) * (1.0 - fh) * (1.0 - fw)
        + at(h0, w0 + 1) * (1.0 - fh) * fw
        + at(h0 + 1, w0) * fh * (1.0 - fw)
        + at(h0 + 1, w0 + 1) * fh * fw
}

/// 按单位切向量对切片做角度校正: 两个方向分别以投影角的余弦为缩放因子.
pub fn correct_patch(patch: ArrayView2<f64>, tangent: [f64; 3]) -> Array2<f64> {
    let (angle_h, angle_w) = slice_angles(tangent);
    scale_warp(patch, angle_h.cos(), angle_w.cos())
}
