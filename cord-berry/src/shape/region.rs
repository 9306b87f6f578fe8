//! 连通区域形态学描述符.
//!
//! 对 (可能经过角度校正的) 2D 工作切片: 标记 4-邻接连通前景区域,
//! 选取面积最大者, 并以标准区域矩公式计算其形态学描述符.
//!
//! 横截面内坐标约定: `w` 为左右 (RL) 方向, `h` 为前后 (AP) 方向.
//! 矩与方向角以 `(x, y) = (w, h)` 计算, 方向角自 RL 轴起算.

use crate::shape::axis::assign_ap_rl;
use crate::{Idx2d, Idx2dF};
use ndarray::{Array2, ArrayView2};
use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::f64::consts::{PI, SQRT_2};

/// 工作切片的前景判定阈值.
///
/// 角度校正的双线性插值会在前景边缘产生分数值像素;
/// 以固定阈值判定前景使最大区域的选取具有确定性.
pub(crate) const FG_THRESHOLD: f64 = 0.5;

/// 像素是否是前景?
#[inline]
fn is_fg(v: f64) -> bool {
    v > FG_THRESHOLD
}

/// 最大连通前景区域的形态学描述符.
///
/// 长度/面积类字段在给定物理分辨率时以毫米为单位, 否则以像素为单位;
/// `bbox`, `centroid`, 矩与周长始终以像素为单位.
#[derive(Debug, Clone)]
pub struct ShapeProperties {
    /// 区域面积.
    pub area: f64,

    /// 半开包围盒 `(min_h, min_w, max_h, max_w)`.
    pub bbox: (usize, usize, usize, usize),

    /// 区域质心 `(h, w)`.
    pub centroid: Idx2dF,

    /// 椭圆拟合偏心率. 0 为圆, 趋近 1 为线状.
    pub eccentricity: f64,

    /// 与区域等面积的圆的直径.
    pub equivalent_diameter: f64,

    /// 欧拉数: 连通分量数 (此处恒为 1) 减去孔洞数.
    pub euler_number: i32,

    /// 规范化二阶中心矩张量 `[[mu20', -mu11'], [-mu11', mu02']]`.
    pub inertia_tensor: [[f64; 2]; 2],

    /// 上述张量的特征值 `(lambda1, lambda2)`, `lambda1 >= lambda2`.
    pub inertia_tensor_eigvals: Idx2dF,

    /// 次轴长度 (椭圆拟合短轴全长).
    pub minor_axis_length: f64,

    /// 主轴长度 (椭圆拟合长轴全长).
    pub major_axis_length: f64,

    /// 原始矩. `moments[i][j]` 为 `sum(x^i * y^j)`, 阶数到 3.
    pub moments: [[f64; 4]; 4],

    /// 中心矩. `moments_central[i][j]` 为 `sum((x-cx)^i * (y-cy)^j)`, 阶数到 3.
    pub moments_central: [[f64; 4]; 4],

    /// 主轴方向角, 单位: 度, 取值范围 `(-90, 90]`, 自 RL (w) 轴起算.
    pub orientation: f64,

    /// 区域周长 (加权边界像素近似).
    pub perimeter: f64,

    /// 次轴长与主轴长之比, 取值范围 \[0, 1\]. 主轴长为 0 时恰为 0.0.
    pub ratio_minor_major: f64,

    /// 实心度: 区域面积与其凸包面积之比.
    pub solidity: f64,

    /// 前后方向解剖直径. 由 [`Self::assign_axis_diameters`] 填充, 之前为 NaN.
    pub ap_diameter: f64,

    /// 左右方向解剖直径. 由 [`Self::assign_axis_diameters`] 填充, 之前为 NaN.
    pub rl_diameter: f64,
}

impl ShapeProperties {
    /// 按主轴方向角把主次轴长指派为 AP/RL 解剖直径.
    #[inline]
    pub fn assign_axis_diameters(&mut self) {
        (self.ap_diameter, self.rl_diameter) = assign_ap_rl(
            self.orientation,
            self.major_axis_length,
            self.minor_axis_length,
        );
    }
}

/// 标记 4-邻接连通前景区域.
///
/// 返回标签图 (背景为 0, 区域标签从 1 起按行优先发现顺序递增)
/// 与每个标签的面积 (`areas[label - 1]`). 两趟 O(像素数) 完成.
pub fn label_foreground(patch: ArrayView2<f64>) -> (Array2<u32>, Vec<usize>) {
    let &[h_len, w_len] = patch.shape() else {
        unreachable!()
    };
    let mut labels = Array2::<u32>::zeros((h_len, w_len));
    let mut areas: Vec<usize> = Vec::new();
    let mut bfs_q: VecDeque<Idx2d> = VecDeque::with_capacity(16);

    for seed_h in 0..h_len {
        for seed_w in 0..w_len {
            if !is_fg(patch[(seed_h, seed_w)]) || labels[(seed_h, seed_w)] != 0 {
                continue;
            }
            let cur = areas.len() as u32 + 1;
            let mut count = 0usize;
            labels[(seed_h, seed_w)] = cur;
            bfs_q.push_back((seed_h, seed_w));
            while let Some((h, w)) = bfs_q.pop_front() {
                count += 1;
                let mut try_push = |pos: Idx2d| {
                    if pos.0 < h_len && pos.1 < w_len && is_fg(patch[pos]) && labels[pos] == 0 {
                        labels[pos] = cur;
                        bfs_q.push_back(pos);
                    }
                };
                try_push((h.wrapping_sub(1), w));
                try_push((h + 1, w));
                try_push((h, w.wrapping_sub(1)));
                try_push((h, w + 1));
            }
            areas.push(count);
        }
    }
    (labels, areas)
}

/// 面积最大的区域标签. 面积相同时取最先标记者 (严格大于比较).
/// 没有任何区域时返回 `None`.
fn dominant_label(areas: &[usize]) -> Option<u32> {
    let mut best: Option<(u32, usize)> = None;
    for (i, &a) in areas.iter().enumerate() {
        if best.map_or(true, |(_, best_area)| a > best_area) {
            best = Some((i as u32 + 1, a));
        }
    }
    best.map(|(label, _)| label)
}

/// 计算最大连通前景区域的形态学描述符.
///
/// `resolution` 为横截面内物理分辨率 `(px, py)` (RL 与 AP 方向,
/// 单位: 毫米/像素). 给定时, 面积乘以 `px * py`, 等效直径与主次轴长乘以
/// `px` — 这假设横截面内各向同性; `px != py` 是接受的近似, 不做校正.
///
/// 切片没有任何前景区域时返回 `None` (显式的 "无属性" 结果).
pub fn dominant_region_properties(
    patch: ArrayView2<f64>,
    resolution: Option<Idx2dF>,
) -> Option<ShapeProperties> {
    let (labels, areas) = label_foreground(patch);
    let chosen = dominant_label(&areas)?;
    let mask = labels.mapv(|l| l == chosen);
    let area_px = areas[chosen as usize - 1] as f64;

    // 原始矩与包围盒. 矩以 (x, y) = (w, h) 计.
    let mut moments = [[0.0f64; 4]; 4];
    let (mut min_h, mut min_w, mut max_h, mut max_w) = (usize::MAX, usize::MAX, 0usize, 0usize);
    for ((h, w), _) in mask.indexed_iter().filter(|(_, &m)| m) {
        (min_h, min_w) = (min_h.min(h), min_w.min(w));
        (max_h, max_w) = (max_h.max(h), max_w.max(w));
        let (x, y) = (w as f64, h as f64);
        for (i, row) in moments.iter_mut().enumerate() {
            for (j, m) in row.iter_mut().enumerate() {
                *m += x.powi(i as i32) * y.powi(j as i32);
            }
        }
    }
    debug_assert_eq!(moments[0][0], area_px);
    let (cx, cy) = (moments[1][0] / area_px, moments[0][1] / area_px);

    // 中心矩.
    let mut moments_central = [[0.0f64; 4]; 4];
    for ((h, w), _) in mask.indexed_iter().filter(|(_, &m)| m) {
        let (x, y) = (w as f64 - cx, h as f64 - cy);
        for (i, row) in moments_central.iter_mut().enumerate() {
            for (j, m) in row.iter_mut().enumerate() {
                *m += x.powi(i as i32) * y.powi(j as i32);
            }
        }
    }

    // 规范化二阶矩的特征分解.
    let a = moments_central[2][0] / area_px;
    let b = moments_central[1][1] / area_px;
    let c = moments_central[0][2] / area_px;
    let common = (((a - c) / 2.0).powi(2) + b * b).sqrt();
    let lambda1 = (a + c) / 2.0 + common;
    let lambda2 = ((a + c) / 2.0 - common).max(0.0);

    let major_px = 4.0 * lambda1.sqrt();
    let minor_px = 4.0 * lambda2.sqrt();
    let eccentricity = if lambda1 <= 0.0 {
        0.0
    } else {
        (1.0 - (lambda2 / lambda1).min(1.0)).sqrt()
    };
    // 0.5 * atan2 的取值范围是 (-pi/2, pi/2], 转换为度即 (-90, 90].
    let orientation = 0.5 * (2.0 * b).atan2(a - c) * 180.0 / PI;

    let eq_diameter_px = (4.0 * area_px / PI).sqrt();

    let convex_px = convex_pixel_count(&mask) as f64;
    debug_assert!(convex_px >= area_px);
    let solidity = area_px / convex_px;

    // 物理缩放.
    let (mut area, mut eq_diameter, mut major, mut minor) =
        (area_px, eq_diameter_px, major_px, minor_px);
    if let Some((px, py)) = resolution {
        area *= px * py;
        eq_diameter *= px;
        major *= px;
        minor *= px;
    }

    // 主轴长为 0 (如单像素区域) 时比值恰为 0.0, 不做除法.
    let ratio_minor_major = if major == 0.0 { 0.0 } else { minor / major };
    debug_assert!((0.0..=1.0 + 1e-12).contains(&ratio_minor_major));

    Some(ShapeProperties {
        area,
        bbox: (min_h, min_w, max_h + 1, max_w + 1),
        centroid: (cy, cx),
        eccentricity,
        equivalent_diameter: eq_diameter,
        euler_number: euler_number(&mask),
        inertia_tensor: [[a, -b], [-b, c]],
        inertia_tensor_eigvals: (lambda1, lambda2),
        minor_axis_length: minor,
        major_axis_length: major,
        moments,
        moments_central,
        orientation,
        perimeter: perimeter(&mask),
        ratio_minor_major,
        solidity,
        ap_diameter: f64::NAN,
        rl_diameter: f64::NAN,
    })
}

/// 边界像素邻接模式的周长权重表, 以模式码索引.
///
/// 模式码 = 1 + 2 * (4-邻接边界像素数) + 10 * (对角邻接边界像素数).
static PERIMETER_WEIGHTS: Lazy<[f64; 50]> = Lazy::new(|| {
    let mut w = [0.0f64; 50];
    for i in [5, 7, 15, 17, 25, 27] {
        w[i] = 1.0;
    }
    for i in [21, 33] {
        w[i] = SQRT_2;
    }
    for i in [13, 23] {
        w[i] = (1.0 + SQRT_2) / 2.0;
    }
    w
});

/// 区域周长的加权边界像素近似.
///
/// 边界像素是 4-邻域腐蚀会去掉的前景像素; 每个边界像素按其邻接模式
/// 赋权 1, sqrt(2) 或 (1 + sqrt(2)) / 2, 求和即周长.
fn perimeter(mask: &Array2<bool>) -> f64 {
    let &[h_len, w_len] = mask.shape() else {
        unreachable!()
    };
    let fg = |h: usize, w: usize| -> bool { h < h_len && w < w_len && mask[(h, w)] };

    // 4-邻域腐蚀边界 (图像边框外视为背景).
    let border = Array2::from_shape_fn((h_len, w_len), |(h, w)| {
        mask[(h, w)]
            && !(fg(h.wrapping_sub(1), w)
                && fg(h + 1, w)
                && fg(h, w.wrapping_sub(1))
                && fg(h, w + 1))
    });

    let on_border = |h: usize, w: usize| -> usize {
        usize::from(h < h_len && w < w_len && border[(h, w)])
    };

    let mut total = 0.0f64;
    for ((h, w), _) in border.indexed_iter().filter(|(_, &b)| b) {
        let edge = on_border(h.wrapping_sub(1), w)
            + on_border(h + 1, w)
            + on_border(h, w.wrapping_sub(1))
            + on_border(h, w + 1);
        let diag = on_border(h.wrapping_sub(1), w.wrapping_sub(1))
            + on_border(h.wrapping_sub(1), w + 1)
            + on_border(h + 1, w.wrapping_sub(1))
            + on_border(h + 1, w + 1);
        total += PERIMETER_WEIGHTS[1 + 2 * edge + 10 * diag];
    }
    total
}

/// 欧拉数: 1 减去孔洞数.
///
/// 孔洞是被区域完全包围的背景连通分量; 前景取 4-邻接时,
/// 背景取对偶的 8-邻接规则.
fn euler_number(mask: &Array2<bool>) -> i32 {
    let &[h_len, w_len] = mask.shape() else {
        unreachable!()
    };
    let mut visited = Array2::<bool>::default((h_len, w_len));
    let mut bfs_q: VecDeque<Idx2d> = VecDeque::new();

    let flood = |start: Idx2d, visited: &mut Array2<bool>, bfs_q: &mut VecDeque<Idx2d>| {
        if mask[start] || visited[start] {
            return;
        }
        visited[start] = true;
        bfs_q.push_back(start);
        while let Some((h, w)) = bfs_q.pop_front() {
            for dh in -1i64..=1 {
                for dw in -1i64..=1 {
                    let (nh, nw) = (h as i64 + dh, w as i64 + dw);
                    if nh < 0 || nw < 0 || nh as usize >= h_len || nw as usize >= w_len {
                        continue;
                    }
                    let pos = (nh as usize, nw as usize);
                    if !mask[pos] && !visited[pos] {
                        visited[pos] = true;
                        bfs_q.push_back(pos);
                    }
                }
            }
        }
    };

    // 先从图像边框淹没外部背景.
    for h in 0..h_len {
        flood((h, 0), &mut visited, &mut bfs_q);
        flood((h, w_len - 1), &mut visited, &mut bfs_q);
    }
    for w in 0..w_len {
        flood((0, w), &mut visited, &mut bfs_q);
        flood((h_len - 1, w), &mut visited, &mut bfs_q);
    }

    // 剩余未访问背景即孔洞, 按 8-邻接分组计数.
    let mut holes = 0i32;
    for h in 0..h_len {
        for w in 0..w_len {
            if !mask[(h, w)] && !visited[(h, w)] {
                holes += 1;
                flood((h, w), &mut visited, &mut bfs_q);
            }
        }
    }
    1 - holes
}

/// 凸包覆盖的像素个数 (以像素中心计, 包含边界上的点).
///
/// 区域退化 (点数过少或共线) 时, 凸包退化为其自身像素集合.
fn convex_pixel_count(mask: &Array2<bool>) -> usize {
    let pts: Vec<(i64, i64)> = mask
        .indexed_iter()
        .filter(|(_, &m)| m)
        .map(|((h, w), _)| (w as i64, h as i64))
        .collect();
    if pts.len() <= 2 {
        return pts.len();
    }
    let hull = convex_hull(&pts);
    if hull.len() < 3 {
        return pts.len();
    }

    let (min_x, max_x) = pts.iter().fold((i64::MAX, i64::MIN), |(lo, hi), p| {
        (lo.min(p.0), hi.max(p.0))
    });
    let (min_y, max_y) = pts.iter().fold((i64::MAX, i64::MIN), |(lo, hi), p| {
        (lo.min(p.1), hi.max(p.1))
    });

    let mut count = 0usize;
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            // 逆时针凸包: 点在所有边的左侧 (含边上) 即在包内.
            let inside = hull
                .iter()
                .zip(hull.iter().cycle().skip(1))
                .all(|(a, b)| cross(*a, *b, (x, y)) >= 0);
            if inside {
                count += 1;
            }
        }
    }
    count
}

/// 向量叉积 `(b - a) x (p - a)`.
#[inline]
fn cross(a: (i64, i64), b: (i64, i64), p: (i64, i64)) -> i64 {
    (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
}

/// Andrew 单调链凸包, 返回逆时针顶点序列 (不重复首尾).
fn convex_hull(pts: &[(i64, i64)]) -> Vec<(i64, i64)> {
    let mut pts: Vec<(i64, i64)> = pts.to_vec();
    pts.sort_unstable();
    pts.dedup();
    if pts.len() <= 2 {
        return pts;
    }

    let build = |it: &mut dyn Iterator<Item = &(i64, i64)>| -> Vec<(i64, i64)> {
        let mut chain: Vec<(i64, i64)> = Vec::with_capacity(pts.len());
        for &p in it {
            while chain.len() >= 2
                && cross(chain[chain.len() - 2], chain[chain.len() - 1], p) <= 0
            {
                chain.pop();
            }
            chain.push(p);
        }
        chain
    };

    let mut lower = build(&mut pts.iter());
    let mut upper = build(&mut pts.iter().rev());
    lower.pop();
    upper.pop();
    lower.append(&mut upper);
    lower
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// 在 `shape` 大小的图上画一个以 `(ch, cw)` 为中心、半径 `r` 的实心圆盘.
    fn disk_patch(shape: Idx2d, (ch, cw): Idx2dF, r: f64) -> Array2<f64> {
        Array2::from_shape_fn(shape, |(h, w)| {
            let (dh, dw) = (h as f64 - ch, w as f64 - cw);
            if dh * dh + dw * dw <= r * r {
                1.0
            } else {
                0.0
            }
        })
    }

    /// 画一个旋转椭圆: 半长轴 `a`, 半短轴 `b`, 主轴自 w 轴起转 `theta_deg` 度.
    fn ellipse_patch(shape: Idx2d, (ch, cw): Idx2dF, a: f64, b: f64, theta_deg: f64) -> Array2<f64> {
        let theta = theta_deg.to_radians();
        let (sin, cos) = theta.sin_cos();
        Array2::from_shape_fn(shape, |(h, w)| {
            let (x, y) = (w as f64 - cw, h as f64 - ch);
            let u = x * cos + y * sin;
            let v = -x * sin + y * cos;
            if (u / a).powi(2) + (v / b).powi(2) <= 1.0 {
                1.0
            } else {
                0.0
            }
        })
    }

    #[test]
    fn test_no_region() {
        let patch = Array2::<f64>::zeros((8, 8));
        assert!(dominant_region_properties(patch.view(), None).is_none());
    }

    /// 圆盘: 偏心率近似 0, 主次轴比近似 1, 等效直径近似 2r.
    #[test]
    fn test_circle_properties() {
        let patch = disk_patch((16, 16), (8.0, 8.0), 5.0);
        let mut p = dominant_region_properties(patch.view(), None).unwrap();

        assert!(p.eccentricity < 0.2);
        assert!(p.ratio_minor_major > 0.9 && p.ratio_minor_major <= 1.0);
        assert!((p.equivalent_diameter - 10.0).abs() < 0.5);
        assert!((p.major_axis_length - 10.0).abs() < 0.8);
        assert!((p.minor_axis_length - 10.0).abs() < 0.8);
        assert_eq!(p.euler_number, 1);
        assert!(p.solidity > 0.9);
        assert!((p.centroid.0 - 8.0).abs() < 1e-9);
        assert!((p.centroid.1 - 8.0).abs() < 1e-9);
        assert_eq!(p.bbox, (3, 3, 14, 14));
        assert_eq!(p.moments[0][0], p.area);

        p.assign_axis_diameters();
        assert!((p.ap_diameter - p.rl_diameter).abs() < 0.5);
    }

    /// 轴对齐椭圆: 方向角近似 0, RL 直径取主轴.
    #[test]
    fn test_ellipse_axis_aligned() {
        let patch = ellipse_patch((32, 32), (16.0, 16.0), 10.0, 4.0, 0.0);
        let mut p = dominant_region_properties(patch.view(), None).unwrap();

        assert!(p.orientation.abs() < 2.0);
        assert!((p.major_axis_length - 20.0).abs() < 1.0);
        assert!((p.minor_axis_length - 8.0).abs() < 1.0);
        assert!(p.eccentricity > 0.8);

        p.assign_axis_diameters();
        assert_eq!(p.rl_diameter, p.major_axis_length);
        assert_eq!(p.ap_diameter, p.minor_axis_length);
    }

    /// 旋转 60 度的椭圆: 方向角近似 60, AP 直径取主轴.
    #[test]
    fn test_ellipse_rotated_60() {
        let patch = ellipse_patch((40, 40), (20.0, 20.0), 12.0, 5.0, 60.0);
        let mut p = dominant_region_properties(patch.view(), None).unwrap();

        assert!((p.orientation.abs() - 60.0).abs() < 3.0);

        p.assign_axis_diameters();
        assert_eq!(p.ap_diameter, p.major_axis_length);
        assert_eq!(p.rl_diameter, p.minor_axis_length);
    }

    /// 单像素区域: 主轴长为 0, 比值恰为 0.0, 不触发除零.
    #[test]
    fn test_single_pixel_degenerate() {
        let mut patch = Array2::<f64>::zeros((6, 6));
        patch[(2, 3)] = 1.0;
        let p = dominant_region_properties(patch.view(), None).unwrap();
        assert_eq!(p.major_axis_length, 0.0);
        assert_eq!(p.ratio_minor_major, 0.0);
        assert_eq!(p.eccentricity, 0.0);
        assert_eq!(p.area, 1.0);
        assert_eq!(p.solidity, 1.0);
    }

    /// 面积相同的两个区域: 取最先标记 (行优先序在前) 者.
    #[test]
    fn test_tie_keeps_first_label() {
        let mut patch = Array2::<f64>::zeros((10, 10));
        for w in 1..4 {
            patch[(1, w)] = 1.0; // 先被扫描到
            patch[(7, w)] = 1.0;
        }
        let p = dominant_region_properties(patch.view(), None).unwrap();
        assert_eq!(p.centroid.0, 1.0);
    }

    /// 物理分辨率缩放 k 倍: 面积乘 k^2, 三个长度量乘 k, 方向角不变.
    #[test]
    fn test_resolution_scaling() {
        let patch = ellipse_patch((32, 32), (16.0, 16.0), 9.0, 5.0, 20.0);
        let base = dominant_region_properties(patch.view(), None).unwrap();
        let scaled = dominant_region_properties(patch.view(), Some((2.0, 2.0))).unwrap();

        let f64_eq = |a: f64, b: f64| (a - b).abs() < 1e-9;
        assert!(f64_eq(scaled.area, base.area * 4.0));
        assert!(f64_eq(scaled.equivalent_diameter, base.equivalent_diameter * 2.0));
        assert!(f64_eq(scaled.major_axis_length, base.major_axis_length * 2.0));
        assert!(f64_eq(scaled.minor_axis_length, base.minor_axis_length * 2.0));
        assert!(f64_eq(scaled.orientation, base.orientation));
        assert!(f64_eq(scaled.ratio_minor_major, base.ratio_minor_major));
    }

    /// 4x4 实心方块在加权边界方案下的周长恰为 12.
    #[test]
    fn test_square_perimeter() {
        let mut patch = Array2::<f64>::zeros((8, 8));
        for h in 2..6 {
            for w in 2..6 {
                patch[(h, w)] = 1.0;
            }
        }
        let p = dominant_region_properties(patch.view(), None).unwrap();
        assert!((p.perimeter - 12.0).abs() < 1e-9);
    }

    /// 圆环: 欧拉数为 0 (一个孔洞), 实心度明显小于 1.
    #[test]
    fn test_ring_euler_and_solidity() {
        let outer = disk_patch((20, 20), (10.0, 10.0), 6.0);
        let inner = disk_patch((20, 20), (10.0, 10.0), 2.5);
        let ring = &outer - &inner;
        let p = dominant_region_properties(ring.view(), None).unwrap();
        assert_eq!(p.euler_number, 0);
        assert!(p.solidity < 0.9);
    }

    /// 插值产生的弱前景 (<= 0.5) 不参与标记.
    #[test]
    fn test_threshold() {
        let mut patch = Array2::<f64>::zeros((5, 5));
        patch[(2, 2)] = 1.0;
        patch[(2, 3)] = 0.4;
        let p = dominant_region_properties(patch.view(), None).unwrap();
        assert_eq!(p.area, 1.0);
    }
}
