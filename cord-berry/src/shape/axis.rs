//! AP/RL 解剖轴指派.
//!
//! 连通区域的主轴本身不携带解剖含义. 这里按主轴方向角把主次轴长
//! 映射到前后 (AP) / 左右 (RL) 解剖直径: 当截面接近轴对齐时,
//! 脊髓通常左右方向宽于前后方向, 因此小角度时主轴视为 RL.

use crate::consts::AXIS_SWAP_DEG;

/// 由主轴方向角 (单位: 度, 自 RL 轴起算) 把主次轴长映射为
/// `(AP 直径, RL 直径)`.
///
/// 方向角严格落在 `(-45, 45)` 开区间内时主轴为 RL; 否则 (包括恰好
/// ±45 度的边界) 两者交换. 边界归属使用严格不等号, 不要改为 `<=`.
#[inline]
pub fn assign_ap_rl(orientation_deg: f64, major: f64, minor: f64) -> (f64, f64) {
    if -AXIS_SWAP_DEG < orientation_deg && orientation_deg < AXIS_SWAP_DEG {
        (minor, major)
    } else {
        (major, minor)
    }
}

#[cfg(test)]
mod tests {
    use super::assign_ap_rl;

    const MAJOR: f64 = 10.0;
    const MINOR: f64 = 4.0;

    #[test]
    fn test_near_axis_aligned() {
        // 主轴接近 RL 轴: 主轴标为 RL.
        for deg in [0.0, 30.0, -30.0, 44.999, -44.999] {
            assert_eq!(assign_ap_rl(deg, MAJOR, MINOR), (MINOR, MAJOR));
        }
    }

    #[test]
    fn test_swapped() {
        // 主轴接近 AP 轴: 主轴标为 AP.
        for deg in [60.0, -60.0, 90.0, 89.9, -75.0] {
            assert_eq!(assign_ap_rl(deg, MAJOR, MINOR), (MAJOR, MINOR));
        }
    }

    /// 恰好 ±45 度落入交换分支 (严格不等号).
    #[test]
    fn test_boundary_exact() {
        assert_eq!(assign_ap_rl(45.0, MAJOR, MINOR), (MAJOR, MINOR));
        assert_eq!(assign_ap_rl(-45.0, MAJOR, MINOR), (MAJOR, MINOR));
    }
}
