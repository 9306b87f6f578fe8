//! 通用常量.

/// 单通道颜色.
pub mod gray {
    /// 分割体数据中, 背景的体素值.
    pub const SEG_BACKGROUND: u8 = 0;

    /// 分割体数据中, 脊髓前景的体素值.
    pub const SEG_CORD: u8 = 1;

    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;

    /// 体素是否是脊髓前景?
    #[inline]
    pub const fn is_cord(p: u8) -> bool {
        matches!(p, SEG_CORD)
    }

    /// 体素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, SEG_BACKGROUND)
    }
}

/// AP/RL 轴指派的主轴方向角阈值 (单位: 度).
///
/// 当主轴方向角严格落在 `(-AXIS_SWAP_DEG, AXIS_SWAP_DEG)` 开区间内时,
/// 主轴被标记为左右 (RL) 方向, 次轴为前后 (AP) 方向; 否则两者交换.
/// 该值基于脊髓横截面在接近轴对齐时左右方向通常宽于前后方向的解剖假设,
/// 不要在没有领域重新验证的情况下修改.
pub const AXIS_SWAP_DEG: f64 = 45.0;

/// 逐切片属性序列的缺失哨兵值.
pub const MISSING: f64 = f64::NAN;
