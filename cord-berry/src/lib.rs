#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供脊髓 MRI 二值分割文件的结构化信息和沿中线的横截面形态学分析算法.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 输入分割必须已经处于规范的轴向方位 (z 为扫描深度方向, h 为前后方向,
//!   w 为左右方向); 该 crate 不负责体素重定向.
//! 2. 在非期望情况下 (如索引越界), 程序会直接 panic, 而不会导致内存错误.
//!   As what Rust promises. 可恢复的错误以 `Result` 返回.
//!
//! # 开发计划
//!
//! ### 切片角度校正 ✅
//!
//! 根据中线切向量与切片法向的夹角, 对 2D 切片进行各向异性缩放重采样.
//!
//! 实现位于 `cord-berry/src/shape/angle.rs`.
//!
//! ### 连通区域形态学描述符 ✅
//!
//! 标记连通前景区域, 选取最大区域, 并计算其矩、偏心率、主次轴长、周长、
//! 实心度、欧拉数等描述符.
//!
//! 实现位于 `cord-berry/src/shape/region.rs`.
//!
//! ### AP/RL 解剖轴指派 ✅
//!
//! 按照主轴方向角把椭圆主次轴映射到前后 (AP) / 左右 (RL) 解剖直径.
//!
//! 实现位于 `cord-berry/src/shape/axis.rs`.
//!
//! ### 逐切片属性序列 ✅
//!
//! 沿深度方向迭代, 汇合出 8 个固定属性的全长度序列, 缺失切片以 NaN 标记.
//!
//! 实现位于 `cord-berry/src/shape/mod.rs`.
//!
//! ### 中线拟合 ✅
//!
//! 从逐切片前景质心出发, 以最小二乘多项式 / 三次样条 / Hann
//! 窗平滑三种方式拟合中线及其逐切片导数.
//!
//! 实现位于 `cord-berry/src/{centerline.rs, fitting}`.
//!
//! ### 二值化 ✅
//!
//! 将标量 (如概率) 扫描以固定阈值或 Otsu 法转换为二值分割.
//!
//! 实现位于 `cord-berry/src/imgproc.rs`.
//!
//! ### 完善代码文档 ✅
//!
//! 给每个 public API 提供文档, 并视情况给 private API 提供文档.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 高精度通用索引 / 向量.
pub type Idx2dF = (f64, f64);

type Predicate = fn(u8) -> bool;

/// 3D 脊髓 nii 文件基础数据结构.
mod data;

pub use data::{
    CordSeg, ImgWriteRaw, ImgWriteVis, MriScan, NiftiHeaderAttr, OwnedSegSlice, SegSlice,
    SegSliceMut,
};

pub use data::slice::save_patch_vis;

pub mod consts;

pub mod centerline;

pub mod fitting;

pub mod imgproc;

pub mod shape;

pub mod prelude;
