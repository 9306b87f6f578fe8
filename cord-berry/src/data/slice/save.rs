//! 图像的持久化存储.

use crate::consts::gray::*;
use crate::{SegSlice, SegSliceMut};
use image::ImageResult;
use ndarray::ArrayView2;
use std::path::Path;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// `ImgWriteVis` trait 的意图是, 图像将以 "可视化友好"
/// 的方式保存, 而不是 "as is" 的方式. 对于 `SegSlice`, `SegSliceMut`
/// 这类仅存在 0, 1 像素值的图像, 在保存时会映射到肉眼较易能区分的形式.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 表明一个可以通过 **按原样** 模式持久化存储的图像对象.
pub trait ImgWriteRaw {
    /// 按原样将图片保存到 `path` 路径.
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 使像素更有利于单通道可视化.
#[inline]
pub(crate) fn pretty(label: u8) -> u8 {
    match label {
        // 背景为黑色
        SEG_BACKGROUND => BLACK,

        // 脊髓为白色
        SEG_CORD => WHITE,

        any_else => panic!("只允许图像存在 0, 1 像素, 但发现了 `{any_else}`"),
    }
}

macro_rules! impl_seg_vis {
    ($($slice: ty),+) => {
        $(
            /// 会将背景/脊髓像素分别映射为黑色/白色. 不允许其他颜色.
            impl ImgWriteVis for $slice {
                fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    let (height, width) = self.shape();
                    let mut buf = image::GrayImage::new(width as u32, height as u32);
                    for ((h, w), &pix) in self.indexed_iter() {
                        buf.put_pixel(w as u32, h as u32, image::Luma([pretty(pix)]));
                    }
                    buf.save(path)
                }
            }
        )+
    };
}

macro_rules! impl_seg_raw {
    ($($slice: ty),+) => {
        $(
            /// 按原样存储.
            impl ImgWriteRaw for $slice {
                fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    let (height, width) = self.shape();
                    let mut buf = image::GrayImage::new(width as u32, height as u32);
                    for ((h, w), &pix) in self.indexed_iter() {
                        buf.put_pixel(w as u32, h as u32, image::Luma([pix]));
                    }
                    buf.save(path)
                }
            }
        )+
    };
}

impl_seg_vis!(SegSlice<'_>, SegSliceMut<'_>);
impl_seg_raw!(SegSlice<'_>, SegSliceMut<'_>);

/// 将角度校正后的 `f64` 工作切片以灰度形式保存到 `path`, 供人工质检.
///
/// 像素值会从 \[0, 1\] 线性映射到 \[0, 255\]; 超出范围的值会被截断.
pub fn save_patch_vis<P: AsRef<Path>>(patch: ArrayView2<f64>, path: P) -> ImageResult<()> {
    let &[height, width] = patch.shape() else {
        unreachable!()
    };
    let mut buf = image::GrayImage::new(width as u32, height as u32);
    for ((h, w), &v) in patch.indexed_iter() {
        let gray = (v.clamp(0.0, 1.0) * 255.0) as u8;
        buf.put_pixel(w as u32, h as u32, image::Luma([gray]));
    }
    buf.save(path)
}
