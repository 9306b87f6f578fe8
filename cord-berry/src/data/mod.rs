use std::ops::{Index, IndexMut};
use std::path::Path;

use itertools::{Itertools, MinMaxResult};
use ndarray::{Array3, ArrayView, ArrayViewMut, Axis, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::consts::gray::*;
use crate::{Idx2d, Idx3d};

pub mod slice;

pub use slice::{ImgWriteRaw, ImgWriteVis, OwnedSegSlice, SegSlice, SegSliceMut};

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// 将 (W, H, z) 转换成 (z, H, W). 以后均按照该模式访问.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    // [W, H, z]. 体素个数数组.
    let [_, w, h, z, ..] = h.dim;
    (z as usize, h as usize, w as usize)
}

/// 3D nii 文件 header 的共用属性和部分通用操作.
pub trait NiftiHeaderAttr {
    /// 获取 header 部分.
    fn header(&self) -> &NiftiHeader;

    /// 获取数据形状大小.
    #[inline]
    fn shape(&self) -> Idx3d {
        get_shape_from_header(self.header())
    }

    /// 获取数据水平切片形状大小.
    #[inline]
    fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取水平切片个数.
    #[inline]
    fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 检查索引是否合法.
    #[inline]
    fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }

    /// 获取单个体素分辨率. 该分辨率以毫米为单位, 分别代表深度 (相邻切片方向),
    /// 高 (横截面的前后方向), 宽 (横截面的左右方向).
    ///
    /// 该值也可以通过 `self.{z_mm, height_mm, width_mm}` 分别获取.
    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        let [_, w, h, z, ..] = self.header().pixdim;
        [z as f64, h as f64, w as f64]
    }

    /// 获取 width 方向 (左右/RL 方向) 体素分辨率, 以毫米为单位.
    #[inline]
    fn width_mm(&self) -> f64 {
        self.header().pixdim[1] as f64
    }

    /// 获取 height 方向 (前后/AP 方向) 体素分辨率, 以毫米为单位.
    #[inline]
    fn height_mm(&self) -> f64 {
        self.header().pixdim[2] as f64
    }

    /// 获取深度方向 (相邻 2D 切片的方向) 体素分辨率, 以毫米为单位.
    #[inline]
    fn z_mm(&self) -> f64 {
        self.header().pixdim[3] as f64
    }

    /// 获取横截面内的体素分辨率 `(height_mm, width_mm)`, 以毫米为单位.
    #[inline]
    fn in_plane_mm(&self) -> (f64, f64) {
        (self.height_mm(), self.width_mm())
    }

    /// 体素分辨率在三个维度上是否是各向同的?
    #[inline]
    fn is_isotropic(&self) -> bool {
        let [z, h, w] = self.pix_dim();
        z == h && z == w
    }

    /// 体素分辨率在横截面的两个维度上是否是各向同的?
    ///
    /// 形态学描述符的物理缩放假设横截面内各向同性;
    /// 各向异性时以 width 方向分辨率近似 (接受的近似, 不报错).
    #[inline]
    fn is_in_plane_isotropic(&self) -> bool {
        self.height_mm() == self.width_mm()
    }

    /// 获取体素的实际体积值, 以立方毫米为单位.
    #[inline]
    fn voxel(&self) -> f64 {
        self.pix_dim().iter().product()
    }

    /// 获取水平切片方向的像素实际面积值, 以平方毫米为单位.
    #[inline]
    fn slice_pixel(&self) -> f64 {
        self.pix_dim().iter().skip(1).product()
    }
}

/// nii 格式 3D MRI 扫描, 包括 header 和标量数据 (如概率分割). 值以 `f32` 保存.
#[derive(Debug, Clone)]
pub struct MriScan {
    header: BoxedHeader,
    data: Array3<f32>,
}

impl NiftiHeaderAttr for MriScan {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx3d> for MriScan {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for MriScan {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl MriScan {
    /// 打开 nii 文件格式的 3D MRI 扫描. `path` 为 nii 文件的本地路径.
    /// 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> nifti::Result<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = Box::new(obj.header().clone());

        // [W, H, z] -> [z, H, W].
        // hint: 原第一维向下增长, 原第二维向右增长.
        let data = obj
            .into_volume()
            .into_ndarray::<f32>()?
            .permuted_axes([2, 1, 0].as_slice());

        // The nature of nifti data field layout.
        debug_assert!(data.is_standard_layout());

        // 该操作不会生成 `Err`, 可直接 unwrap.
        let data =
            Array3::<f32>::from_shape_vec(get_shape_from_header(&header), data.into_raw_vec())
                .unwrap();

        Ok(Self { header, data })
    }

    /// 根据裸标量数据和部分元信息直接创建 `MriScan` 实体.
    ///
    /// # 参数
    ///
    /// 1. `data` 按照 nifti 惯用标准以 \[w, h, z\] 格式存储.
    /// 2. `pix_dim` 按照 \[w, h, z\] 格式存储.
    ///
    /// # 注意
    ///
    /// 该方法可能会创建不一致的实体, 因此你应仅将其用于实验目的.
    pub fn fake(data: Array3<f32>, pix_dim: [f32; 3]) -> Self {
        let (header, data) = fake_parts(data, pix_dim);
        Self { header, data }
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, f32, Ix3> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut<'_, f32, Ix3> {
        self.data.view_mut()
    }
}

/// `fake` 系构造函数的公共部分: 轴重排 + 伪造 header.
fn fake_parts<T: Clone>(data: Array3<T>, pix_dim: [f32; 3]) -> (BoxedHeader, Array3<T>) {
    let (w_len, h_len, z_len) = {
        let &[w, h, z] = data.shape() else {
            unreachable!()
        };
        (w, h, z)
    };
    let data = data.permuted_axes([2, 1, 0]);
    let data = if data.is_standard_layout() {
        data
    } else {
        data.as_standard_layout().to_owned()
    };
    debug_assert!(data.is_standard_layout());

    let mut header = Box::<NiftiHeader>::default();
    header.dim = [3, w_len as u16, h_len as u16, z_len as u16, 1, 1, 1, 1];
    let [_, pw, ph, pz, ..] = &mut header.pixdim;
    let [w, h, z] = &pix_dim;
    (*pw, *ph, *pz) = (*w, *h, *z);
    header.intent_name[..4].copy_from_slice(b"fake");

    (header, data)
}

/// nii 格式 3D 脊髓二值分割, 包括 header 和标签数据. 标签值以 `u8` 保存.
#[derive(Debug, Clone)]
pub struct CordSeg {
    header: BoxedHeader,
    data: Array3<u8>,
}

impl NiftiHeaderAttr for CordSeg {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx3d> for CordSeg {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for CordSeg {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl CordSeg {
    /// 打开 nii 文件格式的 3D 脊髓分割. `path` 为 nii 文件的本地路径.
    /// 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> nifti::Result<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = Box::new(obj.header().clone());

        // [W, H, z] -> [z, H, W]
        // hint: 原第一维向下增长, 原第二维向右增长.
        let data = obj
            .into_volume()
            .into_ndarray::<u8>()?
            .permuted_axes([2, 1, 0].as_slice());

        // The nature of nifti data field layout.
        debug_assert!(data.is_standard_layout());

        // 该操作不会生成 `Err`, 可直接 unwrap.
        let data =
            Array3::<u8>::from_shape_vec(get_shape_from_header(&header), data.into_raw_vec())
                .unwrap();

        Ok(Self { header, data })
    }

    /// 根据裸标签数据和部分元信息直接创建 `CordSeg` 实体.
    ///
    /// # 参数
    ///
    /// 1. `data` 的体素值必须为 0 或 1. 否则程序行为未定义.
    /// 2. `data` 按照 nifti 惯用标准以 \[w, h, z\] 格式存储.
    /// 3. `pix_dim` 按照 \[w, h, z\] 格式存储.
    ///
    /// # 注意
    ///
    /// 该方法可能会创建不一致的实体, 因此你应仅将其用于实验目的.
    pub fn fake(data: Array3<u8>, pix_dim: [f32; 3]) -> Self {
        let (header, data) = fake_parts(data, pix_dim);
        Self { header, data }
    }

    /// 直接创建数据, 复用已有的 header.
    ///
    /// # 注意
    ///
    /// **目前** 你应当使输入满足以下性质, 否则程序行为未定义:
    ///
    /// 1. `data` 按照 \[width, height, z\] 组织, 体素值必须为 0 或 1.
    /// 2. `header` 必须与 `data` 的形状一致.
    #[inline]
    pub fn fake_with_header(header: &NiftiHeader, data: Array3<u8>) -> Self {
        let data = data.permuted_axes([2, 1, 0]);
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };
        debug_assert!(data.is_standard_layout());

        let mut header = Box::new(header.clone());
        header.intent_name[..4].copy_from_slice(b"fake");
        Self { header, data }
    }

    /// 判断该结构是否是由 `fake_*` 方法手动拼接的.
    pub fn is_faked(&self) -> bool {
        self.header.intent_name.starts_with(b"fake")
    }

    /// 由已经处于 `[z, H, W]` 规范顺序的数据和 header 直接组装.
    /// 仅供 crate 内部 (如二值化) 使用.
    #[inline]
    pub(crate) fn from_canonical(header: BoxedHeader, data: Array3<u8>) -> Self {
        debug_assert_eq!(get_shape_from_header(&header), data.dim());
        Self { header, data }
    }

    /// 获取 3D 分割 z 空间的第 `z_index` 层不可变切片.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> SegSlice {
        SegSlice::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 获取 3D 分割 z 空间的第 `z_index` 层可变切片.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at_mut(&mut self, z_index: usize) -> SegSliceMut {
        SegSliceMut::new(self.data.index_axis_mut(Axis(0), z_index))
    }

    /// 获取能按升序迭代 3D 分割水平不可变切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = SegSlice> {
        self.data.axis_iter(Axis(0)).map(SegSlice::new)
    }

    /// 获取能按升序迭代 3D 分割水平可变切片的迭代器.
    #[inline]
    pub fn slice_iter_mut(&mut self) -> impl ExactSizeIterator<Item = SegSliceMut> {
        self.data.axis_iter_mut(Axis(0)).map(SegSliceMut::new)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, u8, Ix3> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut<'_, u8, Ix3> {
        self.data.view_mut()
    }

    /// 获取 3D 分割中值为 `label` 的体素个数.
    #[inline]
    pub fn count(&self, label: u8) -> usize {
        self.data.iter().filter(|p| **p == label).count()
    }

    /// 获取含有脊髓前景体素的切片的包含式深度范围 `(min_z, max_z)`.
    ///
    /// 范围内部允许存在无前景的切片. 如果整个分割都不含前景, 则返回 `None`.
    pub fn nonzero_z_range(&self) -> Option<(usize, usize)> {
        let minmax = self
            .slice_iter()
            .enumerate()
            .filter(|(_, s)| !s.is_background())
            .map(|(iz, _)| iz)
            .minmax();
        match minmax {
            MinMaxResult::NoElements => None,
            MinMaxResult::OneElement(z) => Some((z, z)),
            MinMaxResult::MinMax(lo, hi) => Some((lo, hi)),
        }
    }

    /// 获取第 `z_index` 层前景像素的质心 `(h, w)`. 没有前景时返回 `None`.
    ///
    /// 当 `z_index` 越界时 panic.
    pub fn slice_centroid(&self, z_index: usize) -> Option<crate::Idx2dF> {
        self.slice_at(z_index).centroid(is_cord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    /// 构造一个 \[w, h, z\] 格式的测试分割.
    fn seg_with_fg(z_fg: &[usize]) -> CordSeg {
        let mut data = Array3::<u8>::zeros((8, 8, 6));
        for &z in z_fg {
            data[(4, 3, z)] = SEG_CORD;
        }
        CordSeg::fake(data, [1.0, 1.0, 1.0])
    }

    #[test]
    fn test_fake_shape_and_pix_dim() {
        let seg = seg_with_fg(&[0]);
        assert!(seg.is_faked());
        // [w, h, z] -> (z, h, w)
        assert_eq!(seg.shape(), (6, 8, 8));
        assert_eq!(seg.len_z(), 6);
        assert_eq!(seg.pix_dim(), [1.0, 1.0, 1.0]);
        assert!(seg.is_isotropic());
        assert!(seg.is_in_plane_isotropic());
    }

    #[test]
    fn test_fake_axis_order() {
        let mut data = Array3::<u8>::zeros((8, 8, 6));
        data[(4, 3, 2)] = SEG_CORD; // (w, h, z)
        let seg = CordSeg::fake(data, [1.0, 1.0, 1.0]);
        assert_eq!(seg[(2, 3, 4)], SEG_CORD); // (z, h, w)
        assert_eq!(seg.count(SEG_CORD), 1);
    }

    #[test]
    fn test_nonzero_z_range() {
        assert_eq!(seg_with_fg(&[]).nonzero_z_range(), None);
        assert_eq!(seg_with_fg(&[3]).nonzero_z_range(), Some((3, 3)));
        // 范围内部允许间断.
        assert_eq!(seg_with_fg(&[1, 2, 5]).nonzero_z_range(), Some((1, 5)));
    }

    #[test]
    fn test_slice_centroid() {
        let seg = seg_with_fg(&[2]);
        assert_eq!(seg.slice_centroid(0), None);
        assert_eq!(seg.slice_centroid(2), Some((3.0, 4.0)));
    }
}
