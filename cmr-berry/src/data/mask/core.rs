use super::PosIter;
use crate::consts::gray::*;
use crate::{Area2d, Areas2d, Idx2d, Predicate};
use ndarray::{Array2, ArrayView2, Zip};
use std::collections::{HashSet, VecDeque};
use std::ops::{Index, IndexMut};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 不可变、借用的二维二值掩膜.
#[derive(Clone, Copy)]
pub struct Mask<'a> {
    /// 底层数据的轻量级视图, 借用于 [`OwnedMask`] 或调用方的数组.
    ///
    /// 这里有意把代码写死为 `ArrayView` 降低灵活性, 但使结构的意图更加明确.
    data: ArrayView2<'a, u8>,
}

impl Index<Idx2d> for Mask<'_> {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl<'a> From<ArrayView2<'a, u8>> for Mask<'a> {
    #[inline]
    fn from(data: ArrayView2<'a, u8>) -> Self {
        Self { data }
    }
}

/// 不可变方法集合.
impl<'a> Mask<'a> {
    /// 直接初始化.
    #[inline]
    pub fn new(data: ArrayView2<'a, u8>) -> Self {
        Self { data }
    }

    /// 获得 **底层** 数据的一份不可变 shallow copy.
    #[inline]
    pub fn array_view(&self) -> ArrayView2<'a, u8> {
        self.data
    }

    /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<&u8> {
        self.data.get(pos)
    }

    /// 给定位置 (高, 宽) 是否是前景? 越界时视为背景.
    #[inline]
    pub fn is_foreground_at(&self, pos: Idx2d) -> bool {
        matches!(self.get(pos), Some(&p) if is_foreground(p))
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 判断一个索引是否合法 (未越界).
    #[inline]
    pub fn check(&self, (h, w): Idx2d) -> bool {
        let (h_len, w_len) = self.shape();
        h < h_len && w < w_len
    }

    /// 统计前景像素总个数.
    #[inline]
    pub fn count_foreground(&self) -> usize {
        self.data.iter().filter(|&&p| is_foreground(p)).count()
    }

    /// 以行优先规则, 获取能迭代图像所有 `(索引, 像素值)` 的迭代器.
    #[inline]
    pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &u8)> + '_ {
        self.data.indexed_iter()
    }

    /// 获取所有前景像素的索引, 结果按行优先存储.
    pub fn foreground_pos<B: FromIterator<Idx2d>>(&self) -> B {
        self.indexed_iter()
            .filter_map(|(pos, pixel)| is_foreground(*pixel).then_some(pos))
            .collect()
    }

    /// 前景像素的包围盒 `((h0, w0), (h1, w1))`, 左闭右开. 全背景时返回 `None`.
    pub fn bounding_box(&self) -> Option<(Idx2d, Idx2d)> {
        self.indexed_iter()
            .filter(|(_, p)| is_foreground(**p))
            .fold(None, |acc, ((h, w), _)| match acc {
                None => Some(((h, w), (h + 1, w + 1))),
                Some(((h0, w0), (h1, w1))) => {
                    Some(((h0.min(h), w0.min(w)), (h1.max(h + 1), w1.max(w + 1))))
                }
            })
    }

    /// 以行优先规则迭代包围盒内的前景像素索引. 全背景时不产生任何索引.
    pub fn foreground_pos_in_box(&self) -> impl Iterator<Item = Idx2d> + 'a {
        let mask = *self;
        let (lo, hi) = mask.bounding_box().unwrap_or(((0, 0), (0, 0)));
        PosIter::window(lo, hi).filter(move |&pos| mask.is_foreground_at(pos))
    }

    /// 按照 4-相邻规则获取所有区域. 两个像素 `p1` 和 `p2` 属于同一个区域,
    /// 当且仅当存在一条从 `p1` 到 `p2` 的 4-相邻路径, 且路径上的所有像素
    /// (包括 `p1` 和 `p2`) 都满足谓词 `pred`.
    pub fn areas(&self, pred: Predicate) -> Areas2d {
        let mut ans = Areas2d::with_capacity(1);
        let mut bfs_q = VecDeque::with_capacity(4);
        let mut set = HashSet::with_capacity(16);

        for pos in PosIter::new(self.shape()) {
            if set.contains(&pos) || !pred(self[pos]) {
                continue;
            }
            bfs_q.push_back(pos);
            let mut this_area = Area2d::with_capacity(1);
            while let Some(cur_pos) = bfs_q.pop_front() {
                if !set.insert(cur_pos) {
                    continue;
                }
                this_area.push(cur_pos);

                let (cur_h, cur_w) = cur_pos;
                let neighbours = [
                    (cur_h.wrapping_sub(1), cur_w),
                    (cur_h.saturating_add(1), cur_w),
                    (cur_h, cur_w.wrapping_sub(1)),
                    (cur_h, cur_w.saturating_add(1)),
                ];
                bfs_q.extend(
                    neighbours
                        .into_iter()
                        .filter(|p| self.check(*p) && pred(self[*p]) && !set.contains(p)),
                );
            }
            ans.push(this_area);
        }
        ans
    }

    /// 按照 4-相邻原则获得图像中所有前景区域.
    #[inline]
    pub fn foreground_areas(&self) -> Areas2d {
        self.areas(is_foreground)
    }
}

/// 拥有所有权的二维二值掩膜.
///
/// 提供到 [`Mask`] 的轻量转换, 逐像素集合运算和写入操作.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedMask {
    data: Array2<u8>,
}

impl Index<Idx2d> for OwnedMask {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx2d> for OwnedMask {
    #[inline]
    fn index_mut(&mut self, index: Idx2d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl From<Array2<u8>> for OwnedMask {
    #[inline]
    fn from(data: Array2<u8>) -> Self {
        Self { data }
    }
}

impl OwnedMask {
    /// 创建形状为 `(h, w)` 的全背景掩膜.
    #[inline]
    pub fn zeros((h, w): Idx2d) -> Self {
        Self {
            data: Array2::from_elem((h, w), MASK_BACKGROUND),
        }
    }

    /// 获得不可变掩膜引用.
    #[inline]
    pub fn as_view(&self) -> Mask<'_> {
        Mask::new(self.data.view())
    }

    /// 直接获得底层数据.
    #[inline]
    pub fn into_raw(self) -> Array2<u8> {
        self.data
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 统计前景像素总个数.
    #[inline]
    pub fn count_foreground(&self) -> usize {
        self.as_view().count_foreground()
    }

    /// 将第 `h` 行 `[w0, w1)` 范围内的像素设为前景. 越界部分被截断.
    pub fn fill_row(&mut self, h: usize, w0: usize, w1: usize) {
        let (height, width) = self.shape();
        if h >= height {
            return;
        }
        let w1 = w1.min(width);
        for w in w0..w1 {
            self.data[(h, w)] = MASK_FOREGROUND;
        }
    }

    /// 就地求并集. 两个掩膜形状必须一致, 否则程序 panic.
    pub fn union_with(&mut self, other: Mask<'_>) {
        assert_eq!(self.shape(), other.shape(), "掩膜形状不一致");
        Zip::from(&mut self.data)
            .and(&other.array_view())
            .for_each(|a, &b| *a = to_gray(is_foreground(*a) || is_foreground(b)));
    }

    /// 就地求交集. 两个掩膜形状必须一致, 否则程序 panic.
    pub fn intersect_with(&mut self, other: Mask<'_>) {
        assert_eq!(self.shape(), other.shape(), "掩膜形状不一致");
        Zip::from(&mut self.data)
            .and(&other.array_view())
            .for_each(|a, &b| *a = to_gray(is_foreground(*a) && is_foreground(b)));
    }

    /// 就地求差集 `self - other`. 两个掩膜形状必须一致, 否则程序 panic.
    pub fn subtract(&mut self, other: Mask<'_>) {
        assert_eq!(self.shape(), other.shape(), "掩膜形状不一致");
        Zip::from(&mut self.data)
            .and(&other.array_view())
            .for_each(|a, &b| *a = to_gray(is_foreground(*a) && is_background(b)));
    }
}

/// `bool` -> 掩膜像素值.
#[inline]
const fn to_gray(fg: bool) -> u8 {
    if fg {
        MASK_FOREGROUND
    } else {
        MASK_BACKGROUND
    }
}
