use crate::Idx2d;

/// 行优先索引迭代器, 遍历矩形窗口 `[h0, h1) x [w0, w1)` 内的所有索引.
///
/// 虽然如下函数也能实现相同的功能:
///
/// ```
/// type Idx2d = (usize, usize);
///
/// fn pos_iter_auto((h0, w0): Idx2d, (h1, w1): Idx2d) -> impl Iterator<Item = Idx2d> {
///     (h0..h1).flat_map(move |first| (w0..w1).map(move |second| (first, second)))
/// }
///
/// // ...
/// ```
///
/// 但该迭代器对象占用的空间更大. 连通区域搜索和包围盒内的前景遍历
/// ([`Mask::foreground_pos_in_box`](super::Mask::foreground_pos_in_box)) 都使用它.
#[derive(Debug, Clone)]
pub struct PosIter {
    cur_h: usize,
    cur_w: usize,
    w0: usize,
    h1: usize,
    w1: usize,
}

impl PosIter {
    /// 遍历整幅 `(h, w)` 图像.
    #[inline]
    pub fn new(shape: Idx2d) -> Self {
        Self::window((0, 0), shape)
    }

    /// 遍历窗口 `[h0, h1) x [w0, w1)`. 空窗口不产生任何索引.
    #[inline]
    pub fn window((h0, w0): Idx2d, (h1, w1): Idx2d) -> Self {
        Self {
            cur_h: h0,
            cur_w: w0,
            w0,
            h1,
            w1,
        }
    }

    /// 剩余索引个数.
    #[inline]
    fn remaining(&self) -> usize {
        if self.w0 >= self.w1 || self.cur_h >= self.h1 {
            return 0;
        }
        let row = self.w1 - self.w0;
        (self.h1 - self.cur_h) * row - (self.cur_w - self.w0)
    }
}

impl Iterator for PosIter {
    type Item = Idx2d;

    fn next(&mut self) -> Option<Self::Item> {
        if self.w0 >= self.w1 || self.cur_h >= self.h1 {
            return None;
        }
        let ret_pos = (self.cur_h, self.cur_w);
        if self.cur_w + 1 == self.w1 {
            self.cur_w = self.w0;
            self.cur_h += 1;
        } else {
            self.cur_w += 1;
        }
        Some(ret_pos)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for PosIter {}

#[cfg(test)]
mod completeness_tests {
    use super::PosIter;
    use crate::Idx2d;

    fn pos_iter_builtin((h0, w0): Idx2d, (h1, w1): Idx2d) -> impl Iterator<Item = Idx2d> {
        (h0..h1).flat_map(move |first| (w0..w1).map(move |second| (first, second)))
    }

    #[test]
    fn test_builtin_iter_size_larger() {
        use std::mem::size_of_val as sizeof;

        let tup = (1, 1);
        assert!(sizeof(&pos_iter_builtin((0, 0), tup)) > sizeof(&PosIter::new(tup)));
    }

    #[test]
    fn test_pos_iter_window() {
        for h0 in 0..=2 {
            for w0 in 0..=2 {
                for h1 in 0..=4 {
                    for w1 in 0..=4 {
                        let it = PosIter::window((h0, w0), (h1, w1));
                        let expected: Vec<_> = pos_iter_builtin((h0, w0), (h1, w1)).collect();
                        assert_eq!(it.len(), expected.len());
                        assert!(Iterator::eq(it, expected));
                    }
                }
            }
        }
    }
}
