//! 按采集缓存排序结果.
//!
//! 每个采集标识对应一个 [`OnceCell`]. 第一个调用者负责计算, 同时到达的其它调用者阻塞等待,
//! 之后的调用只是克隆一个 `Arc`. 缓存没有淘汰策略, 只能显式失效.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use once_cell::sync::{Lazy, OnceCell};

use super::{sort_acquisition, DepthTimeIndex, SortResult};
use crate::Acquisition;

type Slot = Arc<OnceCell<SortResult<Arc<DepthTimeIndex>>>>;

static GLOBAL_CACHE: Lazy<SortCache> = Lazy::new(SortCache::new);

/// 以采集标识为键的排序结果缓存. 可在多线程间共享.
#[derive(Debug, Default)]
pub struct SortCache {
    slots: Mutex<HashMap<String, Slot>>,
    computations: AtomicUsize,
}

impl SortCache {
    /// 创建空缓存.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 进程级共享缓存.
    #[inline]
    pub fn global() -> &'static SortCache {
        &GLOBAL_CACHE
    }

    /// 取得槽位表的锁. 持锁线程 panic 不影响表本身的一致性, 因此忽略中毒.
    #[inline]
    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 获取采集 `acq` 的排序结果; 尚未计算时计算并缓存.
    ///
    /// 错误同样会被缓存, 直到调用 [`Self::invalidate`].
    pub fn get_or_compute(&self, acq: &Acquisition) -> SortResult<Arc<DepthTimeIndex>> {
        // 计算期间不持有表锁, 其它采集不受阻塞.
        let slot = self.slots().entry(acq.id().to_string()).or_default().clone();
        slot.get_or_init(|| {
            self.computations.fetch_add(1, Ordering::SeqCst);
            debug!("排序采集 `{}` ({} 张图像)", acq.id(), acq.len());
            sort_acquisition(acq).map(Arc::new)
        })
        .clone()
    }

    /// 获取已缓存的成功结果, 不触发计算.
    pub fn get(&self, id: &str) -> Option<Arc<DepthTimeIndex>> {
        let slot = self.slots().get(id).cloned()?;
        let result = slot.get()?;
        result.as_ref().ok().cloned()
    }

    /// 使采集 `id` 的缓存失效. 返回是否存在该缓存.
    pub fn invalidate(&self, id: &str) -> bool {
        self.slots().remove(id).is_some()
    }

    /// 清空缓存.
    pub fn clear(&self) {
        self.slots().clear();
    }

    /// 已缓存的采集个数 (包括正在计算的).
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    /// 缓存是否为空?
    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    /// 自创建以来实际执行排序的次数.
    #[inline]
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::SeqCst)
    }
}
