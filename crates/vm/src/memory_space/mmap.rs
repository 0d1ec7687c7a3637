//! 内存映射登记表

use crate::address::VpnRange;
use crate::file::VmFile;
use alloc::sync::Arc;
use alloc::vec::Vec;
use uapi::mm::{FIRST_MAP_ID, MapId};

/// 一个活跃的文件映射
pub struct MmapRecord {
    /// 映射标识符
    pub id: MapId,
    /// 私有重新打开的文件句柄，解除映射时关闭
    pub file: Arc<dyn VmFile>,
    /// 映射创建的页
    pub pages: VpnRange,
}

// 手动实现 Debug，因为 dyn VmFile 没有实现 Debug
impl core::fmt::Debug for MmapRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MmapRecord")
            .field("id", &self.id)
            .field("file", &"<dyn VmFile>")
            .field("pages", &self.pages)
            .finish()
    }
}

/// 进程的内存映射登记表
///
/// 标识符单调递增且从不复用。
#[derive(Debug)]
pub struct MmapRegistry {
    next_id: MapId,
    records: Vec<MmapRecord>,
}

impl MmapRegistry {
    /// 创建空登记表
    pub fn new() -> Self {
        Self {
            next_id: FIRST_MAP_ID,
            records: Vec::new(),
        }
    }

    /// 登记一个新映射，返回分配的标识符
    pub fn register(&mut self, file: Arc<dyn VmFile>, pages: VpnRange) -> MapId {
        let id = self.next_id;
        self.next_id += 1;
        self.records.push(MmapRecord { id, file, pages });
        id
    }

    /// 按标识符取出映射记录
    pub fn take(&mut self, id: MapId) -> Option<MmapRecord> {
        let idx = self.records.iter().position(|r| r.id == id)?;
        Some(self.records.remove(idx))
    }

    /// 按标识符查找映射记录
    pub fn get(&self, id: MapId) -> Option<&MmapRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// 取出全部映射记录
    pub fn take_all(&mut self) -> Vec<MmapRecord> {
        core::mem::take(&mut self.records)
    }

    /// 活跃映射数量
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 是否没有活跃映射
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for MmapRegistry {
    fn default() -> Self {
        Self::new()
    }
}
