//! 进度回调
//!
//! 库内只通过 [`ProgressCallback`] 汇报进度，具体显示方式（CLI 进度条、
//! 百分比输出或不显示）由调用方决定。

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

/// 进度条类型
#[derive(Debug, Clone)]
pub enum ProgressType {
    /// 不确定时长的操作
    Spinner,
    /// 已知总字节数的操作
    Bar { total: u64 },
}

#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub progress_type: ProgressType,
    /// 步骤前缀，十六进制步骤号
    pub prefix: String,
    pub message: String,
    pub current: Option<u64>,
}

/// 正在进行的操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressOperation {
    Connect,
    ChipErase,
    ErasePages { count: usize },
    WriteFlash { address: u32, size: u64 },
    ReadFlash { address: u32, size: u64 },
    ReadLock,
    WriteLock { value: u8 },
}

impl fmt::Display for ProgressOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressOperation::Connect => write!(f, "Connecting to chip..."),
            ProgressOperation::ChipErase => write!(f, "Erasing chip..."),
            ProgressOperation::ErasePages { count } => write!(f, "Erasing {} pages...", count),
            ProgressOperation::WriteFlash { address, size } => {
                write!(f, "Writing 0x{:X} bytes at 0x{:08X}...", size, address)
            }
            ProgressOperation::ReadFlash { address, size } => {
                write!(f, "Reading 0x{:X} bytes from 0x{:08X}...", size, address)
            }
            ProgressOperation::ReadLock => write!(f, "Reading lock byte..."),
            ProgressOperation::WriteLock { value } => {
                write!(f, "Writing lock byte 0x{:02X}...", value)
            }
        }
    }
}

/// 操作结束时的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Success,
    Failed,
    Aborted,
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressStatus::Success => write!(f, "Done"),
            ProgressStatus::Failed => write!(f, "Failed"),
            ProgressStatus::Aborted => write!(f, "Aborted"),
        }
    }
}

/// 进度回调 trait
///
/// 实现此 trait 以自定义进度的显示方式
pub trait ProgressCallback: Send + Sync {
    /// 开始一个新的进度条，返回用于后续更新的 ID
    fn start(&self, info: ProgressInfo) -> ProgressId;

    fn update_message(&self, id: ProgressId, message: String);

    /// 增加进度（仅对 Bar 类型有效）
    fn increment(&self, id: ProgressId, delta: u64);

    fn finish(&self, id: ProgressId, final_message: String);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgressId(pub u64);

/// 不产生任何输出的回调
#[derive(Debug, Default)]
pub struct NoOpProgressCallback;

impl ProgressCallback for NoOpProgressCallback {
    fn start(&self, _info: ProgressInfo) -> ProgressId {
        ProgressId(0)
    }

    fn update_message(&self, _id: ProgressId, _message: String) {}

    fn increment(&self, _id: ProgressId, _delta: u64) {}

    fn finish(&self, _id: ProgressId, _final_message: String) {}
}

pub type ProgressCallbackArc = Arc<dyn ProgressCallback>;

pub fn no_op_progress_callback() -> ProgressCallbackArc {
    Arc::new(NoOpProgressCallback)
}

/// 进度条助手，负责分配步骤号
#[derive(Clone)]
pub struct ProgressHelper {
    callback: ProgressCallbackArc,
    step_counter: Arc<AtomicI32>,
}

impl Default for ProgressHelper {
    fn default() -> Self {
        Self::new(no_op_progress_callback(), 0)
    }
}

impl ProgressHelper {
    pub fn new(callback: ProgressCallbackArc, initial_step: i32) -> Self {
        Self {
            callback,
            step_counter: Arc::new(AtomicI32::new(initial_step)),
        }
    }

    fn next_step(&self) -> i32 {
        self.step_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn create_spinner(&self, operation: ProgressOperation) -> ProgressHandler {
        let step = self.next_step();
        let info = ProgressInfo {
            progress_type: ProgressType::Spinner,
            prefix: format!("0x{:02X}", step),
            message: operation.to_string(),
            current: None,
        };
        let id = self.callback.start(info);
        ProgressHandler {
            callback: Arc::clone(&self.callback),
            id,
            operation,
            finished: false,
        }
    }

    pub fn create_bar(&self, total: u64, operation: ProgressOperation) -> ProgressHandler {
        let step = self.next_step();
        let info = ProgressInfo {
            progress_type: ProgressType::Bar { total },
            prefix: format!("0x{:02X}", step),
            message: operation.to_string(),
            current: Some(0),
        };
        let id = self.callback.start(info);
        ProgressHandler {
            callback: Arc::clone(&self.callback),
            id,
            operation,
            finished: false,
        }
    }

    pub fn current_step(&self) -> i32 {
        self.step_counter.load(Ordering::SeqCst)
    }
}

/// 单个进度条
///
/// 未调用 [`finish`](ProgressHandler::finish) 就被丢弃时（例如 `?` 提前返回），
/// 以 Aborted 结束。
pub struct ProgressHandler {
    callback: ProgressCallbackArc,
    id: ProgressId,
    operation: ProgressOperation,
    finished: bool,
}

impl ProgressHandler {
    pub fn set_message(&self, message: impl Into<String>) {
        self.callback.update_message(self.id, message.into());
    }

    pub fn inc(&self, delta: u64) {
        self.callback.increment(self.id, delta);
    }

    pub fn finish(mut self, status: ProgressStatus) {
        self.finished = true;
        self.callback
            .finish(self.id, format!("{} {}", self.operation, status));
    }

    pub fn finish_with_message(mut self, message: impl Into<String>) {
        self.finished = true;
        self.callback.finish(self.id, message.into());
    }
}

impl Drop for ProgressHandler {
    fn drop(&mut self) {
        if !self.finished {
            self.callback.finish(self.id, ProgressStatus::Aborted.to_string());
        }
    }
}
