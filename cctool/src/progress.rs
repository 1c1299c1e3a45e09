//! 命令行进度显示
//!
//! 终端下用 indicatif 进度条，输出被重定向时退化为逐行打印百分比。

use cctool_lib::progress::{ProgressCallback, ProgressId, ProgressInfo, ProgressType};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct PercentState {
    /// Spinner 没有总量
    total: Option<u64>,
    current: u64,
    last_percent: u64,
}

/// 逐行输出 `[step] message NN%` 的进度回调
pub struct PercentProgressCallback {
    states: Mutex<HashMap<u64, (String, PercentState)>>,
    next_id: AtomicU64,
}

impl PercentProgressCallback {
    pub fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn print_line(prefix: &str, message: &str) {
        let mut stdout = io::stdout();
        let _ = writeln!(stdout, "[{}] {}", prefix, message);
        let _ = stdout.flush();
    }

    fn percent(current: u64, total: u64) -> u64 {
        if total == 0 {
            return 100;
        }
        (current.saturating_mul(100) / total).min(100)
    }
}

impl Default for PercentProgressCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCallback for PercentProgressCallback {
    fn start(&self, info: ProgressInfo) -> ProgressId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let state = match info.progress_type {
            ProgressType::Spinner => {
                Self::print_line(&info.prefix, &info.message);
                PercentState {
                    total: None,
                    current: 0,
                    last_percent: 0,
                }
            }
            ProgressType::Bar { total } => {
                let current = info.current.unwrap_or(0);
                let percent = Self::percent(current, total);
                Self::print_line(&info.prefix, &format!("{} {}%", info.message, percent));
                PercentState {
                    total: Some(total),
                    current,
                    last_percent: percent,
                }
            }
        };
        if let Ok(mut states) = self.states.lock() {
            states.insert(id, (info.prefix, state));
        }
        ProgressId(id)
    }

    fn update_message(&self, _id: ProgressId, _message: String) {}

    fn increment(&self, id: ProgressId, delta: u64) {
        let Ok(mut states) = self.states.lock() else {
            return;
        };
        if let Some((prefix, state)) = states.get_mut(&id.0)
            && let Some(total) = state.total
        {
            state.current = state.current.saturating_add(delta);
            let percent = Self::percent(state.current, total);
            // 每 10% 打印一次
            if percent / 10 != state.last_percent / 10 {
                state.last_percent = percent;
                Self::print_line(prefix, &format!("{}%", percent));
            }
        }
    }

    fn finish(&self, id: ProgressId, final_message: String) {
        let removed = self.states.lock().ok().and_then(|mut s| s.remove(&id.0));
        if let Some((prefix, _)) = removed {
            Self::print_line(&prefix, &final_message);
        }
    }
}

/// 基于 indicatif 的进度回调
pub struct IndicatifProgressCallback {
    multi_progress: MultiProgress,
    bars: Mutex<HashMap<u64, ProgressBar>>,
    next_id: AtomicU64,
}

impl IndicatifProgressCallback {
    pub fn new() -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn with_bar(&self, id: ProgressId, f: impl FnOnce(&ProgressBar)) {
        if let Ok(bars) = self.bars.lock()
            && let Some(bar) = bars.get(&id.0)
        {
            f(bar);
        }
    }
}

impl Default for IndicatifProgressCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCallback for IndicatifProgressCallback {
    fn start(&self, info: ProgressInfo) -> ProgressId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let bar = match info.progress_type {
            ProgressType::Spinner => {
                let spinner = self.multi_progress.add(ProgressBar::new_spinner());
                spinner.enable_steady_tick(Duration::from_millis(100));
                spinner.set_style(
                    ProgressStyle::with_template(&format!("[{}] {{spinner}} {{msg}}", info.prefix))
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                spinner
            }
            ProgressType::Bar { total } => {
                let bar = self.multi_progress.add(ProgressBar::new(total));
                bar.set_style(
                    ProgressStyle::with_template(&format!(
                        "[{}] {{msg}} {{wide_bar}} {{bytes}}/{{total_bytes}} {{percent}}%",
                        info.prefix
                    ))
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-"),
                );
                if let Some(current) = info.current {
                    bar.set_position(current);
                }
                bar
            }
        };
        bar.set_message(info.message);

        if let Ok(mut bars) = self.bars.lock() {
            bars.insert(id, bar);
        }
        ProgressId(id)
    }

    fn update_message(&self, id: ProgressId, message: String) {
        self.with_bar(id, |bar| bar.set_message(message));
    }

    fn increment(&self, id: ProgressId, delta: u64) {
        self.with_bar(id, |bar| bar.inc(delta));
    }

    fn finish(&self, id: ProgressId, final_message: String) {
        let removed = self.bars.lock().ok().and_then(|mut b| b.remove(&id.0));
        if let Some(bar) = removed {
            bar.finish_with_message(final_message);
        }
    }
}

/// 终端下返回 indicatif 实现，否则返回百分比实现
pub fn create_progress_callback() -> Arc<dyn ProgressCallback> {
    if io::stdout().is_terminal() {
        Arc::new(IndicatifProgressCallback::new())
    } else {
        Arc::new(PercentProgressCallback::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_is_clamped() {
        assert_eq!(PercentProgressCallback::percent(0, 0), 100);
        assert_eq!(PercentProgressCallback::percent(50, 200), 25);
        assert_eq!(PercentProgressCallback::percent(300, 200), 100);
    }

    #[test]
    fn test_finished_bars_are_forgotten() {
        let callback = PercentProgressCallback::new();
        let id = callback.start(ProgressInfo {
            progress_type: ProgressType::Bar { total: 10 },
            prefix: "0x00".to_string(),
            message: "Writing".to_string(),
            current: Some(0),
        });
        callback.increment(id, 5);
        callback.finish(id, "Writing Done".to_string());
        assert!(callback.states.lock().unwrap().is_empty());
    }
}
