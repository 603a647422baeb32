// ==========================================
// OBARI 生命周期引擎 - 性能埋点
// ==========================================
// - SQLite profile 回调: 语句计数 + 慢 SQL 告警
// - PerfGuard: 单次操作 (如 deal.advance) 的耗时与语句数
// 开关:
// - OBARI_PERF_SQL=1 强制开启 (Debug 构建默认开启)
// - OBARI_SLOW_SQL_MS=50 慢 SQL 阈值 (毫秒)
// ==========================================

use rusqlite::Connection;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const SQL_PREVIEW_CHARS: usize = 240;

/// 0 表示未开启
static SLOW_SQL_MS: AtomicU64 = AtomicU64::new(0);

/// 当前线程上正在统计的操作
#[derive(Default)]
struct OpCounters {
    depth: u32,
    statements: u64,
    slow_statements: u64,
}

thread_local! {
    static COUNTERS: RefCell<OpCounters> = RefCell::new(OpCounters::default());
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn sql_preview(sql: &str) -> String {
    let flat = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= SQL_PREVIEW_CHARS {
        return flat;
    }
    let head: String = flat.chars().take(SQL_PREVIEW_CHARS).collect();
    format!("{}…", head)
}

/// 为连接安装 SQL profile 回调
pub fn install_sqlite_tracing(conn: &mut Connection) {
    let enabled = env_flag("OBARI_PERF_SQL").unwrap_or(cfg!(debug_assertions));
    if !enabled {
        conn.profile(None);
        return;
    }

    let slow_ms = std::env::var("OBARI_SLOW_SQL_MS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .unwrap_or(50);
    SLOW_SQL_MS.store(slow_ms, Ordering::Relaxed);
    conn.profile(Some(on_statement_profiled));
}

fn on_statement_profiled(sql: &str, duration: Duration) {
    let threshold = SLOW_SQL_MS.load(Ordering::Relaxed);
    let slow = threshold > 0 && duration.as_millis() as u64 >= threshold;
    if slow {
        tracing::warn!(
            target: "slow_sql",
            duration_ms = duration.as_millis() as u64,
            sql = %sql_preview(sql),
            "慢 SQL"
        );
    }

    COUNTERS.with(|c| {
        let mut c = c.borrow_mut();
        if c.depth > 0 {
            c.statements += 1;
            if slow {
                c.slow_statements += 1;
            }
        }
    });
}

/// 操作级性能统计; Drop 时输出 debug 日志
pub struct PerfGuard {
    op: &'static str,
    started: Instant,
    statements_before: u64,
    slow_before: u64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        let (statements_before, slow_before) = COUNTERS.with(|c| {
            let mut c = c.borrow_mut();
            c.depth += 1;
            (c.statements, c.slow_statements)
        });
        Self {
            op,
            started: Instant::now(),
            statements_before,
            slow_before,
        }
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let (statements, slow) = COUNTERS.with(|c| {
            let mut c = c.borrow_mut();
            c.depth = c.depth.saturating_sub(1);
            (
                c.statements - self.statements_before,
                c.slow_statements - self.slow_before,
            )
        });
        tracing::debug!(
            target: "perf",
            op = self.op,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            statements,
            slow_statements = slow,
            "操作完成"
        );
    }
}
