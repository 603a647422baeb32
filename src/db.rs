// ==========================================
// OBARI 生命周期引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 集中建表 (幂等), 记录 schema_version
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let mut conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    crate::perf::install_sqlite_tracing(&mut conn);
    Ok(conn)
}

/// 建表 (幂等)
///
/// 说明：
/// - order_staging 通过触发器拒绝对锁定字段的 UPDATE，notes 列除外
/// - 时间戳统一存储为 `%Y-%m-%d %H:%M:%S` 文本
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS deal (
            deal_id TEXT PRIMARY KEY,
            counterparty_ref TEXT NOT NULL,
            direction TEXT NOT NULL CHECK (direction IN ('INBOUND', 'OUTBOUND')),
            status TEXT NOT NULL,
            facts_json TEXT NOT NULL DEFAULT '{}',
            origin TEXT NOT NULL,
            origin_ref TEXT,
            snapshot_id TEXT,
            supersedes TEXT,
            superseded_by TEXT,
            revision INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_deal_status ON deal(status);

        CREATE TABLE IF NOT EXISTS order_staging (
            snapshot_id TEXT PRIMARY KEY,
            draft_id TEXT NOT NULL UNIQUE,
            deal_id TEXT,
            direction TEXT NOT NULL CHECK (direction IN ('INBOUND', 'OUTBOUND')),
            counterparty_ref TEXT NOT NULL,
            our_party_ref TEXT NOT NULL,
            schedule_json TEXT NOT NULL,
            transport_terms_json TEXT NOT NULL,
            transport_class TEXT NOT NULL,
            lines_json TEXT NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            status TEXT NOT NULL
        );

        CREATE TRIGGER IF NOT EXISTS trg_order_staging_locked
        BEFORE UPDATE OF snapshot_id, draft_id, deal_id, direction, counterparty_ref,
                         our_party_ref, schedule_json, transport_terms_json, transport_class,
                         lines_json, created_at, status
        ON order_staging
        BEGIN
            SELECT RAISE(ABORT, 'order_staging locked fields are immutable');
        END;

        CREATE TABLE IF NOT EXISTS number_series (
            series TEXT PRIMARY KEY,
            next_value INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS stock_movement (
            movement_id TEXT PRIMARY KEY,
            item_id TEXT NOT NULL,
            direction TEXT NOT NULL CHECK (direction IN ('IN', 'OUT')),
            quantity REAL NOT NULL CHECK (quantity >= 0),
            moved_at TEXT NOT NULL,
            reference TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_stock_movement_item_ts
            ON stock_movement(item_id, moved_at);

        CREATE TABLE IF NOT EXISTS planning_intent (
            intent_id TEXT PRIMARY KEY,
            item_id TEXT NOT NULL,
            quantity REAL NOT NULL,
            week_slot TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            deal_id TEXT,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            from_status TEXT,
            to_status TEXT,
            detail TEXT,
            payload_json TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_action_log_deal_ts
            ON action_log(deal_id, action_ts);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
