// ==========================================
// OBARI 生命周期引擎 - 事务边界
// ==========================================
// 职责: 在共享连接上开启一个事务, 让多条写入一起提交或一起回滚
// 约束: 闭包内只能使用 *_in(conn, ..) 形式的仓储方法
//       (持锁期间再调用自行加锁的仓储方法会死锁)
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{Connection, Transaction};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct UnitOfWork {
    conn: Arc<Mutex<Connection>>,
}

impl UnitOfWork {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 在单个事务内执行写入
    ///
    /// # 返回
    /// - `Ok(value)`: 闭包成功且事务已提交
    /// - `Err`: 闭包或提交失败, 事务已回滚
    pub fn run<T>(
        &self,
        work: impl FnOnce(&Transaction<'_>) -> RepositoryResult<T>,
    ) -> RepositoryResult<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn.transaction()?;
        // tx 在错误路径上 drop 即回滚
        let value = work(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}
