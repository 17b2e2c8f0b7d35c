//! Transaction handle and BEGIN options.

use std::ops::{Deref, DerefMut};

use crate::connection::Connection;
use crate::error::Result;
use crate::transport::Transport;

/// Transaction isolation level for [`TxOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Options rendered into the `BEGIN` statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxOptions {
    /// Isolation level; server default when unset.
    pub isolation: Option<IsolationLevel>,
    /// Open the transaction read-only.
    pub read_only: bool,
    /// Defer serialization checks (only meaningful for read-only
    /// serializable transactions).
    pub deferrable: bool,
}

impl TxOptions {
    /// Render the `BEGIN` statement for these options.
    pub(crate) fn begin_sql(&self) -> String {
        let mut sql = String::from("BEGIN");
        if let Some(isolation) = self.isolation {
            sql.push_str(" ISOLATION LEVEL ");
            sql.push_str(isolation.as_sql());
        }
        if self.read_only {
            sql.push_str(" READ ONLY");
        }
        if self.deferrable {
            sql.push_str(" DEFERRABLE");
        }
        sql
    }
}

/// A one-shot transaction scope over its connection.
///
/// The handle derefs to the connection, so statements inside the
/// transaction run through it directly. The first `commit` or `rollback`
/// executes the corresponding SQL and releases the transaction slot; later
/// calls are no-ops. A commit is never converted to a rollback by the core,
/// even when the observed transaction status is failed.
pub struct Transaction<'c, T: Transport> {
    conn: &'c mut Connection<T>,
    done: bool,
}

impl<'c, T: Transport> Transaction<'c, T> {
    pub(crate) fn new(conn: &'c mut Connection<T>) -> Self {
        Self { conn, done: false }
    }

    /// Commit the transaction. A no-op after the first commit or rollback.
    pub async fn commit(&mut self) -> Result<()> {
        self.end("COMMIT").await
    }

    /// Roll the transaction back. A no-op after the first commit or
    /// rollback.
    pub async fn rollback(&mut self) -> Result<()> {
        self.end("ROLLBACK").await
    }

    /// True once the transaction was committed or rolled back.
    pub fn is_done(&self) -> bool {
        self.done
    }

    async fn end(&mut self, sql: &str) -> Result<()> {
        if self.done {
            return Ok(());
        }
        self.conn.exec(sql, &[]).await?;
        self.done = true;
        self.conn.in_tx = false;
        Ok(())
    }
}

impl<T: Transport> Deref for Transaction<'_, T> {
    type Target = Connection<T>;

    fn deref(&self) -> &Self::Target {
        self.conn
    }
}

impl<T: Transport> DerefMut for Transaction<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
    }
}

impl<T: Transport> Drop for Transaction<'_, T> {
    fn drop(&mut self) {
        if !self.done {
            // release the slot; the server-side transaction ends at the
            // next ROLLBACK or when the connection closes
            self.conn.in_tx = false;
            log::debug!("transaction dropped without commit or rollback");
        }
    }
}
