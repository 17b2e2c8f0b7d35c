//! Rows, columns, command tags, and the lazy row stream.

use std::sync::Arc;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::protocol::backend::FieldDescription;
use crate::protocol::types::{FormatCode, Oid};
use crate::state::{Action, ExtendedQueryFlow};
use crate::transport::Transport;
use crate::types::Value;

/// Metadata of one result column.
#[derive(Debug, Clone)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Table OID (0 if not a table column)
    pub table_oid: u32,
    /// Column attribute number (0 if not a table column)
    pub column_id: i16,
    /// Data type OID
    pub type_oid: Oid,
    /// Type size (negative = variable width)
    pub type_size: i16,
    /// Type modifier
    pub type_modifier: i32,
    /// Format code advertised by the server
    pub format: FormatCode,
}

impl From<&FieldDescription<'_>> for Column {
    fn from(field: &FieldDescription<'_>) -> Self {
        Self {
            name: field.name.to_string(),
            table_oid: field.table_oid,
            column_id: field.column_id,
            type_oid: field.type_oid,
            type_size: field.type_size,
            type_modifier: field.type_modifier,
            format: field.format,
        }
    }
}

/// A command tag from CommandComplete, e.g. `"DELETE 3"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTag(String);

impl CommandTag {
    pub(crate) fn new(tag: &str) -> Self {
        Self(tag.to_string())
    }

    /// The raw tag text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The leading command word (`"DELETE"` of `"DELETE 3"`).
    pub fn command(&self) -> Option<&str> {
        self.0.split_whitespace().next()
    }

    /// Rows affected, for tags that carry a count.
    pub fn rows_affected(&self) -> Option<u64> {
        let parts: Vec<&str> = self.0.split_whitespace().collect();
        match parts.as_slice() {
            ["INSERT", _oid, count] => count.parse().ok(),
            ["SELECT" | "UPDATE" | "DELETE" | "COPY" | "MOVE" | "FETCH", count] => {
                count.parse().ok()
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for CommandTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One decoded result row.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<[Column]>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(columns: Arc<[Column]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at a column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of the first column with the given name.
    pub fn try_get(&self, name: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c.name == name)?;
        self.values.get(index)
    }

    /// All values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Take ownership of the values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Column metadata.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

/// A lazy, one-pass sequence of rows.
///
/// `next` drives the connection's receive loop one `DataRow` at a time;
/// nothing is buffered ahead. The stream must be consumed to completion (or
/// [`close`][RowStream::close]d) before the connection accepts another
/// operation. Dropping it mid-stream leaves the connection engaged.
pub struct RowStream<'c, T: Transport> {
    conn: &'c mut Connection<T>,
    flow: ExtendedQueryFlow,
    tag: Option<CommandTag>,
    done: bool,
    skip: bool,
}

impl<'c, T: Transport> std::fmt::Debug for RowStream<'c, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream")
            .field("flow", &self.flow)
            .field("tag", &self.tag)
            .field("done", &self.done)
            .field("skip", &self.skip)
            .finish()
    }
}

impl<'c, T: Transport> RowStream<'c, T> {
    pub(crate) fn new(conn: &'c mut Connection<T>, flow: ExtendedQueryFlow) -> Self {
        Self {
            conn,
            flow,
            tag: None,
            done: false,
            skip: false,
        }
    }

    /// Fetch the next row, or `None` once the batch is complete.
    ///
    /// Calling `next` after completion keeps returning `None`.
    pub async fn next(&mut self) -> Option<Result<Row>> {
        loop {
            if self.done {
                return None;
            }
            let frame = match self.conn.recv_frame().await {
                Ok(frame) => frame,
                Err(err) => return Some(Err(self.finish_err(err))),
            };
            let action = self
                .flow
                .step(&frame, &self.conn.params, &mut self.conn.wbuf);
            match action {
                Ok(Action::Read) => {}
                Ok(Action::Flush) => {
                    if let Err(err) = self.conn.flush().await {
                        return Some(Err(self.finish_err(err)));
                    }
                }
                Ok(Action::Async(event)) => self.conn.dispatch(event),
                Ok(Action::Row(row)) => {
                    if !self.skip {
                        return Some(Ok(row));
                    }
                }
                Ok(Action::Finished) => {
                    self.finish_ok();
                    return None;
                }
                Err(err) => return Some(Err(self.finish_err(err))),
            }
        }
    }

    /// Stop consuming rows and drain the remaining protocol messages so the
    /// connection returns cleanly to ReadyForQuery.
    pub async fn close(&mut self) -> Result<()> {
        self.skip = true;
        while !self.done {
            if let Some(Err(err)) = self.next().await {
                return Err(err);
            }
        }
        Ok(())
    }

    /// True once the stream has been fully consumed or closed.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Column metadata captured from the query's row description.
    pub fn columns(&self) -> &[Column] {
        self.flow.columns()
    }

    /// Names of the result columns.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.flow.columns().iter().map(|c| c.name.as_str())
    }

    /// The command tag, available after the stream completed.
    pub fn tag(&self) -> Option<&CommandTag> {
        self.tag.as_ref()
    }

    fn finish_ok(&mut self) {
        self.done = true;
        self.tag = self.flow.take_tag();
        self.conn.tx_status = self.flow.transaction_status();
        self.conn.rows_open = false;
    }

    fn finish_err(&mut self, err: Error) -> Error {
        self.done = true;
        self.conn.observe(&err);
        if !err.is_fatal() {
            // the flow already drained to ReadyForQuery before surfacing it
            self.tag = self.flow.take_tag();
            self.conn.tx_status = self.flow.transaction_status();
            self.conn.rows_open = false;
        }
        err
    }
}
