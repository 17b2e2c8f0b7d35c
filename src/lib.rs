//! Core of a PostgreSQL wire-protocol (v3) client.
//!
//! Three subsystems make up the crate: the frame codec that slices the
//! inbound byte stream into whole messages and builds outbound ones, the
//! connection state machines that drive startup, authentication, simple and
//! extended queries, and the process-wide type codec registry that maps
//! type OIDs to binary `(encode, decode)` pairs.
//!
//! Everything runs over a caller-supplied [`Transport`]; dialing, TLS, and
//! connection-string handling stay outside the crate.
//!
//! # Example
//!
//! ```no_run
//! use pglink::{Config, Connection, TcpTransport, Value};
//!
//! # async fn app() -> pglink::Result<()> {
//! let tcp = tokio::net::TcpStream::connect("localhost:5432").await?;
//! let config = Config::new("postgres").database("postgres");
//! let mut conn = Connection::new(TcpTransport::new(tcp)?, config);
//! conn.handshake().await?;
//!
//! let tag = conn.exec("CREATE TABLE t(id int4, name text)", &[]).await?;
//! assert_eq!(tag.command(), Some("CREATE"));
//!
//! conn.exec("INSERT INTO t VALUES($1, $2)", &[Value::from(1), Value::from("one")])
//!     .await?;
//!
//! let mut rows = conn.query("SELECT id, name FROM t WHERE id = $1", &[Value::from(1)]).await?;
//! while let Some(row) = rows.next().await {
//!     let row = row?;
//!     println!("{:?} {:?}", row.get(0), row.try_get("name"));
//! }
//!
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod error;
mod row;
mod state;
mod transaction;
mod transport;

pub mod protocol;
pub mod types;

pub use config::Config;
pub use connection::{BackendKey, Connection};
pub use error::{Error, Notice, Result};
pub use protocol::types::{FormatCode, Oid, TransactionStatus};
pub use row::{Column, CommandTag, Row, RowStream};
pub use state::Notification;
pub use transaction::{IsolationLevel, Transaction, TxOptions};
pub use transport::{TcpTransport, Transport};
pub use types::Value;
