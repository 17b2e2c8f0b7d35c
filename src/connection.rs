//! The connection: transport + framer + write buffer + session state.

use crate::config::Config;
use crate::error::{Error, Notice, Result};
use crate::protocol::{Frame, Framer, frontend};
use crate::protocol::types::TransactionStatus;
use crate::row::{CommandTag, RowStream};
use crate::state::{Action, AsyncEvent, ExtendedQueryFlow, Notification, SimpleExecFlow, StartupFlow};
use crate::transaction::{Transaction, TxOptions};
use crate::transport::Transport;
use crate::types::{ServerParams, Value};

const READ_CHUNK: usize = 8 * 1024;

/// Backend process ID and cancellation secret from BackendKeyData.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendKey {
    /// Backend process ID
    pub pid: u32,
    /// Cancellation secret
    pub secret_key: u32,
}

type NoticeHandler = Box<dyn FnMut(&Notice) + Send>;
type NotificationHandler = Box<dyn FnMut(&Notification) + Send>;

/// A single PostgreSQL session over a [`Transport`].
///
/// Created with [`new`][Connection::new], activated by exactly one
/// [`handshake`][Connection::handshake], then driven by
/// [`exec`][Connection::exec] / [`query`][Connection::query] /
/// [`begin`][Connection::begin]. One logical operation runs at a time; an
/// open [`RowStream`] must finish (or be closed) before the next one starts.
pub struct Connection<T: Transport> {
    transport: T,
    framer: Framer,
    pub(crate) wbuf: Vec<u8>,
    pub(crate) params: ServerParams,
    pub(crate) tx_status: TransactionStatus,
    pub(crate) rows_open: bool,
    pub(crate) in_tx: bool,
    backend_key: Option<BackendKey>,
    config: Config,
    ready: bool,
    closed: bool,
    notice_handler: Option<NoticeHandler>,
    notification_handler: Option<NotificationHandler>,
}

impl<T: Transport> Connection<T> {
    /// Wrap a freshly dialed transport. The connection is unusable until
    /// [`handshake`][Connection::handshake] succeeds.
    pub fn new(transport: T, config: Config) -> Self {
        Self {
            transport,
            framer: Framer::new(),
            wbuf: Vec::with_capacity(1024),
            params: ServerParams::default(),
            tx_status: TransactionStatus::Idle,
            rows_open: false,
            in_tx: false,
            backend_key: None,
            config,
            ready: false,
            closed: false,
            notice_handler: None,
            notification_handler: None,
        }
    }

    /// Run startup, authentication, and the post-auth burst up to the first
    /// ReadyForQuery. Runs exactly once; a second call fails.
    pub async fn handshake(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        if self.ready {
            return Err(Error::InvalidUsage("handshake already completed".into()));
        }

        let mut flow = StartupFlow::new(&self.config);
        flow.start(&self.config, &mut self.wbuf);
        match self.drive_startup(&mut flow).await {
            Ok(()) => {
                self.backend_key = flow
                    .backend_key()
                    .map(|(pid, secret_key)| BackendKey { pid, secret_key });
                self.tx_status = flow.transaction_status();
                self.ready = true;
                log::debug!(
                    "handshake complete, backend pid {:?}",
                    self.backend_key.map(|k| k.pid)
                );
                Ok(())
            }
            Err(err) => {
                // nothing during startup is recoverable
                self.closed = true;
                Err(err)
            }
        }
    }

    /// Execute a statement and return its command tag.
    ///
    /// Without arguments the statement travels over the simple-query
    /// protocol; with arguments it uses the extended protocol, letting the
    /// server infer parameter types and binding everything in binary format.
    pub async fn exec(&mut self, sql: &str, args: &[Value]) -> Result<CommandTag> {
        self.ensure_ready()?;
        if args.is_empty() {
            self.exec_simple(sql).await
        } else {
            self.exec_extended(sql, args).await
        }
    }

    /// Run a query and stream its rows.
    ///
    /// Always uses the extended protocol so results arrive in binary format.
    /// The connection stays engaged until the stream is exhausted or closed.
    pub async fn query(&mut self, sql: &str, args: &[Value]) -> Result<RowStream<'_, T>> {
        self.ensure_ready()?;

        let mut flow = ExtendedQueryFlow::new(args.to_vec());
        flow.start(sql, &mut self.wbuf);
        if let Err(err) = self.drive_until_bound(&mut flow).await {
            self.observe(&err);
            if !err.is_fatal() {
                self.tx_status = flow.transaction_status();
            }
            return Err(err);
        }

        self.rows_open = true;
        Ok(RowStream::new(self, flow))
    }

    /// Begin a transaction with default options.
    pub async fn begin(&mut self) -> Result<Transaction<'_, T>> {
        self.begin_with(TxOptions::default()).await
    }

    /// Begin a transaction with explicit options.
    pub async fn begin_with(&mut self, options: TxOptions) -> Result<Transaction<'_, T>> {
        self.ensure_ready()?;
        if self.in_tx {
            return Err(Error::InvalidUsage(
                "a transaction is already in progress".into(),
            ));
        }
        self.exec(&options.begin_sql(), &[]).await?;
        self.in_tx = true;
        Ok(Transaction::new(self))
    }

    /// Close the connection. Idempotent; a best-effort Terminate precedes
    /// the transport shutdown.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.ready {
            self.wbuf.clear();
            frontend::write_terminate(&mut self.wbuf);
            let _ = self.transport.write_all(&self.wbuf).await;
            self.wbuf.clear();
        }
        self.transport.close().await?;
        log::debug!("connection closed");
        Ok(())
    }

    /// Install a handler for server notices. Without one, notices are only
    /// logged.
    pub fn on_notice<F: FnMut(&Notice) + Send + 'static>(&mut self, handler: F) {
        self.notice_handler = Some(Box::new(handler));
    }

    /// Install a handler for LISTEN/NOTIFY notifications. Without one they
    /// are dropped.
    pub fn on_notification<F: FnMut(&Notification) + Send + 'static>(&mut self, handler: F) {
        self.notification_handler = Some(Box::new(handler));
    }

    /// The value of a server parameter (`server_version`, `TimeZone`, ...).
    pub fn server_param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// All server parameters reported so far.
    pub fn server_params(&self) -> &ServerParams {
        &self.params
    }

    /// Transaction status from the last observed ReadyForQuery.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.tx_status
    }

    /// The backend cancellation key, if the server sent one.
    pub fn backend_key(&self) -> Option<BackendKey> {
        self.backend_key
    }

    /// True after a successful handshake.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// True once the connection has been closed or hit a fatal error.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // === drivers ===

    async fn exec_simple(&mut self, sql: &str) -> Result<CommandTag> {
        let mut flow = SimpleExecFlow::new();
        flow.start(sql, &mut self.wbuf);
        self.flush().await?;

        loop {
            let frame = match self.recv_frame().await {
                Ok(frame) => frame,
                Err(err) => return Err(self.settle(err, flow.transaction_status())),
            };
            match flow.step(&frame) {
                Ok(Action::Read) => {}
                Ok(Action::Flush) => self.flush().await?,
                Ok(Action::Async(event)) => self.dispatch(event),
                Ok(Action::Row(_)) => {
                    return Err(self.settle(
                        Error::Protocol("simple exec produced a row action".into()),
                        flow.transaction_status(),
                    ));
                }
                Ok(Action::Finished) => break,
                Err(err) => return Err(self.settle(err, flow.transaction_status())),
            }
        }

        self.tx_status = flow.transaction_status();
        flow.take_tag().ok_or_else(|| {
            let err = Error::Protocol("simple exec finished without CommandComplete".into());
            self.observe(&err);
            err
        })
    }

    async fn exec_extended(&mut self, sql: &str, args: &[Value]) -> Result<CommandTag> {
        let mut flow = ExtendedQueryFlow::new(args.to_vec());
        flow.start(sql, &mut self.wbuf);
        self.flush().await?;

        loop {
            let frame = match self.recv_frame().await {
                Ok(frame) => frame,
                Err(err) => return Err(self.settle(err, flow.transaction_status())),
            };
            match flow.step(&frame, &self.params, &mut self.wbuf) {
                Ok(Action::Read) => {}
                Ok(Action::Flush) => self.flush().await?,
                Ok(Action::Async(event)) => self.dispatch(event),
                // exec discards result rows
                Ok(Action::Row(_)) => {}
                Ok(Action::Finished) => break,
                Err(err) => return Err(self.settle(err, flow.transaction_status())),
            }
        }

        self.tx_status = flow.transaction_status();
        // row-less statements always complete with a tag; a missing one
        // means the exchange was cut short
        flow.take_tag().ok_or_else(|| {
            let err = Error::Protocol("extended exec finished without CommandComplete".into());
            self.observe(&err);
            err
        })
    }

    async fn drive_startup(&mut self, flow: &mut StartupFlow) -> Result<()> {
        self.flush().await?;
        loop {
            let frame = self.recv_frame().await?;
            match flow.step(&frame, &mut self.wbuf)? {
                Action::Read => {}
                Action::Flush => self.flush().await?,
                Action::Async(event) => self.dispatch(event),
                Action::Row(_) => {
                    return Err(Error::Protocol("unexpected row during startup".into()));
                }
                Action::Finished => return Ok(()),
            }
        }
    }

    /// Drive an extended flow until Bind/Execute/Sync are on the wire and
    /// only row traffic remains.
    async fn drive_until_bound(&mut self, flow: &mut ExtendedQueryFlow) -> Result<()> {
        self.flush().await?;
        while !flow.bound() {
            let frame = self.recv_frame().await?;
            match flow.step(&frame, &self.params, &mut self.wbuf)? {
                Action::Read => {}
                Action::Flush => self.flush().await?,
                Action::Async(event) => self.dispatch(event),
                Action::Row(_) => {
                    return Err(Error::Protocol("row before portal was bound".into()));
                }
                Action::Finished => break,
            }
        }
        Ok(())
    }

    // === plumbing shared with RowStream ===

    pub(crate) async fn recv_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.framer.next_frame() {
                log::trace!(
                    "(B) '{}' {} bytes",
                    frame.type_byte as char,
                    frame.payload.len()
                );
                return Ok(frame);
            }
            let mut chunk = [0u8; READ_CHUNK];
            let n = self.transport.read(&mut chunk).await?;
            if n == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "server closed the connection",
                )));
            }
            self.framer.feed(&chunk[..n])?;
        }
    }

    pub(crate) async fn flush(&mut self) -> Result<()> {
        if self.wbuf.is_empty() {
            return Ok(());
        }
        log::trace!("(F) flushing {} bytes", self.wbuf.len());
        let result = self.transport.write_all(&self.wbuf).await;
        self.wbuf.clear();
        result.map_err(Error::from)
    }

    pub(crate) fn dispatch(&mut self, event: AsyncEvent) {
        match event {
            AsyncEvent::Parameter { name, value } => {
                log::trace!("parameter {name} = {value}");
                self.params.set(name, value);
            }
            AsyncEvent::Notice(notice) => {
                log::warn!("{notice}");
                if let Some(handler) = &mut self.notice_handler {
                    handler(&notice);
                }
            }
            AsyncEvent::Notification(notification) => {
                if let Some(handler) = &mut self.notification_handler {
                    handler(&notification);
                }
            }
        }
    }

    /// Mark the connection closed when an error is fatal.
    pub(crate) fn observe(&mut self, err: &Error) {
        if err.is_fatal() && !self.closed {
            log::debug!("fatal error, closing connection: {err}");
            self.closed = true;
        }
    }

    /// Record an operation failure: fatal errors close the connection,
    /// recoverable ones adopt the flow's resynchronized status.
    fn settle(&mut self, err: Error, status: TransactionStatus) -> Error {
        self.observe(&err);
        if !err.is_fatal() {
            self.tx_status = status;
        }
        err
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        if !self.ready {
            return Err(Error::InvalidUsage(
                "handshake has not been performed".into(),
            ));
        }
        if self.rows_open {
            return Err(Error::AlreadyEngaged);
        }
        Ok(())
    }
}
