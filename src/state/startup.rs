//! Startup and authentication flow.

use super::{Action, intercept, unexpected};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::Frame;
use crate::protocol::backend::{AuthRequest, BackendKey, ReadyForQuery, msg_type, parse_notice};
use crate::protocol::frontend::{md5_password, write_password, write_startup};
use crate::protocol::types::TransactionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingAuth,
    AwaitingReady,
    Done,
}

/// Drives StartupMessage, the authentication loop, and the post-auth
/// parameter burst up to the first ReadyForQuery.
pub(crate) struct StartupFlow {
    state: State,
    user: String,
    password: Option<String>,
    backend_key: Option<(u32, u32)>,
    tx_status: TransactionStatus,
}

impl StartupFlow {
    pub fn new(config: &Config) -> Self {
        Self {
            state: State::AwaitingAuth,
            user: config.user.clone(),
            password: config.password.clone(),
            backend_key: None,
            tx_status: TransactionStatus::Idle,
        }
    }

    /// Write the StartupMessage. The driver flushes afterwards.
    pub fn start(&self, config: &Config, out: &mut Vec<u8>) {
        let mut params: Vec<(&str, &str)> = vec![
            ("user", &config.user),
            ("client_encoding", "UTF8"),
            ("datestyle", "ISO, YMD"),
        ];
        if let Some(db) = &config.database {
            params.push(("database", db));
        }
        if let Some(app) = &config.application_name {
            params.push(("application_name", app));
        }
        for (name, value) in &config.params {
            params.push((name, value));
        }
        write_startup(out, &params);
    }

    /// Backend cancellation key, once received.
    pub fn backend_key(&self) -> Option<(u32, u32)> {
        self.backend_key
    }

    /// Transaction status from the terminating ReadyForQuery.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.tx_status
    }

    /// Process one frame.
    pub fn step(&mut self, frame: &Frame, out: &mut Vec<u8>) -> Result<Action> {
        if let Some(event) = intercept(frame)? {
            return Ok(Action::Async(event));
        }
        if frame.type_byte == msg_type::ERROR_RESPONSE {
            return Err(Error::Server(parse_notice(&frame.payload)?));
        }

        match self.state {
            State::AwaitingAuth => self.handle_auth(frame, out),
            State::AwaitingReady => self.handle_ready(frame),
            State::Done => Err(unexpected("after startup finished", frame)),
        }
    }

    fn handle_auth(&mut self, frame: &Frame, out: &mut Vec<u8>) -> Result<Action> {
        if frame.type_byte != msg_type::AUTHENTICATION {
            return Err(unexpected("during authentication", frame));
        }

        match AuthRequest::parse(&frame.payload)? {
            AuthRequest::Ok => {
                self.state = State::AwaitingReady;
                Ok(Action::Read)
            }
            AuthRequest::Cleartext => {
                let password = self.required_password()?.to_owned();
                write_password(out, &password);
                Ok(Action::Flush)
            }
            AuthRequest::Md5 { salt } => {
                let hashed = md5_password(&self.user, self.required_password()?, &salt);
                write_password(out, &hashed);
                Ok(Action::Flush)
            }
            AuthRequest::Other(kind) => Err(Error::UnsupportedAuthKind(kind)),
        }
    }

    fn handle_ready(&mut self, frame: &Frame) -> Result<Action> {
        match frame.type_byte {
            msg_type::BACKEND_KEY_DATA => {
                let key = BackendKey::parse(&frame.payload)?;
                self.backend_key = Some((key.pid(), key.secret()));
                Ok(Action::Read)
            }
            msg_type::READY_FOR_QUERY => {
                self.tx_status = ReadyForQuery::parse(&frame.payload)?.status;
                self.state = State::Done;
                Ok(Action::Finished)
            }
            _ => Err(unexpected("during startup", frame)),
        }
    }

    fn required_password(&self) -> Result<&str> {
        self.password
            .as_deref()
            .ok_or_else(|| Error::Auth("password required but not provided".into()))
    }
}
