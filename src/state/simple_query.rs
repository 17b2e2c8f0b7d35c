//! Simple query flow: one Query message, responses discarded except the tag.

use super::{Action, intercept, unexpected};
use crate::error::{Error, Result};
use crate::protocol::Frame;
use crate::protocol::backend::{CommandComplete, ReadyForQuery, msg_type, parse_notice};
use crate::protocol::frontend::write_query;
use crate::protocol::types::TransactionStatus;
use crate::row::CommandTag;

/// Drives a parameterless statement over the simple-query protocol.
///
/// Row data is discarded; the flow exists to carry the command tag back and
/// to return the connection to ReadyForQuery.
pub(crate) struct SimpleExecFlow {
    tag: Option<CommandTag>,
    failed: Option<Error>,
    tx_status: TransactionStatus,
    done: bool,
}

impl SimpleExecFlow {
    pub fn new() -> Self {
        Self {
            tag: None,
            failed: None,
            tx_status: TransactionStatus::Idle,
            done: false,
        }
    }

    /// Write the Query message. The driver flushes afterwards.
    pub fn start(&self, sql: &str, out: &mut Vec<u8>) {
        write_query(out, sql);
    }

    /// The captured command tag, once the flow finished.
    pub fn take_tag(&mut self) -> Option<CommandTag> {
        self.tag.take()
    }

    /// Transaction status from the terminating ReadyForQuery.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.tx_status
    }

    /// Process one frame.
    pub fn step(&mut self, frame: &Frame) -> Result<Action> {
        if let Some(event) = intercept(frame)? {
            return Ok(Action::Async(event));
        }

        match frame.type_byte {
            msg_type::ERROR_RESPONSE => {
                let notice = parse_notice(&frame.payload)?;
                if self.failed.is_none() {
                    self.failed = Some(Error::Server(notice));
                }
                Ok(Action::Read)
            }
            // row traffic of a simple exec is discarded wholesale
            msg_type::ROW_DESCRIPTION
            | msg_type::DATA_ROW
            | msg_type::NO_DATA
            | msg_type::COPY_OUT_RESPONSE => Ok(Action::Read),
            msg_type::COMMAND_COMPLETE => {
                if self.tag.is_some() {
                    return Err(Error::Protocol(
                        "simple exec produced more than one CommandComplete".into(),
                    ));
                }
                let complete = CommandComplete::parse(&frame.payload)?;
                self.tag = Some(CommandTag::new(complete.tag));
                Ok(Action::Read)
            }
            msg_type::EMPTY_QUERY_RESPONSE => {
                if self.failed.is_none() {
                    self.failed = Some(Error::EmptyQuery);
                }
                Ok(Action::Read)
            }
            msg_type::READY_FOR_QUERY => {
                self.tx_status = ReadyForQuery::parse(&frame.payload)?.status;
                self.done = true;
                match self.failed.take() {
                    Some(err) => Err(err),
                    None => Ok(Action::Finished),
                }
            }
            _ if self.done => Err(unexpected("after simple exec finished", frame)),
            _ => Err(unexpected("during simple exec", frame)),
        }
    }
}
