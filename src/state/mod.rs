//! Sans-I/O protocol flows.
//!
//! Each flow consumes whole frames and answers with an [`Action`] telling
//! the driver what to do next. Flows never touch the transport; outbound
//! bytes go into the connection's write buffer passed to every call, and the
//! `Flush` action asks the driver to push them out.

mod extended;
mod simple_query;
mod startup;

pub(crate) use extended::ExtendedQueryFlow;
pub(crate) use simple_query::SimpleExecFlow;
pub(crate) use startup::StartupFlow;

use crate::error::{Notice, Result};
use crate::protocol::Frame;
use crate::protocol::backend::{self, NotificationResponse, ParameterStatus, msg_type};

/// What a flow wants from its driver after seeing a frame.
#[derive(Debug)]
pub(crate) enum Action {
    /// Feed the next frame.
    Read,
    /// Bytes were appended to the write buffer; flush, then read.
    Flush,
    /// An asynchronous message arrived; dispatch it, then read.
    Async(AsyncEvent),
    /// A decoded data row.
    Row(crate::row::Row),
    /// The flow is complete.
    Finished,
}

/// Asynchronous server message surfaced between responses.
#[derive(Debug, Clone)]
pub(crate) enum AsyncEvent {
    /// Non-fatal notice or warning.
    Notice(Notice),
    /// LISTEN/NOTIFY delivery.
    Notification(Notification),
    /// A server parameter changed.
    Parameter {
        /// Parameter name
        name: String,
        /// New value
        value: String,
    },
}

/// An asynchronous notification from `LISTEN`/`NOTIFY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// PID of the notifying backend process
    pub pid: u32,
    /// Channel name
    pub channel: String,
    /// Notification payload
    pub payload: String,
}

/// Recognize and parse async message types. Returns `None` when the frame
/// belongs to the flow's own exchange.
pub(crate) fn intercept(frame: &Frame) -> Result<Option<AsyncEvent>> {
    match frame.type_byte {
        msg_type::NOTICE_RESPONSE => {
            let notice = backend::parse_notice(&frame.payload)?;
            Ok(Some(AsyncEvent::Notice(notice)))
        }
        msg_type::NOTIFICATION_RESPONSE => {
            let n = NotificationResponse::parse(&frame.payload)?;
            Ok(Some(AsyncEvent::Notification(Notification {
                pid: n.pid,
                channel: n.channel.to_string(),
                payload: n.payload.to_string(),
            })))
        }
        msg_type::PARAMETER_STATUS => {
            let p = ParameterStatus::parse(&frame.payload)?;
            Ok(Some(AsyncEvent::Parameter {
                name: p.name.to_string(),
                value: p.value.to_string(),
            }))
        }
        _ => Ok(None),
    }
}

pub(crate) fn unexpected(context: &str, frame: &Frame) -> crate::error::Error {
    crate::error::Error::Protocol(format!(
        "unexpected message '{}' {context}",
        frame.type_byte as char
    ))
}
