//! Extended query flow: Parse / Describe / Bind / Execute / Sync.

use std::sync::Arc;

use super::{Action, intercept, unexpected};
use crate::error::{Error, Result};
use crate::protocol::Frame;
use crate::protocol::backend::{
    BindComplete, CloseComplete, CommandComplete, DataRow, NoData, ParameterDescription,
    ParseComplete, ReadyForQuery, RowDescription, msg_type, parse_notice,
};
use crate::protocol::frontend::{
    write_bind, write_close, write_describe, write_execute, write_flush, write_parse, write_sync,
};
use crate::protocol::types::{FormatCode, Oid, TransactionStatus};
use crate::row::{Column, CommandTag, Row};
use crate::types::{FieldContext, ServerParams, Value, encode_value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitParse,
    AwaitParamDesc,
    AwaitRowDesc,
    AwaitBind,
    Rows,
    Drain,
    Done,
}

/// Drives one statement through the extended-query protocol.
///
/// The flow always terminates at ReadyForQuery: server and codec errors are
/// stashed, a Sync is emitted if one is not already in flight, and the error
/// surfaces once the stream is back in a known-good state.
#[derive(Debug)]
pub(crate) struct ExtendedQueryFlow {
    state: State,
    args: Vec<Value>,
    param_oids: Vec<Oid>,
    columns: Arc<[Column]>,
    sync_sent: bool,
    failed: Option<Error>,
    tag: Option<CommandTag>,
    tx_status: TransactionStatus,
}

impl ExtendedQueryFlow {
    pub fn new(args: Vec<Value>) -> Self {
        Self {
            state: State::AwaitParse,
            args,
            param_oids: Vec::new(),
            columns: Arc::from(Vec::new()),
            sync_sent: false,
            failed: None,
            tag: None,
            tx_status: TransactionStatus::Idle,
        }
    }

    /// Write Parse + Describe(statement) + Flush. The driver flushes after.
    pub fn start(&self, sql: &str, out: &mut Vec<u8>) {
        write_parse(out, "", sql, &[]);
        write_describe(out, b'S', "");
        write_flush(out);
    }

    /// True once Bind/Describe/Execute/Close/Sync have been emitted and row
    /// traffic is all that remains.
    pub fn bound(&self) -> bool {
        matches!(self.state, State::AwaitBind | State::Rows | State::Done)
    }

    /// Columns of the result set, empty for row-less statements.
    pub fn columns(&self) -> &[Column] {
        &self.columns
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
    pub fn step(
        &mut self,
        frame: &Frame,
        params: &ServerParams,
        out: &mut Vec<u8>,
    ) -> Result<Action> {
        if let Some(event) = intercept(frame)? {
            return Ok(Action::Async(event));
        }
        if frame.type_byte == msg_type::ERROR_RESPONSE {
            let notice = parse_notice(&frame.payload)?;
            return Ok(self.fail(Error::Server(notice), out));
        }

        match self.state {
            State::AwaitParse => {
                if frame.type_byte != msg_type::PARSE_COMPLETE {
                    return Err(unexpected("while awaiting ParseComplete", frame));
                }
                ParseComplete::parse(&frame.payload)?;
                self.state = State::AwaitParamDesc;
                Ok(Action::Read)
            }
            State::AwaitParamDesc => {
                if frame.type_byte != msg_type::PARAMETER_DESCRIPTION {
                    return Err(unexpected("while awaiting ParameterDescription", frame));
                }
                self.param_oids = ParameterDescription::parse(&frame.payload)?.into_oids();
                self.state = State::AwaitRowDesc;
                Ok(Action::Read)
            }
            State::AwaitRowDesc => {
                match frame.type_byte {
                    msg_type::ROW_DESCRIPTION => {
                        self.columns = parse_columns(&frame.payload)?;
                    }
                    msg_type::NO_DATA => {
                        NoData::parse(&frame.payload)?;
                        self.columns = Arc::from(Vec::new());
                    }
                    _ => return Err(unexpected("while awaiting statement description", frame)),
                }
                Ok(self.bind(params, out))
            }
            State::AwaitBind => {
                if frame.type_byte != msg_type::BIND_COMPLETE {
                    return Err(unexpected("while awaiting BindComplete", frame));
                }
                BindComplete::parse(&frame.payload)?;
                self.state = State::Rows;
                Ok(Action::Read)
            }
            State::Rows => self.handle_rows(frame, params, out),
            State::Drain => match frame.type_byte {
                msg_type::READY_FOR_QUERY => self.finish(frame),
                _ => Ok(Action::Read),
            },
            State::Done => Err(unexpected("after extended query finished", frame)),
        }
    }

    fn handle_rows(
        &mut self,
        frame: &Frame,
        params: &ServerParams,
        out: &mut Vec<u8>,
    ) -> Result<Action> {
        match frame.type_byte {
            // portal describe refreshes the statement-describe columns
            msg_type::ROW_DESCRIPTION => {
                self.columns = parse_columns(&frame.payload)?;
                Ok(Action::Read)
            }
            msg_type::NO_DATA => {
                NoData::parse(&frame.payload)?;
                Ok(Action::Read)
            }
            msg_type::DATA_ROW => match self.decode_row(&frame.payload, params) {
                Ok(row) => Ok(Action::Row(row)),
                Err(err @ Error::Codec(_)) => Ok(self.fail(err, out)),
                Err(err) => Err(err),
            },
            msg_type::COMMAND_COMPLETE => {
                if self.tag.is_some() {
                    return Err(Error::Protocol(
                        "extended query produced more than one CommandComplete".into(),
                    ));
                }
                let complete = CommandComplete::parse(&frame.payload)?;
                self.tag = Some(CommandTag::new(complete.tag));
                Ok(Action::Read)
            }
            msg_type::EMPTY_QUERY_RESPONSE => Ok(self.fail(Error::EmptyQuery, out)),
            msg_type::CLOSE_COMPLETE => {
                CloseComplete::parse(&frame.payload)?;
                Ok(Action::Read)
            }
            msg_type::READY_FOR_QUERY => self.finish(frame),
            _ => Err(unexpected("during extended query rows", frame)),
        }
    }

    /// Serialize the arguments and emit Bind through Sync.
    fn bind(&mut self, params: &ServerParams, out: &mut Vec<u8>) -> Action {
        if self.args.len() != self.param_oids.len() {
            return self.fail(
                Error::ParamCount {
                    expected: self.param_oids.len(),
                    got: self.args.len(),
                },
                out,
            );
        }

        let encoded = match self.encode_args(params) {
            Ok(encoded) => encoded,
            Err(err) => return self.fail(err, out),
        };

        write_bind(out, "", "", &encoded);
        write_describe(out, b'P', "");
        write_execute(out, "", 0);
        write_close(out, b'S', "");
        write_sync(out);
        self.sync_sent = true;
        self.state = State::AwaitBind;
        Action::Flush
    }

    fn encode_args(&self, params: &ServerParams) -> Result<Vec<Option<Vec<u8>>>> {
        let mut encoded = Vec::with_capacity(self.args.len());
        for (value, &oid) in self.args.iter().zip(&self.param_oids) {
            if value.is_null() {
                encoded.push(None);
                continue;
            }
            let ctx = FieldContext::for_encode(oid, params);
            encoded.push(Some(encode_value(value, &ctx)?));
        }
        Ok(encoded)
    }

    fn decode_row(&self, payload: &[u8], params: &ServerParams) -> Result<Row> {
        let data = DataRow::parse(payload)?;
        if data.len() != self.columns.len() {
            return Err(Error::Protocol(format!(
                "DataRow has {} values for {} columns",
                data.len(),
                self.columns.len()
            )));
        }

        let mut values = Vec::with_capacity(data.len());
        for (cell, column) in data.iter().zip(self.columns.iter()) {
            match cell? {
                None => values.push(Value::Null),
                Some(bytes) => {
                    // results are bound all-binary regardless of what the
                    // statement describe advertised
                    let ctx = FieldContext::new(
                        column.type_oid,
                        column.type_size,
                        column.type_modifier,
                        FormatCode::Binary,
                        bytes,
                        params,
                    );
                    values.push(crate::types::decode_field(&ctx)?);
                }
            }
        }
        Ok(Row::new(self.columns.clone(), values))
    }

    /// Record a recoverable failure and steer the flow to ReadyForQuery.
    fn fail(&mut self, err: Error, out: &mut Vec<u8>) -> Action {
        if self.failed.is_none() {
            self.failed = Some(err);
        }
        self.state = State::Drain;
        if !self.sync_sent {
            write_sync(out);
            self.sync_sent = true;
            Action::Flush
        } else {
            Action::Read
        }
    }

    fn finish(&mut self, frame: &Frame) -> Result<Action> {
        self.tx_status = ReadyForQuery::parse(&frame.payload)?.status;
        self.state = State::Done;
        match self.failed.take() {
            Some(err) => Err(err),
            None => Ok(Action::Finished),
        }
    }
}

fn parse_columns(payload: &[u8]) -> Result<Arc<[Column]>> {
    let description = RowDescription::parse(payload)?;
    Ok(description.fields().iter().map(Column::from).collect())
}
