//! Shared test scaffolding: a scripted in-memory transport and builders for
//! canned backend bytes.

use std::io;
use std::sync::{Arc, Mutex};

use pglink::{Config, Connection, Transport};

#[derive(Default)]
struct State {
    input: Vec<u8>,
    pos: usize,
    written: Vec<u8>,
    closed: bool,
}

/// A transport that replays canned server bytes and captures everything the
/// client writes. Reads hand out at most `chunk` bytes at a time so the
/// framer sees arbitrary partitions; an exhausted script reads as EOF.
pub struct ScriptedTransport {
    state: Arc<Mutex<State>>,
    chunk: usize,
}

/// Observer handle onto a [`ScriptedTransport`] that outlives the
/// connection owning it.
#[derive(Clone)]
pub struct TransportProbe {
    state: Arc<Mutex<State>>,
}

impl TransportProbe {
    /// Everything the client has written so far.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().unwrap().written.clone()
    }

    /// Number of scripted bytes the client has not read yet.
    pub fn unread(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.input.len() - state.pos
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

impl Transport for ScriptedTransport {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        if state.pos >= state.input.len() {
            return Ok(0);
        }
        let n = self
            .chunk
            .min(buf.len())
            .min(state.input.len() - state.pos);
        let pos = state.pos;
        buf[..n].copy_from_slice(&state.input[pos..pos + n]);
        state.pos += n;
        Ok(n)
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
        }
        state.written.extend_from_slice(buf);
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Builder for the byte stream a scripted server sends.
#[derive(Default)]
pub struct Script {
    bytes: Vec<u8>,
}

#[allow(dead_code)]
impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    fn msg(mut self, type_byte: u8, payload: &[u8]) -> Self {
        self.bytes.push(type_byte);
        self.bytes
            .extend_from_slice(&((payload.len() as i32 + 4).to_be_bytes()));
        self.bytes.extend_from_slice(payload);
        self
    }

    pub fn auth_ok(self) -> Self {
        self.msg(b'R', &0_i32.to_be_bytes())
    }

    pub fn auth_cleartext(self) -> Self {
        self.msg(b'R', &3_i32.to_be_bytes())
    }

    pub fn auth_md5(self, salt: [u8; 4]) -> Self {
        let mut payload = 5_i32.to_be_bytes().to_vec();
        payload.extend_from_slice(&salt);
        self.msg(b'R', &payload)
    }

    pub fn auth_unsupported(self, kind: i32) -> Self {
        self.msg(b'R', &kind.to_be_bytes())
    }

    pub fn parameter_status(self, name: &str, value: &str) -> Self {
        let mut payload = Vec::new();
        payload.extend_from_slice(name.as_bytes());
        payload.push(0);
        payload.extend_from_slice(value.as_bytes());
        payload.push(0);
        self.msg(b'S', &payload)
    }

    pub fn backend_key(self, pid: u32, secret: u32) -> Self {
        let mut payload = pid.to_be_bytes().to_vec();
        payload.extend_from_slice(&secret.to_be_bytes());
        self.msg(b'K', &payload)
    }

    pub fn ready(self, status: u8) -> Self {
        self.msg(b'Z', &[status])
    }

    pub fn parse_complete(self) -> Self {
        self.msg(b'1', &[])
    }

    pub fn bind_complete(self) -> Self {
        self.msg(b'2', &[])
    }

    pub fn close_complete(self) -> Self {
        self.msg(b'3', &[])
    }

    pub fn no_data(self) -> Self {
        self.msg(b'n', &[])
    }

    pub fn parameter_description(self, oids: &[u32]) -> Self {
        let mut payload = (oids.len() as i16).to_be_bytes().to_vec();
        for oid in oids {
            payload.extend_from_slice(&oid.to_be_bytes());
        }
        self.msg(b't', &payload)
    }

    /// RowDescription from `(name, type_oid)` pairs; sizes and modifiers are
    /// generic variable-width values.
    pub fn row_description(self, columns: &[(&str, u32)]) -> Self {
        let mut payload = (columns.len() as i16).to_be_bytes().to_vec();
        for (name, type_oid) in columns {
            payload.extend_from_slice(name.as_bytes());
            payload.push(0);
            payload.extend_from_slice(&0_u32.to_be_bytes()); // table oid
            payload.extend_from_slice(&0_i16.to_be_bytes()); // column id
            payload.extend_from_slice(&type_oid.to_be_bytes());
            payload.extend_from_slice(&(-1_i16).to_be_bytes()); // size
            payload.extend_from_slice(&(-1_i32).to_be_bytes()); // modifier
            payload.extend_from_slice(&1_u16.to_be_bytes()); // binary
        }
        self.msg(b'T', &payload)
    }

    pub fn data_row(self, cells: &[Option<&[u8]>]) -> Self {
        let mut payload = (cells.len() as i16).to_be_bytes().to_vec();
        for cell in cells {
            match cell {
                Some(bytes) => {
                    payload.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
                    payload.extend_from_slice(bytes);
                }
                None => payload.extend_from_slice(&(-1_i32).to_be_bytes()),
            }
        }
        self.msg(b'D', &payload)
    }

    pub fn command_complete(self, tag: &str) -> Self {
        let mut payload = tag.as_bytes().to_vec();
        payload.push(0);
        self.msg(b'C', &payload)
    }

    pub fn empty_query(self) -> Self {
        self.msg(b'I', &[])
    }

    pub fn error_response(self, severity: &str, code: &str, message: &str) -> Self {
        let mut payload = Vec::new();
        for (field, value) in [(b'V', severity), (b'C', code), (b'M', message)] {
            payload.push(field);
            payload.extend_from_slice(value.as_bytes());
            payload.push(0);
        }
        payload.push(0);
        self.msg(b'E', &payload)
    }

    pub fn notice(self, severity: &str, message: &str) -> Self {
        let mut payload = Vec::new();
        for (field, value) in [(b'V', severity), (b'M', message)] {
            payload.push(field);
            payload.extend_from_slice(value.as_bytes());
            payload.push(0);
        }
        payload.push(0);
        self.msg(b'N', &payload)
    }

    pub fn notification(self, pid: u32, channel: &str, body: &str) -> Self {
        let mut payload = pid.to_be_bytes().to_vec();
        payload.extend_from_slice(channel.as_bytes());
        payload.push(0);
        payload.extend_from_slice(body.as_bytes());
        payload.push(0);
        self.msg(b'A', &payload)
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Build the transport, handing reads out `chunk` bytes at a time.
    pub fn into_transport(self, chunk: usize) -> (ScriptedTransport, TransportProbe) {
        let state = Arc::new(Mutex::new(State {
            input: self.bytes,
            ..Default::default()
        }));
        (
            ScriptedTransport {
                state: state.clone(),
                chunk,
            },
            TransportProbe { state },
        )
    }
}

/// The canned startup exchange every connection test begins with.
pub fn handshake_script() -> Script {
    Script::new()
        .auth_ok()
        .parameter_status("server_version", "16.3")
        .parameter_status("TimeZone", "UTC")
        .backend_key(4242, 0xC0FFEE)
        .ready(b'I')
}

/// Connect and handshake over the given script.
#[allow(dead_code)]
pub async fn connected(script: Script) -> (Connection<ScriptedTransport>, TransportProbe) {
    connected_with(script, Config::new("alice").database("app"), 64).await
}

/// Connect and handshake with explicit config and read-chunk size.
pub async fn connected_with(
    script: Script,
    config: Config,
    chunk: usize,
) -> (Connection<ScriptedTransport>, TransportProbe) {
    let (transport, probe) = script.into_transport(chunk);
    let mut conn = Connection::new(transport, config);
    conn.handshake().await.expect("handshake failed");
    (conn, probe)
}

/// Split a captured client byte stream into its message type bytes,
/// optionally skipping the untyped startup message at the front.
#[allow(dead_code)]
pub fn typed_messages(written: &[u8], skip_startup: bool) -> Vec<u8> {
    let mut types = Vec::new();
    let mut pos = 0;
    if skip_startup {
        let len = i32::from_be_bytes(written[0..4].try_into().unwrap()) as usize;
        pos = len;
    }
    while pos < written.len() {
        let type_byte = written[pos];
        let len =
            i32::from_be_bytes(written[pos + 1..pos + 5].try_into().unwrap()) as usize;
        types.push(type_byte);
        pos += 1 + len;
    }
    types
}
