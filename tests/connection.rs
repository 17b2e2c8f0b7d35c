//! End-to-end connection scenarios against a scripted server.

mod common;

use std::sync::{Arc, Mutex};

use common::{Script, connected, connected_with, handshake_script, typed_messages};
use pglink::protocol::frontend::md5_password;
use pglink::protocol::types::oid;
use pglink::{Config, Connection, Error, TransactionStatus, Value};

// === scenario 1: handshake ===

#[tokio::test]
async fn handshake_reaches_idle() {
    let (conn, probe) = connected(handshake_script()).await;

    assert!(conn.is_ready());
    assert_eq!(conn.transaction_status(), TransactionStatus::Idle);
    assert_eq!(conn.server_param("server_version"), Some("16.3"));
    let key = conn.backend_key().unwrap();
    assert_eq!((key.pid, key.secret_key), (4242, 0xC0FFEE));

    // the startup message carries the session parameters
    let written = probe.written();
    let len = i32::from_be_bytes(written[0..4].try_into().unwrap()) as usize;
    let startup = &written[..len];
    assert_eq!(&startup[4..8], &196608_i32.to_be_bytes());
    let body = String::from_utf8_lossy(&startup[8..]);
    assert!(body.contains("user\0alice\0"));
    assert!(body.contains("database\0app\0"));
    assert!(body.contains("client_encoding\0UTF8\0"));
    assert!(body.contains("datestyle\0ISO, YMD\0"));
}

#[tokio::test]
async fn handshake_runs_exactly_once() {
    let (mut conn, _probe) = connected(handshake_script()).await;
    assert!(matches!(
        conn.handshake().await,
        Err(Error::InvalidUsage(_))
    ));
}

#[tokio::test]
async fn cleartext_auth_sends_password() {
    let script = Script::new()
        .auth_cleartext()
        .auth_ok()
        .ready(b'I');
    let config = Config::new("alice").password("hunter2");
    let (conn, probe) = connected_with(script, config, 16).await;
    assert!(conn.is_ready());

    let types = typed_messages(&probe.written(), true);
    assert_eq!(types, vec![b'p']);
    assert!(probe.written().ends_with(b"hunter2\0"));
}

#[tokio::test]
async fn md5_auth_sends_salted_hash() {
    let salt = [0xDE, 0xAD, 0xBE, 0xEF];
    let script = Script::new().auth_md5(salt).auth_ok().ready(b'I');
    let config = Config::new("alice").password("hunter2");
    let (_conn, probe) = connected_with(script, config, 16).await;

    let expected = md5_password("alice", "hunter2", &salt);
    let written = probe.written();
    assert!(written.ends_with(format!("{expected}\0").as_bytes()));
}

#[tokio::test]
async fn unsupported_auth_kind_fails_closed() {
    let script = Script::new().auth_unsupported(10);
    let (transport, _probe) = script.into_transport(64);
    let mut conn = Connection::new(transport, Config::new("alice"));
    let err = conn.handshake().await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedAuthKind(10)));
    assert!(conn.is_closed());
}

// === scenario 2: simple exec ===

#[tokio::test]
async fn simple_exec_returns_tag() {
    let script = handshake_script()
        .command_complete("CREATE TABLE")
        .ready(b'I');
    let (mut conn, probe) = connected(script).await;

    let tag = conn.exec("CREATE TABLE t(id int)", &[]).await.unwrap();
    assert!(tag.as_str().starts_with("CREATE TABLE"));
    assert_eq!(conn.transaction_status(), TransactionStatus::Idle);

    // a parameterless exec travels as a single Query message
    assert_eq!(typed_messages(&probe.written(), true), vec![b'Q']);
}

#[tokio::test]
async fn simple_exec_discards_row_traffic() {
    let script = handshake_script()
        .row_description(&[("n", oid::INT4)])
        .data_row(&[Some(&1_i32.to_be_bytes())])
        .data_row(&[Some(&2_i32.to_be_bytes())])
        .command_complete("SELECT 2")
        .ready(b'I');
    let (mut conn, _probe) = connected(script).await;

    let tag = conn.exec("SELECT n FROM t", &[]).await.unwrap();
    assert_eq!(tag.rows_affected(), Some(2));
}

// === scenario 3: parameterized exec ===

#[tokio::test]
async fn extended_exec_runs_full_sequence_once() {
    let script = handshake_script()
        .parse_complete()
        .parameter_description(&[oid::INT4])
        .no_data()
        .bind_complete()
        .no_data()
        .command_complete("DELETE 0")
        .close_complete()
        .ready(b'I');
    let (mut conn, probe) = connected(script).await;

    let tag = conn
        .exec("DELETE FROM t WHERE id=$1", &[Value::from(42)])
        .await
        .unwrap();
    assert_eq!(tag.as_str(), "DELETE 0");
    assert_eq!(conn.transaction_status(), TransactionStatus::Idle);

    // Parse, Describe(S), Flush, then Bind, Describe(P), Execute, Close, Sync
    assert_eq!(
        typed_messages(&probe.written(), true),
        vec![b'P', b'D', b'H', b'B', b'D', b'E', b'C', b'S']
    );
}

#[tokio::test]
async fn extended_exec_rejects_wrong_arg_count() {
    let script = handshake_script()
        .parse_complete()
        .parameter_description(&[oid::INT4, oid::TEXT])
        .no_data()
        .ready(b'I')
        // connection stays usable
        .command_complete("SELECT 1")
        .ready(b'I');
    let (mut conn, _probe) = connected(script).await;

    let err = conn
        .exec("SELECT $1, $2", &[Value::from(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ParamCount { expected: 2, got: 1 }));
    assert!(!conn.is_closed());

    conn.exec("SELECT 1", &[]).await.unwrap();
}

// === scenario 4: query to exhaustion ===

#[tokio::test]
async fn query_yields_rows_until_done() {
    let columns = [("typname", oid::NAME), ("oid", oid::OID)];
    let script = handshake_script()
        .parse_complete()
        .parameter_description(&[])
        .row_description(&columns)
        .bind_complete()
        .row_description(&columns)
        .data_row(&[Some(b"bool"), Some(&16_u32.to_be_bytes())])
        .data_row(&[Some(b"bytea"), Some(&17_u32.to_be_bytes())])
        .data_row(&[None, Some(&0_u32.to_be_bytes())])
        .command_complete("SELECT 3")
        .close_complete()
        .ready(b'I');
    let (mut conn, _probe) = connected(script).await;

    let mut rows = conn
        .query("SELECT typname, oid FROM pg_type", &[])
        .await
        .unwrap();
    let names: Vec<_> = rows.column_names().map(str::to_owned).collect();
    assert_eq!(names, ["typname", "oid"]);

    let mut seen = Vec::new();
    while let Some(row) = rows.next().await {
        let row = row.unwrap();
        seen.push((row.get(0).cloned().unwrap(), row.get(1).cloned().unwrap()));
    }
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].0, Value::Text("bool".into()));
    assert_eq!(seen[0].1, Value::Oid(16));
    assert_eq!(seen[2].0, Value::Null);

    // iterating past the end stays done
    assert!(rows.next().await.is_none());
    assert!(rows.is_done());
    assert_eq!(rows.tag().unwrap().as_str(), "SELECT 3");

    drop(rows);
    assert_eq!(conn.transaction_status(), TransactionStatus::Idle);
}

// === scenario 5: early close drains the stream ===

#[tokio::test]
async fn closing_mid_query_drains_to_ready() {
    let columns = [("n", oid::INT4)];
    let script = handshake_script()
        .parse_complete()
        .parameter_description(&[])
        .row_description(&columns)
        .bind_complete()
        .row_description(&columns)
        .data_row(&[Some(&1_i32.to_be_bytes())])
        .data_row(&[Some(&2_i32.to_be_bytes())])
        .data_row(&[Some(&3_i32.to_be_bytes())])
        .command_complete("SELECT 3")
        .close_complete()
        .ready(b'I');
    let (mut conn, probe) = connected(script).await;

    let mut rows = conn.query("SELECT n FROM t", &[]).await.unwrap();
    let first = rows.next().await.unwrap().unwrap();
    assert_eq!(first.get(0), Some(&Value::Int4(1)));

    rows.close().await.unwrap();
    assert!(rows.is_done());
    drop(rows);

    // no server bytes are left unread and the session is idle again
    assert_eq!(probe.unread(), 0);
    assert_eq!(conn.transaction_status(), TransactionStatus::Idle);
}

// === scenario 6: single-operation interlock ===

#[tokio::test]
async fn second_query_while_rows_open_is_rejected_without_io() {
    let columns = [("n", oid::INT4)];
    let script = handshake_script()
        .parse_complete()
        .parameter_description(&[])
        .row_description(&columns)
        .bind_complete()
        .row_description(&columns)
        .data_row(&[Some(&1_i32.to_be_bytes())])
        .data_row(&[Some(&2_i32.to_be_bytes())])
        .command_complete("SELECT 2")
        .close_complete()
        .ready(b'I');
    let (mut conn, probe) = connected(script).await;

    let mut rows = conn.query("SELECT n FROM t", &[]).await.unwrap();
    rows.next().await.unwrap().unwrap();
    // abandoned mid-stream: the connection stays engaged
    drop(rows);

    let written_before = probe.written().len();
    let err = conn.query("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyEngaged));
    let err = conn.exec("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyEngaged));
    assert_eq!(probe.written().len(), written_before, "bytes were emitted");
}

// === error resync ===

#[tokio::test]
async fn server_error_resyncs_and_connection_recovers() {
    let script = handshake_script()
        // extended exec fails at Parse
        .error_response("ERROR", "42P01", "relation \"missing\" does not exist")
        .ready(b'I')
        // following simple exec succeeds
        .command_complete("CREATE TABLE")
        .ready(b'I');
    let (mut conn, probe) = connected(script).await;

    let err = conn
        .exec("DELETE FROM missing WHERE id=$1", &[Value::from(1)])
        .await
        .unwrap_err();
    let Error::Server(notice) = &err else {
        panic!("expected a server error, got {err:?}");
    };
    assert_eq!(notice.code.as_deref(), Some("42P01"));
    assert!(!conn.is_closed());

    let tag = conn.exec("CREATE TABLE t(id int)", &[]).await.unwrap();
    assert_eq!(tag.as_str(), "CREATE TABLE");

    // the failed attempt closed with a bare Sync after the error
    let types = typed_messages(&probe.written(), true);
    assert_eq!(types, vec![b'P', b'D', b'H', b'S', b'Q']);
}

#[tokio::test]
async fn empty_query_fails_simple_exec() {
    let script = handshake_script().empty_query().ready(b'I');
    let (mut conn, _probe) = connected(script).await;
    assert!(matches!(
        conn.exec("", &[]).await,
        Err(Error::EmptyQuery)
    ));
    assert!(!conn.is_closed());
}

// === transactions ===

#[tokio::test]
async fn begin_commit_round_trip() {
    let script = handshake_script()
        .command_complete("BEGIN")
        .ready(b'T')
        .command_complete("INSERT 0 1")
        .ready(b'T')
        .command_complete("COMMIT")
        .ready(b'I');
    let (mut conn, probe) = connected(script).await;

    let mut tx = conn.begin().await.unwrap();
    assert_eq!(tx.transaction_status(), TransactionStatus::InTransaction);

    let tag = tx.exec("INSERT INTO t VALUES (1)", &[]).await.unwrap();
    assert_eq!(tag.rows_affected(), Some(1));

    tx.commit().await.unwrap();
    assert!(tx.is_done());

    // commit and rollback are one-shot; nothing further hits the wire
    let written_before = probe.written().len();
    tx.commit().await.unwrap();
    tx.rollback().await.unwrap();
    assert_eq!(probe.written().len(), written_before);

    drop(tx);
    assert_eq!(conn.transaction_status(), TransactionStatus::Idle);
}

#[tokio::test]
async fn nested_begin_is_rejected() {
    let script = handshake_script().command_complete("BEGIN").ready(b'T');
    let (mut conn, _probe) = connected(script).await;

    let tx = conn.begin().await.unwrap();
    drop(tx);
    // the slot was released by drop, but the server is still in a
    // transaction; a fresh begin through the same connection is the
    // caller's decision. Nested begin through a live handle is not:
    let script2 = handshake_script().command_complete("BEGIN").ready(b'T');
    let (mut conn2, _probe2) = connected(script2).await;
    let mut tx2 = conn2.begin().await.unwrap();
    assert!(matches!(tx2.begin().await, Err(Error::InvalidUsage(_))));
}

#[tokio::test]
async fn begin_with_options_renders_sql() {
    let script = handshake_script().command_complete("BEGIN").ready(b'T');
    let (mut conn, probe) = connected(script).await;

    let options = pglink::TxOptions {
        isolation: Some(pglink::IsolationLevel::Serializable),
        read_only: true,
        deferrable: false,
    };
    let _tx = conn.begin_with(options).await.unwrap();
    let written = probe.written();
    let text = String::from_utf8_lossy(&written);
    assert!(text.contains("BEGIN ISOLATION LEVEL SERIALIZABLE READ ONLY"));
}

// === async messages ===

#[tokio::test]
async fn notices_and_notifications_reach_handlers() {
    let script = handshake_script()
        .notice("WARNING", "this table is haunted")
        .notification(99, "events", "payload!")
        .parameter_status("TimeZone", "PST8PDT")
        .command_complete("SELECT 0")
        .ready(b'I');
    let (mut conn, _probe) = connected(script).await;

    let notices = Arc::new(Mutex::new(Vec::new()));
    let notifications = Arc::new(Mutex::new(Vec::new()));
    {
        let notices = notices.clone();
        conn.on_notice(move |n| notices.lock().unwrap().push(n.message.clone().unwrap()));
    }
    {
        let notifications = notifications.clone();
        conn.on_notification(move |n| notifications.lock().unwrap().push(n.clone()));
    }

    conn.exec("SELECT pg_sleep(0)", &[]).await.unwrap();

    assert_eq!(
        notices.lock().unwrap().as_slice(),
        ["this table is haunted"]
    );
    let seen = notifications.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].pid, 99);
    assert_eq!(seen[0].channel, "events");
    assert_eq!(seen[0].payload, "payload!");
    drop(seen);

    // ParameterStatus updated the session map in passing
    assert_eq!(conn.server_param("TimeZone"), Some("PST8PDT"));
}

// === transport failure and close ===

#[tokio::test]
async fn eof_mid_operation_is_fatal() {
    let script = handshake_script(); // nothing scripted beyond startup
    let (mut conn, _probe) = connected(script).await;

    let err = conn.exec("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(conn.is_closed());
    assert!(matches!(conn.exec("SELECT 1", &[]).await, Err(Error::Closed)));
}

#[tokio::test]
async fn close_is_idempotent_and_terminates() {
    let (mut conn, probe) = connected(handshake_script()).await;

    conn.close().await.unwrap();
    conn.close().await.unwrap();
    assert!(conn.is_closed());
    assert!(probe.is_closed());

    // the last message on the wire is Terminate
    let types = typed_messages(&probe.written(), true);
    assert_eq!(types, vec![b'X']);
}

// === framer integration: tiny read chunks ===

#[tokio::test]
async fn one_byte_reads_still_work_end_to_end() {
    let script = handshake_script()
        .command_complete("SELECT 1")
        .ready(b'I');
    let (mut conn, _probe) =
        connected_with(script, Config::new("alice").database("app"), 1).await;
    let tag = conn.exec("SELECT 1", &[]).await.unwrap();
    assert_eq!(tag.as_str(), "SELECT 1");
}
