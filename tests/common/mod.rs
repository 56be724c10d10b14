//! Shared test infrastructure.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use snmp_engine::agent::Agent;
use snmp_engine::handler::scalar::{ObjectIdentifierOidHandler, OctetStringOidHandler};
use snmp_engine::oid::well_known;
use snmp_engine::{oid, ClientContext, StatKind};

pub const TEST_COMMUNITY: &[u8] = b"private";

pub fn sys_descr_value() -> &'static str {
    "Test System Description"
}

pub fn sys_object_id_value() -> snmp_engine::Oid {
    oid!(1, 3, 6, 1, 4, 1, 424242, 1, 1)
}

/// Initialize test logging once; honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Start an agent on an ephemeral localhost port serving the system
/// scalars used across the scenario tests.
pub async fn system_agent(name: &str) -> Agent {
    Agent::builder(name)
        .bind("127.0.0.1:0".parse().unwrap())
        .community(TEST_COMMUNITY)
        .single_var_handler(
            well_known::sys_descr(),
            Arc::new(OctetStringOidHandler::from_str(sys_descr_value(), false)),
        )
        .single_var_handler(
            well_known::sys_object_id(),
            Arc::new(ObjectIdentifierOidHandler::new(sys_object_id_value(), false)),
        )
        .build()
        .await
        .expect("agent bind")
}

/// Start a client context on an ephemeral localhost port.
pub async fn client_context(name: &str) -> ClientContext {
    ClientContext::builder(name)
        .bind("127.0.0.1:0".parse().unwrap())
        .log_decode_errors(true)
        .build()
        .await
        .expect("client context bind")
}

/// A localhost address that nothing listens on.
pub fn black_hole() -> SocketAddr {
    // Bind an ephemeral socket and drop it; nothing answers afterwards.
    let socket = std::net::UdpSocket::bind("127.0.0.1:0").expect("probe bind");
    let addr = socket.local_addr().expect("probe addr");
    drop(socket);
    addr
}

/// Stat increments travel over a channel; poll briefly before asserting.
pub async fn wait_for_stat<F, Fut>(query: F, expected: u64) -> u64
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = snmp_engine::Result<u64>>,
{
    let mut value = 0;
    for _ in 0..100 {
        value = query().await.expect("stat query");
        if value == expected {
            return value;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    value
}

/// Assert a set of current-bin stats on a client context.
pub async fn assert_client_stats(ctxt: &ClientContext, expectations: &[(StatKind, u64)]) {
    for &(kind, expected) in expectations {
        let actual = wait_for_stat(|| ctxt.get_stat(kind, 0), expected).await;
        assert_eq!(actual, expected, "stat {:?} mismatch", kind);
    }
}
