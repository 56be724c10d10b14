//! Trap emission and reception end-to-end.

mod common;

use std::sync::Arc;
use std::time::Duration;

use snmp_engine::agent::Agent;
use snmp_engine::handler::scalar::IntOidHandler;
use snmp_engine::trap::{NotificationKind, TrapReceiver};
use snmp_engine::{oid, GenericTrap, TrapV1Pdu, Value, VarBind, Version};

async fn trap_receiver(name: &str) -> TrapReceiver {
    TrapReceiver::builder(name)
        .bind("127.0.0.1:0".parse().unwrap())
        .build()
        .await
        .unwrap()
}

async fn trap_agent(name: &str) -> Agent {
    Agent::builder(name)
        .bind("127.0.0.1:0".parse().unwrap())
        .single_var_handler(
            oid!(1, 3, 6, 1, 4, 1, 424242, 1, 0),
            Arc::new(IntOidHandler::new(0, false)),
        )
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn v1_trap_roundtrip() {
    common::init_tracing();
    let receiver = trap_receiver("v1-receiver").await;
    let agent = trap_agent("v1-sender").await;

    let trap = TrapV1Pdu::new(
        oid!(1, 3, 6, 1, 4, 1, 424242),
        [127, 0, 0, 1],
        GenericTrap::LinkDown,
        0,
        5_000,
        vec![VarBind::new(
            oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 3),
            Value::Integer(3),
        )],
    );
    agent
        .send_v1_trap(receiver.local_addr(), &b"public"[..], trap.clone())
        .await
        .unwrap();

    let notification = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
        .await
        .expect("trap within deadline")
        .expect("receiver running");

    assert_eq!(notification.version, Version::V1);
    assert_eq!(notification.community.as_ref(), b"public");
    match notification.kind {
        NotificationKind::TrapV1(received) => assert_eq!(received, trap),
        other => panic!("expected v1 trap, got {:?}", other),
    }

    agent.shutdown().await;
    receiver.shutdown().await;
}

#[tokio::test]
async fn v2_trap_roundtrip() {
    common::init_tracing();
    let receiver = trap_receiver("v2-receiver").await;
    let agent = trap_agent("v2-sender").await;

    let varbinds = vec![
        VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(5_000)),
        VarBind::new(
            oid!(1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0),
            Value::ObjectIdentifier(oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 3)),
        ),
    ];
    agent
        .send_v2_trap(receiver.local_addr(), &b"public"[..], varbinds.clone())
        .await
        .unwrap();

    let notification = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
        .await
        .expect("trap within deadline")
        .expect("receiver running");

    assert_eq!(notification.version, Version::V2c);
    match notification.kind {
        NotificationKind::TrapV2(pdu) => assert_eq!(pdu.varbinds, varbinds),
        other => panic!("expected v2 trap, got {:?}", other),
    }

    agent.shutdown().await;
    receiver.shutdown().await;
}
