//! # snmp-engine
//!
//! An embeddable SNMP v1/v2c engine. Three roles share one concurrency
//! and transport substrate:
//!
//! - **Client**: a [`ClientContext`] tracks concurrent requests over a
//!   single UDP socket, with per-request timeout/retry and flow control.
//! - **Agent**: an [`Agent`] answers GET/GETNEXT/GETBULK/SET through a
//!   longest-prefix handler registry and an application transaction
//!   provider.
//! - **Trap receiver**: a [`TrapReceiver`] surfaces v1/v2c traps and
//!   informs.
//!
//! Each engine owns its socket and a small set of cooperating tasks
//! (listener, outbound writer, stats tracker, request tracker) under a
//! supervisor that restarts the socket workers after runtime failures.
//! A 24-hour rolling statistics window in fifteen-minute bins is
//! queryable on every role.
//!
//! ## Client example
//!
//! ```rust,no_run
//! use snmp_engine::{ClientContext, oid};
//!
//! #[tokio::main]
//! async fn main() -> snmp_engine::Result<()> {
//!     let ctxt = ClientContext::new("poller").await?;
//!     let client = ctxt.v2c_client("public", "192.0.2.1:161".parse().unwrap());
//!
//!     let mut req = ctxt.allocate_get_request();
//!     req.add_oid(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));
//!     let req = client.send_request(req).await;
//!
//!     match req.response() {
//!         Some(pdu) => println!("sysDescr: {}", pdu.varbinds[0].value),
//!         None => println!("failed: {:?}", req.transport_error()),
//!     }
//!     ctxt.free_request(req);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod ber;
pub mod client;
pub mod engine;
pub mod error;
pub mod handler;
pub mod message;
pub mod oid;
pub mod pdu;
pub mod trap;
pub mod value;
pub mod varbind;
pub mod version;

pub use agent::{Agent, AgentBuilder};
pub use client::{ClientContext, ClientContextBuilder, CommunityRequest, V2cClient};
pub use engine::stats::{StatKind, StatsBin, STATS_BINS};
pub use error::{DecodeErrorKind, Error, ErrorStatus, Result, TransportError};
pub use handler::{
    HandlerError, NoopTransactionProvider, OidHandler, TransactionProvider, TxnHandle,
};
pub use message::{CommunityMessage, Message, V1TrapMessage};
pub use oid::Oid;
pub use pdu::{GenericTrap, Pdu, PduType, TrapV1Pdu};
pub use trap::{Notification, NotificationKind, TrapReceiver, TrapReceiverBuilder};
pub use value::{BitString, Value};
pub use varbind::VarBind;
pub use version::Version;
