//! Flow reconciliation engine for the hypervisor-local SDN controller
//! agent: negotiates OpenFlow 1.3 tunnel-metadata options with the local
//! switch, then keeps its flow/group/meter tables converged with a desired
//! state built up by the caller, emitting the minimal batch of updates on
//! each [`engine::Engine::put`] call.
//!
//! The switch connection itself, and the group/meter id allocation it
//! shares with the rest of the agent, are collaborators supplied by the
//! embedder (see [`connection::SwitchConnection`] and
//! [`extend_table::ExtendTable`]) — this crate owns the reconciliation
//! algorithm, not the OpenFlow wire codec or transport.

pub mod connection;
pub mod ctzone;
pub mod desired;
pub mod engine;
pub mod error;
pub mod extend_table;
pub mod flow;
pub mod ids;
pub mod inject;
pub mod installed;
mod ratelimit;
mod reconcile;
mod state;

pub use connection::{OfErrorKind, OfMessage, Sent, SwitchConnection, TlvMapping, Xid};
pub use ctzone::{CtZonePendingEntry, CtZoneState, CtZoneTable};
pub use desired::DesiredFlowTable;
pub use engine::{Engine, EngineConfig};
pub use error::{OfctrlError, Result};
pub use extend_table::{ExtendEntry, ExtendTable, InMemoryExtendTable};
pub use flow::{Flow, FlowKey, Match};
pub use ids::{DesiredId, InstalledId, SourceId};
pub use inject::{MicroflowParser, ParsedMicroflow, PortLookup};
pub use installed::InstalledFlowTable;
pub use reconcile::ReconcileStats;
pub use state::ConnectionState;
