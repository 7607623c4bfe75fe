//! The opaque switch connection the engine drives. This module defines the
//! contract (`SwitchConnection`) and the message vocabulary (`OfMessage`)
//! the engine exchanges over it; it does not implement an actual OpenFlow
//! codec or transport — per the engine's scope, that is a collaborator's
//! concern, the same way `rconn`/`ofputil_*` live outside `ofctrl.c` itself
//! in the original (they're a separate library OVS links against).

use crate::flow::Flow;

pub type Xid = u32;

/// A single `(class, type, index)` tunnel-metadata mapping as reported by
/// an `NXT_TLV_TABLE_REPLY`, or requested in an `NXT_TLV_TABLE_MOD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvMapping {
    pub option_class: u16,
    pub option_type: u8,
    pub option_len: u8,
    pub index: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfErrorKind {
    /// `NXTTMFC_ALREADY_MAPPED` / `NXTTMFC_DUP_ENTRY`: another controller
    /// raced us allocating the same tunnel-metadata option.
    TlvRace,
    Other,
}

/// The subset of OpenFlow 1.3 (plus the Nicira TLV-table and
/// conntrack-flush-zone vendor extensions) messages the engine's state
/// machine and reconciler need to recognize, either to send or to receive.
#[derive(Debug, Clone)]
pub enum OfMessage {
    TlvTableRequest,
    TlvTableReply { mappings: Vec<TlvMapping> },
    TlvTableMod { mappings: Vec<TlvMapping> },
    BarrierRequest,
    BarrierReply,
    Error { kind: OfErrorKind, detail: String },
    EchoRequest,
    EchoReply,
    FlowModDeleteAll,
    FlowModAdd { flow: Flow },
    FlowModModify { flow: Flow },
    FlowModDelete { flow: Flow },
    GroupModDeleteAll,
    GroupAdd { group_id: u32, spec: String },
    GroupDelete { group_id: u32 },
    MeterModDeleteAll,
    MeterAdd { meter_id: u32, spec: String },
    MeterDelete { meter_id: u32 },
    CtFlushZone { zone: u16 },
    PacketOut { in_port: u32, packet: Vec<u8> },
    /// Anything the engine doesn't have a specific variant for, forwarded
    /// for informational logging only (mirrors `ofctrl_recv`'s catch-all
    /// "OpenFlow packet ignored" branch).
    Other,
}

/// A message that has been sent, carrying the xid the switch will echo back
/// in its reply (if any).
#[derive(Debug, Clone, Copy)]
pub struct Sent {
    pub xid: Xid,
}

/// The engine's view of the switch connection. An embedder supplies a
/// concrete implementation wrapping its actual OpenFlow transport
/// (`rconn`-equivalent); the engine only ever calls through this trait.
pub trait SwitchConnection {
    /// Bumps whenever the underlying transport reconnects. The engine resets
    /// its state machine to `S_NEW` whenever this changes between calls to
    /// `run`.
    fn connection_seqno(&self) -> u64;

    fn is_connected(&self) -> bool;

    /// The negotiated OpenFlow wire version, or `None` if no connection/
    /// version has been negotiated yet (`rconn_get_version(swconn) < 0`).
    fn version(&self) -> Option<u8>;

    /// Queues `msg` for transmission and returns the xid it was sent with.
    fn send(&mut self, msg: OfMessage) -> Sent;

    /// Number of messages queued for transmission but not yet flushed to
    /// the wire (`rconn_packet_counter_n_packets`). `put()` refuses to run
    /// while this is nonzero, to bound how much gets batched into one pass.
    fn in_flight(&self) -> usize;

    /// Non-blocking receive of the next inbound message, if any.
    fn recv(&mut self) -> Option<(Xid, OfMessage)>;

    fn set_probe_interval(&mut self, secs: u32);
}
