//! Packet injection: synthesizes a single packet from a logical-expression
//! description and sends it into the switch's pipeline as an
//! `OFPT_PACKET_OUT`. Grounded on `ofctrl_inject_pkt`/`ofctrl_lookup_port` in
//! the original; the logical-expression parser and the address-set/
//! port-group lookups it needs are external collaborators here exactly as
//! they are there (`expr_parse`, `expr_to_matches`, `addr_sets`,
//! `port_groups` all live in other OVN modules, not `ofctrl.c`).

use crate::connection::{OfMessage, SwitchConnection};
use crate::error::{OfctrlError, Result};

/// A parsed microflow ready to be emitted: the logical ingress port it
/// should appear to arrive on, and the raw packet bytes to send.
pub struct ParsedMicroflow {
    pub ingress_port_name: String,
    pub packet: Vec<u8>,
}

/// Parses an `inject-pkt`-style logical flow expression (`"inport==\"sw0-p1\"
/// && ..."`) into a concrete packet. Implemented by whatever owns the
/// logical-flow symbol table and address sets/port groups; out of scope
/// for this crate the same way `expr_parse` is out of scope for
/// `ofctrl.c`.
pub trait MicroflowParser {
    fn parse(&self, expr: &str) -> std::result::Result<ParsedMicroflow, String>;
}

/// Resolves a logical port name to the local OpenFlow port number it's
/// currently bound to (`ofctrl_lookup_port`).
pub trait PortLookup {
    fn lookup(&self, logical_port_name: &str) -> Option<u32>;
}

/// Parses `expr`, resolves its ingress port, and sends the resulting packet
/// as a `PACKET_OUT`. Returns a human-readable error (never a structured
/// one) on any failure, matching `ofctrl_inject_pkt`'s `char *` contract:
/// callers display the message, they don't match on it.
pub fn inject_pkt(
    conn: &mut dyn SwitchConnection,
    parser: &dyn MicroflowParser,
    ports: &dyn PortLookup,
    expr: &str,
) -> Result<()> {
    if conn.version().is_none() {
        return Err(OfctrlError::Inject("OpenFlow channel not ready.".into()));
    }

    let flow = parser
        .parse(expr)
        .map_err(|e| OfctrlError::Inject(format!("failed to parse flow: {e}")))?;

    let in_port = ports.lookup(&flow.ingress_port_name).ok_or_else(|| {
        OfctrlError::Inject(format!(
            "unknown ingress port '{}'",
            flow.ingress_port_name
        ))
    })?;

    conn.send(OfMessage::PacketOut {
        in_port,
        packet: flow.packet,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Sent, Xid};
    use std::collections::HashMap;

    struct FakeConn {
        next_xid: Xid,
        sent: Vec<OfMessage>,
        version: Option<u8>,
    }

    impl SwitchConnection for FakeConn {
        fn connection_seqno(&self) -> u64 {
            0
        }
        fn is_connected(&self) -> bool {
            true
        }
        fn version(&self) -> Option<u8> {
            self.version
        }
        fn send(&mut self, msg: OfMessage) -> Sent {
            self.next_xid += 1;
            self.sent.push(msg);
            Sent { xid: self.next_xid }
        }
        fn in_flight(&self) -> usize {
            0
        }
        fn recv(&mut self) -> Option<(Xid, OfMessage)> {
            None
        }
        fn set_probe_interval(&mut self, _secs: u32) {}
    }

    struct FakeParser;
    impl MicroflowParser for FakeParser {
        fn parse(&self, expr: &str) -> std::result::Result<ParsedMicroflow, String> {
            Ok(ParsedMicroflow {
                ingress_port_name: expr.to_string(),
                packet: vec![0xde, 0xad],
            })
        }
    }

    struct FakePorts(HashMap<String, u32>);
    impl PortLookup for FakePorts {
        fn lookup(&self, name: &str) -> Option<u32> {
            self.0.get(name).copied()
        }
    }

    #[test]
    fn rejects_when_channel_not_ready() {
        let mut conn = FakeConn {
            next_xid: 0,
            sent: vec![],
            version: None,
        };
        let err = inject_pkt(&mut conn, &FakeParser, &FakePorts(HashMap::new()), "sw0-p1")
            .unwrap_err();
        assert!(matches!(err, OfctrlError::Inject(_)));
    }

    #[test]
    fn sends_packet_out_on_success() {
        let mut conn = FakeConn {
            next_xid: 0,
            sent: vec![],
            version: Some(4),
        };
        let mut ports = HashMap::new();
        ports.insert("sw0-p1".to_string(), 7);
        inject_pkt(&mut conn, &FakeParser, &FakePorts(ports), "sw0-p1").unwrap();
        assert_eq!(conn.sent.len(), 1);
        assert!(matches!(conn.sent[0], OfMessage::PacketOut { in_port: 7, .. }));
    }

    #[test]
    fn unknown_port_is_an_error() {
        let mut conn = FakeConn {
            next_xid: 0,
            sent: vec![],
            version: Some(4),
        };
        let err = inject_pkt(&mut conn, &FakeParser, &FakePorts(HashMap::new()), "sw0-p1")
            .unwrap_err();
        assert!(matches!(err, OfctrlError::Inject(_)));
    }
}
