//! The five-state connection state machine that negotiates a Geneve
//! tunnel-metadata field before the reconciler is allowed to run. Grounded
//! on the `S_NEW` / `S_TLV_TABLE_REQUESTED` / `S_TLV_TABLE_MOD_SENT` /
//! `S_CLEAR_FLOWS` / `S_UPDATE_FLOWS` states and the `process_tlv_table_reply`
//! helper in the original controller.

use crate::connection::{OfErrorKind, TlvMapping, Xid};

/// Tunnel-metadata option identity OVN negotiates for Geneve. Kept as the
/// default so existing deployments keep working, but callers may override
/// it through `EngineConfig::tlv_option` (see `SPEC_FULL.md` §10.3) rather
/// than this being a hardcoded constant only upstream can change.
pub const DEFAULT_GENEVE_CLASS: u16 = 0x0102;
pub const DEFAULT_GENEVE_TYPE: u8 = 0x80;
pub const DEFAULT_GENEVE_LEN: u8 = 4;

/// Number of tunnel-metadata option slots a switch's TLV table can hold
/// (`TUN_METADATA_NUM_OPTS` in the original, asserted to be 64).
pub const TUN_METADATA_NUM_OPTS: u16 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TlvOption {
    pub class: u16,
    pub typ: u8,
    pub len: u8,
}

impl Default for TlvOption {
    fn default() -> Self {
        Self {
            class: DEFAULT_GENEVE_CLASS,
            typ: DEFAULT_GENEVE_TYPE,
            len: DEFAULT_GENEVE_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    TlvTableRequested { xid: Xid },
    TlvTableModSent { mod_xid: Xid, barrier_xid: Xid },
    ClearFlows,
    UpdateFlows,
}

impl ConnectionState {
    pub fn is_update_flows(&self) -> bool {
        matches!(self, ConnectionState::UpdateFlows)
    }
}

/// Outcome of examining an `NXT_TLV_TABLE_REPLY`.
pub(crate) enum TlvReplyOutcome {
    /// Our option is already mapped at a usable index; negotiation is done.
    UseExisting { field_id: u16 },
    /// No usable existing mapping, but a free index exists; send
    /// `NXT_TLV_TABLE_MOD` to claim it.
    RequestMapping { mapping: TlvMapping, field_id: u16 },
    /// Negotiation cannot succeed; tunnel metadata is disabled for this
    /// connection.
    Failed { reason: String },
}

/// Port of `process_tlv_table_reply`: scans the reply's mappings for our
/// option; if present at a valid index, Geneve is ready to use; otherwise
/// picks the lowest free index and asks the switch to claim it.
pub(crate) fn process_tlv_table_reply(
    option: TlvOption,
    mappings: &[TlvMapping],
) -> TlvReplyOutcome {
    let mut free_mask: u64 = u64::MAX;

    for map in mappings {
        if map.option_class == option.class
            && map.option_type == option.typ
            && map.option_len == option.len
        {
            if map.index >= TUN_METADATA_NUM_OPTS {
                return TlvReplyOutcome::Failed {
                    reason: format!(
                        "desired Geneve tunnel option {:#x},{},{} already in use \
                         with unsupported index {}",
                        option.class, option.typ, option.len, map.index
                    ),
                };
            }
            return TlvReplyOutcome::UseExisting {
                field_id: map.index,
            };
        }
        if map.index < TUN_METADATA_NUM_OPTS {
            free_mask &= !(1u64 << map.index);
        }
    }

    if free_mask == 0 {
        return TlvReplyOutcome::Failed {
            reason: "no Geneve options free for use".to_string(),
        };
    }

    let index = free_mask.trailing_zeros() as u16;
    TlvReplyOutcome::RequestMapping {
        mapping: TlvMapping {
            option_class: option.class,
            option_type: option.typ,
            option_len: option.len,
            index,
        },
        field_id: index,
    }
}

pub(crate) fn is_tlv_race(kind: OfErrorKind) -> bool {
    matches!(kind, OfErrorKind::TlvRace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_mapping_at_valid_index_is_used() {
        let option = TlvOption::default();
        let mappings = vec![TlvMapping {
            option_class: option.class,
            option_type: option.typ,
            option_len: option.len,
            index: 5,
        }];
        match process_tlv_table_reply(option, &mappings) {
            TlvReplyOutcome::UseExisting { field_id } => assert_eq!(field_id, 5),
            _ => panic!("expected UseExisting"),
        }
    }

    #[test]
    fn existing_mapping_past_bound_fails() {
        let option = TlvOption::default();
        let mappings = vec![TlvMapping {
            option_class: option.class,
            option_type: option.typ,
            option_len: option.len,
            index: 64,
        }];
        match process_tlv_table_reply(option, &mappings) {
            TlvReplyOutcome::Failed { .. } => {}
            _ => panic!("expected Failed"),
        }
    }

    #[test]
    fn picks_lowest_free_index() {
        let option = TlvOption::default();
        let other = TlvMapping {
            option_class: 0xffff,
            option_type: 0,
            option_len: 4,
            index: 0,
        };
        match process_tlv_table_reply(option, &[other]) {
            TlvReplyOutcome::RequestMapping { mapping, field_id } => {
                assert_eq!(field_id, 1);
                assert_eq!(mapping.index, 1);
            }
            _ => panic!("expected RequestMapping"),
        }
    }

    #[test]
    fn all_slots_taken_fails() {
        let option = TlvOption::default();
        let mappings: Vec<TlvMapping> = (0..64)
            .map(|i| TlvMapping {
                option_class: 0xffff,
                option_type: 0,
                option_len: 4,
                index: i,
            })
            .collect();
        match process_tlv_table_reply(option, &mappings) {
            TlvReplyOutcome::Failed { .. } => {}
            _ => panic!("expected Failed"),
        }
    }
}
