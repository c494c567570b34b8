//! Receive stream parser — the heart of the system. Consumes one
//! bulk-IN chunk and demultiplexes it into complete [`PassthruMsg`]
//! records, spilling overflow into the [`RxQueue`].
//!
//! Packet type and channel family are modeled as tagged enumerations and
//! resolved through [`decode`], a small decision table, rather than a
//! chain of fallthrough cases.

use crate::msg::{rx_status, PassthruMsg};
use crate::queue::RxQueue;
use crate::support::parse_timestamp;

/// The bus family a channel byte identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelFamily {
    /// ISO-9141 K-line.
    Iso9141,
    /// ISO-14230 (KWP2000) K-line.
    Iso14230,
    /// Raw CAN.
    Can,
    /// ISO-15765 CAN transport.
    Iso15765,
}

impl ChannelFamily {
    /// Decode the wire channel-family byte (spec §3/§4.3).
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x33 => Some(Self::Iso9141),
            0x34 => Some(Self::Iso14230),
            0x35 => Some(Self::Can),
            0x36 => Some(Self::Iso15765),
            _ => None,
        }
    }

    /// The wire byte for this family.
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Iso9141 => 0x33,
            Self::Iso14230 => 0x34,
            Self::Can => 0x35,
            Self::Iso15765 => 0x36,
        }
    }

    /// Maps a J2534 `ProtocolID` (3..6) onto the family the device
    /// uses to tag frames for that channel.
    pub fn from_protocol_id(protocol_id: u32) -> Option<Self> {
        match protocol_id {
            3 => Some(Self::Iso9141),
            4 => Some(Self::Iso14230),
            5 => Some(Self::Can),
            6 => Some(Self::Iso15765),
            _ => None,
        }
    }

    /// CAN-shaped families carry a 4-byte timestamp before their
    /// payload and compute payload length as `L - 5`; K-line-shaped
    /// families have no leading timestamp on fragment/start frames and
    /// compute payload length as `L - 1`.
    fn is_can_shaped(self) -> bool {
        matches!(self, Self::Can | Self::Iso15765)
    }
}

/// The eight packet-type codes the device's binary frames carry in
/// byte 4 of their header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Normal message (fragment).
    NormMsg,
    /// Transmit completed.
    TxDone,
    /// Transmit loopback message (fragment).
    TxLbMsg,
    /// Receive message end indication.
    RxMsgEndInd,
    /// Extended-addressing receive message end indication.
    ExtAddrMsgEndInd,
    /// Loopback message end indication.
    LbMsgEndInd,
    /// Normal message start indication.
    NormMsgStartInd,
    /// Transmit loopback start indication.
    TxLbStartInd,
}

impl PacketType {
    /// Decode the wire packet-type byte, or `None` for an unrecognised
    /// code (a typed parse failure instead of silently falling into a
    /// default arm).
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Self::NormMsg),
            0x10 => Some(Self::TxDone),
            0x20 => Some(Self::TxLbMsg),
            0x40 => Some(Self::RxMsgEndInd),
            0x44 => Some(Self::ExtAddrMsgEndInd),
            0x60 => Some(Self::LbMsgEndInd),
            0x80 => Some(Self::NormMsgStartInd),
            0xA0 => Some(Self::TxLbStartInd),
            _ => None,
        }
    }
}

/// Result of resolving a `(PacketType, ChannelFamily)` pair: what
/// `RxStatus` to assign, whether this frame carries a timestamp, how
/// many trailing payload bytes (if any) to copy, where `ExtraDataIndex`
/// lands once the frame is applied, and whether this frame finalises
/// (emits) the current output slot or only appends to it.
#[derive(Debug, Clone, Copy)]
pub struct FrameEffect {
    /// `RxStatus` to assign to the current slot.
    pub rx_status: u32,
    /// Whether bytes 5..9 of the frame are a timestamp to decode.
    pub has_timestamp: bool,
    /// Whether this frame carries payload bytes to copy into the current
    /// slot at all. K-line start/end indications carry no payload of
    /// their own — their `DataSize` comes entirely from the fragment
    /// frames already accumulated — so this is `false` for them.
    pub copies_payload: bool,
    /// Whether this frame finalises the current slot (advances to the
    /// next one) or only accumulates into it.
    pub finalizes: bool,
    /// `ExtraDataIndex` to stamp on the slot once finalised; ignored
    /// when `finalizes` is false.
    pub extra_data_index_on_finalize: ExtraDataIndex,
}

/// `ExtraDataIndex` at finalisation: either zero (TX_DONE / start
/// indications carry no "extra data" boundary) or equal to the
/// accumulated `DataSize` (ordinary completed messages).
#[derive(Debug, Clone, Copy)]
pub enum ExtraDataIndex {
    /// Always zero.
    Zero,
    /// Equal to the slot's final `DataSize`.
    EqualsDataSize,
}

/// Resolve the decision table of spec §4.3/§9 for one `(packet_type,
/// family)` pair.
pub fn decode(packet_type: PacketType, family: ChannelFamily) -> FrameEffect {
    let can_shaped = family.is_can_shaped();
    use PacketType::*;
    match packet_type {
        TxDone => FrameEffect {
            rx_status: rx_status::TX_DONE,
            has_timestamp: can_shaped,
            // original_source/j2534/j2534.c:960-964 only copies for
            // ISO15765/CAN; the CAN-shaped data-copy rule applies, K-line
            // has no TX_DONE payload.
            copies_payload: can_shaped,
            finalizes: true,
            extra_data_index_on_finalize: ExtraDataIndex::Zero,
        },
        NormMsgStartInd | TxLbStartInd => FrameEffect {
            rx_status: if can_shaped {
                rx_status::TX_INDICATION_LOOPBACK
            } else {
                rx_status::START_OF_MESSAGE
            },
            has_timestamp: can_shaped,
            // K-line start indications always report DataSize=0
            // (original_source/j2534/j2534.c:1000-1005); only the
            // CAN-shaped start indication carries a payload.
            copies_payload: can_shaped,
            finalizes: true,
            extra_data_index_on_finalize: ExtraDataIndex::Zero,
        },
        NormMsg | TxLbMsg => FrameEffect {
            rx_status: if matches!(packet_type, TxLbMsg) {
                rx_status::TX_MSG_TYPE
            } else {
                rx_status::NORMAL
            },
            has_timestamp: can_shaped,
            copies_payload: true,
            finalizes: can_shaped,
            extra_data_index_on_finalize: ExtraDataIndex::EqualsDataSize,
        },
        RxMsgEndInd | ExtAddrMsgEndInd | LbMsgEndInd => FrameEffect {
            rx_status: if matches!(packet_type, LbMsgEndInd) {
                rx_status::TX_MSG_TYPE
            } else {
                rx_status::NORMAL
            },
            has_timestamp: true,
            // K-line end indications only supply the timestamp; the
            // message body was already copied by the fragment frames
            // (original_source/j2534/j2534.c:1104-1111 copies nothing
            // here for ISO9141/ISO14230).
            copies_payload: can_shaped,
            finalizes: true,
            extra_data_index_on_finalize: ExtraDataIndex::EqualsDataSize,
        },
    }
}

/// Number of payload bytes a frame of on-wire length `l` contributes,
/// given the family's shape. Guards against underflow per spec §9's
/// open question: CAN-shaped frames need `L >= 5`, K-line-shaped frames
/// need `L >= 1`.
fn payload_len(l: u8, can_shaped: bool) -> usize {
    let l = l as i32;
    if can_shaped {
        if l >= 5 {
            (l - 5) as usize
        } else {
            0
        }
    } else if l >= 1 {
        (l - 1) as usize
    } else {
        0
    }
}

/// Outcome of one call to [`consume`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsumeResult {
    /// Number of slots in the caller's array that were filled.
    pub filled: usize,
}

/// Parse one bulk-IN chunk, filling `out` (which must have at least one
/// element) and overflowing into `queue`. `family` is the current
/// channel's bus family and `protocol_id` stamps every produced message.
///
/// Mirrors the cursor-advancement rule of spec §4.3: after handling a
/// frame, the cursor advances by `L + 4`.
pub fn consume(
    chunk: &[u8],
    channel_byte: u8,
    family: ChannelFamily,
    protocol_id: u32,
    out: &mut [PassthruMsg],
    queue: &mut RxQueue,
) -> ConsumeResult {
    let mut cursor = 0usize;
    let mut slot = 0usize;
    // The active (not-yet-finalized) slot being accumulated into.
    let mut current = PassthruMsg {
        protocol_id,
        ..Default::default()
    };
    let mut have_current = false;

    while cursor + 5 <= chunk.len() {
        if chunk[cursor] != b'a' || chunk[cursor + 1] != b'r' {
            break;
        }
        let family_byte = chunk[cursor + 2];
        if family_byte == b'o' {
            // bare 5-byte acknowledgement
            cursor += 5;
            continue;
        }
        if family_byte != channel_byte {
            break;
        }
        let l = chunk[cursor + 3];
        let packet_type = match PacketType::from_byte(chunk[cursor + 4]) {
            Some(pt) => pt,
            None => {
                log::warn!("unrecognised packet type 0x{:02X}, skipping frame", chunk[cursor + 4]);
                cursor += l as usize + 4;
                continue;
            }
        };

        let effect = decode(packet_type, family);
        let can_shaped = family.is_can_shaped();
        let pos = cursor + 5;

        if !have_current {
            current = PassthruMsg {
                protocol_id,
                ..Default::default()
            };
            have_current = true;
        }

        if effect.has_timestamp && pos + 4 <= chunk.len() {
            let mut ts_bytes = [0u8; 4];
            ts_bytes.copy_from_slice(&chunk[pos..pos + 4]);
            current.timestamp = parse_timestamp(ts_bytes);
        }

        if effect.copies_payload {
            let data_offset = if effect.has_timestamp { pos + 4 } else { pos };
            let n = payload_len(l, can_shaped).min(chunk.len().saturating_sub(data_offset));
            let n = n.min(crate::msg::PM_DATA_LEN.saturating_sub(current.data_size as usize));
            if n > 0 {
                let start = current.data_size as usize;
                current.data[start..start + n].copy_from_slice(&chunk[data_offset..data_offset + n]);
                current.data_size += n as u32;
            }
        }

        current.rx_status = effect.rx_status;
        current.tx_flags = 0;

        if effect.finalizes {
            current.extra_data_index = match effect.extra_data_index_on_finalize {
                ExtraDataIndex::Zero => 0,
                ExtraDataIndex::EqualsDataSize => current.data_size,
            };

            if slot < out.len() {
                out[slot] = current;
                slot += 1;
            } else {
                queue.enqueue(current);
            }
            have_current = false;
        }

        cursor += l as usize + 4;
    }

    // A chunk may end mid-accumulation (K-line fragment awaiting its end
    // indication); the partially built slot is not emitted yet. The next
    // chunk read continues into a fresh accumulator, matching the
    // single-threaded, sequential-consume contract of spec §5 (no
    // cross-call fragment carry-over is specified, so an unterminated
    // fragment at chunk end is simply dropped on the next read).
    let _ = have_current;

    ConsumeResult { filled: slot }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(channel: u8, l: u8, packet_type: u8, rest: &[u8]) -> Vec<u8> {
        let mut v = vec![b'a', b'r', channel, l, packet_type];
        v.extend_from_slice(rest);
        v
    }

    #[test]
    fn can_single_frame_message() {
        let mut payload = vec![0x00, 0x00, 0x01, 0x00]; // timestamp 256
        payload.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]); // 8 data bytes
        let chunk = frame(0x36, 13, 0x40, &payload); // L = 5 (ts) + 8 = 13
        let mut out = [PassthruMsg::default()];
        let mut q = RxQueue::new();
        let res = consume(&chunk, 0x36, ChannelFamily::Iso15765, 6, &mut out, &mut q);
        assert_eq!(res.filled, 1);
        assert_eq!(out[0].rx_status, rx_status::NORMAL);
        assert_eq!(out[0].data_size, 8);
        assert_eq!(out[0].extra_data_index, 8);
        assert_eq!(out[0].protocol_id, 6);
        assert_eq!(out[0].timestamp, 256);
    }

    #[test]
    fn kline_multi_fragment_message() {
        let start = frame(0x33, 5, 0x80, &[0, 0, 0, 0]); // start indication, no usable payload
        let frag = frame(0x33, 4, 0x00, &[0xAA, 0xBB, 0xCC]); // L=4 -> 3 payload bytes
        let end = frame(0x33, 5, 0x40, &[0x00, 0x00, 0x00, 0x01]); // end indication w/ timestamp

        let mut chunk = Vec::new();
        chunk.extend_from_slice(&start);
        chunk.extend_from_slice(&frag);
        chunk.extend_from_slice(&end);

        let mut out = [PassthruMsg::default(), PassthruMsg::default()];
        let mut q = RxQueue::new();
        let res = consume(&chunk, 0x33, ChannelFamily::Iso9141, 3, &mut out, &mut q);

        assert_eq!(res.filled, 2);
        assert_eq!(out[0].rx_status, rx_status::START_OF_MESSAGE);
        assert_eq!(out[0].data_size, 0);
        assert_eq!(out[1].data_size, 3);
        assert_eq!(out[1].extra_data_index, 3);
        assert_eq!(out[1].rx_status, rx_status::NORMAL);
    }

    #[test]
    fn overflow_spills_into_queue() {
        let mut chunk = Vec::new();
        for i in 0..4u8 {
            chunk.extend_from_slice(&frame(0x35, 6, 0x40, &[0, 0, 0, 0, i]));
        }
        let mut out = [PassthruMsg::default(), PassthruMsg::default()];
        let mut q = RxQueue::new();
        let res = consume(&chunk, 0x35, ChannelFamily::Can, 5, &mut out, &mut q);
        assert_eq!(res.filled, 2);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn aro_ack_frame_is_skipped() {
        let mut chunk = b"ar\x6f\x00\x00".to_vec();
        chunk.extend_from_slice(&frame(0x35, 6, 0x40, &[0, 0, 0, 0, 9]));
        let mut out = [PassthruMsg::default()];
        let mut q = RxQueue::new();
        let res = consume(&chunk, 0x35, ChannelFamily::Can, 5, &mut out, &mut q);
        assert_eq!(res.filled, 1);
    }

    #[test]
    fn short_length_never_underflows() {
        // L = 2 on a CAN-shaped frame (would underflow L-5 without the guard)
        let chunk = frame(0x35, 2, 0x40, &[]);
        let mut out = [PassthruMsg::default()];
        let mut q = RxQueue::new();
        let res = consume(&chunk, 0x35, ChannelFamily::Can, 5, &mut out, &mut q);
        assert_eq!(res.filled, 1);
        assert_eq!(out[0].data_size, 0);
    }

    #[test]
    fn kline_end_indication_does_not_copy_the_next_frames_bytes() {
        // A K-line end indication carries only a timestamp; its DataSize
        // must come entirely from the preceding fragment, never from
        // whatever bytes happen to follow it in the chunk.
        let frag = frame(0x33, 4, 0x00, &[0xAA, 0xBB, 0xCC]); // 3 payload bytes
        let end = frame(0x33, 5, 0x40, &[0x00, 0x00, 0x00, 0x01]); // timestamp only
        let next = frame(0x33, 5, 0x80, &[0, 0, 0, 0]); // a following start indication

        let mut chunk = Vec::new();
        chunk.extend_from_slice(&frag);
        chunk.extend_from_slice(&end);
        chunk.extend_from_slice(&next);

        let mut out = [PassthruMsg::default(), PassthruMsg::default()];
        let mut q = RxQueue::new();
        let res = consume(&chunk, 0x33, ChannelFamily::Iso9141, 3, &mut out, &mut q);

        assert_eq!(res.filled, 2);
        assert_eq!(out[0].data_size, 3);
        assert_eq!(out[0].data[..3], [0xAA, 0xBB, 0xCC]);
        assert_eq!(out[0].extra_data_index, 3);
        assert_eq!(out[1].data_size, 0);
    }
}
