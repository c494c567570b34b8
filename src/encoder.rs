//! Builds the ASCII command lines the device understands. Pure
//! functions: no I/O, fully unit-testable byte-for-byte.

/// `ati` — read device identification.
pub fn ati() -> Vec<u8> {
    b"ati\r\n".to_vec()
}

/// `ata` — activate interface.
pub fn ata() -> Vec<u8> {
    b"ata\r\n".to_vec()
}

/// `atz` — deactivate interface.
pub fn atz() -> Vec<u8> {
    b"atz\r\n".to_vec()
}

/// `ato<proto> <flags> <baud> 0` — open channel.
pub fn ato(protocol: u32, flags: u32, baud: u32) -> Vec<u8> {
    format!("ato{} {} {} 0\r\n", protocol, flags, baud).into_bytes()
}

/// `atc<channel>` — close channel.
pub fn atc(channel: u32) -> Vec<u8> {
    format!("atc{}\r\n", channel).into_bytes()
}

/// `att<channel> <len> <txflags>` followed by `payload`.
pub fn att(channel: u32, tx_flags: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = format!("att{} {} {}\r\n", channel, payload.len(), tx_flags).into_bytes();
    out.extend_from_slice(payload);
    out
}

/// `atf<channel> <filtertype> <txflags> <datasize>` followed by
/// `mask ++ pattern ++ flow` (flow may be empty).
pub fn atf(channel: u32, filter_type: u32, tx_flags: u32, mask: &[u8], pattern: &[u8], flow: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "atf{} {} {} {}\r\n",
        channel,
        filter_type,
        tx_flags,
        mask.len()
    )
    .into_bytes();
    out.extend_from_slice(mask);
    out.extend_from_slice(pattern);
    out.extend_from_slice(flow);
    out
}

/// `atk<channel> <filterid>` — remove filter.
pub fn atk(channel: u32, filter_id: u32) -> Vec<u8> {
    format!("atk{} {}\r\n", channel, filter_id).into_bytes()
}

/// `atg<channel> <param>` — get config parameter.
pub fn atg(channel: u32, param: u32) -> Vec<u8> {
    format!("atg{} {}\r\n", channel, param).into_bytes()
}

/// `ats<channel> <param> <value>` — set config parameter.
pub fn ats(channel: u32, param: u32, value: u32) -> Vec<u8> {
    format!("ats{} {} {}\r\n", channel, param, value).into_bytes()
}

/// `atr <pin>` — read voltage on pin.
pub fn atr(pin: u32) -> Vec<u8> {
    format!("atr {}\r\n", pin).into_bytes()
}

/// `aty<channel> <len> 0` followed by `payload` — fast-init.
pub fn aty(channel: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = format!("aty{} {} 0\r\n", channel, payload.len()).into_bytes();
    out.extend_from_slice(payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ato_formats_protocol_flags_baud() {
        assert_eq!(ato(6, 0, 500_000), b"ato6 0 500000 0\r\n".to_vec());
    }

    #[test]
    fn att_appends_raw_payload_after_header() {
        let payload = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let cmd = att(6, 0, &payload);
        assert_eq!(&cmd[..10], b"att6 8 0\r\n");
        assert_eq!(&cmd[10..], &payload);
    }

    #[test]
    fn atf_round_trip_matches_invariant() {
        let mask = [0xFFu8; 4];
        let pattern = [0x12u8; 4];
        let cmd = atf(1, 3, 0, &mask, &pattern, &[]);
        assert!(cmd.starts_with(b"atf"));
        let header_end = cmd.iter().position(|&b| b == b'\r').unwrap();
        let header = std::str::from_utf8(&cmd[..header_end]).unwrap();
        assert_eq!(header, "atf1 3 0 4");
        assert_eq!(&cmd[header_end..header_end + 2], b"\r\n");
        assert_eq!(&cmd[header_end + 2..header_end + 6], &mask);
        assert_eq!(&cmd[header_end + 6..header_end + 10], &pattern);
    }

    #[test]
    fn atf_appends_flow_control_bytes_last() {
        let mask = [0x01u8];
        let pattern = [0x02u8];
        let flow = [0x03u8, 0x04];
        let cmd = atf(2, 3, 0, &mask, &pattern, &flow);
        assert_eq!(&cmd[cmd.len() - 2..], &flow);
    }

    #[test]
    fn atr_formats_pin() {
        assert_eq!(atr(16), b"atr 16\r\n".to_vec());
    }
}
