//! `PassThruIoctl` subcommand dispatch (spec §4.5's numbered table),
//! operating on safe, already-validated inputs; `src/ffi.rs` does the
//! raw-pointer-to-slice conversion at the ABI boundary and calls in here.

use crate::encoder;
use crate::msg::{PassThruError, PassthruMsg};
use crate::session::Session;
use crate::support::parse_trailing_u32;

/// `ioctlID` values understood by [`dispatch`]. `START_CONTINUOUS` and
/// `STOP_CONTINUOUS` are absent from spec.md's adapter but present in the
/// upstream J2534 `ioctlID` enumeration; they are ambient IOCTL-surface
/// completeness (ungoverned by any Non-goal) and simply report
/// `ERR_NOT_SUPPORTED`, the same as this adapter's periodic-message
/// entry points.
pub mod id {
    /// Read each listed parameter's current value.
    pub const GET_CONFIG: u32 = 1;
    /// Write each listed parameter's value.
    pub const SET_CONFIG: u32 = 2;
    /// Sample battery voltage on pin 16.
    pub const READ_VBATT: u32 = 3;
    /// Begin sending a periodic message. Not present on this adapter.
    pub const START_CONTINUOUS: u32 = 4;
    /// Perform fast-init (ISO14230 wake-up) and capture the ECU's reply.
    pub const FAST_INIT: u32 = 5;
    /// Stop a periodic message. Not present on this adapter.
    pub const STOP_CONTINUOUS: u32 = 6;
    /// Discard anything pending in the outbound direction.
    pub const CLEAR_TX_BUFFER: u32 = 7;
    /// Discard anything queued in the receive FIFO.
    pub const CLEAR_RX_BUFFER: u32 = 8;
}

/// One `parameter`/`value` pair of an `SCONFIG_LIST` entry.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SConfig {
    /// The J2534 configuration parameter id.
    pub parameter: u32,
    /// The parameter's value: an input for `SET_CONFIG`, an output for
    /// `GET_CONFIG` (overwritten in place).
    pub value: u32,
}

/// The `SCONFIG_LIST` structure J2534 hosts pass as `pInput` (and, for
/// `GET_CONFIG`, read the updated values back out of) to `PassThruIoctl`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SConfigList {
    /// Number of [`SConfig`] entries `config_ptr` points to.
    pub num_of_params: u32,
    /// Pointer to the first entry of a caller-owned array.
    pub config_ptr: *mut SConfig,
}

/// GET_CONFIG: for each entry, send `atg`, parse the `arg <param>
/// <value>` reply, and overwrite the entry's value in place.
pub fn get_config(session: &mut Session, channel_id: u32, entries: &mut [SConfig]) -> Result<(), PassThruError> {
    let channel = session.require_channel(channel_id)?;
    for entry in entries.iter_mut() {
        let cmd = encoder::atg(channel.channel_id, entry.parameter);
        session.trace_out(&cmd);
        let reply = session.transport.send_and_expect(&cmd, 256, 1000, Some(b"arg"))?;
        session.trace_in(&reply);
        entry.value = parse_trailing_u32(&reply, b"arg").ok_or(PassThruError::Failed)?;
    }
    Ok(())
}

/// SET_CONFIG: for each entry, send `ats<channel> <param> <value>`.
pub fn set_config(session: &mut Session, channel_id: u32, entries: &[SConfig]) -> Result<(), PassThruError> {
    let channel = session.require_channel(channel_id)?;
    for entry in entries {
        let cmd = encoder::ats(channel.channel_id, entry.parameter, entry.value);
        session.trace_out(&cmd);
        session.transport.send_and_expect(&cmd, 256, 1000, None)?;
    }
    Ok(())
}

/// READ_VBATT: `atr 16`, parsing `arr 16 <mV>` into the returned value.
pub fn read_vbatt(session: &mut Session) -> Result<u32, PassThruError> {
    let cmd = encoder::atr(16);
    session.trace_out(&cmd);
    let reply = session.transport.send_and_expect(&cmd, 256, 1000, Some(b"arr"))?;
    session.trace_in(&reply);
    parse_trailing_u32(&reply, b"arr").ok_or(PassThruError::Failed)
}

/// FAST_INIT: `aty<channel> <len> 0` plus the init payload, parse `ary
/// <len>`, then perform a second 500ms bulk-IN to collect the ECU's
/// `len`-byte wake-up response into the returned message.
pub fn fast_init(
    session: &mut Session,
    channel_id: u32,
    tx: &PassthruMsg,
) -> Result<PassthruMsg, PassThruError> {
    let channel = session.require_channel(channel_id)?;
    let payload = &tx.data[..tx.data_size as usize];
    let cmd = encoder::aty(channel.channel_id, payload);
    session.trace_out(&cmd);
    let reply = session.transport.send_and_expect(&cmd, 256, 1000, Some(b"ary"))?;
    session.trace_in(&reply);
    let len = parse_trailing_u32(&reply, b"ary").ok_or(PassThruError::Failed)? as usize;

    let mut out = PassthruMsg {
        protocol_id: channel.protocol_id,
        ..Default::default()
    };
    if len > 0 {
        let response = session.transport.read_chunk(len.max(64), 500)?;
        session.trace_in(&response);
        let n = response.len().min(crate::msg::PM_DATA_LEN);
        out.data[..n].copy_from_slice(&response[..n]);
        out.data_size = n as u32;
        out.extra_data_index = n as u32;
    }
    Ok(out)
}

/// CLEAR_TX_BUFFER: no outbound software buffer exists on this adapter,
/// so this is a pure no-op success (spec §4.5).
pub fn clear_tx_buffer() -> Result<(), PassThruError> {
    Ok(())
}

/// CLEAR_RX_BUFFER: discard anything waiting in the receive FIFO.
pub fn clear_rx_buffer(session: &mut Session) -> Result<(), PassThruError> {
    session.queue.flush();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sconfig_is_repr_c_pair() {
        let c = SConfig { parameter: 1, value: 500_000 };
        assert_eq!(c.parameter, 1);
        assert_eq!(c.value, 500_000);
    }
}
