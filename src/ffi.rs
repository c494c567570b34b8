//! The J2534 PassThru entry points (spec §4.5): argument validation,
//! per-call logging, delegation to the safe inner session operations of
//! [`crate::session`] and [`crate::ioctl`], and the `i32` ABI
//! error-code translation every function performs at its boundary,
//! converting a `Result` to a raw code right at the edge.

use std::ffi::{c_char, c_void, CStr};

use crate::encoder;
use crate::ioctl::{self, SConfigList};
use crate::logsink::LogSink;
use crate::msg::{PassThruError, PassthruMsg, PM_DATA_LEN};
use crate::parser::{self, ChannelFamily};
use crate::queue::RxQueue;
use crate::session::{self, ChannelState, Session};
use crate::support::{parse_after_last_colon, parse_trailing_u32, truncate_to};
use crate::transport::Transport;

/// J2534 filter-type values accepted by `PassThruStartMsgFilter`.
mod filter_type {
    pub const FLOW_CONTROL: u32 = 3;
}

/// Byte capacity of every caller-facing version/description buffer
/// (spec §3's 80-character last-error bound, reused here for every
/// other fixed string buffer this API defines).
const STRING_BUF_LEN: usize = 80;

/// Capacity of one outer bulk-IN read in `PassThruReadMsgs`, sized well
/// above the device's largest observed frame.
const READ_CAPACITY: usize = 4160;

/// Write `s` into the caller's fixed buffer as a NUL-terminated C
/// string, truncated to fit.
///
/// # Safety
/// `dst` must point to a writable buffer of at least [`STRING_BUF_LEN`]
/// bytes.
unsafe fn write_c_string(dst: *mut c_char, s: &str) {
    let bounded = truncate_to(s, STRING_BUF_LEN - 1);
    let bytes = bounded.as_bytes();
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst as *mut u8, bytes.len());
        *(dst as *mut u8).add(bytes.len()) = 0;
    }
}

/// Open the device at USB VID 0x0403 / PID 0xCC4D, send `ati`/`ata`,
/// and install the process-wide [`Session`].
///
/// # Safety
/// `device_id` must be a valid pointer to a writable `u32`. `name`, if
/// non-null, must point to a NUL-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn PassThruOpen(name: *const c_char, device_id: *mut u32) -> i32 {
    if device_id.is_null() {
        session::set_last_error("pDeviceID is null");
        return PassThruError::NullParameter.code();
    }
    if session::is_open() {
        session::set_last_error("a device is already open");
        return PassThruError::DeviceInUse.code();
    }
    if !name.is_null() {
        let label = unsafe { CStr::from_ptr(name) }.to_string_lossy();
        log::debug!("PassThruOpen({})", label);
    }

    let result = (|| -> Result<u32, PassThruError> {
        let mut transport = Transport::open()?;
        let mut log = LogSink::from_env().ok().flatten();

        let ati_cmd = encoder::ati();
        if let Some(log) = log.as_mut() {
            log.hex("-> ", &ati_cmd);
        }
        let ident = transport.send_and_expect(&ati_cmd, 256, 1000, Some(b"ari"))?;
        if let Some(log) = log.as_mut() {
            log.hex("<- ", &ident);
        }
        let firmware_version = parse_after_last_colon(&ident).unwrap_or_default();
        transport.send_and_expect(&encoder::ata(), 256, 1000, None)?;

        let device_id_value = transport.device_address as u32;
        session::install(Session {
            transport,
            device_id: device_id_value,
            firmware_version,
            channel: None,
            queue: RxQueue::new(),
            log,
        });
        Ok(device_id_value)
    })();

    match result {
        Ok(value) => {
            unsafe {
                *device_id = value;
            }
            PassThruError::NoError.code()
        }
        Err(e) => {
            session::set_last_error(e.to_string());
            e.code()
        }
    }
}

/// Deactivate the interface (`atz`), release the USB interface, and
/// tear down the [`Session`].
#[no_mangle]
pub extern "C" fn PassThruClose(device_id: u32) -> i32 {
    let result = session::with_session(|s| {
        s.require_device(device_id)?;
        let cmd = encoder::atz();
        s.trace_out(&cmd);
        s.transport.send_and_expect(&cmd, 256, 1000, None)?;
        Ok(())
    });
    match result {
        Ok(()) => {
            session::teardown();
            PassThruError::NoError.code()
        }
        Err(e) => e.code(),
    }
}

/// Open a logical channel for one protocol (`ato`), recording the bus
/// family the device will tag its frames with.
///
/// # Safety
/// `channel_id` must be a valid pointer to a writable `u32`.
#[no_mangle]
pub unsafe extern "C" fn PassThruConnect(
    device_id: u32,
    protocol_id: u32,
    flags: u32,
    baud: u32,
    channel_id: *mut u32,
) -> i32 {
    if channel_id.is_null() {
        session::set_last_error("pChannelID is null");
        return PassThruError::NullParameter.code();
    }
    let family = match ChannelFamily::from_protocol_id(protocol_id) {
        Some(f) => f,
        None => {
            session::set_last_error("unsupported ProtocolID");
            return PassThruError::InvalidProtocolId.code();
        }
    };

    let result = session::with_session(|s| {
        s.require_device(device_id)?;
        if s.channel.is_some() {
            return Err(PassThruError::ChannelInUse);
        }
        let cmd = encoder::ato(protocol_id, flags, baud);
        s.trace_out(&cmd);
        s.transport.send_and_expect(&cmd, 256, 1000, None)?;
        s.channel = Some(ChannelState {
            channel_id: protocol_id,
            protocol_id,
            family,
        });
        Ok(protocol_id)
    });

    match result {
        Ok(value) => {
            unsafe {
                *channel_id = value;
            }
            PassThruError::NoError.code()
        }
        Err(e) => e.code(),
    }
}

/// Close a channel (`atc`), flushing anything left in the receive FIFO.
#[no_mangle]
pub extern "C" fn PassThruDisconnect(channel_id: u32) -> i32 {
    let result = session::with_session(|s| {
        s.require_channel(channel_id)?;
        s.queue.flush();
        let cmd = encoder::atc(channel_id);
        s.trace_out(&cmd);
        s.transport.send_and_expect(&cmd, 256, 1000, None)?;
        s.channel = None;
        Ok(())
    });
    match result {
        Ok(()) => PassThruError::NoError.code(),
        Err(e) => e.code(),
    }
}

/// Fill up to `*num_msgs` slots: first drain the FIFO, then read fresh
/// bulk-IN chunks through the receive parser until the array fills or a
/// read returns no data.
///
/// # Safety
/// `msg_array` must point to an array of at least `*num_msgs`
/// [`PassthruMsg`] slots; `num_msgs` must be a valid pointer to a `u32`.
#[no_mangle]
pub unsafe extern "C" fn PassThruReadMsgs(
    channel_id: u32,
    msg_array: *mut PassthruMsg,
    num_msgs: *mut u32,
    timeout: u32,
) -> i32 {
    if msg_array.is_null() || num_msgs.is_null() {
        session::set_last_error("pMsg or pNumMsgs is null");
        return PassThruError::NullParameter.code();
    }
    let requested = unsafe { *num_msgs } as usize;
    if requested == 0 {
        return PassThruError::NoError.code();
    }
    let out = unsafe { std::slice::from_raw_parts_mut(msg_array, requested) };

    let result = session::with_session(|s| {
        let channel = s.require_channel(channel_id)?;
        let mut filled = s.queue.drain_into(out);
        while filled < out.len() {
            let chunk = s.transport.read_chunk(READ_CAPACITY, timeout)?;
            if chunk.is_empty() {
                break;
            }
            s.trace_in(&chunk);
            let channel_byte = channel.family.to_byte();
            let res = parser::consume(
                &chunk,
                channel_byte,
                channel.family,
                channel.protocol_id,
                &mut out[filled..],
                &mut s.queue,
            );
            if res.filled == 0 {
                break;
            }
            filled += res.filled;
        }
        Ok(filled)
    });

    match result {
        Ok(filled) => {
            unsafe {
                *num_msgs = filled as u32;
            }
            PassThruError::NoError.code()
        }
        Err(e) => e.code(),
    }
}

/// Transmit up to `*num_msgs` messages, validating every `DataSize`
/// before any USB traffic (spec §8's "bad argument" contract).
///
/// # Safety
/// `msg_array` must point to an array of at least `*num_msgs`
/// [`PassthruMsg`] values; `num_msgs` must be a valid pointer to a `u32`.
#[no_mangle]
pub unsafe extern "C" fn PassThruWriteMsgs(
    channel_id: u32,
    msg_array: *const PassthruMsg,
    num_msgs: *mut u32,
    time_interval: u32,
) -> i32 {
    if msg_array.is_null() || num_msgs.is_null() {
        session::set_last_error("pMsg or pNumMsgs is null");
        return PassThruError::NullParameter.code();
    }
    let requested = unsafe { *num_msgs } as usize;
    let msgs = unsafe { std::slice::from_raw_parts(msg_array, requested) };

    let result = session::with_session(|s| {
        let channel = s.require_channel(channel_id)?;
        for msg in msgs {
            if msg.data_size == 0 || msg.data_size as usize > PM_DATA_LEN {
                return Err(PassThruError::InvalidMsg);
            }
        }
        let mut sent = 0usize;
        for msg in msgs {
            let payload = &msg.data[..msg.data_size as usize];
            let cmd = encoder::att(channel.channel_id, msg.tx_flags, payload);
            s.trace_out(&cmd);
            s.transport.write(&cmd, time_interval)?;
            sent += 1;
        }
        Ok(sent)
    });

    match result {
        Ok(sent) => {
            unsafe {
                *num_msgs = sent as u32;
            }
            PassThruError::NoError.code()
        }
        Err(e) => e.code(),
    }
}

/// Install a mask/pattern (and, for `FLOW_CONTROL_FILTER`, flow-control)
/// filter, returning the device-assigned filter id.
///
/// # Safety
/// `mask_msg` and `pattern_msg` must be valid pointers to
/// [`PassthruMsg`]; `flow_control_msg` must be either null or a valid
/// pointer to one; `msg_id` must be a valid pointer to a writable `u32`.
#[no_mangle]
pub unsafe extern "C" fn PassThruStartMsgFilter(
    channel_id: u32,
    filter_type_value: u32,
    mask_msg: *const PassthruMsg,
    pattern_msg: *const PassthruMsg,
    flow_control_msg: *const PassthruMsg,
    msg_id: *mut u32,
) -> i32 {
    if mask_msg.is_null() || pattern_msg.is_null() || msg_id.is_null() {
        session::set_last_error("pMaskMsg, pPatternMsg or pMsgID is null");
        return PassThruError::NullParameter.code();
    }
    let mask = unsafe { &*mask_msg };
    let pattern = unsafe { &*pattern_msg };

    if mask.data_size != pattern.data_size
        || mask.data_size as usize > 12
        || mask.tx_flags != pattern.tx_flags
    {
        session::set_last_error("mask/pattern DataSize or TxFlags mismatch");
        return PassThruError::InvalidMsg.code();
    }

    let needs_flow = filter_type_value == filter_type::FLOW_CONTROL;
    if needs_flow != !flow_control_msg.is_null() {
        session::set_last_error("flow-control message required iff FLOW_CONTROL_FILTER");
        return PassThruError::InvalidMsg.code();
    }

    let flow_bytes: Vec<u8> = if needs_flow {
        let flow = unsafe { &*flow_control_msg };
        flow.data[..flow.data_size as usize].to_vec()
    } else {
        Vec::new()
    };
    let mask_bytes = mask.data[..mask.data_size as usize].to_vec();
    let pattern_bytes = pattern.data[..pattern.data_size as usize].to_vec();

    let result = session::with_session(|s| {
        let channel = s.require_channel(channel_id)?;
        let cmd = encoder::atf(
            channel.channel_id,
            filter_type_value,
            mask.tx_flags,
            &mask_bytes,
            &pattern_bytes,
            &flow_bytes,
        );
        s.trace_out(&cmd);
        let reply = s.transport.send_and_expect(&cmd, 256, 1000, Some(b"arf"))?;
        s.trace_in(&reply);
        parse_trailing_u32(&reply, b"arf").ok_or(PassThruError::Failed)
    });

    match result {
        Ok(id) => {
            unsafe {
                *msg_id = id;
            }
            PassThruError::NoError.code()
        }
        Err(e) => e.code(),
    }
}

/// Remove a filter previously installed by `PassThruStartMsgFilter`.
#[no_mangle]
pub extern "C" fn PassThruStopMsgFilter(channel_id: u32, msg_id: u32) -> i32 {
    let result = session::with_session(|s| {
        let channel = s.require_channel(channel_id)?;
        let cmd = encoder::atk(channel.channel_id, msg_id);
        s.trace_out(&cmd);
        s.transport.send_and_expect(&cmd, 256, 1000, None)?;
        Ok(())
    });
    match result {
        Ok(()) => PassThruError::NoError.code(),
        Err(e) => e.code(),
    }
}

/// Periodic-message transmission is not implemented by this adapter
/// (spec §1).
#[no_mangle]
pub extern "C" fn PassThruStartPeriodicMsg(
    _channel_id: u32,
    _msg: *const PassthruMsg,
    _msg_id: *mut u32,
    _time_interval: u32,
) -> i32 {
    session::set_last_error("periodic message transmission is not supported");
    PassThruError::NotSupported.code()
}

/// Periodic-message transmission is not implemented by this adapter
/// (spec §1).
#[no_mangle]
pub extern "C" fn PassThruStopPeriodicMsg(_channel_id: u32, _msg_id: u32) -> i32 {
    session::set_last_error("periodic message transmission is not supported");
    PassThruError::NotSupported.code()
}

/// Programming-voltage control is not implemented by this adapter
/// (spec §1).
#[no_mangle]
pub extern "C" fn PassThruSetProgrammingVoltage(_device_id: u32, _pin_number: u32, _voltage: u32) -> i32 {
    session::set_last_error("programming-voltage control is not supported");
    PassThruError::NotSupported.code()
}

/// Copy the firmware version (captured at `PassThruOpen`), this
/// library's own version, and the J2534 API version it implements into
/// the caller's buffers.
///
/// # Safety
/// Each buffer must be writable and at least [`STRING_BUF_LEN`] bytes.
#[no_mangle]
pub unsafe extern "C" fn PassThruReadVersion(
    device_id: u32,
    firmware_vers: *mut c_char,
    dll_vers: *mut c_char,
    api_vers: *mut c_char,
) -> i32 {
    if firmware_vers.is_null() || dll_vers.is_null() || api_vers.is_null() {
        session::set_last_error("a version output buffer is null");
        return PassThruError::NullParameter.code();
    }
    let result = session::with_session(|s| {
        s.require_device(device_id)?;
        Ok(s.firmware_version.clone())
    });
    match result {
        Ok(firmware) => {
            unsafe {
                write_c_string(firmware_vers, &firmware);
                write_c_string(dll_vers, env!("CARGO_PKG_VERSION"));
                write_c_string(api_vers, "04.04");
            }
            PassThruError::NoError.code()
        }
        Err(e) => e.code(),
    }
}

/// Copy the process-wide last-error string into the caller's buffer.
///
/// # Safety
/// `error_description` must be writable and at least [`STRING_BUF_LEN`]
/// bytes.
#[no_mangle]
pub unsafe extern "C" fn PassThruGetLastError(error_description: *mut c_char) -> i32 {
    if error_description.is_null() {
        return PassThruError::NullParameter.code();
    }
    unsafe {
        write_c_string(error_description, &session::last_error());
    }
    PassThruError::NoError.code()
}

/// Dispatch one of the numbered IOCTL subcommands of spec §4.5.
///
/// # Safety
/// `input`/`output` must point to the structure the given `ioctl_id`
/// expects (an `SCONFIG_LIST` for `GET_CONFIG`/`SET_CONFIG`, a `u32` for
/// `READ_VBATT`, a [`PassthruMsg`] for `FAST_INIT`), or be null where
/// that subcommand does not use them.
#[no_mangle]
pub unsafe extern "C" fn PassThruIoctl(
    channel_id: u32,
    ioctl_id: u32,
    input: *mut c_void,
    output: *mut c_void,
) -> i32 {
    let result = session::with_session(|s| match ioctl_id {
        ioctl::id::GET_CONFIG => {
            if input.is_null() {
                return Err(PassThruError::NullParameter);
            }
            let list = unsafe { &*(input as *const SConfigList) };
            let entries =
                unsafe { std::slice::from_raw_parts_mut(list.config_ptr, list.num_of_params as usize) };
            ioctl::get_config(s, channel_id, entries)
        }
        ioctl::id::SET_CONFIG => {
            if input.is_null() {
                return Err(PassThruError::NullParameter);
            }
            let list = unsafe { &*(input as *const SConfigList) };
            let entries =
                unsafe { std::slice::from_raw_parts(list.config_ptr, list.num_of_params as usize) };
            ioctl::set_config(s, channel_id, entries)
        }
        ioctl::id::READ_VBATT => {
            if output.is_null() {
                return Err(PassThruError::NullParameter);
            }
            let vbatt = ioctl::read_vbatt(s)?;
            unsafe {
                *(output as *mut u32) = vbatt;
            }
            Ok(())
        }
        ioctl::id::FAST_INIT => {
            if input.is_null() || output.is_null() {
                return Err(PassThruError::NullParameter);
            }
            let tx = unsafe { &*(input as *const PassthruMsg) };
            let response = ioctl::fast_init(s, channel_id, tx)?;
            unsafe {
                *(output as *mut PassthruMsg) = response;
            }
            Ok(())
        }
        ioctl::id::CLEAR_TX_BUFFER => ioctl::clear_tx_buffer(),
        ioctl::id::CLEAR_RX_BUFFER => ioctl::clear_rx_buffer(s),
        _ => Err(PassThruError::NotSupported),
    });

    match result {
        Ok(()) => PassThruError::NoError.code(),
        Err(e) => e.code(),
    }
}
