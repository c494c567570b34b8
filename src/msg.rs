//! PASSTHRU_MSG and the J2534 error taxonomy.

use crate::transport::TransportError;

/// Maximum number of payload bytes a [`PassthruMsg`] can carry.
pub const PM_DATA_LEN: usize = 4128;

/// A received/transmitted J2534 message.
///
/// Field layout matches the J2534 04.04 `PASSTHRU_MSG` struct exactly so
/// that a C host linking against the produced `cdylib` sees the ABI it
/// expects.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PassthruMsg {
    /// Protocol identifier of the channel this message belongs to.
    pub protocol_id: u32,
    /// Role/status flags (see [`rx_status`]).
    pub rx_status: u32,
    /// Caller-supplied transmit flags.
    pub tx_flags: u32,
    /// Device timestamp in microseconds, host-ordered.
    pub timestamp: u32,
    /// Number of valid bytes in `data`.
    pub data_size: u32,
    /// Boundary between normal and extra data within `data`.
    pub extra_data_index: u32,
    /// Payload bytes.
    pub data: [u8; PM_DATA_LEN],
}

impl Default for PassthruMsg {
    fn default() -> Self {
        Self {
            protocol_id: 0,
            rx_status: 0,
            tx_flags: 0,
            timestamp: 0,
            data_size: 0,
            extra_data_index: 0,
            data: [0u8; PM_DATA_LEN],
        }
    }
}

impl std::fmt::Debug for PassthruMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassthruMsg")
            .field("protocol_id", &self.protocol_id)
            .field("rx_status", &self.rx_status)
            .field("tx_flags", &self.tx_flags)
            .field("timestamp", &self.timestamp)
            .field("data_size", &self.data_size)
            .field("extra_data_index", &self.extra_data_index)
            .field("data", &&self.data[..self.data_size as usize])
            .finish()
    }
}

/// `RxStatus` role tags. Assigned as mutually-exclusive tags, not
/// combinable bits, matching the wire protocol's own usage.
pub mod rx_status {
    /// Normal receive.
    pub const NORMAL: u32 = 0;
    /// Transmit loopback echo.
    pub const TX_MSG_TYPE: u32 = 1;
    /// Message start indication.
    pub const START_OF_MESSAGE: u32 = 2;
    /// Transmit completed.
    pub const TX_DONE: u32 = 8;
    /// Transmit loopback completed.
    pub const TX_INDICATION_LOOPBACK: u32 = 9;
}

/// The J2534 04.04 error codes this adapter returns.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassThruError {
    /// No error.
    NoError = 0,
    /// The function/ioctl is not supported by this adapter.
    NotSupported = 1,
    /// `ChannelID` does not refer to an open channel.
    InvalidChannelId = 2,
    /// `ProtocolID` is not one this adapter implements.
    InvalidProtocolId = 3,
    /// A required pointer argument was null.
    NullParameter = 4,
    /// An `ioctlID`/value combination is invalid.
    InvalidIoctlValue = 5,
    /// `Flags` contains an unsupported combination.
    InvalidFlags = 6,
    /// Catch-all transport/device failure.
    Failed = 7,
    /// No matching device is present on the USB bus, or the session's
    /// device handle is gone.
    DeviceNotConnected = 8,
    /// A transfer did not complete within its timeout.
    Timeout = 9,
    /// A `PASSTHRU_MSG` failed validation.
    InvalidMsg = 10,
    /// A periodic message interval is out of range.
    InvalidTimeInterval = 11,
    /// A resource limit (filters, periodic messages) was exceeded.
    ExceededLimit = 12,
    /// `MsgID` does not refer to a registered periodic message.
    InvalidMsgId = 13,
    /// The device is already open in another process.
    DeviceInUse = 14,
    /// `ioctlID` is not recognised.
    InvalidIoctlId = 15,
    /// No data currently available.
    BufferEmpty = 16,
    /// No room to store more data.
    BufferFull = 17,
    /// A transfer returned more data than the buffer could hold.
    BufferOverflow = 18,
    /// `Pin` does not refer to a valid connector pin.
    PinInvalid = 19,
    /// The channel is already connected for this protocol.
    ChannelInUse = 20,
    /// A message's `ProtocolID` does not match its channel.
    MsgProtocolId = 21,
    /// `FilterID`/`MsgID` does not refer to a registered filter.
    InvalidFilterId = 22,
    /// No flow-control message was supplied where one is required.
    NoFlowControl = 23,
    /// A filter matching these parameters already exists.
    NotUnique = 24,
    /// `Baudrate` is out of range for the protocol.
    InvalidBaudrate = 25,
    /// `DeviceID` does not refer to an open device.
    InvalidDeviceId = 26,
}

impl PassThruError {
    /// The raw `int32_t` this error is reported as across the FFI boundary.
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for PassThruError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for PassThruError {}

/// Error map of spec §7: transport failures translate to the J2534
/// equivalent before ever reaching the facade.
impl From<TransportError> for PassThruError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Io(_)
            | TransportError::NotFound
            | TransportError::NoDevice => PassThruError::DeviceNotConnected,
            TransportError::Access | TransportError::Busy => PassThruError::DeviceInUse,
            TransportError::Timeout => PassThruError::Timeout,
            TransportError::Overflow => PassThruError::BufferOverflow,
            TransportError::NoMem => PassThruError::ExceededLimit,
            TransportError::NotSupported => PassThruError::NotSupported,
            TransportError::DeviceError(_) => PassThruError::Failed,
            TransportError::Other(_) => PassThruError::Failed,
        }
    }
}
