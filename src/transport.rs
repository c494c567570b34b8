//! USB bulk transport: device discovery, the single *send-and-optionally-
//! expect* operation, and the transport error taxonomy.

use std::time::Duration;

use rusb::{Context, DeviceHandle, UsbContext};

use crate::support::pattern_search;

const VENDOR_ID: u16 = 0x0403;
const PRODUCT_ID: u16 = 0xcc4d;

/// Errors raised by the USB layer, mapped onto [`crate::msg::PassThruError`]
/// by the error map of spec §7.
#[derive(Debug, Clone, Copy, thiserror::Error)]
pub enum TransportError {
    /// Generic I/O failure.
    #[error("USB I/O error")]
    Io(#[source] rusb::Error),
    /// No device with the matching VID/PID is present on the bus.
    #[error("device not found")]
    NotFound,
    /// The device disappeared mid-session.
    #[error("device disconnected")]
    NoDevice,
    /// The interface could not be claimed (permissions).
    #[error("access denied")]
    Access,
    /// The device is already claimed by another process.
    #[error("device busy")]
    Busy,
    /// A transfer did not complete within its timeout.
    #[error("transfer timed out")]
    Timeout,
    /// A read returned more data than the buffer could hold.
    #[error("buffer overflow")]
    Overflow,
    /// Host ran out of memory for the transfer.
    #[error("out of memory")]
    NoMem,
    /// The requested transfer type is not supported.
    #[error("not supported")]
    NotSupported,
    /// The device reported an `ae <n>` error line.
    #[error("device error {0}")]
    DeviceError(u32),
    /// Anything else `rusb` surfaced.
    #[error("USB error")]
    Other(#[source] rusb::Error),
}

impl From<rusb::Error> for TransportError {
    fn from(e: rusb::Error) -> Self {
        match e {
            rusb::Error::Io => TransportError::Io(e),
            rusb::Error::NotFound => TransportError::NotFound,
            rusb::Error::NoDevice => TransportError::NoDevice,
            rusb::Error::Access => TransportError::Access,
            rusb::Error::Busy => TransportError::Busy,
            rusb::Error::Timeout => TransportError::Timeout,
            rusb::Error::Overflow => TransportError::Overflow,
            rusb::Error::NoMem => TransportError::NoMem,
            rusb::Error::NotSupported => TransportError::NotSupported,
            other => TransportError::Other(other),
        }
    }
}

/// The bulk endpoint pair discovered on the device at open time.
#[derive(Debug, Clone, Copy)]
pub struct Endpoints {
    /// Interface number the endpoints belong to.
    pub interface_number: u8,
    /// Bulk-IN endpoint address.
    pub bulk_in: u8,
    /// Bulk-OUT endpoint address.
    pub bulk_out: u8,
}

/// Owns the open USB device handle and its discovered endpoints.
pub struct Transport {
    handle: DeviceHandle<Context>,
    endpoints: Endpoints,
    /// USB device address, used as the J2534 `DeviceID`.
    pub device_address: u8,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("endpoints", &self.endpoints)
            .field("device_address", &self.device_address)
            .finish()
    }
}

impl Transport {
    /// Locate the device by VID/PID, open it, detach the kernel driver
    /// if present, and claim the bulk interface.
    pub fn open() -> Result<Self, TransportError> {
        let context = Context::new()?;
        for device in context.devices()?.iter() {
            let desc = device.device_descriptor()?;
            if desc.vendor_id() != VENDOR_ID || desc.product_id() != PRODUCT_ID {
                continue;
            }

            let mut handle = device.open()?;
            let device_address = device.address();

            let config = device.active_config_descriptor()?;
            let mut endpoints = None;
            for interface in config.interfaces() {
                for setting in interface.descriptors() {
                    if setting.num_endpoints() != 2 {
                        continue;
                    }
                    let mut bulk_in = None;
                    let mut bulk_out = None;
                    for ep in setting.endpoint_descriptors() {
                        if ep.transfer_type() != rusb::TransferType::Bulk {
                            continue;
                        }
                        match ep.direction() {
                            rusb::Direction::In => bulk_in = Some(ep.address()),
                            rusb::Direction::Out => bulk_out = Some(ep.address()),
                        }
                    }
                    if let (Some(bulk_in), Some(bulk_out)) = (bulk_in, bulk_out) {
                        endpoints = Some(Endpoints {
                            interface_number: setting.interface_number(),
                            bulk_in,
                            bulk_out,
                        });
                    }
                }
            }

            let endpoints = match endpoints {
                Some(e) => e,
                None => continue,
            };

            if handle.kernel_driver_active(endpoints.interface_number).unwrap_or(false) {
                let _ = handle.detach_kernel_driver(endpoints.interface_number);
            }
            handle.claim_interface(endpoints.interface_number)?;

            return Ok(Transport {
                handle,
                endpoints,
                device_address,
            });
        }
        Err(TransportError::NotFound)
    }

    /// *Send-and-optionally-expect* (spec §4.1): write `out_data` (if
    /// nonempty), then, unless `timeout` is zero, read bulk-IN chunks
    /// into `capacity`-sized reads until a device error line, the `aro`
    /// acknowledgement (when `expect` is `None`), or `expect` is found.
    /// Returns the last chunk read (truncated to its valid length).
    pub fn send_and_expect(
        &mut self,
        out_data: &[u8],
        capacity: usize,
        timeout_ms: u32,
        expect: Option<&[u8]>,
    ) -> Result<Vec<u8>, TransportError> {
        let timeout = Duration::from_millis(timeout_ms as u64);

        if !out_data.is_empty() {
            self.handle
                .write_bulk(self.endpoints.bulk_out, out_data, timeout)?;
        }

        if timeout_ms == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; capacity];
        loop {
            let n = self
                .handle
                .read_bulk(self.endpoints.bulk_in, &mut buf, timeout)?;
            let chunk = buf[..n].to_vec();

            if n >= 3 && chunk[2] == b'e' {
                if let Ok(text) = std::str::from_utf8(&chunk[4..]) {
                    if let Ok(code) = text.trim_end_matches(['\r', '\n', '\0']).parse::<u32>() {
                        return Err(TransportError::DeviceError(code));
                    }
                }
            }

            let acked = match expect {
                Some(pattern) => pattern_search(&chunk, pattern).is_some(),
                None => pattern_search(&chunk, b"aro\r\n").is_some(),
            };
            if acked {
                return Ok(chunk);
            }
        }
    }

    /// Write `data` with no expectation of a reply, used by
    /// `PassThruWriteMsgs`: the `att` command is not acknowledged on the
    /// wire, unlike `ato`/`atf`/`aty`.
    pub fn write(&mut self, data: &[u8], timeout_ms: u32) -> Result<(), TransportError> {
        let timeout = Duration::from_millis(timeout_ms as u64);
        self.handle.write_bulk(self.endpoints.bulk_out, data, timeout)?;
        Ok(())
    }

    /// Read one bulk-IN chunk with no prior send, used by the receive
    /// parser's outer loop.
    pub fn read_chunk(&mut self, capacity: usize, timeout_ms: u32) -> Result<Vec<u8>, TransportError> {
        let timeout = Duration::from_millis(timeout_ms as u64);
        let mut buf = vec![0u8; capacity];
        let n = self
            .handle
            .read_bulk(self.endpoints.bulk_in, &mut buf, timeout)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// The endpoints discovered at open.
    pub fn endpoints(&self) -> Endpoints {
        self.endpoints
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        let _ = self.handle.release_interface(self.endpoints.interface_number);
    }
}
