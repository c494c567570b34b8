#![deny(
    missing_docs,
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_imports,
    unused_import_braces,
    unused_qualifications
)]

//! A J2534 PassThru provider for a USB-attached vehicle diagnostic
//! interface at USB vendor 0x0403 / product 0xCC4D (the Tactrix
//! Openport 2.0 and compatible clones).
//!
//! The crate translates between the J2534 04.04 API (open/close device,
//! connect/disconnect channel, read/write message frames, filters,
//! IOCTL configuration and fast-init) and the device's proprietary
//! line-oriented USB command protocol, spoken over one bulk-IN and one
//! bulk-OUT endpoint.
//!
//! ## Layout
//!
//! * [`transport`] — USB device discovery and the bulk *send-and-
//!   optionally-expect* operation.
//! * [`encoder`] — builds the outgoing ASCII command lines.
//! * [`parser`] — the receive stream state machine; the heart of the
//!   system.
//! * [`queue`] — the FIFO overflow buffer for messages the caller's
//!   array could not hold.
//! * [`session`] — the single open device's state, the single lookup
//!   point every entry point consults.
//! * [`ioctl`] — the numbered `PassThruIoctl` subcommands.
//! * [`msg`] — `PassthruMsg`, the J2534 error taxonomy, and the
//!   transport-to-J2534 error map.
//! * [`support`] — endianness, timestamp and ASCII-reply parsing
//!   helpers shared by the other modules.
//! * [`logsink`] — the optional `LOG_ENABLE` wire-trace file.
//! * [`ffi`] — the thirteen `#[no_mangle]` `PassThru*` entry points.
//!
//! Built as both a `cdylib` (for C/C++ diagnostic tool hosts) and an
//! `rlib` so the protocol engine is independently unit-testable without
//! crossing the C ABI boundary.

pub mod encoder;
pub mod ffi;
pub mod ioctl;
pub mod logsink;
pub mod msg;
pub mod parser;
pub mod queue;
pub mod session;
pub mod support;
pub mod transport;

pub use msg::{PassThruError, PassthruMsg};
