//! Drives the receive parser against hand-built bulk-IN byte fixtures,
//! simulating the wire instead of a real USB device or hardware channel.

use tactrix_openport_j2534::msg::{rx_status, PassthruMsg};
use tactrix_openport_j2534::parser::{consume, ChannelFamily};
use tactrix_openport_j2534::queue::RxQueue;

fn frame(channel: u8, l: u8, packet_type: u8, rest: &[u8]) -> Vec<u8> {
    let mut v = vec![b'a', b'r', channel, l, packet_type];
    v.extend_from_slice(rest);
    v
}

/// spec.md §8 scenario 3: single-frame CAN receive.
#[test]
fn can_single_frame_scenario() {
    let mut payload = vec![0x00, 0x00, 0x01, 0x00];
    payload.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    let chunk = frame(0x36, 13, 0x40, &payload);

    let mut out = [PassthruMsg::default()];
    let mut queue = RxQueue::new();
    let result = consume(&chunk, 0x36, ChannelFamily::Iso15765, 6, &mut out, &mut queue);

    assert_eq!(result.filled, 1);
    assert_eq!(out[0].rx_status, rx_status::NORMAL);
    assert_eq!(out[0].data_size, 8);
    assert_eq!(out[0].extra_data_index, 8);
    assert_eq!(out[0].protocol_id, 6);
    assert_eq!(out[0].timestamp, 256);
    assert!(out[0].data_size <= 4128);
    assert!(out[0].extra_data_index <= out[0].data_size);
}

/// spec.md §8 scenario 4: K-line start indication, fragment, end
/// indication across one multi-frame chunk.
#[test]
fn kline_multi_fragment_scenario() {
    let start = frame(0x33, 5, 0x80, &[0, 0, 0, 0]);
    let frag = frame(0x33, 7, 0x00, &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    let end = frame(0x33, 5, 0x40, &[0x00, 0x00, 0x00, 0x2A]);

    let mut chunk = Vec::new();
    chunk.extend_from_slice(&start);
    chunk.extend_from_slice(&frag);
    chunk.extend_from_slice(&end);

    let mut out = [PassthruMsg::default(), PassthruMsg::default()];
    let mut queue = RxQueue::new();
    let result = consume(&chunk, 0x33, ChannelFamily::Iso9141, 3, &mut out, &mut queue);

    assert_eq!(result.filled, 2);
    assert_eq!(out[0].rx_status, rx_status::START_OF_MESSAGE);
    assert_eq!(out[0].data_size, 0);
    assert_eq!(out[1].data_size, 6);
    assert_eq!(out[1].extra_data_index, 6);
    assert_eq!(out[1].rx_status, rx_status::NORMAL);
    assert_eq!(out[1].timestamp, 0x2A);
}

/// spec.md §8 scenario 5: overflow into the FIFO and a follow-up drain
/// without a fresh bulk-IN read.
#[test]
fn fifo_overflow_then_drain_scenario() {
    let mut chunk = Vec::new();
    for i in 0..4u8 {
        chunk.extend_from_slice(&frame(0x35, 6, 0x40, &[0, 0, 0, 0, i]));
    }

    let mut queue = RxQueue::new();
    let mut first = [PassthruMsg::default(), PassthruMsg::default()];
    let result = consume(&chunk, 0x35, ChannelFamily::Can, 5, &mut first, &mut queue);
    assert_eq!(result.filled, 2);
    assert_eq!(queue.len(), 2);

    // A second PassThruReadMsgs-shaped call drains the FIFO without
    // touching the transport again.
    let mut second = [PassthruMsg::default(), PassthruMsg::default()];
    let drained = queue.drain_into(&mut second);
    assert_eq!(drained, 2);
    assert!(queue.is_empty());
    assert_eq!(second[0].data[0], 2);
    assert_eq!(second[1].data[0], 3);
}

/// Every produced message upholds the invariants of spec.md §8
/// regardless of which family produced it.
#[test]
fn every_emitted_message_upholds_size_invariants() {
    let chunk = frame(0x36, 13, 0x20, &[0, 0, 0, 1, 9, 9, 9, 9, 9, 9, 9, 9]);
    let mut out = [PassthruMsg::default()];
    let mut queue = RxQueue::new();
    consume(&chunk, 0x36, ChannelFamily::Iso15765, 6, &mut out, &mut queue);
    assert!(out[0].data_size <= 4128);
    assert!(out[0].extra_data_index <= out[0].data_size);
}

/// CLEAR_RX_BUFFER / PassThruDisconnect both reduce to `RxQueue::flush`,
/// which must leave the queue empty.
#[test]
fn flush_empties_the_fifo() {
    let mut queue = RxQueue::new();
    queue.enqueue(PassthruMsg::default());
    queue.enqueue(PassthruMsg::default());
    queue.flush();
    assert!(queue.is_empty());
}
