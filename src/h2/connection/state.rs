use crate::types::{H2ErrorCode, Header};
use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;
use std::time::Instant;

// Connection States
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Idle,
    Open,
    HalfClosedLocal,
    HalfClosedRemote,
    Closed,
}

// Stream States (RFC 7540 Section 5.1). ReservedLocal/ReservedRemote are
// entered only via PUSH_PROMISE, which this client rejects outright; they
// exist here so the state machine's shape matches the full RFC diagram
// rather than the subset a client that never accepts server push happens
// to reach.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamState {
    Idle,
    ReservedLocal,
    ReservedRemote,
    Open,
    HalfClosedLocal,
    HalfClosedRemote,
    Closed,
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamState::Idle => write!(f, "idle"),
            StreamState::ReservedLocal => write!(f, "reserved (local)"),
            StreamState::ReservedRemote => write!(f, "reserved (remote)"),
            StreamState::Open => write!(f, "open"),
            StreamState::HalfClosedLocal => write!(f, "half-closed (local)"),
            StreamState::HalfClosedRemote => write!(f, "half-closed (remote)"),
            StreamState::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum StreamEvent {
    Headers {
        headers: Vec<Header>,
        end_stream: bool,
        is_trailer: bool,
    },
    Data {
        payload: Bytes,
        end_stream: bool,
    },
    RstStream {
        error_code: H2ErrorCode,
    },
}

#[derive(Debug, Clone)]
pub(super) struct PendingHeaderBlock {
    pub(super) block: BytesMut,
    pub(super) end_stream: bool,
    pub(super) frame_count: u32,
    pub(super) started_at: Instant,
}

impl PendingHeaderBlock {
    pub(super) fn new() -> Self {
        Self {
            block: BytesMut::new(),
            end_stream: false,
            frame_count: 0,
            started_at: Instant::now(),
        }
    }

    pub(super) fn append(&mut self, fragment: &[u8]) {
        self.frame_count += 1;
        self.block.extend_from_slice(fragment);
    }
}

#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub state: StreamState,
    pub send_window: i32,
    pub recv_window: i32,
    pub headers_sent: bool,
    pub final_headers_received: bool,
    pub end_stream_received: bool,
    pub end_stream_sent: bool,
    pub inbound_events: VecDeque<StreamEvent>,
    pub(super) pending_headers: Option<PendingHeaderBlock>,
}

impl StreamInfo {
    pub(super) fn new(send_window: i32, recv_window: i32) -> Self {
        Self {
            state: StreamState::Idle,
            send_window,
            recv_window,
            headers_sent: false,
            final_headers_received: false,
            end_stream_received: false,
            end_stream_sent: false,
            inbound_events: VecDeque::new(),
            pending_headers: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_state_display_matches_rfc_names() {
        assert_eq!(StreamState::Idle.to_string(), "idle");
        assert_eq!(StreamState::HalfClosedLocal.to_string(), "half-closed (local)");
        assert_eq!(StreamState::HalfClosedRemote.to_string(), "half-closed (remote)");
        assert_eq!(StreamState::Closed.to_string(), "closed");
    }

    #[test]
    fn new_stream_info_starts_idle_with_no_pending_events() {
        let info = StreamInfo::new(65_535, 65_535);
        assert_eq!(info.state, StreamState::Idle);
        assert_eq!(info.send_window, 65_535);
        assert_eq!(info.recv_window, 65_535);
        assert!(!info.headers_sent);
        assert!(!info.final_headers_received);
        assert!(info.inbound_events.is_empty());
        assert!(info.pending_headers.is_none());
    }

    #[test]
    fn pending_header_block_accumulates_fragments_and_counts_frames() {
        let mut pending = PendingHeaderBlock::new();
        pending.append(b"abc");
        pending.append(b"def");
        assert_eq!(pending.frame_count, 2);
        assert_eq!(&pending.block[..], b"abcdef");
    }

    #[test]
    fn stream_event_clone_preserves_variant() {
        let event = StreamEvent::RstStream {
            error_code: H2ErrorCode::Cancel,
        };
        let cloned = event.clone();
        assert!(matches!(cloned, StreamEvent::RstStream { error_code } if error_code == H2ErrorCode::Cancel));
    }
}
