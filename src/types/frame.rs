use bytes::Bytes;

/// Wire frame type (RFC 9113 Section 6). `Unknown` carries the raw type byte
/// so unrecognized frames can be constructed and discarded by the engine
/// instead of failing the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTypeH2 {
    Data,         // 0x0
    Headers,      // 0x1
    Priority,     // 0x2
    RstStream,    // 0x3
    Settings,     // 0x4
    PushPromise,  // 0x5
    Ping,         // 0x6
    GoAway,       // 0x7
    WindowUpdate, // 0x8
    Continuation, // 0x9
    Unknown(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    H2(FrameTypeH2),
}

/// A parsed HTTP/2 frame. The payload is always an owned, refcounted `Bytes`
/// slice: frame parsing may reuse a scratch read buffer internally, but
/// nothing past the frame boundary aliases that buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    pub frame_type: FrameType,
    pub flags: u8,
    pub stream_id: u32,
    pub payload: Bytes,
}
