//! The writer/reader halves that back a live [`super::H2Connection`] handle.
//!
//! One writer task owns the socket's write half and the HPACK encoder; it
//! drains a bounded command queue so wire order always matches command
//! order with no extra locking. One reader task owns the read half and the
//! HPACK decoder; it demultiplexes incoming frames, updates the shared
//! bookkeeping, and wakes any handle blocked in `recv_stream_event` via a
//! connection-wide `Notify`. `ConnShared` is the only state both tasks (and
//! the handle) touch concurrently, and it is never held across an `.await`.

use super::state::{ConnectionState, PendingHeaderBlock, StreamEvent, StreamInfo, StreamState};
use crate::h2::consts::*;
use crate::h2::hpack::HpackCodec;
use crate::stream::TransportStream;
use crate::types::{
    ClientTimeouts, Frame, FrameType, FrameTypeH2, H2ConnectionErrorKind, H2ErrorCode, Header,
    ProtocolError,
};
use crate::utils::timeout_result;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot, Notify};

const WRITE_QUEUE_DEPTH: usize = 256;

/// A fatal, connection-wide error. Stored so every waiter on every stream
/// can reconstruct the same `ProtocolError` instead of only the one caller
/// that happened to be reading the socket when it occurred.
#[derive(Debug, Clone)]
pub(super) enum ConnFatal {
    Io(String),
    Protocol(String),
}

impl ConnFatal {
    fn into_error(self) -> ProtocolError {
        match self {
            ConnFatal::Io(msg) => ProtocolError::ConnectionFailed(msg),
            ConnFatal::Protocol(msg) => {
                ProtocolError::H2ConnectionError(H2ConnectionErrorKind::ProtocolViolation(msg))
            }
        }
    }
}

pub(super) struct ConnShared {
    pub(super) state: ConnectionState,
    pub(super) settings: HashMap<u16, u32>,
    pub(super) remote_settings: HashMap<u16, u32>,
    pub(super) streams: HashMap<u32, StreamInfo>,
    pub(super) send_connection_window: i32,
    pub(super) recv_connection_window: i32,
    pub(super) next_stream_id: u32,
    pub(super) last_stream_id: u32,
    pub(super) initial_settings_received: bool,
    pub(super) peer_allows_push: bool,
    pub(super) goaway_last_stream_id: Option<u32>,
    fatal: Option<ConnFatal>,
}

impl ConnShared {
    pub(super) fn new() -> Self {
        let mut settings = HashMap::new();
        settings.insert(SETTINGS_HEADER_TABLE_SIZE, DEFAULT_HEADER_TABLE_SIZE);
        settings.insert(SETTINGS_ENABLE_PUSH, 0);
        settings.insert(
            SETTINGS_MAX_CONCURRENT_STREAMS,
            DEFAULT_MAX_CONCURRENT_STREAMS,
        );
        settings.insert(SETTINGS_INITIAL_WINDOW_SIZE, DEFAULT_INITIAL_WINDOW_SIZE);
        settings.insert(SETTINGS_MAX_FRAME_SIZE, DEFAULT_MAX_FRAME_SIZE);
        settings.insert(SETTINGS_MAX_HEADER_LIST_SIZE, DEFAULT_MAX_HEADER_LIST_SIZE);

        Self {
            state: ConnectionState::Idle,
            settings,
            remote_settings: HashMap::new(),
            streams: HashMap::new(),
            send_connection_window: DEFAULT_INITIAL_WINDOW_SIZE as i32,
            recv_connection_window: DEFAULT_INITIAL_WINDOW_SIZE as i32,
            next_stream_id: 1,
            last_stream_id: 0,
            initial_settings_received: false,
            peer_allows_push: true,
            goaway_last_stream_id: None,
            fatal: None,
        }
    }

    pub(super) fn is_connection_open(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Open | ConnectionState::HalfClosedRemote
        )
    }

    pub(super) fn max_frame_size(&self) -> usize {
        self.remote_settings
            .get(&SETTINGS_MAX_FRAME_SIZE)
            .copied()
            .unwrap_or(DEFAULT_MAX_FRAME_SIZE) as usize
    }

    pub(super) fn peer_initial_stream_window(&self) -> i32 {
        clamp_window(
            self.remote_settings
                .get(&SETTINGS_INITIAL_WINDOW_SIZE)
                .copied()
                .unwrap_or(DEFAULT_INITIAL_WINDOW_SIZE),
        )
    }

    pub(super) fn local_initial_stream_window(&self) -> i32 {
        clamp_window(
            self.settings
                .get(&SETTINGS_INITIAL_WINDOW_SIZE)
                .copied()
                .unwrap_or(DEFAULT_INITIAL_WINDOW_SIZE),
        )
    }

    pub(super) fn max_concurrent_streams(&self) -> u32 {
        self.remote_settings
            .get(&SETTINGS_MAX_CONCURRENT_STREAMS)
            .copied()
            .unwrap_or(DEFAULT_MAX_CONCURRENT_STREAMS)
    }

    pub(super) fn active_stream_count(&self) -> usize {
        self.streams
            .values()
            .filter(|s| {
                matches!(
                    s.state,
                    StreamState::Open
                        | StreamState::HalfClosedLocal
                        | StreamState::HalfClosedRemote
                )
            })
            .count()
    }

    /// Allocates and registers the next locally-opened stream, rejecting the
    /// request if the peer's `SETTINGS_MAX_CONCURRENT_STREAMS` cap is
    /// already reached.
    pub(super) fn create_stream(&mut self) -> Result<u32, ProtocolError> {
        if let Some(err) = &self.fatal {
            return Err(err.clone().into_error());
        }
        if !self.initial_settings_received {
            return Err(ProtocolError::RequestFailed(
                "HTTP/2 handshake not complete".to_string(),
            ));
        }
        if !self.is_connection_open() {
            return Err(ProtocolError::ConnectionFailed(
                "HTTP/2 connection is not open".to_string(),
            ));
        }
        if let Some(last) = self.goaway_last_stream_id {
            if self.next_stream_id > last {
                return Err(ProtocolError::RequestFailed(
                    "GOAWAY received: new streams are not allowed".to_string(),
                ));
            }
        }

        let active = self.active_stream_count();
        let cap = self.max_concurrent_streams() as usize;
        if active >= cap {
            return Err(ProtocolError::RequestFailed(format!(
                "max concurrent streams ({}) reached",
                cap
            )));
        }

        let stream_id = self.next_stream_id;
        self.next_stream_id += 2;

        let send_window = self.peer_initial_stream_window();
        let recv_window = self.local_initial_stream_window();
        self.streams
            .insert(stream_id, StreamInfo::new(send_window, recv_window));

        Ok(stream_id)
    }

    /// Looks up a stream an incoming frame refers to. Every stream this
    /// client will ever see was opened locally via `create_stream`; an id
    /// with no registered entry (including any even, server-reserved id,
    /// since PUSH_PROMISE is rejected outright) means the peer is
    /// referencing a stream that was never opened.
    pub(super) fn require_stream(&mut self, stream_id: u32) -> Result<&mut StreamInfo, ProtocolError> {
        self.streams.get_mut(&stream_id).ok_or_else(|| {
            H2ConnectionErrorKind::ProtocolViolation(format!(
                "frame referenced stream {} which was never opened",
                stream_id
            ))
            .into()
        })
    }

    pub(super) fn fatal_error(&self) -> Option<ProtocolError> {
        self.fatal.clone().map(ConnFatal::into_error)
    }

    fn set_fatal(&mut self, err: ConnFatal) {
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
        self.state = ConnectionState::Closed;
    }

    /// Applies one decoded SETTINGS parameter. Returns `Some(new_table_size)`
    /// when the change must be forwarded to the writer task's encoder.
    fn apply_setting(&mut self, id: u16, value: u32) -> Result<Option<usize>, ProtocolError> {
        match id {
            SETTINGS_HEADER_TABLE_SIZE => {
                self.remote_settings.insert(id, value);
                Ok(Some(value as usize))
            }
            SETTINGS_ENABLE_PUSH => {
                self.remote_settings.insert(id, value);
                self.peer_allows_push = value != 0;
                Ok(None)
            }
            SETTINGS_MAX_CONCURRENT_STREAMS => {
                self.remote_settings.insert(id, value);
                Ok(None)
            }
            SETTINGS_INITIAL_WINDOW_SIZE => {
                if value > 0x7FFF_FFFF {
                    return Err(ProtocolError::InvalidResponse(
                        "Invalid INITIAL_WINDOW_SIZE value".to_string(),
                    ));
                }
                let old_value = self
                    .remote_settings
                    .get(&id)
                    .copied()
                    .unwrap_or(DEFAULT_INITIAL_WINDOW_SIZE);
                let delta = value as i32 - old_value as i32;
                for stream in self.streams.values_mut() {
                    stream.send_window = (stream.send_window + delta).clamp(0, 0x7FFF_FFFF);
                }
                self.remote_settings.insert(id, value);
                Ok(None)
            }
            SETTINGS_MAX_FRAME_SIZE => {
                if !(16384..=16_777_215).contains(&value) {
                    return Err(ProtocolError::InvalidResponse(
                        "Invalid MAX_FRAME_SIZE value".to_string(),
                    ));
                }
                self.remote_settings.insert(id, value);
                Ok(None)
            }
            SETTINGS_MAX_HEADER_LIST_SIZE => {
                self.remote_settings.insert(id, value);
                Ok(None)
            }
            _ => Ok(None),
        }
    }
}

pub(super) fn clamp_window(value: u32) -> i32 {
    value.min(0x7FFF_FFFF) as i32
}

pub(super) enum WriteCommand {
    Preface,
    Settings(Vec<(u16, u32)>),
    SettingsAck,
    Headers {
        stream_id: u32,
        headers: Vec<Header>,
        end_stream: bool,
        respond: oneshot::Sender<Result<(), ProtocolError>>,
    },
    Data {
        stream_id: u32,
        data: Bytes,
        end_stream: bool,
        respond: oneshot::Sender<Result<(), ProtocolError>>,
    },
    WindowUpdate {
        stream_id: u32,
        increment: u32,
        respond: Option<oneshot::Sender<Result<(), ProtocolError>>>,
    },
    RstStream {
        stream_id: u32,
        error_code: u32,
        respond: Option<oneshot::Sender<Result<(), ProtocolError>>>,
    },
    GoAway {
        last_stream_id: u32,
        error_code: u32,
        debug_data: Vec<u8>,
        respond: oneshot::Sender<Result<(), ProtocolError>>,
    },
    PingAck([u8; 8]),
    SetEncoderTableSize(usize),
}

pub(super) fn spawn_writer(
    mut write_half: WriteHalf<TransportStream>,
    shared: std::sync::Arc<Mutex<ConnShared>>,
    timeouts: ClientTimeouts,
) -> (mpsc::Sender<WriteCommand>, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<WriteCommand>(WRITE_QUEUE_DEPTH);
    let local_table_size = {
        let guard = shared.lock().unwrap();
        guard
            .settings
            .get(&SETTINGS_HEADER_TABLE_SIZE)
            .copied()
            .unwrap_or(DEFAULT_HEADER_TABLE_SIZE) as usize
    };
    let handle = tokio::spawn(async move {
        let mut encoder = HpackCodec::new(local_table_size, DEFAULT_HEADER_TABLE_SIZE as usize);

        async fn write_frames(
            write_half: &mut WriteHalf<TransportStream>,
            timeouts: &ClientTimeouts,
            frames: &[Frame],
        ) -> Result<(), ProtocolError> {
            let mut buf = Vec::new();
            for frame in frames {
                buf.extend_from_slice(&frame.serialize()?);
            }
            timeout_result(timeouts.write, async {
                write_half.write_all(&buf).await.map_err(ProtocolError::Io)
            })
            .await
        }

        while let Some(cmd) = rx.recv().await {
            match cmd {
                WriteCommand::Preface => {
                    let result = timeout_result(timeouts.write, async {
                        write_half
                            .write_all(CONNECTION_PREFACE)
                            .await
                            .map_err(ProtocolError::Io)
                    })
                    .await;
                    if result.is_err() {
                        break;
                    }
                }
                WriteCommand::Settings(params) => {
                    let frame = Frame::settings(&params);
                    if write_frames(&mut write_half, &timeouts, &[frame]).await.is_err() {
                        break;
                    }
                }
                WriteCommand::SettingsAck => {
                    let frame = Frame::settings_ack();
                    if write_frames(&mut write_half, &timeouts, &[frame]).await.is_err() {
                        break;
                    }
                }
                WriteCommand::Headers {
                    stream_id,
                    headers,
                    end_stream,
                    respond,
                } => {
                    let result = async {
                        let max_frame = shared.lock().unwrap().max_frame_size();
                        let frames =
                            encode_headers_frames(&mut encoder, stream_id, &headers, end_stream, max_frame)?;
                        write_frames(&mut write_half, &timeouts, &frames).await?;

                        let mut guard = shared.lock().unwrap();
                        if let Ok(stream) = guard.require_stream(stream_id) {
                            stream.headers_sent = true;
                            if end_stream {
                                stream.end_stream_sent = true;
                                stream.state = StreamState::HalfClosedLocal;
                            } else if matches!(stream.state, StreamState::Idle) {
                                stream.state = StreamState::Open;
                            }
                        }
                        Ok(())
                    }
                    .await;
                    let _ = respond.send(result);
                }
                WriteCommand::Data {
                    stream_id,
                    data,
                    end_stream,
                    respond,
                } => {
                    let result = async {
                        let data_len = data.len();
                        {
                            let mut guard = shared.lock().unwrap();
                            if data_len > guard.max_frame_size() {
                                return Err(ProtocolError::RequestFailed(
                                    "DATA frame exceeds peer advertised MAX_FRAME_SIZE".to_string(),
                                ));
                            }
                            let stream = guard.require_stream(stream_id)?;
                            if stream.send_window < data_len as i32 {
                                return Err(ProtocolError::H2FlowControlError(
                                    "Stream flow control window exceeded".to_string(),
                                ));
                            }
                            if guard.send_connection_window < data_len as i32 {
                                return Err(ProtocolError::H2FlowControlError(
                                    "Connection flow control window exceeded".to_string(),
                                ));
                            }
                            guard.streams.get_mut(&stream_id).unwrap().send_window -= data_len as i32;
                            guard.send_connection_window -= data_len as i32;
                        }

                        let frame = Frame::data(stream_id, data, end_stream);
                        write_frames(&mut write_half, &timeouts, &[frame]).await?;

                        if end_stream {
                            let mut guard = shared.lock().unwrap();
                            if let Ok(stream) = guard.require_stream(stream_id) {
                                stream.end_stream_sent = true;
                                stream.state = match stream.state {
                                    StreamState::Open => StreamState::HalfClosedLocal,
                                    StreamState::HalfClosedRemote => StreamState::Closed,
                                    other => other,
                                };
                            }
                        }
                        Ok(())
                    }
                    .await;
                    let _ = respond.send(result);
                }
                WriteCommand::WindowUpdate {
                    stream_id,
                    increment,
                    respond,
                } => {
                    let result = async {
                        let frame = Frame::window_update(stream_id, increment)?;
                        write_frames(&mut write_half, &timeouts, &[frame]).await
                    }
                    .await;
                    if result.is_ok() {
                        let increment_val = clamp_window(increment);
                        let mut guard = shared.lock().unwrap();
                        if stream_id == 0 {
                            guard.recv_connection_window =
                                guard.recv_connection_window.saturating_add(increment_val);
                        } else if let Some(stream) = guard.streams.get_mut(&stream_id) {
                            stream.recv_window = stream.recv_window.saturating_add(increment_val);
                        }
                    }
                    if let Some(respond) = respond {
                        let _ = respond.send(result);
                    }
                }
                WriteCommand::RstStream {
                    stream_id,
                    error_code,
                    respond,
                } => {
                    let frame = Frame::rst(stream_id, error_code);
                    let result = write_frames(&mut write_half, &timeouts, &[frame]).await;
                    if result.is_ok() {
                        let mut guard = shared.lock().unwrap();
                        if let Some(stream) = guard.streams.get_mut(&stream_id) {
                            stream.state = StreamState::Closed;
                        }
                    }
                    if let Some(respond) = respond {
                        let _ = respond.send(result);
                    }
                }
                WriteCommand::GoAway {
                    last_stream_id,
                    error_code,
                    debug_data,
                    respond,
                } => {
                    let frame = Frame::goaway(last_stream_id, error_code, Some(&debug_data));
                    let result = write_frames(&mut write_half, &timeouts, &[frame]).await;
                    {
                        let mut guard = shared.lock().unwrap();
                        guard.state = ConnectionState::Closed;
                    }
                    let _ = respond.send(result);
                }
                WriteCommand::PingAck(data) => {
                    let frame = Frame::ping_ack(data);
                    let _ = write_frames(&mut write_half, &timeouts, &[frame]).await;
                }
                WriteCommand::SetEncoderTableSize(size) => {
                    encoder.set_encoder_max_table_size(size);
                }
            }
        }
        let _ = write_half.shutdown().await;
    });

    (tx, handle)
}

fn encode_headers_frames(
    encoder: &mut HpackCodec,
    stream_id: u32,
    headers: &[Header],
    end_stream: bool,
    max_frame: usize,
) -> Result<Vec<Frame>, ProtocolError> {
    let mut encoded = encoder.encode(headers)?;
    let mut first = true;
    let mut frames = Vec::new();

    loop {
        let chunk_len = encoded.len().min(max_frame.max(1));
        let chunk = if chunk_len > 0 {
            encoded.split_to(chunk_len)
        } else {
            Bytes::new()
        };

        let is_last = encoded.is_empty();
        let mut flags = 0u8;
        if first && end_stream {
            flags |= END_STREAM_FLAG;
        }
        if is_last {
            flags |= END_HEADERS_FLAG;
        }

        let frame_type = if first {
            FrameTypeH2::Headers
        } else {
            FrameTypeH2::Continuation
        };
        frames.push(Frame::new(frame_type, flags, stream_id, chunk));

        if is_last {
            break;
        }
        first = false;
    }

    Ok(frames)
}

pub(super) fn spawn_reader(
    mut read_half: ReadHalf<TransportStream>,
    shared: std::sync::Arc<Mutex<ConnShared>>,
    notify: std::sync::Arc<Notify>,
    writer_tx: mpsc::Sender<WriteCommand>,
    timeouts: ClientTimeouts,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let decoder_table_size = {
            let guard = shared.lock().unwrap();
            guard
                .settings
                .get(&SETTINGS_HEADER_TABLE_SIZE)
                .copied()
                .unwrap_or(DEFAULT_HEADER_TABLE_SIZE) as usize
        };
        let mut decoder = HpackCodec::new(DEFAULT_HEADER_TABLE_SIZE as usize, decoder_table_size);

        loop {
            let frame = match read_frame(&mut read_half, &timeouts).await {
                Ok(frame) => frame,
                Err(err) => {
                    let reason = match &err {
                        ProtocolError::Io(e) => ConnFatal::Io(e.to_string()),
                        ProtocolError::Timeout => ConnFatal::Io("read timed out".to_string()),
                        other => ConnFatal::Protocol(other.to_string()),
                    };
                    fail_connection(&shared, &notify, reason);
                    break;
                }
            };

            match process_frame(&shared, &notify, &writer_tx, &mut decoder, frame).await {
                Ok(ShouldContinue::Continue) => {}
                Ok(ShouldContinue::Stop) => break,
                Err(reason) => {
                    fail_connection(&shared, &notify, reason);
                    break;
                }
            }
        }
    })
}

enum ShouldContinue {
    Continue,
    Stop,
}

fn fail_connection(shared: &Mutex<ConnShared>, notify: &Notify, reason: ConnFatal) {
    let mut guard = shared.lock().unwrap();
    guard.set_fatal(reason);
    drop(guard);
    notify.notify_waiters();
}

async fn read_frame(
    read_half: &mut ReadHalf<TransportStream>,
    timeouts: &ClientTimeouts,
) -> Result<Frame, ProtocolError> {
    let mut header_buf = [0u8; FRAME_HEADER_SIZE];
    timeout_result(timeouts.read, async {
        read_half
            .read_exact(&mut header_buf)
            .await
            .map_err(ProtocolError::Io)
    })
    .await?;

    let length =
        ((header_buf[0] as u32) << 16) | ((header_buf[1] as u32) << 8) | (header_buf[2] as u32);

    let mut payload_buf = vec![0u8; length as usize];
    if length > 0 {
        timeout_result(timeouts.read, async {
            read_half
                .read_exact(&mut payload_buf)
                .await
                .map_err(ProtocolError::Io)
        })
        .await?;
    }

    let mut frame_buf = Vec::with_capacity(FRAME_HEADER_SIZE + length as usize);
    frame_buf.extend_from_slice(&header_buf);
    frame_buf.extend_from_slice(&payload_buf);
    Frame::parse(&frame_buf)
}

async fn process_frame(
    shared: &Mutex<ConnShared>,
    notify: &Notify,
    writer_tx: &mpsc::Sender<WriteCommand>,
    decoder: &mut HpackCodec,
    frame: Frame,
) -> Result<ShouldContinue, ConnFatal> {
    match &frame.frame_type {
        FrameType::H2(FrameTypeH2::Settings) => {
            handle_settings(shared, writer_tx, &frame).await?;
        }
        FrameType::H2(FrameTypeH2::Headers) => {
            handle_headers(shared, notify, decoder, &frame)?;
        }
        FrameType::H2(FrameTypeH2::Continuation) => {
            handle_continuation(shared, notify, decoder, &frame)?;
        }
        FrameType::H2(FrameTypeH2::Data) => {
            handle_data(shared, notify, writer_tx, &frame).await?;
        }
        FrameType::H2(FrameTypeH2::WindowUpdate) => {
            handle_window_update(shared, &frame)?;
        }
        FrameType::H2(FrameTypeH2::RstStream) => {
            handle_rst_stream(shared, notify, &frame)?;
        }
        FrameType::H2(FrameTypeH2::Ping) => {
            if !frame.is_ack() && frame.payload.len() == 8 {
                let mut data = [0u8; 8];
                data.copy_from_slice(&frame.payload);
                let _ = writer_tx.send(WriteCommand::PingAck(data)).await;
            }
        }
        FrameType::H2(FrameTypeH2::PushPromise) => {
            return Err(ConnFatal::Protocol(
                "PUSH_PROMISE received but push is disabled".to_string(),
            ));
        }
        FrameType::H2(FrameTypeH2::GoAway) => {
            handle_goaway(shared, notify, &frame)?;
        }
        _ => {}
    }

    Ok(ShouldContinue::Continue)
}

async fn handle_settings(
    shared: &Mutex<ConnShared>,
    writer_tx: &mpsc::Sender<WriteCommand>,
    frame: &Frame,
) -> Result<(), ConnFatal> {
    if frame.is_ack() {
        return Ok(());
    }

    let mut offset = 0;
    let mut table_size_update = None;
    {
        let mut guard = shared.lock().unwrap();
        while offset + 6 <= frame.payload.len() {
            let id = u16::from_be_bytes([frame.payload[offset], frame.payload[offset + 1]]);
            let value = u32::from_be_bytes([
                frame.payload[offset + 2],
                frame.payload[offset + 3],
                frame.payload[offset + 4],
                frame.payload[offset + 5],
            ]);
            match guard.apply_setting(id, value) {
                Ok(Some(size)) => table_size_update = Some(size),
                Ok(None) => {}
                Err(err) => return Err(ConnFatal::Protocol(err.to_string())),
            }
            offset += 6;
        }
        guard.initial_settings_received = true;
    }

    if let Some(size) = table_size_update {
        let _ = writer_tx.send(WriteCommand::SetEncoderTableSize(size)).await;
    }
    let _ = writer_tx.send(WriteCommand::SettingsAck).await;
    Ok(())
}

fn handle_headers(
    shared: &Mutex<ConnShared>,
    notify: &Notify,
    decoder: &mut HpackCodec,
    frame: &Frame,
) -> Result<(), ConnFatal> {
    if frame.stream_id == 0 {
        return Err(ConnFatal::Protocol("HEADERS frame received on stream 0".to_string()));
    }

    let fragment = header_fragment_bytes(frame).map_err(|e| ConnFatal::Protocol(e.to_string()))?;
    let end_stream = frame.is_end_stream();

    let mut guard = shared.lock().unwrap();
    let stream_id = frame.stream_id;
    guard.require_stream(stream_id).map_err(|e| ConnFatal::Protocol(e.to_string()))?;

    if end_stream {
        let stream = guard.streams.get_mut(&stream_id).unwrap();
        stream.end_stream_received = true;
        stream.state = match stream.state {
            StreamState::Idle | StreamState::Open => StreamState::HalfClosedRemote,
            StreamState::HalfClosedLocal => StreamState::Closed,
            other => other,
        };
    } else {
        let stream = guard.streams.get_mut(&stream_id).unwrap();
        if matches!(stream.state, StreamState::Idle) {
            stream.state = StreamState::Open;
        }
    }

    if frame.is_end_headers() {
        let event = decode_header_block(&mut guard, decoder, stream_id, fragment.as_ref(), end_stream)
            .map_err(|e| ConnFatal::Protocol(e.to_string()))?;
        push_event(&mut guard, stream_id, event);
        drop(guard);
        notify.notify_waiters();
    } else {
        let mut pending = PendingHeaderBlock::new();
        pending.end_stream = end_stream;
        pending.append(fragment.as_ref());
        check_continuation_limits(&pending).map_err(|e| ConnFatal::Protocol(e.to_string()))?;
        guard.streams.get_mut(&stream_id).unwrap().pending_headers = Some(pending);
    }

    Ok(())
}

fn handle_continuation(
    shared: &Mutex<ConnShared>,
    notify: &Notify,
    decoder: &mut HpackCodec,
    frame: &Frame,
) -> Result<(), ConnFatal> {
    if (frame.flags & PADDED_FLAG) != 0 {
        return Err(ConnFatal::Protocol("CONTINUATION frame must not be padded".to_string()));
    }

    let stream_id = frame.stream_id;
    let mut guard = shared.lock().unwrap();
    let stream = guard
        .streams
        .get_mut(&stream_id)
        .ok_or_else(|| ConnFatal::Protocol("CONTINUATION frame on unknown stream".to_string()))?;

    let pending = stream
        .pending_headers
        .as_mut()
        .ok_or_else(|| ConnFatal::Protocol("CONTINUATION frame without pending header block".to_string()))?;
    pending.append(frame.payload.as_ref());
    check_continuation_limits(pending).map_err(|e| ConnFatal::Protocol(e.to_string()))?;

    if !frame.is_end_headers() {
        return Ok(());
    }

    let pending = stream.pending_headers.take().unwrap();
    let (block, end_stream) = (pending.block.freeze(), pending.end_stream);

    let event = decode_header_block(&mut guard, decoder, stream_id, block.as_ref(), end_stream)
        .map_err(|e| ConnFatal::Protocol(e.to_string()))?;
    push_event(&mut guard, stream_id, event);
    drop(guard);
    notify.notify_waiters();
    Ok(())
}

async fn handle_data(
    shared: &Mutex<ConnShared>,
    notify: &Notify,
    writer_tx: &mpsc::Sender<WriteCommand>,
    frame: &Frame,
) -> Result<(), ConnFatal> {
    let stream_id = frame.stream_id;
    if stream_id == 0 {
        return Err(ConnFatal::Protocol("DATA frame received on stream 0".to_string()));
    }

    let payload = data_payload(frame).map_err(|e| ConnFatal::Protocol(e.to_string()))?;
    let data_size = frame.payload.len() as u32;
    let end_stream = frame.is_end_stream();

    let mut stream_top_up = None;
    let mut conn_top_up = None;

    if data_size > 0 {
        let mut guard = shared.lock().unwrap();
        let data_window = clamp_window(data_size);
        {
            let stream = guard
                .require_stream(stream_id)
                .map_err(|e| ConnFatal::Protocol(e.to_string()))?;
            if stream.recv_window < data_window {
                return Err(ConnFatal::Protocol("Peer violated stream flow control".to_string()));
            }
            stream.recv_window -= data_window;
        }
        if guard.recv_connection_window < data_window {
            return Err(ConnFatal::Protocol("Peer violated connection flow control".to_string()));
        }
        guard.recv_connection_window -= data_window;

        let stream_low_water = guard.local_initial_stream_window() / 2;
        let target = guard.local_initial_stream_window();
        let stream = guard.streams.get(&stream_id).unwrap();
        if stream.recv_window <= stream_low_water {
            let increment = (target - stream.recv_window).max(0) as u32;
            if increment > 0 {
                stream_top_up = Some(increment);
            }
        }

        let connection_low_water = DEFAULT_INITIAL_WINDOW_SIZE as i32 / 2;
        if guard.recv_connection_window <= connection_low_water {
            let increment =
                (DEFAULT_INITIAL_WINDOW_SIZE as i32 - guard.recv_connection_window).max(0) as u32;
            if increment > 0 {
                conn_top_up = Some(increment);
            }
        }

        if end_stream {
            let stream = guard.streams.get_mut(&stream_id).unwrap();
            stream.end_stream_received = true;
            stream.state = match stream.state {
                StreamState::Open => StreamState::HalfClosedRemote,
                StreamState::HalfClosedLocal => StreamState::Closed,
                other => other,
            };
        }

        push_event(&mut guard, stream_id, StreamEvent::Data { payload, end_stream });
    } else {
        let mut guard = shared.lock().unwrap();
        guard
            .require_stream(stream_id)
            .map_err(|e| ConnFatal::Protocol(e.to_string()))?;
        if end_stream {
            let stream = guard.streams.get_mut(&stream_id).unwrap();
            stream.end_stream_received = true;
            stream.state = match stream.state {
                StreamState::Open => StreamState::HalfClosedRemote,
                StreamState::HalfClosedLocal => StreamState::Closed,
                other => other,
            };
        }
        push_event(&mut guard, stream_id, StreamEvent::Data { payload, end_stream });
    }

    notify.notify_waiters();

    if let Some(increment) = stream_top_up {
        let _ = writer_tx
            .send(WriteCommand::WindowUpdate { stream_id, increment, respond: None })
            .await;
    }
    if let Some(increment) = conn_top_up {
        let _ = writer_tx
            .send(WriteCommand::WindowUpdate { stream_id: 0, increment, respond: None })
            .await;
    }

    Ok(())
}

fn handle_window_update(shared: &Mutex<ConnShared>, frame: &Frame) -> Result<(), ConnFatal> {
    if frame.payload.len() != 4 {
        return Err(ConnFatal::Protocol("Invalid WINDOW_UPDATE frame size".to_string()));
    }
    let increment = u32::from_be_bytes([
        frame.payload[0],
        frame.payload[1],
        frame.payload[2],
        frame.payload[3],
    ]) & 0x7FFF_FFFF;
    if increment == 0 {
        return Err(ConnFatal::Protocol(
            "WINDOW_UPDATE increment must be greater than zero".to_string(),
        ));
    }
    let increment_val = clamp_window(increment);

    let mut guard = shared.lock().unwrap();
    if frame.stream_id == 0 {
        guard.send_connection_window =
            guard.send_connection_window.saturating_add(increment_val).clamp(0, 0x7FFF_FFFF);
    } else if let Some(stream) = guard.streams.get_mut(&frame.stream_id) {
        stream.send_window = stream.send_window.saturating_add(increment_val).clamp(0, 0x7FFF_FFFF);
    }
    Ok(())
}

fn handle_rst_stream(shared: &Mutex<ConnShared>, notify: &Notify, frame: &Frame) -> Result<(), ConnFatal> {
    if frame.payload.len() != 4 {
        return Err(ConnFatal::Protocol("RST_STREAM frame must have 4-byte payload".to_string()));
    }
    let error_code = u32::from_be_bytes([
        frame.payload[0],
        frame.payload[1],
        frame.payload[2],
        frame.payload[3],
    ]);
    let h2_error = H2ErrorCode::from(error_code);

    let mut guard = shared.lock().unwrap();
    let stream_id = frame.stream_id;
    if guard.streams.get(&stream_id).is_none() {
        return Err(ConnFatal::Protocol(format!(
            "RST_STREAM for stream {} which was never opened",
            stream_id
        )));
    }
    guard.streams.get_mut(&stream_id).unwrap().state = StreamState::Closed;
    push_event(&mut guard, stream_id, StreamEvent::RstStream { error_code: h2_error });
    drop(guard);
    notify.notify_waiters();
    Ok(())
}

/// A GOAWAY only refuses *new* streams (enforced via `goaway_last_stream_id`
/// in `ConnShared::create_stream`); streams already open keep draining their
/// queued events normally, matching how a well-behaved peer uses GOAWAY to
/// drain a connection rather than sever it immediately.
fn handle_goaway(shared: &Mutex<ConnShared>, notify: &Notify, frame: &Frame) -> Result<(), ConnFatal> {
    if frame.payload.len() < 8 {
        return Err(ConnFatal::Protocol("Invalid GOAWAY frame size".to_string()));
    }
    let last_stream_id = u32::from_be_bytes([
        frame.payload[0],
        frame.payload[1],
        frame.payload[2],
        frame.payload[3],
    ]) & 0x7FFF_FFFF;
    let error_code = u32::from_be_bytes([
        frame.payload[4],
        frame.payload[5],
        frame.payload[6],
        frame.payload[7],
    ]);
    let _h2_error = H2ErrorCode::from(error_code);
    let _debug_data = if frame.payload.len() > 8 {
        String::from_utf8_lossy(&frame.payload[8..]).to_string()
    } else {
        String::new()
    };

    let mut guard = shared.lock().unwrap();
    guard.last_stream_id = last_stream_id;
    guard.goaway_last_stream_id = Some(last_stream_id);
    for (&id, stream) in guard.streams.iter_mut() {
        if id > last_stream_id {
            stream.state = StreamState::Closed;
        }
    }
    if guard.state != ConnectionState::Closed {
        guard.state = ConnectionState::HalfClosedRemote;
    }
    drop(guard);
    notify.notify_waiters();
    Ok(())
}

fn push_event(guard: &mut ConnShared, stream_id: u32, event: StreamEvent) {
    if let Some(stream) = guard.streams.get_mut(&stream_id) {
        stream.inbound_events.push_back(event);
    }
}

fn check_continuation_limits(pending: &PendingHeaderBlock) -> Result<(), ProtocolError> {
    if pending.frame_count > MAX_CONTINUATION_FRAMES {
        return Err(H2ConnectionErrorKind::EnhanceYourCalm(format!(
            "header block spans more than {} frames",
            MAX_CONTINUATION_FRAMES
        ))
        .into());
    }
    if pending.block.len() > MAX_CONTINUATION_ACCUMULATED_SIZE {
        return Err(H2ConnectionErrorKind::EnhanceYourCalm(format!(
            "header block exceeds {} bytes",
            MAX_CONTINUATION_ACCUMULATED_SIZE
        ))
        .into());
    }
    if pending.started_at.elapsed() > MAX_CONTINUATION_DURATION {
        return Err(H2ConnectionErrorKind::EnhanceYourCalm(
            "header block took too long to assemble".to_string(),
        )
        .into());
    }
    Ok(())
}

fn header_fragment_bytes(frame: &Frame) -> Result<Bytes, ProtocolError> {
    let payload = &frame.payload;
    let mut offset = 0usize;
    let mut pad_length = 0usize;

    if (frame.flags & PADDED_FLAG) != 0 {
        if payload.is_empty() {
            return Err(ProtocolError::H2ProtocolError(
                "PADDED flag set but no pad length available".to_string(),
            ));
        }
        pad_length = payload[0] as usize;
        offset += 1;
        if pad_length > payload.len().saturating_sub(offset) {
            return Err(ProtocolError::H2ProtocolError(
                "Invalid padding length in HEADERS frame".to_string(),
            ));
        }
    }

    if (frame.flags & PRIORITY_FLAG) != 0 {
        if payload.len() < offset + 5 {
            return Err(ProtocolError::H2ProtocolError(
                "PRIORITY flag set but insufficient payload".to_string(),
            ));
        }
        offset += 5;
    }

    if pad_length > payload.len().saturating_sub(offset) {
        return Err(ProtocolError::H2ProtocolError("Padding exceeds payload size".to_string()));
    }

    let end = payload.len() - pad_length;
    if offset > end {
        return Err(ProtocolError::H2ProtocolError(
            "Invalid header fragment boundaries".to_string(),
        ));
    }

    Ok(payload.slice(offset..end))
}

fn data_payload(frame: &Frame) -> Result<Bytes, ProtocolError> {
    let payload = &frame.payload;
    if (frame.flags & PADDED_FLAG) == 0 {
        return Ok(payload.clone());
    }
    if payload.is_empty() {
        return Err(ProtocolError::H2ProtocolError(
            "DATA frame with PADDED flag set but empty payload".to_string(),
        ));
    }
    let pad_length = payload[0] as usize;
    if pad_length > payload.len().saturating_sub(1) {
        return Err(ProtocolError::H2ProtocolError(
            "Padding length exceeds DATA payload".to_string(),
        ));
    }
    let end = payload.len() - pad_length;
    Ok(payload.slice(1..end))
}

fn decode_header_block(
    guard: &mut ConnShared,
    decoder: &mut HpackCodec,
    stream_id: u32,
    block: &[u8],
    end_stream: bool,
) -> Result<StreamEvent, ProtocolError> {
    let headers = decoder.decode(block)?;

    let status_code = headers.iter().find_map(|h| {
        (h.name == ":status")
            .then(|| h.value.as_ref()?.parse::<u16>().ok())
            .flatten()
    });
    let informational = status_code.map(|code| code < 200).unwrap_or(false);

    let already_final = guard
        .streams
        .get(&stream_id)
        .map(|s| s.final_headers_received)
        .unwrap_or(false);

    if !informational && !already_final {
        if let Some(stream) = guard.streams.get_mut(&stream_id) {
            stream.final_headers_received = true;
        }
    }

    let is_trailer = already_final && !informational;

    Ok(StreamEvent::Headers { headers, end_stream, is_trailer })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_stream_allocates_odd_ids_starting_at_one() {
        let mut shared = ConnShared::new();
        shared.initial_settings_received = true;
        shared.state = ConnectionState::Open;

        assert_eq!(shared.create_stream().unwrap(), 1);
        assert_eq!(shared.create_stream().unwrap(), 3);
        assert_eq!(shared.create_stream().unwrap(), 5);
    }

    #[test]
    fn create_stream_rejects_before_handshake_completes() {
        let mut shared = ConnShared::new();
        let err = shared.create_stream().unwrap_err();
        assert!(matches!(err, ProtocolError::RequestFailed(_)));
    }

    #[test]
    fn create_stream_enforces_max_concurrent_streams() {
        let mut shared = ConnShared::new();
        shared.initial_settings_received = true;
        shared.state = ConnectionState::Open;
        shared
            .remote_settings
            .insert(SETTINGS_MAX_CONCURRENT_STREAMS, 1);

        shared.create_stream().unwrap();
        let err = shared.create_stream().unwrap_err();
        assert!(matches!(err, ProtocolError::RequestFailed(_)));
    }

    #[test]
    fn create_stream_rejects_new_streams_after_goaway() {
        let mut shared = ConnShared::new();
        shared.initial_settings_received = true;
        shared.state = ConnectionState::Open;
        shared.goaway_last_stream_id = Some(0);

        let err = shared.create_stream().unwrap_err();
        assert!(matches!(err, ProtocolError::RequestFailed(_)));
    }

    #[test]
    fn require_stream_rejects_unknown_stream_id() {
        let mut shared = ConnShared::new();
        let err = shared.require_stream(7).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::H2ConnectionError(H2ConnectionErrorKind::ProtocolViolation(_))
        ));
    }

    #[test]
    fn require_stream_finds_a_previously_created_stream() {
        let mut shared = ConnShared::new();
        shared.initial_settings_received = true;
        shared.state = ConnectionState::Open;
        let stream_id = shared.create_stream().unwrap();

        assert!(shared.require_stream(stream_id).is_ok());
    }

    #[test]
    fn goaway_marks_higher_numbered_streams_closed_but_keeps_connection_open() {
        let mut shared = ConnShared::new();
        shared.initial_settings_received = true;
        shared.state = ConnectionState::Open;
        let low = shared.create_stream().unwrap();
        let high = shared.create_stream().unwrap();

        let notify = Notify::new();
        let mutex = Mutex::new(shared);
        let frame = Frame::goaway(low, 0, None);
        handle_goaway(&mutex, &notify, &frame).unwrap();

        let guard = mutex.lock().unwrap();
        assert_eq!(guard.streams.get(&high).unwrap().state, StreamState::Closed);
        assert_ne!(guard.streams.get(&low).unwrap().state, StreamState::Closed);
        assert!(guard.is_connection_open());
        assert_eq!(guard.goaway_last_stream_id, Some(low));
    }

    #[test]
    fn fatal_error_is_sticky_and_closes_the_connection() {
        let mut shared = ConnShared::new();
        shared.set_fatal(ConnFatal::Io("broken pipe".to_string()));
        assert!(shared.fatal_error().is_some());
        assert!(!shared.is_connection_open());

        // A later fatal error never overwrites the first one.
        shared.set_fatal(ConnFatal::Protocol("should be ignored".to_string()));
        match shared.fatal_error().unwrap() {
            ProtocolError::ConnectionFailed(msg) => assert_eq!(msg, "broken pipe"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn apply_setting_initial_window_size_adjusts_existing_stream_send_windows() {
        let mut shared = ConnShared::new();
        shared.initial_settings_received = true;
        shared.state = ConnectionState::Open;
        let stream_id = shared.create_stream().unwrap();

        shared.apply_setting(SETTINGS_INITIAL_WINDOW_SIZE, 70_000).unwrap();
        let send_window = shared.streams.get(&stream_id).unwrap().send_window;
        assert_eq!(send_window, 70_000);
    }

    #[test]
    fn apply_setting_rejects_invalid_max_frame_size() {
        let mut shared = ConnShared::new();
        let err = shared.apply_setting(SETTINGS_MAX_FRAME_SIZE, 10).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidResponse(_)));
    }

    #[test]
    fn encode_headers_frames_splits_oversized_blocks_across_continuations() {
        let mut encoder = HpackCodec::new(4096, 4096);
        let headers: Vec<Header> = (0..200)
            .map(|i| Header {
                name: format!("x-header-{}", i),
                value: Some("value".repeat(20)),
            })
            .collect();

        let frames = encode_headers_frames(&mut encoder, 1, &headers, true, 128).unwrap();
        assert!(frames.len() > 1);
        assert!(matches!(frames[0].frame_type, FrameType::H2(FrameTypeH2::Headers)));
        assert!(frames[1..]
            .iter()
            .all(|f| matches!(f.frame_type, FrameType::H2(FrameTypeH2::Continuation))));
        assert!(frames.last().unwrap().is_end_headers());
        assert!(frames[0].is_end_stream());
    }

    #[test]
    fn header_fragment_bytes_strips_padding_and_priority() {
        let mut payload = Vec::new();
        payload.push(2u8); // pad length
        payload.extend_from_slice(&[0, 0, 0, 0]); // stream dependency
        payload.push(16); // weight
        payload.extend_from_slice(b"hi");
        payload.extend_from_slice(&[0, 0]); // padding

        let frame = Frame::new(
            FrameTypeH2::Headers,
            PADDED_FLAG | PRIORITY_FLAG,
            1,
            Bytes::from(payload),
        );
        let fragment = header_fragment_bytes(&frame).unwrap();
        assert_eq!(fragment.as_ref(), b"hi");
    }

    #[test]
    fn data_payload_strips_padding() {
        let mut payload = vec![1u8];
        payload.extend_from_slice(b"hi");
        payload.push(0);
        let frame = Frame::new(FrameTypeH2::Data, PADDED_FLAG, 1, Bytes::from(payload));

        let payload = data_payload(&frame).unwrap();
        assert_eq!(payload.as_ref(), b"hi");
    }
}
