mod engine;
mod state;

pub use state::{ConnectionState, StreamEvent, StreamInfo, StreamState};

use crate::connection::HttpConnection;
use crate::h2::consts::*;
use crate::stream::{create_stream, TransportStream};
use crate::types::{ClientTimeouts, H2ErrorCode, H2StreamErrorKind, Header, ProtocolError};
use crate::utils::timeout_result;
use crate::Response;
use async_trait::async_trait;
use bytes::Bytes;
use engine::{spawn_reader, spawn_writer, ConnShared, WriteCommand};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Notify};

/// A live HTTP/2 connection. Cheap to clone: every clone shares the same
/// writer task, reader task, and bookkeeping, so many callers can multiplex
/// concurrent streams over one socket. The writer task is the sole owner of
/// the HPACK encoder and the socket's write half; the reader task is the
/// sole owner of the HPACK decoder and the read half. Everything else
/// (stream state, windows, settings) lives in `ConnShared`, guarded by a
/// plain `std::sync::Mutex` that is never held across an `.await`.
#[derive(Clone)]
pub struct H2Connection {
    shared: Arc<Mutex<ConnShared>>,
    notify: Arc<Notify>,
    writer_tx: mpsc::Sender<WriteCommand>,
    reader_task: Arc<tokio::task::JoinHandle<()>>,
    writer_task: Arc<tokio::task::JoinHandle<()>>,
}

#[derive(Debug, Clone)]
pub struct H2ConnectOptions {
    pub target: String,
    pub timeouts: ClientTimeouts,
}

impl H2Connection {
    pub async fn connect(
        target: &str,
        timeouts: &ClientTimeouts, // TODO make optional
    ) -> Result<Self, ProtocolError> {
        let target = crate::utils::parse_target(target)?;
        let scheme = target.scheme();
        let is_tls = scheme == "https";
        let is_h2c = scheme == "http";

        if !is_tls && !is_h2c {
            return Err(ProtocolError::RequestFailed(
                "HTTP/2 requires https, h2, h2c, or http schemes".to_string(),
            ));
        }

        let host = target
            .host()
            .ok_or_else(|| ProtocolError::InvalidTarget("Target missing host".to_string()))?;
        let port = target
            .port()
            .ok_or_else(|| ProtocolError::InvalidTarget("Target missing port".to_string()))?;

        let scheme_for_transport = if is_tls { "h2" } else { "http" };
        let transport = timeout_result(timeouts.connect, async {
            create_stream(scheme_for_transport, host, port)
                .await
                .map_err(|e| ProtocolError::ConnectionFailed(e.to_string()))
        })
        .await?;

        let connection = Self::new(transport, timeouts.clone());
        connection.perform_handshake().await?;
        Ok(connection)
    }

    /// Wraps an already-established transport in a connection handle and
    /// spawns its writer/reader tasks. The connection preface and initial
    /// SETTINGS are not sent until [`Self::perform_handshake`] runs.
    pub fn new(stream: TransportStream, timeouts: ClientTimeouts) -> Self {
        let shared = Arc::new(Mutex::new(ConnShared::new()));
        let notify = Arc::new(Notify::new());

        let (read_half, write_half) = stream.into_split();
        let (writer_tx, writer_task) = spawn_writer(write_half, shared.clone(), timeouts.clone());
        let reader_task = spawn_reader(
            read_half,
            shared.clone(),
            notify.clone(),
            writer_tx.clone(),
            timeouts,
        );

        Self {
            shared,
            notify,
            writer_tx,
            reader_task: Arc::new(reader_task),
            writer_task: Arc::new(writer_task),
        }
    }

    async fn perform_handshake(&self) -> Result<(), ProtocolError> {
        let settings_params: Vec<(u16, u32)> = {
            let guard = self.shared.lock().unwrap();
            guard.settings.iter().map(|(&id, &value)| (id, value)).collect()
        };

        self.send_command(WriteCommand::Preface).await?;
        self.send_command(WriteCommand::Settings(settings_params))
            .await?;

        self.wait_until(|guard| guard.initial_settings_received)
            .await?;

        let mut guard = self.shared.lock().unwrap();
        if matches!(guard.state, ConnectionState::Idle) {
            guard.state = ConnectionState::Open;
        }
        Ok(())
    }

    /// Blocks until `condition` holds on the shared state, or the connection
    /// fails fatally. Uses the documented `Notify` pattern: the `Notified`
    /// future is created and enabled before the condition is re-checked, so
    /// a notification racing with the check is never missed.
    async fn wait_until(
        &self,
        mut condition: impl FnMut(&ConnShared) -> bool,
    ) -> Result<(), ProtocolError> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let guard = self.shared.lock().unwrap();
                if condition(&guard) {
                    return Ok(());
                }
                if let Some(err) = guard.fatal_error() {
                    return Err(err);
                }
            }

            notified.await;
        }
    }

    async fn send_command(&self, command: WriteCommand) -> Result<(), ProtocolError> {
        self.writer_tx
            .send(command)
            .await
            .map_err(|_| self.fatal_or("HTTP/2 writer task has stopped"))
    }

    fn fatal_or(&self, fallback: &str) -> ProtocolError {
        self.shared
            .lock()
            .unwrap()
            .fatal_error()
            .unwrap_or_else(|| ProtocolError::ConnectionFailed(fallback.to_string()))
    }

    pub async fn create_stream(&self) -> Result<u32, ProtocolError> {
        self.shared.lock().unwrap().create_stream()
    }

    pub fn get_stream_state(&self, stream_id: u32) -> Option<StreamState> {
        self.shared
            .lock()
            .unwrap()
            .streams
            .get(&stream_id)
            .map(|s| s.state.clone())
    }

    pub async fn send_headers(
        &self,
        stream_id: u32,
        headers: &[Header],
        end_stream: bool,
    ) -> Result<(), ProtocolError> {
        let (tx, rx) = oneshot::channel();
        self.send_command(WriteCommand::Headers {
            stream_id,
            headers: headers.to_vec(),
            end_stream,
            respond: tx,
        })
        .await?;
        rx.await
            .map_err(|_| self.fatal_or("HTTP/2 writer task has stopped"))?
    }

    /// Sends a single DATA frame. Unlike headers, this client never splits
    /// an oversized payload across multiple frames: a payload larger than
    /// the peer's advertised `SETTINGS_MAX_FRAME_SIZE` is rejected. Callers
    /// that need to send more than one frame's worth of body should call
    /// this once per frame themselves.
    pub async fn send_data(
        &self,
        stream_id: u32,
        data: &[u8],
        end_stream: bool,
    ) -> Result<(), ProtocolError> {
        let (tx, rx) = oneshot::channel();
        self.send_command(WriteCommand::Data {
            stream_id,
            data: Bytes::copy_from_slice(data),
            end_stream,
            respond: tx,
        })
        .await?;
        rx.await
            .map_err(|_| self.fatal_or("HTTP/2 writer task has stopped"))?
    }

    pub async fn send_window_update(
        &self,
        stream_id: u32,
        increment: u32,
    ) -> Result<(), ProtocolError> {
        if increment == 0 {
            return Err(ProtocolError::H2ProtocolError(
                "WINDOW_UPDATE increment must be greater than zero".to_string(),
            ));
        }
        let (tx, rx) = oneshot::channel();
        self.send_command(WriteCommand::WindowUpdate {
            stream_id,
            increment,
            respond: Some(tx),
        })
        .await?;
        rx.await
            .map_err(|_| self.fatal_or("HTTP/2 writer task has stopped"))?
    }

    pub async fn send_rst(
        &self,
        stream_id: u32,
        error_code: H2ErrorCode,
    ) -> Result<(), ProtocolError> {
        let (tx, rx) = oneshot::channel();
        self.send_command(WriteCommand::RstStream {
            stream_id,
            error_code: error_code as u32,
            respond: Some(tx),
        })
        .await?;
        rx.await
            .map_err(|_| self.fatal_or("HTTP/2 writer task has stopped"))?
    }

    pub async fn send_goaway(
        &self,
        last_stream_id: u32,
        error_code: u32,
        debug_data: Option<&[u8]>,
    ) -> Result<(), ProtocolError> {
        let (tx, rx) = oneshot::channel();
        self.send_command(WriteCommand::GoAway {
            last_stream_id,
            error_code,
            debug_data: debug_data.map(|d| d.to_vec()).unwrap_or_default(),
            respond: tx,
        })
        .await?;
        rx.await
            .map_err(|_| self.fatal_or("HTTP/2 writer task has stopped"))?
    }

    /// Waits for the next event (headers, data, or reset) on `stream_id`.
    /// The stream must already have been opened via [`Self::create_stream`]:
    /// this client never accepts server push, so every stream it will ever
    /// see was reserved locally first.
    pub async fn recv_stream_event(&self, stream_id: u32) -> Result<StreamEvent, ProtocolError> {
        if stream_id == 0 {
            return Err(ProtocolError::H2ProtocolError(
                "Cannot receive events for stream 0".to_string(),
            ));
        }

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut guard = self.shared.lock().unwrap();
                let stream = guard.streams.get_mut(&stream_id).ok_or_else(|| {
                    ProtocolError::H2ProtocolError(format!(
                        "stream {} was never opened",
                        stream_id
                    ))
                })?;
                if let Some(event) = stream.inbound_events.pop_front() {
                    return Ok(event);
                }
                if let Some(err) = guard.fatal_error() {
                    return Err(err);
                }
            }

            notified.await;
        }
    }

    pub fn is_connection_open(&self) -> bool {
        self.shared.lock().unwrap().is_connection_open()
    }

    pub fn get_max_concurrent_streams(&self) -> u32 {
        self.shared.lock().unwrap().max_concurrent_streams()
    }

    pub fn get_active_stream_count(&self) -> usize {
        self.shared.lock().unwrap().active_stream_count()
    }

    pub async fn close(&self) -> Result<(), ProtocolError> {
        let last_stream_id = self.shared.lock().unwrap().last_stream_id;
        self.send_goaway(last_stream_id, 0, None).await
    }

    pub async fn read_response(&self, stream_id: u32) -> Result<Response, ProtocolError> {
        self.read_response_options(stream_id, None, None, None, None)
            .await
    }

    pub async fn read_response_options(
        &self,
        stream_id: u32,
        overall_timeout: Option<Duration>,
        event_timeout: Option<Duration>,
        max_events: Option<usize>,
        event_handler: Option<&dyn Fn(&StreamEvent)>,
    ) -> Result<Response, ProtocolError> {
        let protocol = "HTTP/2.0".to_string();
        let mut status: Option<u16> = None;
        let mut headers = Vec::new();
        let mut body = Vec::new();
        let mut trailers: Option<Vec<Header>> = None;
        let mut event_count = 0;
        let start_time = std::time::Instant::now();

        loop {
            if let Some(timeout) = overall_timeout {
                if start_time.elapsed() >= timeout {
                    break;
                }
            }

            if let Some(max) = max_events {
                if event_count >= max {
                    break;
                }
            }

            let event_result = if let Some(timeout) = event_timeout {
                match tokio::time::timeout(timeout, self.recv_stream_event(stream_id)).await {
                    Ok(result) => result,
                    Err(_) => break,
                }
            } else {
                self.recv_stream_event(stream_id).await
            };

            let event = match event_result {
                Ok(event) => {
                    event_count += 1;
                    if let Some(handler) = event_handler {
                        handler(&event);
                    }
                    event
                }
                Err(e) => {
                    if event_handler.is_some() {
                        break;
                    } else {
                        return Err(e);
                    }
                }
            };

            match event {
                StreamEvent::Headers {
                    headers: block,
                    end_stream,
                    is_trailer,
                } => {
                    if !is_trailer {
                        let mut parsed_status: Option<u16> = None;
                        let mut filtered = Vec::new();
                        for header in block.into_iter() {
                            if header.name == ":status" {
                                if let Some(ref value) = header.value {
                                    if let Ok(code) = value.parse::<u16>() {
                                        parsed_status = Some(code);
                                    }
                                }
                            } else if !header.name.starts_with(':') {
                                filtered.push(header);
                            }
                        }

                        let code = parsed_status.ok_or_else(|| {
                            ProtocolError::InvalidResponse(
                                "Missing :status header in response".to_string(),
                            )
                        })?;

                        if code < 200 {
                            if end_stream {
                                return Err(ProtocolError::InvalidResponse(
                                    "Informational response closed stream".to_string(),
                                ));
                            }
                            continue;
                        }

                        status = Some(code);
                        headers = filtered;

                        if end_stream {
                            break;
                        }
                    } else {
                        let trailer_headers = trailers.get_or_insert_with(Vec::new);
                        trailer_headers
                            .extend(block.into_iter().filter(|h| !h.name.starts_with(':')));
                        if end_stream {
                            break;
                        }
                    }
                }
                StreamEvent::Data {
                    payload,
                    end_stream,
                } => {
                    body.extend_from_slice(&payload);
                    if end_stream {
                        break;
                    }
                }
                StreamEvent::RstStream { error_code } => {
                    return Err(ProtocolError::H2StreamError(H2StreamErrorKind::Reset(
                        error_code,
                    )));
                }
            }
        }

        let status = status.ok_or_else(|| {
            ProtocolError::InvalidResponse("No final response received".to_string())
        })?;

        Ok(Response {
            status,
            protocol,
            headers,
            body: Bytes::from(body),
            trailers,
        })
    }
}

impl Drop for H2Connection {
    fn drop(&mut self) {
        // The writer/reader tasks are shared across every clone of this
        // handle (via `Arc`); only abort them once the last handle goes
        // away, otherwise an in-flight clone would have its connection
        // killed out from under it.
        if Arc::strong_count(&self.writer_task) == 1 {
            self.writer_task.abort();
        }
        if Arc::strong_count(&self.reader_task) == 1 {
            self.reader_task.abort();
        }
    }
}

#[async_trait(?Send)]
impl HttpConnection for H2Connection {
    type ConnectOptions = H2ConnectOptions;
    type ReadOptions = u32;

    async fn connect(options: Self::ConnectOptions) -> Result<Self, ProtocolError> {
        H2Connection::connect(&options.target, &options.timeouts).await
    }

    async fn read_response(
        &mut self,
        stream_id: Self::ReadOptions,
    ) -> Result<Response, ProtocolError> {
        H2Connection::read_response(self, stream_id).await
    }
}
