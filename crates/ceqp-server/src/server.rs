//! Single-session TCP server loop.
//!
//! State machine:
//!
//! ```text
//! IDLE -- start(port) --> LISTENING
//! LISTENING -- accept ok --> SESSION
//! LISTENING -- stop      --> IDLE
//! SESSION -- frame ok    --> SESSION
//! SESSION -- frame bad / eof / stop --> LISTENING   (session socket closed)
//! ```
//!
//! Only one client is served at a time; a slow client blocks the server
//! task, which is acceptable since there is no second client to starve.
//! Cancellation is cooperative: `stop` flips a shared flag that the
//! accept loop and the per-frame loop both poll via a short bounded
//! `select!` against the blocking I/O.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex as StdMutex,
    },
    time::Duration,
};

use ceqp_core::target::{HostModules, TargetProcess};
use ceqp_proto::{read_frame, write_frame, Frame, Opcode};
use tokio::{net::TcpListener, task::JoinHandle};

use crate::dispatch::{self, code, DispatchError};

/// How often the accept loop and the per-frame loop re-check the stop flag.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The CEQP server: bind, accept one client at a time, dispatch its frames.
///
/// Generic over the host-supplied target so the demonstration binary and
/// tests can both plug in [`crate::demo::DemoTarget`] without the server
/// loop knowing anything about it.
pub struct Server<T> {
    target: Arc<T>,
    running: Arc<AtomicBool>,
    test_env: Arc<AtomicBool>,
    cross_bitness_available: Arc<AtomicBool>,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl<T> Server<T>
where
    T: TargetProcess + HostModules + Send + Sync + 'static,
{
    /// Build a server bound to no port yet (IDLE state). The cross-bitness
    /// access path (used only when this server binary and the target differ
    /// in pointer width) starts out available; hosts that lack the syscall
    /// facility call [`Server::set_cross_bitness_available`] to disable it.
    pub fn new(target: T) -> Self {
        Self {
            target: Arc::new(target),
            running: Arc::new(AtomicBool::new(false)),
            test_env: Arc::new(AtomicBool::new(false)),
            cross_bitness_available: Arc::new(AtomicBool::new(true)),
            task: StdMutex::new(None),
        }
    }

    /// Bind and begin serving on `port` (all interfaces). Idempotent if
    /// already running. Returns `false` only on a resource error (failed
    /// bind/listen).
    ///
    /// # Panics
    ///
    /// Panics if the internal task-handle mutex is poisoned.
    pub async fn start(&self, port: u16) -> bool {
        if self.running.load(Ordering::SeqCst) {
            return true;
        }

        let listener = match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => listener,
            Err(err) => {
                tracing::error!("failed to bind port {port}: {err}");
                return false;
            },
        };

        let Ok(local_addr) = listener.local_addr() else {
            tracing::error!("bound listener has no local address");
            return false;
        };
        tracing::info!("listening on {local_addr}");

        self.running.store(true, Ordering::SeqCst);

        let target = Arc::clone(&self.target);
        let running = Arc::clone(&self.running);
        let test_env = Arc::clone(&self.test_env);
        let cross_bitness_available = Arc::clone(&self.cross_bitness_available);

        let handle = tokio::spawn(accept_loop(listener, target, running, test_env, cross_bitness_available));
        *self.task.lock().expect("server task mutex poisoned") = Some(handle);

        true
    }

    /// Stop accepting and tear down the active session, then join the
    /// background task. A no-op if the server isn't running.
    ///
    /// # Panics
    ///
    /// Panics if the internal task-handle mutex is poisoned.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.task.lock().expect("server task mutex poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Enable or disable test-mode diagnostics (`DTYPE`/`LEN` echoed on
    /// pointer-chain reads). Does not alter wire semantics otherwise.
    pub fn set_test_env(&self, enable: bool) {
        self.test_env.store(enable, Ordering::SeqCst);
    }

    /// Enable or disable the cross-bitness memory access path. Only takes
    /// effect when this server and the target differ in pointer width; when
    /// disabled, such requests fail with [`ceqp_core::CoreError::CrossArchUnsupported`]
    /// instead of silently truncating addresses.
    pub fn set_cross_bitness_available(&self, available: bool) {
        self.cross_bitness_available.store(available, Ordering::SeqCst);
    }

    /// Whether the server is currently in `LISTENING` or `SESSION`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

async fn accept_loop<T>(
    listener: TcpListener,
    target: Arc<T>,
    running: Arc<AtomicBool>,
    test_env: Arc<AtomicBool>,
    cross_bitness_available: Arc<AtomicBool>,
) where
    T: TargetProcess + HostModules + Send + Sync + 'static,
{
    while running.load(Ordering::SeqCst) {
        let accepted: Option<(tokio::net::TcpStream, SocketAddr)> = tokio::select! {
            result = listener.accept() => match result {
                Ok(pair) => Some(pair),
                Err(err) => {
                    tracing::warn!("accept failed: {err}");
                    None
                },
            },
            () = tokio::time::sleep(STOP_POLL_INTERVAL) => None,
        };

        let Some((stream, addr)) = accepted else {
            continue;
        };

        if let Err(err) = stream.set_nodelay(true) {
            tracing::warn!("failed to set TCP_NODELAY for {addr}: {err}");
        }
        tracing::debug!("accepted session from {addr}");

        run_session(stream, &target, &running, &test_env, &cross_bitness_available).await;

        tracing::debug!("session with {addr} ended");
    }
}

async fn run_session<T>(
    mut stream: tokio::net::TcpStream,
    target: &T,
    running: &AtomicBool,
    test_env: &AtomicBool,
    cross_bitness_available: &AtomicBool,
) where
    T: TargetProcess + HostModules,
{
    while running.load(Ordering::SeqCst) {
        let frame = tokio::select! {
            result = read_frame(&mut stream) => result,
            () = tokio::time::sleep(STOP_POLL_INTERVAL) => continue,
        };

        let frame = match frame {
            Ok(frame) => frame,
            Err(ceqp_proto::ProtocolError::UnsupportedVersion { request_id, .. }) => {
                send_framing_error(
                    &mut stream,
                    request_id,
                    code::BAD_VERSION,
                    "unsupported protocol version",
                )
                .await;
                break;
            },
            Err(ceqp_proto::ProtocolError::PayloadTooLarge { size, max, request_id }) => {
                send_framing_error(
                    &mut stream,
                    request_id,
                    code::PAYLOAD_TOO_LARGE,
                    &format!("payload of {size} bytes exceeds the {max}-byte limit"),
                )
                .await;
                break;
            },
            Err(err) => {
                tracing::debug!("session closing: {err}");
                break;
            },
        };

        let request_id = frame.header.request_id;
        let response = respond(
            target,
            test_env.load(Ordering::SeqCst),
            cross_bitness_available.load(Ordering::SeqCst),
            &frame,
        );

        let out_frame = match response {
            Ok((frame_type, payload)) => Frame::new(frame_type, request_id, payload),
            Err(err) => {
                tracing::warn!("request {request_id} failed: {err}");
                Frame::new(Opcode::ErrorResp.to_u8(), request_id, err.encode())
            },
        };

        if let Err(err) = write_frame(&mut stream, &out_frame).await {
            tracing::debug!("session closing, write failed: {err}");
            break;
        }
    }
}

fn respond<T>(
    target: &T,
    test_env: bool,
    cross_bitness_available: bool,
    frame: &Frame,
) -> Result<(u8, Vec<u8>), DispatchError>
where
    T: TargetProcess + HostModules,
{
    let opcode =
        Opcode::from_u8(frame.header.frame_type).ok_or_else(|| dispatch::unknown_opcode(frame.header.frame_type))?;
    let request = crate::request::decode(opcode, &frame.payload)?;
    let modules = target.modules();
    let ok = dispatch::dispatch(target, &modules, request, test_env, cross_bitness_available)?;
    Ok((ok.frame_type, ok.payload))
}

async fn send_framing_error(
    stream: &mut tokio::net::TcpStream,
    request_id: u32,
    code: u32,
    message: &str,
) {
    let err = DispatchError::new(code, message);
    let frame = Frame::new(Opcode::ErrorResp.to_u8(), request_id, err.encode());
    if let Err(write_err) = write_frame(stream, &frame).await {
        tracing::debug!("failed to send framing error response: {write_err}");
    }
}
