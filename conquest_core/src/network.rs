//! Length-prefixed TCP framing: `u32` little-endian length, then the payload.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use tracing::{error, info, warn};

use crate::transport::{Transport, TransportError};

pub const MAX_FRAME_LEN: usize = 1 << 20;
const ACCEPT_POLL: Duration = Duration::from_millis(50);

pub fn write_frame<W: Write + ?Sized>(writer: &mut W, frame: &[u8]) -> Result<(), TransportError> {
    if frame.len() > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge {
            len: frame.len(),
            max: MAX_FRAME_LEN,
        });
    }
    let len = frame.len() as u32;
    let mut buffer = Vec::with_capacity(4 + frame.len());
    buffer.extend_from_slice(&len.to_le_bytes());
    buffer.extend_from_slice(frame);
    writer.write_all(&buffer)?;
    Ok(())
}

/// Reads one frame; `None` when the peer closed the stream between frames.
pub fn read_frame<R: Read + ?Sized>(reader: &mut R) -> Result<Option<Vec<u8>>, TransportError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    let mut frame = vec![0u8; len];
    reader.read_exact(&mut frame)?;
    Ok(Some(frame))
}

type ClientList = Arc<Mutex<Vec<(SocketAddr, TcpStream)>>>;

/// Server side of the framed transport.
///
/// Frames from every client arrive on [`FrameServer::inbound`]; broadcasts are
/// queued and written to all connected clients by the accept thread.
pub struct FrameServer {
    local_addr: SocketAddr,
    outbound: Sender<Vec<u8>>,
    loopback: Sender<Vec<u8>>,
    inbound: Receiver<Vec<u8>>,
    clients: ClientList,
}

impl FrameServer {
    pub fn start(bind_addr: SocketAddr) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(bind_addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let (outbound, outbound_rx) = unbounded::<Vec<u8>>();
        let (inbound_tx, inbound) = unbounded::<Vec<u8>>();
        let clients: ClientList = Arc::new(Mutex::new(Vec::new()));
        let accept_clients = Arc::clone(&clients);
        let loopback = inbound_tx.clone();

        thread::Builder::new()
            .name("frame-accept".to_string())
            .spawn(move || loop {
                match listener.accept() {
                    Ok((stream, addr)) => {
                        register_client(stream, addr, &accept_clients, &inbound_tx);
                    }
                    Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                        thread::sleep(ACCEPT_POLL);
                    }
                    Err(err) => {
                        error!(target: "conquest::network", error = %err, "client.accept_failed");
                        thread::sleep(Duration::from_millis(200));
                    }
                }

                loop {
                    match outbound_rx.try_recv() {
                        Ok(frame) => broadcast_frame(&accept_clients, &frame),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            info!(target: "conquest::network", "frame_server.stopped");
                            return;
                        }
                    }
                }
            })?;

        info!(target: "conquest::network", %local_addr, "frame_server.listening");
        Ok(Self {
            local_addr,
            outbound,
            loopback,
            inbound,
            clients,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn inbound(&self) -> &Receiver<Vec<u8>> {
        &self.inbound
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().expect("clients mutex poisoned").len()
    }
}

impl Transport for FrameServer {
    /// Loops back into the inbound queue, for a player hosted in the server process.
    fn send_to_server(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.loopback
            .send(bytes.to_vec())
            .map_err(|_| TransportError::Closed)
    }

    fn broadcast(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if bytes.len() > MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLarge {
                len: bytes.len(),
                max: MAX_FRAME_LEN,
            });
        }
        self.outbound
            .send(bytes.to_vec())
            .map_err(|_| TransportError::Closed)
    }
}

fn register_client(
    stream: TcpStream,
    addr: SocketAddr,
    clients: &ClientList,
    inbound: &Sender<Vec<u8>>,
) {
    if let Err(err) = stream.set_nodelay(true) {
        warn!(target: "conquest::network", %addr, error = %err, "client.nodelay_failed");
    }
    if let Err(err) = stream.set_nonblocking(false) {
        warn!(target: "conquest::network", %addr, error = %err, "client.blocking_failed");
    }
    let reader = match stream.try_clone() {
        Ok(reader) => reader,
        Err(err) => {
            warn!(target: "conquest::network", %addr, error = %err, "client.rejected");
            return;
        }
    };

    let inbound = inbound.clone();
    let spawned = thread::Builder::new()
        .name(format!("frame-reader-{}", addr))
        .spawn(move || read_loop(reader, addr, inbound));
    if let Err(err) = spawned {
        warn!(target: "conquest::network", %addr, error = %err, "client.rejected");
        return;
    }

    info!(target: "conquest::network", %addr, "client.connected");
    clients
        .lock()
        .expect("clients mutex poisoned")
        .push((addr, stream));
}

fn read_loop(mut stream: TcpStream, addr: SocketAddr, inbound: Sender<Vec<u8>>) {
    loop {
        match read_frame(&mut stream) {
            Ok(Some(frame)) => {
                if inbound.send(frame).is_err() {
                    break;
                }
            }
            Ok(None) => {
                info!(target: "conquest::network", %addr, "client.disconnected");
                break;
            }
            Err(err) => {
                warn!(target: "conquest::network", %addr, error = %err, "client.read_failed");
                break;
            }
        }
    }
}

fn broadcast_frame(clients: &ClientList, frame: &[u8]) {
    let mut guard = clients.lock().expect("clients mutex poisoned");
    guard.retain_mut(|(addr, stream)| match write_frame(stream, frame) {
        Ok(()) => true,
        Err(err) => {
            warn!(target: "conquest::network", %addr, error = %err, "client.dropped");
            let _ = stream.shutdown(Shutdown::Both);
            false
        }
    });
}

/// Client side of the framed transport.
pub struct FrameClient {
    stream: TcpStream,
    inbound: Receiver<Vec<u8>>,
    reader: Option<thread::JoinHandle<()>>,
}

impl FrameClient {
    pub fn connect(addr: SocketAddr) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let reader_stream = stream.try_clone()?;
        let (inbound_tx, inbound) = unbounded();
        let reader = thread::Builder::new()
            .name("frame-client-reader".to_string())
            .spawn(move || read_loop(reader_stream, addr, inbound_tx))?;
        Ok(Self {
            stream,
            inbound,
            reader: Some(reader),
        })
    }

    pub fn inbound(&self) -> &Receiver<Vec<u8>> {
        &self.inbound
    }
}

impl Transport for FrameClient {
    fn send_to_server(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        write_frame(&mut self.stream, bytes)
    }

    fn broadcast(&mut self, _bytes: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::Unsupported("broadcast from a client"))
    }
}

impl Drop for FrameClient {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}
