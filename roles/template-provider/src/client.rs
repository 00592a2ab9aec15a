//! Per-connection session state.

use std::net::SocketAddr;

use codec_sv2::{HandshakeRole, NoiseDecoder, Responder, State};
use mio::net::TcpStream;

/// One connected Sv2 client and everything the worker thread knows about
/// it. Sessions are created on accept, get their transport cipher when the
/// handshake completes, and are destroyed when `disconnect_flag` is
/// observed at the top of the loop.
pub(crate) struct Sv2Client {
    pub sock: TcpStream,
    pub addr: SocketAddr,
    /// Handshake material, then the transport codec.
    pub state: State,
    /// Buffers and splits encrypted transport frames.
    pub decoder: NoiseDecoder,
    /// Bytes received before the handshake completed.
    pub handshake_buf: Vec<u8>,
    /// Whether SetupConnection has been accepted.
    pub setup_connection_confirmed: bool,
    /// Whether CoinbaseOutputDataSize has been received. Templates are
    /// only streamed once it has.
    pub coinbase_output_data_size_recv: bool,
    /// The client's declared coinbase output reserve, in bytes. Zero means
    /// the configured default applies.
    pub coinbase_tx_outputs_size: u32,
    /// Total fees of the last template sent to this client. Reset on tip
    /// change.
    pub latest_submitted_template_fees: i64,
    /// Marks the session for eviction at the top of the next iteration.
    pub disconnect_flag: bool,
}

impl Sv2Client {
    pub fn new(sock: TcpStream, addr: SocketAddr, responder: Box<Responder>) -> Self {
        Self {
            sock,
            addr,
            state: State::initialized(HandshakeRole::Responder(responder)),
            decoder: NoiseDecoder::new(),
            handshake_buf: Vec::new(),
            setup_connection_confirmed: false,
            coinbase_output_data_size_recv: false,
            coinbase_tx_outputs_size: 0,
            latest_submitted_template_fees: 0,
            disconnect_flag: false,
        }
    }
}
