//! The template dispatch loop: a single worker thread owning the listen
//! socket, every client session and the template cache.

use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use binary_sv2::{from_bytes, to_bytes, Encodable};
use bitcoin::{BlockHash, Weight};
use codec_sv2::{NoiseEncoder, Responder, State, Sv2Frame};
use common_messages_sv2::{
    Protocol, SetupConnection, SetupConnectionError, SetupConnectionSuccess,
};
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Registry, Token};
use noise_sv2::RESPONDER_EXPECTED_HANDSHAKE_MESSAGE_SIZE;
use slab::Slab;
use template_distribution_sv2::{
    CoinbaseOutputDataSize, NewTemplate, RequestTransactionData, RequestTransactionDataError,
    RequestTransactionDataSuccess, SetNewPrevHash, SubmitSolution,
};
use tracing::{debug, error, info, trace, warn};

use crate::client::Sv2Client;
use crate::config::{Keystore, Sv2TemplateProviderConfig};
use crate::error::Sv2ClientError;
use crate::interfaces::{
    BlockAssembler, BlockAssemblerOptions, BlockTemplate, ChainstateManager, Mempool, TipWatcher,
    DEFAULT_BLOCK_MIN_TX_FEE_RATE, MAX_BLOCK_WEIGHT,
};
use crate::template;

const LISTENER: Token = Token(usize::MAX);

/// Bounded wait on the tip-change condition variable per iteration.
const TIP_WAIT: Duration = Duration::from_millis(50);
/// Socket poll timeout per iteration.
const POLL_TIMEOUT: Duration = Duration::from_millis(50);
/// Sleep between iterations while the node is in IBD.
const IBD_SLEEP: Duration = Duration::from_millis(100);
/// Per-sweep receive buffer.
const RECV_BUFFER_SIZE: usize = 0x10000;

// Rebuild timer with the first trigger firing immediately.
struct Timer {
    interval: Duration,
    last_triggered: Option<Instant>,
}

impl Timer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_triggered: None,
        }
    }

    fn trigger(&mut self) -> bool {
        match self.last_triggered {
            Some(last) if last.elapsed() < self.interval => false,
            _ => {
                self.last_triggered = Some(Instant::now());
                true
            }
        }
    }
}

/// State owned by the worker thread. Nothing here is touched off-thread;
/// the only cross-thread primitives are the interrupt flag, the tip
/// watcher and the mempool counter, all read-only from this side.
pub(crate) struct TemplateProviderThread {
    config: Sv2TemplateProviderConfig,
    keystore: Keystore,
    chainman: Arc<dyn ChainstateManager>,
    mempool: Arc<dyn Mempool>,
    block_assembler: Arc<dyn BlockAssembler>,
    tip_watcher: Arc<TipWatcher>,
    interrupt_flag: Arc<AtomicBool>,

    listener: Option<TcpListener>,
    clients: Slab<Sv2Client>,
    block_cache: HashMap<u64, BlockTemplate>,
    template_id: u64,
    best_prev_hash: Option<BlockHash>,
    template_last_update: u64,
}

impl TemplateProviderThread {
    pub(crate) fn new(
        config: Sv2TemplateProviderConfig,
        keystore: Keystore,
        chainman: Arc<dyn ChainstateManager>,
        mempool: Arc<dyn Mempool>,
        block_assembler: Arc<dyn BlockAssembler>,
        tip_watcher: Arc<TipWatcher>,
        interrupt_flag: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            keystore,
            chainman,
            mempool,
            block_assembler,
            tip_watcher,
            interrupt_flag,
            listener: None,
            clients: Slab::new(),
            block_cache: HashMap::new(),
            template_id: 0,
            best_prev_hash: None,
            template_last_update: 0,
        }
    }

    pub(crate) fn run(mut self) {
        let mut poll = match Poll::new() {
            Ok(poll) => poll,
            Err(e) => {
                error!("Failed to create socket poller: {}", e);
                return;
            }
        };
        let mut events = Events::with_capacity(128);
        let mut timer = Timer::new(Duration::from_secs(self.config.interval));

        while !self.interrupt_flag.load(Ordering::Relaxed) {
            if self.chainman.is_initial_block_download() {
                std::thread::sleep(IBD_SLEEP);
                continue;
            }

            // Once IBD has ended, create the listening socket for new Sv2
            // connections.
            if self.listener.is_none() {
                match self.bind_listen_port(poll.registry()) {
                    Ok(()) => info!("Template Provider listening on port: {}", self.config.port),
                    Err(e) => {
                        error!("thread shutting down due to bind failure: {}", e);
                        self.interrupt_flag.store(true, Ordering::Relaxed);
                        continue;
                    }
                }
            }

            self.disconnect_flagged(poll.registry());

            let best_block_changed = match self.tip_watcher.wait_timeout(TIP_WAIT) {
                Some(tip) if self.best_prev_hash != Some(tip) => {
                    self.best_prev_hash = Some(tip);
                    true
                }
                _ => false,
            };

            let mempool_last_update = self.mempool.transactions_updated();
            let mut should_make_template = false;

            if best_block_changed {
                // All outstanding work is invalid under the new tip; the
                // whole cache is swapped for an empty one.
                self.block_cache = HashMap::new();
                for (_, client) in self.clients.iter_mut() {
                    client.latest_submitted_template_fees = 0;
                }
                should_make_template = true;
                self.template_last_update = mempool_last_update;
            } else if timer.trigger() && mempool_last_update > self.template_last_update {
                should_make_template = true;
            }

            if should_make_template {
                // Newly connected clients get their first work from the
                // CoinbaseOutputDataSize handler instead.
                let keys: Vec<usize> = self
                    .clients
                    .iter()
                    .filter(|(_, client)| {
                        client.coinbase_output_data_size_recv && !client.disconnect_flag
                    })
                    .map(|(key, _)| key)
                    .collect();
                for key in keys {
                    if let Err(e) = self.send_work(key, best_block_changed) {
                        error!("Failed to send work: {}", e);
                        self.clients[key].disconnect_flag = true;
                    }
                }
            }

            if let Err(e) = poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                if e.kind() == ErrorKind::Interrupted {
                    continue;
                }
                error!("Socket poll failed: {}", e);
                self.interrupt_flag.store(true, Ordering::Relaxed);
                continue;
            }

            let mut accept_ready = false;
            let mut readable = Vec::new();
            for event in events.iter() {
                match event.token() {
                    LISTENER => accept_ready = true,
                    Token(key) => {
                        if event.is_error() {
                            if let Some(client) = self.clients.get_mut(key) {
                                client.disconnect_flag = true;
                            }
                        } else if event.is_readable() || event.is_read_closed() {
                            readable.push(key);
                        }
                    }
                }
            }

            if accept_ready {
                self.accept_new_clients(poll.registry());
            }
            for key in readable {
                self.process_client_io(key);
            }
        }

        info!("Template Provider thread exiting");
    }

    fn bind_listen_port(&mut self, registry: &Registry) -> std::io::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let mut listener = TcpListener::bind(addr)?;
        registry.register(&mut listener, LISTENER, Interest::READABLE)?;
        self.listener = Some(listener);
        Ok(())
    }

    // Remove clients that are flagged for disconnection.
    fn disconnect_flagged(&mut self, registry: &Registry) {
        let flagged: Vec<usize> = self
            .clients
            .iter()
            .filter(|(_, client)| client.disconnect_flag)
            .map(|(key, _)| key)
            .collect();
        for key in flagged {
            let mut client = self.clients.remove(key);
            if let Err(e) = registry.deregister(&mut client.sock) {
                trace!("Failed to deregister client socket: {}", e);
            }
            debug!("Disconnected Sv2 client {}", client.addr);
        }
    }

    fn accept_new_clients(&mut self, registry: &Registry) {
        loop {
            let accepted = match &self.listener {
                Some(listener) => listener.accept(),
                None => return,
            };
            match accepted {
                Ok((sock, addr)) => {
                    let responder = Responder::new(
                        self.keystore.authority_key(),
                        self.keystore.static_key(),
                        self.config.cert_validity_sec,
                    );
                    let entry = self.clients.vacant_entry();
                    let key = entry.key();
                    let client = entry.insert(Sv2Client::new(sock, addr, responder));
                    if let Err(e) =
                        registry.register(&mut client.sock, Token(key), Interest::READABLE)
                    {
                        error!("Failed to register client socket: {}", e);
                        client.disconnect_flag = true;
                    }
                    debug!("New Sv2 client {}", addr);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("Failed to accept Sv2 connection: {}", e);
                    break;
                }
            }
        }
    }

    fn process_client_io(&mut self, key: usize) {
        let mut received = Vec::new();
        {
            let client = match self.clients.get_mut(key) {
                Some(client) => client,
                None => return,
            };
            let mut buf = [0u8; RECV_BUFFER_SIZE];
            loop {
                match client.sock.read(&mut buf) {
                    Ok(0) => {
                        client.disconnect_flag = true;
                        break;
                    }
                    Ok(n) => {
                        trace!("Num bytes received: {}", n);
                        received.extend_from_slice(&buf[..n]);
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        debug!("Recv error from {}: {}", client.addr, e);
                        client.disconnect_flag = true;
                        break;
                    }
                }
            }
        }

        if received.is_empty() {
            return;
        }
        // All failures on the decrypt/dispatch path are caught here and end
        // the session.
        if let Err(e) = self.process_received_bytes(key, &received) {
            error!("Received error when processing client message: {}", e);
            if let Some(client) = self.clients.get_mut(key) {
                client.disconnect_flag = true;
            }
        }
    }

    fn process_received_bytes(&mut self, key: usize, bytes: &[u8]) -> Result<(), Sv2ClientError> {
        if self.clients[key].state.is_in_transport_mode() {
            self.process_transport_bytes(key, bytes)
        } else {
            self.process_maybe_handshake(key, bytes)
        }
    }

    fn process_maybe_handshake(&mut self, key: usize, bytes: &[u8]) -> Result<(), Sv2ClientError> {
        let reply = {
            let client = &mut self.clients[key];
            client.handshake_buf.extend_from_slice(bytes);
            if client.handshake_buf.len() < RESPONDER_EXPECTED_HANDSHAKE_MESSAGE_SIZE {
                return Ok(());
            }
            let mut msg_e = [0u8; RESPONDER_EXPECTED_HANDSHAKE_MESSAGE_SIZE];
            msg_e.copy_from_slice(&client.handshake_buf[..RESPONDER_EXPECTED_HANDSHAKE_MESSAGE_SIZE]);
            client
                .handshake_buf
                .drain(..RESPONDER_EXPECTED_HANDSHAKE_MESSAGE_SIZE);
            let (reply, transport) = client.state.step_1(msg_e)?;
            client.state = transport;
            reply
        };

        debug!("Send noise handshake reply: ES");
        Self::send_buf(&mut self.clients[key].sock, &reply)?;

        // Bytes pipelined behind message E already belong to the transport.
        let leftover: Vec<u8> = self.clients[key].handshake_buf.drain(..).collect();
        if leftover.is_empty() {
            Ok(())
        } else {
            self.process_transport_bytes(key, &leftover)
        }
    }

    fn process_transport_bytes(&mut self, key: usize, bytes: &[u8]) -> Result<(), Sv2ClientError> {
        let frames = {
            let client = &mut self.clients[key];
            let codec = match &mut client.state {
                State::Transport(codec) => codec,
                _ => return Err(Sv2ClientError::ProtocolViolation("transport before handshake")),
            };
            client.decoder.feed(bytes);
            let mut frames = Vec::new();
            while let Some(frame) = client.decoder.next_frame(codec)? {
                frames.push(frame);
            }
            frames
        };

        for frame in frames {
            self.process_sv2_message(key, frame)?;
        }
        Ok(())
    }

    fn process_sv2_message(&mut self, key: usize, frame: Sv2Frame) -> Result<(), Sv2ClientError> {
        match frame.header.msg_type() {
            SetupConnection::MESSAGE_TYPE => self.handle_setup_connection(key, &frame.payload),
            CoinbaseOutputDataSize::MESSAGE_TYPE => {
                self.handle_coinbase_output_data_size(key, &frame.payload)
            }
            RequestTransactionData::MESSAGE_TYPE => {
                self.handle_request_transaction_data(key, &frame.payload)
            }
            SubmitSolution::MESSAGE_TYPE => self.handle_submit_solution(key, &frame.payload),
            msg_type => {
                warn!("Received unknown message type 0x{:02x}", msg_type);
                Err(Sv2ClientError::ProtocolViolation("unexpected message type"))
            }
        }
    }

    fn handle_setup_connection(&mut self, key: usize, payload: &[u8]) -> Result<(), Sv2ClientError> {
        debug!("Received 0x00 SetupConnection");

        if self.clients[key].setup_connection_confirmed {
            error!("Client connection has already been confirmed");
            return Ok(());
        }

        let setup_conn: SetupConnection = from_bytes(payload)
            .map_err(|_| Sv2ClientError::ProtocolViolation("invalid SetupConnection message"))?;

        // Disconnect a client that connects on the wrong subprotocol.
        if setup_conn.protocol != Protocol::TemplateDistributionProtocol as u8 {
            let setup_conn_err = SetupConnectionError {
                flags: setup_conn.flags,
                error_code: SetupConnectionError::UNSUPPORTED_PROTOCOL
                    .try_into()
                    .expect("error code is a valid Str0255"),
            };
            debug!("Send 0x02 SetupConnection.Error");
            Self::encrypt_and_send_message(
                &mut self.clients[key],
                SetupConnectionError::MESSAGE_TYPE,
                &setup_conn_err,
            )?;
            return Err(Sv2ClientError::PolicyReject(
                SetupConnectionError::UNSUPPORTED_PROTOCOL,
            ));
        }

        // Disconnect a client that is not running a compatible protocol
        // version.
        if self.config.protocol_version < setup_conn.min_version
            || self.config.protocol_version > setup_conn.max_version
        {
            let setup_conn_err = SetupConnectionError {
                flags: setup_conn.flags,
                error_code: SetupConnectionError::PROTOCOL_VERSION_MISMATCH
                    .try_into()
                    .expect("error code is a valid Str0255"),
            };
            debug!("Send 0x02 SetupConnection.Error");
            Self::encrypt_and_send_message(
                &mut self.clients[key],
                SetupConnectionError::MESSAGE_TYPE,
                &setup_conn_err,
            )?;
            error!(
                "Received a connection with incompatible protocol versions: min_version: {}, max_version: {}",
                setup_conn.min_version, setup_conn.max_version
            );
            return Err(Sv2ClientError::PolicyReject(
                SetupConnectionError::PROTOCOL_VERSION_MISMATCH,
            ));
        }

        debug!("Send 0x01 SetupConnection.Success");
        let setup_success = SetupConnectionSuccess {
            used_version: self.config.protocol_version,
            flags: self.config.optional_features,
        };
        Self::encrypt_and_send_message(
            &mut self.clients[key],
            SetupConnectionSuccess::MESSAGE_TYPE,
            &setup_success,
        )?;
        self.clients[key].setup_connection_confirmed = true;
        Ok(())
    }

    fn handle_coinbase_output_data_size(
        &mut self,
        key: usize,
        payload: &[u8],
    ) -> Result<(), Sv2ClientError> {
        debug!("Received 0x70 CoinbaseOutputDataSize");

        if !self.clients[key].setup_connection_confirmed {
            return Err(Sv2ClientError::ProtocolViolation(
                "CoinbaseOutputDataSize before connection setup",
            ));
        }

        let msg: CoinbaseOutputDataSize = from_bytes(payload).map_err(|_| {
            Sv2ClientError::ProtocolViolation("invalid CoinbaseOutputDataSize message")
        })?;

        let max_additional_size = msg.coinbase_output_max_additional_size;
        debug!("coinbase_output_max_additional_size={} bytes", max_additional_size);

        if u64::from(max_additional_size) > MAX_BLOCK_WEIGHT.to_wu() {
            error!("Received impossible CoinbaseOutputDataSize: {}", max_additional_size);
            return Err(Sv2ClientError::ProtocolViolation(
                "coinbase reserve above maximum block weight",
            ));
        }

        {
            let client = &mut self.clients[key];
            client.coinbase_output_data_size_recv = true;
            client.coinbase_tx_outputs_size = max_additional_size;
        }

        // Immediately drive one template + prev-hash cycle.
        self.send_work(key, /* send_new_prevhash */ true)
    }

    fn handle_request_transaction_data(
        &mut self,
        key: usize,
        payload: &[u8],
    ) -> Result<(), Sv2ClientError> {
        debug!("Received 0x73 RequestTransactionData");

        let request: RequestTransactionData = match from_bytes(payload) {
            Ok(request) => request,
            Err(e) => {
                error!("Received invalid RequestTransactionData message: {:?}", e);
                return Ok(());
            }
        };

        match self.block_cache.get(&request.template_id) {
            Some(cached) => {
                let success = template::transaction_data_success(&cached.block, request.template_id)?;
                debug!("Send 0x74 RequestTransactionData.Success");
                Self::encrypt_and_send_message(
                    &mut self.clients[key],
                    RequestTransactionDataSuccess::MESSAGE_TYPE,
                    &success,
                )
            }
            None => {
                let request_tx_data_error = RequestTransactionDataError {
                    template_id: request.template_id,
                    error_code: RequestTransactionDataError::TEMPLATE_ID_NOT_FOUND
                        .try_into()
                        .expect("error code is a valid Str0255"),
                };
                debug!("Send 0x75 RequestTransactionData.Error");
                Self::encrypt_and_send_message(
                    &mut self.clients[key],
                    RequestTransactionDataError::MESSAGE_TYPE,
                    &request_tx_data_error,
                )
            }
        }
    }

    fn handle_submit_solution(&mut self, key: usize, payload: &[u8]) -> Result<(), Sv2ClientError> {
        debug!("Received 0x76 SubmitSolution");

        {
            let client = &self.clients[key];
            if !client.setup_connection_confirmed && !client.coinbase_output_data_size_recv {
                return Err(Sv2ClientError::ProtocolViolation(
                    "SubmitSolution before connection setup",
                ));
            }
        }

        let solution: SubmitSolution = match from_bytes(payload) {
            Ok(solution) => solution,
            Err(e) => {
                error!("Received invalid SubmitSolution message: {:?}", e);
                return Ok(());
            }
        };

        // A solution for a template that was swapped out by a tip change is
        // silently dropped.
        if let Some(cached) = self.block_cache.get(&solution.template_id) {
            match template::solution_block(&cached.block, &solution) {
                Ok(block) => {
                    let hash = block.block_hash();
                    let accepted = self.chainman.process_new_block(block);
                    info!(
                        "Solution for template {} produced block {}: {}",
                        solution.template_id,
                        hash,
                        if accepted { "accepted" } else { "rejected" }
                    );
                }
                Err(e) => error!("Failed to reconstruct solution block: {}", e),
            }
        }

        Ok(())
    }

    // The two-message "future template then prev-hash" pattern lets ASICs
    // preload work and switch on the cheap SetNewPrevHash when a block is
    // found. Timer-driven updates carry the current prev hash implicitly
    // and are gated on the configured minimum fee improvement.
    fn send_work(&mut self, key: usize, send_new_prevhash: bool) -> Result<(), Sv2ClientError> {
        self.template_id += 1;
        let template_id = self.template_id;

        // Reducing the maximum weight by the client's coinbase reserve
        // leaves it room for its own outputs.
        let reserve = match self.clients[key].coinbase_tx_outputs_size {
            0 => self.config.default_coinbase_tx_additional_output_size,
            declared => declared,
        };
        let options = BlockAssemblerOptions {
            block_max_weight: Weight::from_wu(
                MAX_BLOCK_WEIGHT.to_wu().saturating_sub(u64::from(reserve)),
            ),
            block_min_fee_rate: DEFAULT_BLOCK_MIN_TX_FEE_RATE,
        };

        let time_start = Instant::now();
        let block_template = self
            .block_assembler
            .create_new_block(options)
            .map_err(Sv2ClientError::BlockAssembly)?;
        trace!(
            "Assemble template: {:.2}ms",
            time_start.elapsed().as_secs_f64() * 1000.0
        );

        let future_template = send_new_prevhash && self.config.default_future_templates;
        let new_template =
            template::new_template_message(&block_template.block, template_id, future_template)?;

        // Do not submit a new template if the fee increase is insufficient.
        let fees = block_template.total_fees();
        if !send_new_prevhash
            && self.clients[key].latest_submitted_template_fees + self.config.fee_delta > fees
        {
            return Ok(());
        }

        let set_new_prev_hash =
            template::set_new_prev_hash_message(&block_template.block, template_id);
        self.block_cache.insert(template_id, block_template);

        debug!("Send 0x71 NewTemplate");
        if let Err(e) = Self::encrypt_and_send_message(
            &mut self.clients[key],
            NewTemplate::MESSAGE_TYPE,
            &new_template,
        ) {
            error!("Error sending NewTemplate message");
            return Err(e);
        }

        if send_new_prevhash {
            debug!("Send 0x72 SetNewPrevHash");
            if let Err(e) = Self::encrypt_and_send_message(
                &mut self.clients[key],
                SetNewPrevHash::MESSAGE_TYPE,
                &set_new_prev_hash,
            ) {
                error!("Error sending SetNewPrevHash message");
                return Err(e);
            }
        }

        self.clients[key].latest_submitted_template_fees = fees;
        Ok(())
    }

    fn encrypt_and_send_message<T: Encodable>(
        client: &mut Sv2Client,
        msg_type: u8,
        msg: &T,
    ) -> Result<(), Sv2ClientError> {
        let frame = Sv2Frame::from_message(msg_type, to_bytes(msg))
            .map_err(|e| Sv2ClientError::TransportFatal(e.into()))?;
        let codec = match &mut client.state {
            State::Transport(codec) => codec,
            _ => {
                return Err(Sv2ClientError::ProtocolViolation(
                    "message send before handshake completion",
                ))
            }
        };
        let wire = NoiseEncoder::encode(&frame, codec)?;
        trace!("Send {} bytes", wire.len());
        Self::send_buf(&mut client.sock, &wire)
    }

    // Sends are non-blocking with bounded sleeps on back-pressure; a slow
    // client stalls the worker, an accepted limit at the expected fan-out
    // of a handful of pools.
    fn send_buf(sock: &mut TcpStream, buf: &[u8]) -> Result<(), Sv2ClientError> {
        let mut total_sent = 0;
        while total_sent < buf.len() {
            match sock.write(&buf[total_sent..]) {
                Ok(0) => std::thread::sleep(Duration::from_millis(10)),
                Ok(n) => {
                    total_sent += n;
                    trace!("Sent {} bytes", total_sent);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(100))
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(Sv2ClientError::Io(e)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn timer_first_trigger_is_immediate() {
        let mut timer = Timer::new(Duration::from_secs(3600));
        assert!(timer.trigger());
        assert!(!timer.trigger());
    }

    #[test]
    fn timer_refires_after_interval() {
        let mut timer = Timer::new(Duration::from_millis(10));
        assert!(timer.trigger());
        assert!(!timer.trigger());
        std::thread::sleep(Duration::from_millis(15));
        assert!(timer.trigger());
    }
}
