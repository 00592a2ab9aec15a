//! # Sv2 Template Provider
//!
//! A Stratum V2 Template Provider: a long-running service embedded in a
//! Bitcoin full node that serves block templates to mining pools and
//! miners over the Template Distribution subprotocol, on a Noise-encrypted
//! TCP transport.
//!
//! The node passes its chainstate, mempool and block-assembly capabilities
//! into the constructor ([`interfaces`]), together with a [`TipWatcher`]
//! it signals on every chain tip change. [`Sv2TemplateProvider::start`]
//! probes the configured listen port and spawns the single worker thread
//! that owns all sockets, sessions and the template cache:
//!
//! - On tip change, the cache is swapped wholesale and every fully set-up
//!   session receives a future `NewTemplate` followed by `SetNewPrevHash`.
//! - On mempool improvement past the configured fee delta, sessions
//!   receive a fresh `NewTemplate` under the unchanged tip.
//! - `RequestTransactionData` and `SubmitSolution` are answered from the
//!   cache; solutions are reconstituted into full blocks and handed to
//!   block validation.
//!
//! Nothing is persisted; all state is in-memory and dies with the process.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use secp256k1::XOnlyPublicKey;
use tracing::error;

mod client;
pub mod config;
pub mod error;
pub mod interfaces;
mod provider;
mod template;

pub use config::{Keystore, Sv2TemplateProviderConfig};
pub use error::{Sv2ClientError, TpError};
pub use interfaces::{
    BlockAssembler, BlockAssemblerOptions, BlockAssemblyError, BlockTemplate, ChainstateManager,
    Mempool, TipWatcher,
};

use provider::TemplateProviderThread;

/// Handle to the Template Provider service.
///
/// Dropping the handle interrupts and joins the worker thread.
pub struct Sv2TemplateProvider {
    config: Sv2TemplateProviderConfig,
    keystore: Keystore,
    chainman: Arc<dyn ChainstateManager>,
    mempool: Arc<dyn Mempool>,
    block_assembler: Arc<dyn BlockAssembler>,
    tip_watcher: Arc<TipWatcher>,
    interrupt_flag: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Sv2TemplateProvider {
    pub fn new(
        config: Sv2TemplateProviderConfig,
        chainman: Arc<dyn ChainstateManager>,
        mempool: Arc<dyn Mempool>,
        block_assembler: Arc<dyn BlockAssembler>,
        tip_watcher: Arc<TipWatcher>,
    ) -> Result<Self, TpError> {
        let keystore = Keystore::from_config(&config)?;
        Ok(Self {
            config,
            keystore,
            chainman,
            mempool,
            block_assembler,
            tip_watcher,
            interrupt_flag: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        })
    }

    /// The x-only authority public key clients must pin to validate the
    /// certificate presented during the handshake. Advertised out of band.
    pub fn authority_public_key(&self) -> XOnlyPublicKey {
        self.keystore.authority_public_key()
    }

    /// Checks the listen port and spawns the worker thread.
    ///
    /// The probe socket is dropped immediately and the port re-opened by
    /// the worker once IBD has ended; a port that cannot be bound surfaces
    /// here so the node can refuse to start with the current
    /// configuration.
    pub fn start(&mut self) -> Result<(), TpError> {
        if self.thread_handle.is_some() {
            return Err(TpError::AlreadyStarted);
        }

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        drop(std::net::TcpListener::bind(addr).map_err(TpError::Bind)?);

        let thread = TemplateProviderThread::new(
            self.config.clone(),
            self.keystore,
            Arc::clone(&self.chainman),
            Arc::clone(&self.mempool),
            Arc::clone(&self.block_assembler),
            Arc::clone(&self.tip_watcher),
            Arc::clone(&self.interrupt_flag),
        );
        let handle = std::thread::Builder::new()
            .name("sv2".to_string())
            .spawn(move || thread.run())
            .map_err(TpError::Io)?;
        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Asks the worker thread to stop at the top of its next iteration.
    pub fn interrupt(&self) {
        self.interrupt_flag.store(true, Ordering::Relaxed);
    }

    /// Interrupts and joins the worker thread. Sessions are torn down when
    /// their sockets drop with the thread state.
    pub fn stop(&mut self) {
        self.interrupt();
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                error!("Sv2 handler thread panicked");
            }
        }
    }
}

impl Drop for Sv2TemplateProvider {
    fn drop(&mut self) {
        self.stop();
    }
}
