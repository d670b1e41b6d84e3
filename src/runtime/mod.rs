//! # SOME/IP Runtime Module
//!
//! Wires the stack to its transports for one configured node.
//!
//! ## Key Types
//!
//! - [`SomeIpRuntime`] - owns the tx pool, local services, diagnostics and SD state
//! - [`dispatcher::dispatch`] - header classification of inbound messages
//! - [`process::process_unicast`] - rx path from datagram to response
//!
//! ## Lifecycle
//!
//! 1. Load configuration: `SomeIpRuntime::load("config.json", "my_instance")`
//! 2. Register services: `runtime.offer_service("alias", methods)`
//! 3. Start runtime: `runtime.run()`
//! 4. Stop gracefully: `runtime.stop()`
//!
//! Every table sits behind its own mutex. Locks are always taken in the order
//! offers, services, sd, pool, diagnostics.

pub mod config;
pub mod dispatcher;
pub mod process;

use crate::codec::SessionHandling;
use crate::diagnostics::{DiagnosticSink, ErrorKind, ErrorReport, ErrorReportBuffer};
use crate::message::TxPool;
use crate::sd::{DiscoveryError, RemoteService, ServiceDiscovery, ServiceOffer};
use crate::service::{LocalServiceRegistry, MethodHandler, RegistryError};
use crate::transport::{SomeIpTransport, UdpTransport};
use config::{InstanceConfig, SystemConfig};
use log::{debug, error, info, warn};
use process::{RxContext, process_unicast};
use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),
    #[error("instance '{0}' not found in config")]
    UnknownInstance(String),
    #[error("service '{0}' not found in config")]
    UnknownService(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("service discovery is disabled")]
    SdDisabled,
    #[error("runtime state poisoned by a panicking thread")]
    Poisoned,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RuntimeError> {
    mutex.lock().map_err(|_| RuntimeError::Poisoned)
}

const RX_BUFFER_SIZE: usize = 1500;

pub struct SomeIpRuntime {
    config: InstanceConfig,
    transport: Box<dyn SomeIpTransport>,
    offers: Mutex<Vec<(String, ServiceOffer)>>,
    services: Mutex<LocalServiceRegistry>,
    sd: Option<Mutex<ServiceDiscovery>>,
    pool: Mutex<TxPool>,
    diagnostics: Mutex<ErrorReportBuffer>,
    running: AtomicBool,
}

impl SomeIpRuntime {
    /// Reads `config_path` and binds the sockets of `instance_name`.
    pub fn load(config_path: impl AsRef<Path>, instance_name: &str) -> Result<Arc<Self>, RuntimeError> {
        let system = SystemConfig::load(config_path)?;
        let config = system.instance(instance_name)?.clone();
        info!(target: "someip::runtime", "initializing '{}' on {}", instance_name, config.ip);
        Ok(Arc::new(Self::bind(config)?))
    }

    /// Binds a non-blocking unicast socket on `ip:unicast_port` and, if SD is enabled, the SD
    /// multicast socket.
    pub fn bind(config: InstanceConfig) -> Result<Self, RuntimeError> {
        let transport = UdpTransport::new(SocketAddrV4::new(config.ip, config.stack.unicast_port))?;
        transport.set_nonblocking(true)?;

        let sd_transport: Option<Box<dyn SomeIpTransport>> = if config.sd.enabled {
            let port = if config.sd.port == 0 { crate::sd::SD_DEFAULT_PORT } else { config.sd.port };
            let sd = UdpTransport::new_multicast(config.sd.multicast_ip, config.ip, port)?;
            sd.set_nonblocking(true)?;
            Some(Box::new(sd))
        } else {
            None
        };

        Self::new(config, Box::new(transport), sd_transport)
    }

    /// Builds the runtime on caller-supplied transports.
    pub fn new(
        config: InstanceConfig,
        transport: Box<dyn SomeIpTransport>,
        sd_transport: Option<Box<dyn SomeIpTransport>>,
    ) -> Result<Self, RuntimeError> {
        let mut diagnostics = ErrorReportBuffer::default();
        let sd = match sd_transport {
            Some(sd_transport) if config.sd.enabled => Some(Mutex::new(ServiceDiscovery::new(
                sd_transport,
                config.ip,
                &config.sd,
                &mut diagnostics,
            )?)),
            _ => None,
        };

        Ok(SomeIpRuntime {
            transport,
            offers: Mutex::new(Vec::new()),
            services: Mutex::new(LocalServiceRegistry::new(
                config.stack.max_services,
                config.stack.max_methods,
            )),
            sd,
            pool: Mutex::new(TxPool::new(config.stack.tx_pool_size, config.stack.tx_block_size)),
            diagnostics: Mutex::new(diagnostics),
            running: AtomicBool::new(true),
            config,
        })
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    fn handling(&self) -> SessionHandling {
        self.config.stack.session_handling.into()
    }

    fn sd(&self) -> Result<MutexGuard<'_, ServiceDiscovery>, RuntimeError> {
        lock(self.sd.as_ref().ok_or(RuntimeError::SdDisabled)?)
    }

    /// Registers the configured service `alias` with its method handlers and announces it.
    pub fn offer_service(
        &self,
        alias: &str,
        methods: Vec<(u16, Arc<dyn MethodHandler>)>,
    ) -> Result<ServiceOffer, RuntimeError> {
        let service = self
            .config
            .providing
            .get(alias)
            .ok_or_else(|| RuntimeError::UnknownService(alias.to_string()))?;
        let port = service.port.unwrap_or(self.config.stack.unicast_port);
        let offer = ServiceOffer {
            service_id: service.service_id,
            instance_id: service.instance_id,
            major_version: service.major_version,
            minor_version: service.minor_version,
            endpoint: SocketAddrV4::new(self.config.ip, port),
        };

        let mut offers = lock(&self.offers)?;
        {
            let mut services = lock(&self.services)?;
            services.add_service(offer.service_id, offer.instance_id, service.interface_version, port)?;
            for (method_id, handler) in methods {
                if let Err(e) = services.add_method(offer.service_id, method_id, handler) {
                    services.remove_service(offer.service_id, offer.instance_id, service.interface_version)?;
                    return Err(e.into());
                }
            }
        }
        offers.push((alias.to_string(), offer));
        info!(target: "someip::runtime", "offering '{}' (0x{:04x}) on {}", alias, offer.service_id, offer.endpoint);

        if self.sd.is_some() {
            let mut sd = self.sd()?;
            let destination = sd.multicast_destination();
            let mut pool = lock(&self.pool)?;
            let mut diag = lock(&self.diagnostics)?;
            sd.send_offer(&mut pool, &offer, destination, &mut *diag)?;
        }
        Ok(offer)
    }

    /// Withdraws `alias` locally and announces a StopOffer.
    pub fn stop_offer_service(&self, alias: &str) -> Result<(), RuntimeError> {
        let mut offers = lock(&self.offers)?;
        let index = offers
            .iter()
            .position(|(name, _)| name == alias)
            .ok_or_else(|| RuntimeError::UnknownService(alias.to_string()))?;
        let (_, offer) = offers.remove(index);

        let interface_version = self
            .config
            .providing
            .get(alias)
            .map_or(1, |s| s.interface_version);
        lock(&self.services)?.remove_service(offer.service_id, offer.instance_id, interface_version)?;

        if self.sd.is_some() {
            let mut sd = self.sd()?;
            let destination = sd.multicast_destination();
            let mut pool = lock(&self.pool)?;
            let mut diag = lock(&self.diagnostics)?;
            sd.send_stop_offer(&mut pool, &offer, destination, &mut *diag)?;
        }
        Ok(())
    }

    /// Multicasts a Find for the given service.
    pub fn find_service(&self, service_id: u16, instance_id: u16, major_version: u8) -> Result<(), RuntimeError> {
        let mut sd = self.sd()?;
        let destination = sd.multicast_destination();
        let mut pool = lock(&self.pool)?;
        let mut diag = lock(&self.diagnostics)?;
        sd.send_find(&mut pool, service_id, instance_id, major_version, destination, &mut *diag)?;
        Ok(())
    }

    pub fn lookup_remote(&self, service_id: u16, instance_id: u16, major_version: u8) -> Option<RemoteService> {
        self.sd()
            .ok()
            .and_then(|sd| sd.lookup(service_id, instance_id, major_version).copied())
    }

    pub fn diagnostics(&self) -> Vec<ErrorReport> {
        lock(&self.diagnostics)
            .map(|diag| diag.reports().to_vec())
            .unwrap_or_default()
    }

    /// Handles every datagram queued on both sockets and returns how many were processed.
    pub fn poll(&self) -> Result<usize, RuntimeError> {
        let mut buf = [0u8; RX_BUFFER_SIZE];
        let mut processed = 0;

        loop {
            match self.transport.receive(&mut buf) {
                Ok((len, source)) => {
                    self.handle_unicast(&buf[..len], source)?;
                    processed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    self.report_rx_error(&e)?;
                    break;
                }
            }
        }

        if self.sd.is_none() {
            return Ok(processed);
        }
        loop {
            let received = self.sd()?.transport().receive(&mut buf);
            match received {
                Ok((len, source)) => {
                    self.handle_sd(&buf[..len], source)?;
                    processed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    self.report_rx_error(&e)?;
                    break;
                }
            }
        }
        Ok(processed)
    }

    fn report_rx_error(&self, e: &io::Error) -> Result<(), RuntimeError> {
        error!(target: "someip::rx", "receive failed: {}", e);
        lock(&self.diagnostics)?.report(ErrorKind::UdpRxError, [0; 6]);
        Ok(())
    }

    fn handle_unicast(&self, data: &[u8], source: SocketAddr) -> Result<(), RuntimeError> {
        let services = lock(&self.services)?;
        let mut pool = lock(&self.pool)?;
        let mut diag = lock(&self.diagnostics)?;
        let mut ctx = RxContext {
            registry: &services,
            pool: &mut pool,
            transport: self.transport.as_ref(),
            diag: &mut *diag,
            handling: self.handling(),
        };

        match process_unicast(&mut ctx, data, source) {
            Ok(outcome) => debug!(target: "someip::rx", "{} -> {:?}", source, outcome.return_code),
            Err(e) => warn!(target: "someip::rx", "datagram from {} not served: {}", source, e),
        }
        Ok(())
    }

    fn handle_sd(&self, data: &[u8], source: SocketAddr) -> Result<(), RuntimeError> {
        let offers = lock(&self.offers)?;
        let mut sd = self.sd()?;
        let mut pool = lock(&self.pool)?;
        let mut diag = lock(&self.diagnostics)?;

        let finds = match sd.process_multicast(data, source, &mut *diag) {
            Ok(finds) => finds,
            Err(e) => {
                debug!(target: "someip::sd", "sd datagram from {} ignored: {}", source, e);
                return Ok(());
            }
        };

        let SocketAddr::V4(peer) = source else {
            return Ok(());
        };
        if finds > 0 {
            let answered = sd.answer_finds(&mut pool, offers.iter().map(|(_, offer)| offer), peer, &mut *diag);
            debug!(target: "someip::sd", "{} find entries from {}, {} offers sent", finds, peer, answered);
        }
        Ok(())
    }

    /// Ages the remote service cache and re-announces every local offer.
    pub fn tick(&self, elapsed: u32) -> Result<(), RuntimeError> {
        if self.sd.is_none() {
            return Ok(());
        }
        let offers = lock(&self.offers)?;
        let mut sd = self.sd()?;
        sd.tick(elapsed);

        let destination = sd.multicast_destination();
        let mut pool = lock(&self.pool)?;
        let mut diag = lock(&self.diagnostics)?;
        for (alias, offer) in offers.iter() {
            if let Err(e) = sd.send_offer(&mut pool, offer, destination, &mut *diag) {
                warn!(target: "someip::sd", "cyclic offer of '{}' failed: {}", alias, e);
            }
        }
        Ok(())
    }

    /// Polls both sockets until [`stop`](Self::stop), ticking SD once per configured interval.
    pub fn run(&self) -> Result<(), RuntimeError> {
        info!(target: "someip::runtime", "event loop started");
        let interval = Duration::from_millis(self.config.sd.tick_interval_ms.max(1));
        let mut last_tick = Instant::now();
        let mut carry = Duration::ZERO;

        while self.running.load(Ordering::Relaxed) {
            if self.poll()? == 0 {
                thread::sleep(Duration::from_millis(1));
            }

            let now = Instant::now();
            if now.duration_since(last_tick) >= interval {
                carry += now.duration_since(last_tick);
                last_tick = now;
                let seconds = carry.as_secs();
                carry -= Duration::from_secs(seconds);
                self.tick(u32::try_from(seconds).unwrap_or(u32::MAX))?;
            }
        }
        info!(target: "someip::runtime", "event loop stopped");
        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}
