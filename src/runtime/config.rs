use super::RuntimeError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::net::Ipv4Addr;
use std::path::Path;

/// Limits of the request/response side of the stack.
#[derive(Debug, Deserialize, Clone)]
pub struct StackConfig {
    #[serde(default = "default_true")]
    pub session_handling: bool,
    #[serde(default = "default_max_services")]
    pub max_services: usize,
    /// Methods per service.
    #[serde(default = "default_max_methods")]
    pub max_methods: usize,
    #[serde(default = "default_tx_pool_size")]
    pub tx_pool_size: usize,
    /// Bytes per tx buffer, clamped to 16..=1400.
    #[serde(default = "default_tx_block_size")]
    pub tx_block_size: usize,
    #[serde(default = "default_unicast_port")]
    pub unicast_port: u16,
}

impl Default for StackConfig {
    fn default() -> Self {
        StackConfig {
            session_handling: default_true(),
            max_services: default_max_services(),
            max_methods: default_max_methods(),
            tx_pool_size: default_tx_pool_size(),
            tx_block_size: default_tx_block_size(),
            unicast_port: default_unicast_port(),
        }
    }
}

/// Service Discovery Configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SdConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_multicast_ip")]
    pub multicast_ip: Ipv4Addr,
    /// 0 falls back to 30490.
    #[serde(default = "default_sd_port")]
    pub port: u16,
    #[serde(default = "default_max_remote_services")]
    pub max_remote_services: usize,
    /// Entries/options decoded per SD message.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Seconds announced in our Offers.
    #[serde(default = "default_offer_ttl")]
    pub offer_ttl: u32,
}

impl Default for SdConfig {
    fn default() -> Self {
        SdConfig {
            enabled: default_true(),
            multicast_ip: default_multicast_ip(),
            port: default_sd_port(),
            max_remote_services: default_max_remote_services(),
            max_entries: default_max_entries(),
            tick_interval_ms: default_tick_interval(),
            offer_ttl: default_offer_ttl(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub service_id: u16,
    #[serde(default = "default_instance_id")]
    pub instance_id: u16,
    #[serde(default = "default_major_version")]
    pub major_version: u8,
    #[serde(default)]
    pub minor_version: u32,
    #[serde(default = "default_interface_version")]
    pub interface_version: u8,
    /// Falls back to `stack.unicast_port`.
    pub port: Option<u16>,
}

fn default_true() -> bool { true }
fn default_max_services() -> usize { 8 }
fn default_max_methods() -> usize { 8 }
fn default_tx_pool_size() -> usize { 8 }
fn default_tx_block_size() -> usize { 1400 }
fn default_unicast_port() -> u16 { 5005 }
fn default_multicast_ip() -> Ipv4Addr { Ipv4Addr::new(224, 224, 224, 245) }
fn default_sd_port() -> u16 { 30490 }
fn default_max_remote_services() -> usize { 8 }
fn default_max_entries() -> usize { 8 }
fn default_tick_interval() -> u64 { 1000 }
fn default_offer_ttl() -> u32 { 3 }
fn default_instance_id() -> u16 { 1 }
fn default_major_version() -> u8 { 1 }
fn default_interface_version() -> u8 { 1 }

#[derive(Debug, Deserialize, Clone)]
pub struct InstanceConfig {
    /// Local unicast address; also the interface the SD group is joined on.
    pub ip: Ipv4Addr,
    #[serde(default)]
    pub stack: StackConfig,
    #[serde(default)]
    pub sd: SdConfig,
    #[serde(default)]
    pub providing: HashMap<String, ServiceConfig>,
}

impl InstanceConfig {
    /// Instance on `ip` with default settings and nothing provided.
    pub fn new(ip: Ipv4Addr) -> Self {
        InstanceConfig {
            ip,
            stack: StackConfig::default(),
            sd: SdConfig::default(),
            providing: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SystemConfig {
    pub instances: HashMap<String, InstanceConfig>,
}

impl SystemConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let file = File::open(path)?;
        let config = serde_json::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, RuntimeError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn instance(&self, name: &str) -> Result<&InstanceConfig, RuntimeError> {
        self.instances
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownInstance(name.to_string()))
    }
}
