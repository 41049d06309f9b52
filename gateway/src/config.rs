//! Gateway configuration
//!
//! Layered: built-in defaults, then an optional `config/gateway.toml`,
//! then `PAYGRID_*` environment overrides (e.g. `PAYGRID_LISTEN_ADDR`).

use serde::Deserialize;

/// Core adapter transport selection
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterTransport {
    /// In-process core (demos, tests)
    Internal,
    /// JSON over HTTP
    Rest,
    /// gRPC
    Grpc,
}

/// Adapter section
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    /// Transport flavor
    pub transport: AdapterTransport,

    /// Bank code fronted by the adapter
    pub bank_code: String,

    /// Base URL for REST/GRPC transports
    pub base_url: Option<String>,

    /// Per-call timeout (milliseconds)
    pub timeout_ms: u64,
}

/// Top-level gateway configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address, e.g. `0.0.0.0:8080`
    pub listen_addr: String,

    /// UETR system identifier (4 chars)
    pub system_id: String,

    /// Core banking adapter
    pub adapter: AdapterConfig,

    /// Seed demo tenant, accounts, clearing systems, and routing rules
    pub seed_demo: bool,

    /// Self-healing monitor tick (seconds)
    pub monitor_interval_secs: u64,

    /// Batch dispatch cadence (seconds)
    pub batch_cadence_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            system_id: uetr::UetrGenerator::DEFAULT_SYSTEM_ID.to_string(),
            adapter: AdapterConfig {
                transport: AdapterTransport::Internal,
                bank_code: "BANK001".to_string(),
                base_url: None,
                timeout_ms: 30_000,
            },
            seed_demo: true,
            monitor_interval_secs: 30,
            batch_cadence_secs: 60,
        }
    }
}

impl GatewayConfig {
    /// Load the layered configuration
    pub fn load() -> anyhow::Result<Self> {
        let defaults = GatewayConfig::default();

        let settings = config::Config::builder()
            .set_default("listen_addr", defaults.listen_addr.clone())?
            .set_default("system_id", defaults.system_id.clone())?
            .set_default("adapter.transport", "internal")?
            .set_default("adapter.bank_code", defaults.adapter.bank_code.clone())?
            .set_default("adapter.timeout_ms", defaults.adapter.timeout_ms as i64)?
            .set_default("seed_demo", defaults.seed_demo)?
            .set_default("monitor_interval_secs", defaults.monitor_interval_secs as i64)?
            .set_default("batch_cadence_secs", defaults.batch_cadence_secs as i64)?
            .add_source(config::File::with_name("config/gateway").required(false))
            .add_source(config::Environment::with_prefix("PAYGRID").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
