use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Static configuration for one `block-agentd` instance: which volume
/// mount it fronts and where its node-facing RPC listener binds. CLI
/// flags (see `main.rs`) override any field also settable here.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Mount root of the shared volume this daemon fronts.
    pub volume_root: PathBuf,
    /// Name recorded in metadata log headers.
    pub volume_name: String,
    /// Address the RPC listener binds to.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Path to the `targetcli` binary; overridable for test doubles.
    #[serde(default = "default_targetcli_path")]
    pub targetcli_path: String,
}

fn default_listen() -> SocketAddr {
    "0.0.0.0:24007".parse().unwrap()
}

fn default_targetcli_path() -> String {
    "targetcli".to_string()
}

impl AgentConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).map_err(Into::into)
    }
}
