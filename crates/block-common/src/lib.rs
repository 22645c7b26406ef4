use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod error;

pub use error::{BlockError, BlockResult};

/// A server identifier as supplied on the `block_hosts` list: a hostname or
/// IP literal, never resolved or validated by this crate (name resolution
/// is an external collaborator per the system boundary).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostAddr(pub String);

impl HostAddr {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HostAddr {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for HostAddr {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated block name: unique per volume, safe to use as a filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockName(String);

impl BlockName {
    pub fn parse(name: &str) -> BlockResult<Self> {
        if name.is_empty() {
            return Err(BlockError::InvalidArgument(
                "block name cannot be empty".into(),
            ));
        }
        if name == "." || name == ".." || name == "meta.lock" {
            return Err(BlockError::InvalidArgument(format!(
                "block name '{}' is reserved",
                name
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(BlockError::InvalidArgument(
                "block name must be alphanumeric with '-', '_' or '.'".into(),
            ));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The 128-bit UUID that names a block's backing file and is embedded in
/// its IQN. Distinct from the block's human-readable name so that renaming
/// a block (not currently exposed) would be a metadata-only operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gbid(pub Uuid);

impl Gbid {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> BlockResult<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| BlockError::InvalidArgument(format!("invalid gbid '{}': {}", s, e)))
    }
}

impl Default for Gbid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Gbid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The IQN prefix every gluster-block-compatible target is registered under.
pub const IQN_PREFIX: &str = "iqn.2016-12.org.gluster-block:";

pub fn iqn_for(gbid: &Gbid) -> String {
    format!("{}{}", IQN_PREFIX, gbid)
}

/// Per-host transition state for a block, as recorded in the metadata log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaStatus {
    ConfigInProgress,
    ConfigSuccess,
    ConfigFail,
    CleanupInProgress,
    CleanupSuccess,
    CleanupFail,
}

impl MetaStatus {
    /// Parses a status token exactly as it appears in the log grammar.
    /// Unknown tokens are not an error here: callers are expected to warn
    /// and drop the entry.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "CONFIGINPROGRESS" => Some(Self::ConfigInProgress),
            "CONFIGSUCCESS" => Some(Self::ConfigSuccess),
            "CONFIGFAIL" => Some(Self::ConfigFail),
            "CLEANUPINPROGRESS" => Some(Self::CleanupInProgress),
            "CLEANUPSUCCESS" => Some(Self::CleanupSuccess),
            "CLEANUPFAIL" => Some(Self::CleanupFail),
            _ => None,
        }
    }

    pub fn as_token(&self) -> &'static str {
        match self {
            Self::ConfigInProgress => "CONFIGINPROGRESS",
            Self::ConfigSuccess => "CONFIGSUCCESS",
            Self::ConfigFail => "CONFIGFAIL",
            Self::CleanupInProgress => "CLEANUPINPROGRESS",
            Self::CleanupSuccess => "CLEANUPSUCCESS",
            Self::CleanupFail => "CLEANUPFAIL",
        }
    }
}

impl fmt::Display for MetaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_token())
    }
}

/// The pair of status tags a fan-out round uses for its in-progress/success/
/// fail log entries: `{CONFIG*}` for creation, `{CLEANUP*}` for deletion.
#[derive(Debug, Clone, Copy)]
pub struct StatusTags {
    pub in_progress: MetaStatus,
    pub success: MetaStatus,
    pub fail: MetaStatus,
}

impl StatusTags {
    pub const CONFIG: Self = Self {
        in_progress: MetaStatus::ConfigInProgress,
        success: MetaStatus::ConfigSuccess,
        fail: MetaStatus::ConfigFail,
    };

    pub const CLEANUP: Self = Self {
        in_progress: MetaStatus::CleanupInProgress,
        success: MetaStatus::CleanupSuccess,
        fail: MetaStatus::CleanupFail,
    };
}

/// One row of a block's metadata log, with duplicate addresses already
/// collapsed to the latest status by the time this is handed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEntry {
    pub addr: HostAddr,
    pub status: MetaStatus,
}

/// Structured events a running daemon emits alongside its `tracing` spans,
/// useful for postmortem correlation across a fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    BlockCreateStarted {
        block_name: String,
        volume: String,
        mpath: u32,
        hosts: usize,
    },
    BlockCreateFinished {
        block_name: String,
        exit: i32,
    },
    BlockDeleteStarted {
        block_name: String,
        volume: String,
    },
    BlockDeleteFinished {
        block_name: String,
        exit: i32,
    },
    AuditRound {
        block_name: String,
        success: usize,
        fail: usize,
        spare: usize,
        need: usize,
    },
}
