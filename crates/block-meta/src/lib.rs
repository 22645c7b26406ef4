//! Metadata log (C2).
//!
//! One append-only text file per block under `<volume>/block-meta/<block_name>`,
//! plus a sibling `meta.lock` lock target. Each line is either a `KEY: VALUE`
//! header field or an `<addr>: <STATUS>` host transition. Reading a log
//! collapses duplicate addresses to their latest status while preserving
//! first-seen order.

use block_common::{BlockError, BlockName, BlockResult, Gbid, HostEntry, MetaStatus};
use std::sync::Arc;
use volume_fs::SharedVolume;

const META_DIR: &str = "block-meta";
const STORE_DIR: &str = "block-store";
const LOCK_FILE: &str = "meta.lock";

/// `ENTRYCREATE` tracks whether the backing file has been materialized;
/// the backing object exists iff this is `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryCreateStatus {
    InProgress,
    Success,
    Fail,
}

impl EntryCreateStatus {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "INPROGRESS" => Some(Self::InProgress),
            "SUCCESS" => Some(Self::Success),
            "FAIL" => Some(Self::Fail),
            _ => None,
        }
    }

    fn as_token(&self) -> &'static str {
        match self {
            Self::InProgress => "INPROGRESS",
            Self::Success => "SUCCESS",
            Self::Fail => "FAIL",
        }
    }
}

/// In-memory projection of a block's metadata log.
#[derive(Debug, Clone, Default)]
pub struct MetaInfo {
    pub volume: String,
    pub gbid: Option<Gbid>,
    pub size: Option<u64>,
    pub mpath: Option<u32>,
    pub entry_create: Option<EntryCreateStatus>,
    pub hosts: Vec<HostEntry>,
}

impl MetaInfo {
    /// Parses a log file's full text. Unknown status tokens are dropped
    /// with a warning, never treated as a parse error.
    pub fn parse(volume: &str, text: &str) -> Self {
        let mut info = MetaInfo {
            volume: volume.to_string(),
            ..Default::default()
        };

        for line in text.lines() {
            let Some((key, value)) = line.split_once(": ") else {
                continue;
            };

            match key {
                "VOLUME" => info.volume = value.to_string(),
                "GBID" => info.gbid = Gbid::parse(value).ok(),
                "SIZE" => info.size = value.parse().ok(),
                "HA" => info.mpath = value.parse().ok(),
                "ENTRYCREATE" => info.entry_create = EntryCreateStatus::parse(value),
                addr => {
                    let Some(status) = MetaStatus::parse(value) else {
                        tracing::warn!(addr, status = value, "dropping unknown status token");
                        continue;
                    };
                    if let Some(existing) =
                        info.hosts.iter_mut().find(|h| h.addr.as_str() == addr)
                    {
                        existing.status = status;
                    } else {
                        info.hosts.push(HostEntry {
                            addr: addr.into(),
                            status,
                        });
                    }
                }
            }
        }

        info
    }

    /// Latest-status count of addresses in `CONFIGSUCCESS`.
    pub fn success_count(&self) -> usize {
        self.hosts
            .iter()
            .filter(|h| h.status == MetaStatus::ConfigSuccess)
            .count()
    }

    pub fn addrs_with_status(&self, status: MetaStatus) -> Vec<&HostEntry> {
        self.hosts.iter().filter(|h| h.status == status).collect()
    }
}

/// Relative paths within a volume's directory tree.
pub fn meta_path(block_name: &BlockName) -> String {
    format!("{}/{}", META_DIR, block_name.as_str())
}

pub fn lock_path() -> String {
    format!("{}/{}", META_DIR, LOCK_FILE)
}

pub fn store_path(gbid: &Gbid) -> String {
    format!("{}/{}", STORE_DIR, gbid)
}

/// Reads, writes, and enumerates a volume's metadata logs through a
/// [`SharedVolume`] handle.
pub struct BlockMetaStore<V: SharedVolume> {
    volume: Arc<V>,
    volume_name: String,
}

impl<V: SharedVolume> BlockMetaStore<V> {
    pub fn new(volume: Arc<V>, volume_name: impl Into<String>) -> Self {
        Self {
            volume,
            volume_name: volume_name.into(),
        }
    }

    pub fn volume_name(&self) -> &str {
        &self.volume_name
    }

    pub fn block_exists(&self, block_name: &BlockName) -> bool {
        self.volume.exists(&meta_path(block_name))
    }

    /// Reads and parses a block's log. Returns `Err(NotFound)` if absent.
    pub fn open_read(&self, block_name: &BlockName) -> BlockResult<MetaInfo> {
        if !self.block_exists(block_name) {
            return Err(BlockError::NotFound);
        }
        let text = self.volume.read_to_string(&meta_path(block_name))?;
        Ok(MetaInfo::parse(&self.volume_name, &text))
    }

    /// Appends the block's header in one atomic write, matching the
    /// original implementation's single write of the whole header record.
    pub fn append_header(
        &self,
        block_name: &BlockName,
        gbid: &Gbid,
        size: u64,
        mpath: u32,
    ) -> BlockResult<()> {
        let lines = vec![
            format!("VOLUME: {}", self.volume_name),
            format!("GBID: {}", gbid),
            format!("SIZE: {}", size),
            format!("HA: {}", mpath),
            "ENTRYCREATE: INPROGRESS".to_string(),
        ];
        self.volume.append_lines(&meta_path(block_name), &lines)
    }

    pub fn append_entry_create(
        &self,
        block_name: &BlockName,
        status: EntryCreateStatus,
    ) -> BlockResult<()> {
        self.volume.append_line(
            &meta_path(block_name),
            &format!("ENTRYCREATE: {}", status.as_token()),
        )
    }

    pub fn append_status(
        &self,
        block_name: &BlockName,
        addr: &str,
        status: MetaStatus,
    ) -> BlockResult<()> {
        self.volume
            .append_line(&meta_path(block_name), &format!("{}: {}", addr, status))
    }

    /// Lists block names under this volume's metadata directory, skipping
    /// `meta.lock`.
    pub fn list(&self) -> BlockResult<Vec<String>> {
        let mut names = self.volume.read_dir_names(META_DIR)?;
        names.retain(|n| n != LOCK_FILE);
        names.sort();
        Ok(names)
    }

    pub fn create_backing_object(&self, gbid: &Gbid, size: u64) -> BlockResult<()> {
        self.volume.create_exact(&store_path(gbid), size)
    }

    pub fn unlink_backing_object(&self, gbid: &Gbid) -> BlockResult<()> {
        self.volume.unlink(&store_path(gbid))
    }

    pub fn unlink_meta(&self, block_name: &BlockName) -> BlockResult<()> {
        self.volume.unlink(&meta_path(block_name))
    }

    /// Acquires the volume-wide advisory lock used to serialize every
    /// mutating and consistency-sensitive CLI request.
    pub fn lock_volume(&self) -> BlockResult<volume_fs::VolumeLock> {
        self.volume.lock_file(&lock_path())
    }
}
