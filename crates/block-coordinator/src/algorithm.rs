use crate::fanout;
use crate::transport::{AgentTransport, RemoteOp};
use block_common::{BlockError, BlockName, BlockResult, Gbid, HostAddr, MetaStatus, StatusTags};
use block_meta::{BlockMetaStore, EntryCreateStatus, MetaInfo};
use std::sync::Arc;
use volume_fs::SharedVolume;

// block_common doesn't export the RPC Response type; reuse block-rpc's.
type Reply = block_rpc::Response;

pub struct CreateCliRequest {
    pub volume: String,
    pub volfileserver: String,
    pub block_hosts: Vec<HostAddr>,
    pub block_name: BlockName,
    pub size: u64,
    pub mpath: u32,
}

pub struct DeleteCliRequest {
    pub volume: String,
    pub block_name: BlockName,
}

pub struct InfoCliRequest {
    pub volume: String,
    pub block_name: BlockName,
}

/// Drives the per-block state machine against one volume. One
/// `Coordinator` fronts exactly one shared-volume mount, matching how a
/// `block-agentd` instance is configured with a single volume root.
pub struct Coordinator<V: SharedVolume + 'static> {
    meta: Arc<BlockMetaStore<V>>,
    transport: Arc<dyn AgentTransport>,
}

impl<V: SharedVolume + 'static> Coordinator<V> {
    pub fn new(meta: Arc<BlockMetaStore<V>>, transport: Arc<dyn AgentTransport>) -> Self {
        Self { meta, transport }
    }

    /// Creates a new multipath block: validates the request, writes the
    /// metadata header, materializes the backing file, then drives
    /// per-node configuration across the candidate hosts.
    pub async fn create_cli(&self, req: CreateCliRequest) -> Reply {
        match self.run_create(req).await {
            Ok(out) => Reply::ok(out),
            Err(e) => Reply::failed(e.to_string(), e.exit_code()),
        }
    }

    async fn run_create(&self, req: CreateCliRequest) -> BlockResult<String> {
        if req.mpath == 0 {
            return Err(BlockError::InvalidArgument(
                "multipath factor must be at least 1".into(),
            ));
        }
        if req.size == 0 {
            return Err(BlockError::InvalidArgument("size must be positive".into()));
        }
        if req.mpath as usize > req.block_hosts.len() {
            return Err(BlockError::MpathExceedsHosts {
                mpath: req.mpath,
                host_count: req.block_hosts.len(),
            });
        }

        let _lock = self.meta.lock_volume()?;

        if self.meta.block_exists(&req.block_name) {
            return Err(BlockError::AlreadyExists(req.block_name.to_string()));
        }

        let gbid = Gbid::new();
        self.meta
            .append_header(&req.block_name, &gbid, req.size, req.mpath)?;

        if let Err(e) = self.meta.create_backing_object(&gbid, req.size) {
            self.meta
                .append_entry_create(&req.block_name, EntryCreateStatus::Fail)?;
            return Err(e);
        }
        self.meta
            .append_entry_create(&req.block_name, EntryCreateStatus::Success)?;

        let primary: Vec<HostAddr> = req.block_hosts[..req.mpath as usize].to_vec();
        let primary_op = RemoteOp::Create {
            volume: req.volume.clone(),
            volfileserver: req.volfileserver.clone(),
            block_name: req.block_name.to_string(),
            gbid,
            size: req.size,
        };
        let mut outcome = fanout::run(
            self.meta.clone(),
            self.transport.clone(),
            req.block_name.clone(),
            primary,
            primary_op,
            StatusTags::CONFIG,
        )
        .await?;

        match self
            .audit_and_rewind(
                &req.block_name,
                &req.volume,
                &req.volfileserver,
                &gbid,
                req.size,
                &req.block_hosts,
                req.mpath,
            )
            .await
        {
            Ok(audit_out) => {
                outcome.out.push_str(&audit_out);
                Ok(outcome.out)
            }
            Err(e) => {
                let cleanup_out = self.cleanup(&req.block_name, &gbid, false).await?;
                outcome.out.push_str(&cleanup_out);
                Err(BlockError::Internal(format!("{e}: {}", outcome.out)))
            }
        }
    }

    /// Counts the latest status per address, and if the success count
    /// still falls short of the multipath factor, dispatches creation to
    /// fresh spare hosts and recurses. Bounded at `hosts.len()` rounds as
    /// a backstop against a misbehaving fan-out that fails to consume a
    /// spare, not a substitute for the real termination condition
    /// (`spent` strictly increasing).
    async fn audit_and_rewind(
        &self,
        block_name: &BlockName,
        volume: &str,
        volfileserver: &str,
        gbid: &Gbid,
        size: u64,
        hosts: &[HostAddr],
        mpath: u32,
    ) -> BlockResult<String> {
        let mut composite = String::new();
        let max_rounds = hosts.len().max(1);

        for _round in 0..max_rounds {
            let info = self.meta.open_read(block_name)?;
            let success = info.addrs_with_status(MetaStatus::ConfigSuccess).len();
            let fail = info.addrs_with_status(MetaStatus::ConfigFail).len();
            let inprogress = info.addrs_with_status(MetaStatus::ConfigInProgress).len();
            let spent = success + fail + inprogress;
            let spare = hosts.len().saturating_sub(spent);
            let need = mpath as i64 - success as i64;

            tracing::info!(
                block_name = %block_name,
                success,
                fail,
                spare,
                need,
                "audit round"
            );

            if need <= 0 {
                return Ok(composite);
            }
            if spare == 0 {
                tracing::warn!(block_name = %block_name, "No Spare nodes to create");
                return Err(BlockError::AuditExhausted(block_name.to_string()));
            }
            if (spare as i64) < need {
                tracing::warn!(block_name = %block_name, "Not enough Spare nodes");
                return Err(BlockError::AuditExhausted(block_name.to_string()));
            }

            let need = need as usize;
            let spares: Vec<HostAddr> = hosts[spent..spent + need].to_vec();
            tracing::info!(
                block_name = %block_name,
                hosts = ?spares,
                "Trying to serve request for block from spare machines"
            );

            let op = RemoteOp::Create {
                volume: volume.to_string(),
                volfileserver: volfileserver.to_string(),
                block_name: block_name.to_string(),
                gbid: *gbid,
                size,
            };
            let outcome = fanout::run(
                self.meta.clone(),
                self.transport.clone(),
                block_name.clone(),
                spares,
                op,
                StatusTags::CONFIG,
            )
            .await?;
            composite.push_str(&outcome.out);
        }

        Err(BlockError::AuditExhausted(block_name.to_string()))
    }

    /// Best-effort cleanup of partial creation or an explicit delete.
    /// `deleteall` selects whether addresses whose latest status is
    /// `CONFIGSUCCESS` are also torn down.
    async fn cleanup(
        &self,
        block_name: &BlockName,
        gbid: &Gbid,
        deleteall: bool,
    ) -> BlockResult<String> {
        let info = self.meta.open_read(block_name)?;
        let targets: Vec<HostAddr> = info
            .hosts
            .iter()
            .filter(|h| {
                matches!(
                    h.status,
                    MetaStatus::ConfigInProgress | MetaStatus::ConfigFail
                ) || matches!(
                    h.status,
                    MetaStatus::CleanupInProgress | MetaStatus::CleanupFail
                ) || (deleteall && h.status == MetaStatus::ConfigSuccess)
            })
            .map(|h| h.addr.clone())
            .collect();

        let out = if targets.is_empty() {
            String::new()
        } else {
            let op = RemoteOp::Delete {
                block_name: block_name.to_string(),
                gbid: *gbid,
            };
            let outcome = fanout::run(
                self.meta.clone(),
                self.transport.clone(),
                block_name.clone(),
                targets,
                op,
                StatusTags::CLEANUP,
            )
            .await?;
            outcome.out
        };

        self.maybe_finalize_removal(block_name, gbid)?;
        Ok(out)
    }

    fn maybe_finalize_removal(&self, block_name: &BlockName, gbid: &Gbid) -> BlockResult<()> {
        let info = self.meta.open_read(block_name)?;
        let all_clean = !info.hosts.is_empty()
            && info
                .hosts
                .iter()
                .all(|h| h.status == MetaStatus::CleanupSuccess);

        if all_clean {
            self.meta.unlink_backing_object(gbid)?;
            self.meta.unlink_meta(block_name)?;
        }
        Ok(())
    }

    /// Tears down every non-terminal host entry for a block, then removes
    /// the backing file and log once every host reads `CLEANUPSUCCESS`.
    pub async fn delete_cli(&self, req: DeleteCliRequest) -> Reply {
        match self.run_delete(req).await {
            Ok(out) => Reply::ok(out),
            Err(e) => Reply::failed(e.to_string(), e.exit_code()),
        }
    }

    async fn run_delete(&self, req: DeleteCliRequest) -> BlockResult<String> {
        let _lock = self.meta.lock_volume()?;

        if !self.meta.block_exists(&req.block_name) {
            return Err(BlockError::NotFound);
        }

        let info = self.meta.open_read(&req.block_name)?;
        let gbid = info
            .gbid
            .ok_or_else(|| BlockError::Internal("metadata log missing GBID".into()))?;

        self.cleanup(&req.block_name, &gbid, true).await
    }

    /// Enumerates every block name on the volume.
    pub async fn list_cli(&self) -> Reply {
        match self.run_list() {
            Ok(out) => Reply::ok(out),
            Err(e) => Reply::failed(e.to_string(), e.exit_code()),
        }
    }

    fn run_list(&self) -> BlockResult<String> {
        let _lock = self.meta.lock_volume()?;
        let names = self.meta.list()?;
        Ok(names.join("\n"))
    }

    /// Formats a single block's current status for the operator.
    pub async fn info_cli(&self, req: InfoCliRequest) -> Reply {
        match self.run_info(req) {
            Ok(out) => Reply::ok(out),
            Err(e) => Reply::failed(e.to_string(), e.exit_code()),
        }
    }

    fn run_info(&self, req: InfoCliRequest) -> BlockResult<String> {
        let _lock = self.meta.lock_volume()?;
        let info = self.meta.open_read(&req.block_name)?;
        Ok(format_info(&req.block_name, &info))
    }
}

fn format_info(block_name: &BlockName, info: &MetaInfo) -> String {
    let nodes: Vec<&str> = info
        .addrs_with_status(MetaStatus::ConfigSuccess)
        .iter()
        .map(|h| h.addr.as_str())
        .collect();

    format!(
        "NAME: {name}\nVOLUME: {volume}\nGBID: {gbid}\nSIZE: {size}\nMULTIPATH: {mpath}\nBLOCK CONFIG NODE(S): {nodes}",
        name = block_name,
        volume = info.volume,
        gbid = info
            .gbid
            .map(|g| g.to_string())
            .unwrap_or_else(|| "-".to_string()),
        size = info.size.unwrap_or(0),
        mpath = info.mpath.unwrap_or(0),
        nodes = nodes.join(" "),
    )
}
