use crate::transport::{AgentTransport, RemoteOp};
use block_common::{BlockName, BlockResult, HostAddr, MetaStatus, StatusTags};
use block_meta::BlockMetaStore;
use std::sync::Arc;
use volume_fs::SharedVolume;

/// The reply text and per-host disposition of one fan-out round.
#[derive(Debug, Default)]
pub struct FanOutOutcome {
    pub out: String,
    pub succeeded: Vec<HostAddr>,
    pub failed: Vec<HostAddr>,
}

struct HostResult {
    addr: HostAddr,
    status: MetaStatus,
    out: String,
}

/// Dispatches `op` to every host in `hosts` concurrently, one `tokio::spawn`
/// task per host, replacing the original's manual `pthread_create`/
/// `pthread_join` array and its `static` argument buffers, which carry no
/// semantics worth preserving. Each worker appends its in-progress status
/// before dispatch and its terminal status after; a slow or failing worker
/// never blocks a sibling.
pub async fn run<V: SharedVolume + 'static>(
    meta: Arc<BlockMetaStore<V>>,
    transport: Arc<dyn AgentTransport>,
    block_name: BlockName,
    hosts: Vec<HostAddr>,
    op: RemoteOp,
    tags: StatusTags,
) -> BlockResult<FanOutOutcome> {
    for addr in &hosts {
        meta.append_status(&block_name, addr.as_str(), tags.in_progress)?;
    }

    let mut handles = Vec::with_capacity(hosts.len());
    for addr in hosts.iter().cloned() {
        let meta = meta.clone();
        let transport = transport.clone();
        let block_name = block_name.clone();
        let op = op.clone();

        handles.push(tokio::spawn(async move {
            tracing::debug!(addr = %addr, "dispatching fan-out worker");
            let result = transport.dispatch(&addr, op).await;
            let (status, out) = match &result {
                Ok(resp) if resp.is_success() => (tags.success, resp.out.clone()),
                Ok(resp) => (tags.fail, resp.out.clone()),
                Err(e) => (tags.fail, e.to_string()),
            };

            if let Err(e) = meta.append_status(&block_name, addr.as_str(), status) {
                tracing::warn!(addr = %addr, error = %e, "failed to append fan-out status");
            }
            tracing::info!(addr = %addr, status = %status, "fan-out worker finished");

            HostResult { addr, status, out }
        }));
    }

    // `join_all` preserves the order of the handles it was given, so the
    // composite reply is concatenated in dispatch order even though the
    // workers themselves may finish in any order.
    let joined = futures::future::join_all(handles).await;

    let mut outcome = FanOutOutcome {
        out: String::new(),
        succeeded: Vec::new(),
        failed: Vec::new(),
    };
    for joined_result in joined {
        let host_result = joined_result.map_err(|e| {
            block_common::BlockError::Internal(format!("fan-out task panicked: {e}"))
        })?;
        outcome.out.push_str(&host_result.out);
        if host_result.status == tags.success {
            outcome.succeeded.push(host_result.addr);
        } else {
            outcome.failed.push(host_result.addr);
        }
    }

    Ok(outcome)
}
