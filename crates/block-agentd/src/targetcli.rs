//! Local iSCSI target configuration, shelling out to `targetcli`
//! exactly as `block_create_1_svc`/`block_delete_1_svc` do in the
//! original implementation.

use block_common::iqn_for;
use block_common::Gbid;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;

const GLFS_BACKSTORE_PATH: &str = "/backstores/user:glfs";
const ATTRIBUTES: &str = "generate_node_acls=1 demo_mode_write_protect=0";
/// Matches the original's `fread(reply->out, 1, 4096, fp)` capture cap.
const MAX_CAPTURE_BYTES: usize = 4096;

/// One exec result: the combined, truncated output and the shell's exit
/// status. A negative `exit` indicates the shell itself never ran.
pub struct ExecResult {
    pub out: String,
    pub exit: i32,
}

/// Serializes every `targetcli` invocation on this node behind one mutex;
/// the underlying configuration store is not safe for concurrent writers.
pub struct TargetCli {
    path: String,
    hostname: String,
    lock: Arc<Mutex<()>>,
}

impl TargetCli {
    pub fn new(path: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            hostname: hostname.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Builds and runs the six-step create sequence: globals, backstore,
    /// IQN, LUN, portal, TPG attributes, save.
    pub async fn create_target(
        &self,
        block_name: &str,
        gbid: &Gbid,
        volume: &str,
        volfileserver: &str,
        size: u64,
    ) -> ExecResult {
        let iqn_path = format!("/iscsi/{}", iqn_for(gbid));
        let cmd = format!(
            "{tc} set global auto_add_default_portal=false && \
             {tc} {glfs} create {block_name} {size} {volume}@{volfileserver}/block-store/{gbid} {gbid} && \
             {tc} /iscsi create {iqn} && \
             {tc} {iqn_path}/tpg1/luns create {glfs}/{block_name} && \
             {tc} {iqn_path}/tpg1/portals create {hostname} && \
             {tc} {iqn_path}/tpg1 set attribute {attrs} && \
             {tc} / saveconfig",
            tc = self.path,
            glfs = GLFS_BACKSTORE_PATH,
            block_name = block_name,
            size = size,
            volume = volume,
            volfileserver = volfileserver,
            gbid = gbid,
            iqn = iqn_for(gbid),
            iqn_path = iqn_path,
            hostname = self.hostname,
            attrs = ATTRIBUTES,
        );

        self.run(&cmd).await
    }

    /// The reverse sequence: delete IQN, delete backstore, save. Idempotent:
    /// if a resource is already gone the shell call may exit non-zero and
    /// that status is surfaced faithfully, never self-repaired.
    pub async fn delete_target(&self, block_name: &str, gbid: &Gbid) -> ExecResult {
        let cmd = format!(
            "{tc} {glfs} delete {block_name} && \
             {tc} /iscsi delete {iqn} && \
             {tc} / saveconfig",
            tc = self.path,
            glfs = GLFS_BACKSTORE_PATH,
            block_name = block_name,
            iqn = iqn_for(gbid),
        );

        self.run(&cmd).await
    }

    async fn run(&self, cmd: &str) -> ExecResult {
        let _guard = self.lock.lock().await;
        tracing::debug!(cmd, "executing targetcli sequence");

        let output = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::null())
            .output()
            .await;

        match output {
            Ok(output) => {
                let mut combined = output.stdout;
                combined.extend_from_slice(&output.stderr);
                combined.truncate(MAX_CAPTURE_BYTES);
                ExecResult {
                    out: String::from_utf8_lossy(&combined).into_owned(),
                    exit: output.status.code().unwrap_or(-1),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, cmd, "failed to spawn targetcli shell");
                ExecResult {
                    out: e.to_string(),
                    exit: -1,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_delete_sequences_shell_out_and_capture_output() {
        // Substitute `/bin/echo` style behavior by pointing targetcli_path
        // at a shell built-in that always succeeds, verifying the command
        // construction and exit handling without a real iSCSI stack.
        let tc = TargetCli::new("true", "agent0.example.com");
        let gbid = Gbid::new();

        let create = tc
            .create_target("b1", &gbid, "vol0", "server0", 1024)
            .await;
        assert_eq!(create.exit, 0);

        let delete = tc.delete_target("b1", &gbid).await;
        assert_eq!(delete.exit, 0);
    }

    #[tokio::test]
    async fn nonzero_exit_is_surfaced_faithfully() {
        let tc = TargetCli::new("false", "agent0.example.com");
        let gbid = Gbid::new();

        let create = tc
            .create_target("b1", &gbid, "vol0", "server0", 1024)
            .await;
        assert_ne!(create.exit, 0);
    }
}
