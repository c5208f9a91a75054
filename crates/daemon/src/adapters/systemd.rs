// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host driver over systemd and coreutils.
//!
//! Everything the daemon doesn't own is mutated through spawned commands
//! with explicit argv (no shell interpretation anywhere).

use async_trait::async_trait;
use dbx_core::{DriverError, HostDriver, ProcStatus, PupId, CONTAINER_GID, CONTAINER_UID};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Where the container runtime keeps per-container state.
const CONTAINER_STATE_ROOT: &str = "/var/lib/nixos-containers";

pub struct SystemdDriver {
    container_state_root: PathBuf,
}

impl SystemdDriver {
    pub fn new() -> Self {
        Self { container_state_root: PathBuf::from(CONTAINER_STATE_ROOT) }
    }

    #[cfg(test)]
    pub fn with_container_state_root(root: PathBuf) -> Self {
        Self { container_state_root: root }
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<String, DriverError> {
        tracing::debug!(command = program, ?args, "driver exec");
        let output = Command::new(program).args(args).output().await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(DriverError::CommandFailed {
                command: format!("{program} {}", args.join(" ")),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }

    async fn chown_container_user(&self, path: &Path) -> Result<(), DriverError> {
        let owner = format!("{CONTAINER_UID}:{CONTAINER_GID}");
        let target = path.display().to_string();
        self.run("chown", &["-R", owner.as_str(), target.as_str()]).await?;
        Ok(())
    }
}

impl Default for SystemdDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostDriver for SystemdDriver {
    async fn start_service(&self, service: &str) -> Result<(), DriverError> {
        self.run("systemctl", &["start", service]).await?;
        Ok(())
    }

    async fn stop_service(&self, service: &str) -> Result<(), DriverError> {
        self.run("systemctl", &["stop", service]).await?;
        Ok(())
    }

    async fn service_status(&self, service: &str) -> Result<ProcStatus, DriverError> {
        // `show` exits zero for unknown units, reporting state "inactive".
        let out = self
            .run(
                "systemctl",
                &["show", service, "--property=ActiveState,SubState", "--value"],
            )
            .await?;
        let mut lines = out.lines();
        let active_state = lines.next().unwrap_or("inactive").trim().to_string();
        let sub_state = lines.next().unwrap_or("").trim().to_string();
        Ok(ProcStatus { running: sub_state == "running", active_state })
    }

    async fn service_status_text(&self, service: &str) -> Result<String, DriverError> {
        // `status` exits non-zero for stopped units; the text is still the
        // point here, so fall back to journal output alone.
        let status = match self.run("systemctl", &["status", "--no-pager", service]).await {
            Ok(out) => out,
            Err(DriverError::CommandFailed { stderr, .. }) => stderr,
            Err(e) => return Err(e),
        };
        let journal = self
            .run("journalctl", &["-u", service, "-n", "20", "--no-pager"])
            .await
            .unwrap_or_default();
        Ok(format!("{status}\n{journal}"))
    }

    async fn create_storage_dir(&self, path: &Path) -> Result<(), DriverError> {
        std::fs::create_dir_all(path)?;
        self.chown_container_user(path).await
    }

    async fn remove_tree(&self, path: &Path) -> Result<(), DriverError> {
        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        Ok(())
    }

    async fn write_key_file(&self, path: &Path, contents: &str) -> Result<(), DriverError> {
        write_private_file(path, contents)?;
        self.chown_container_user(path).await
    }

    async fn write_config_env(&self, path: &Path, contents: &str) -> Result<(), DriverError> {
        write_private_file(path, contents)?;
        self.chown_container_user(path).await
    }

    async fn remove_container_state(&self, pup_id: &PupId) -> Result<(), DriverError> {
        let dir = self.container_state_root.join(format!("pup-{pup_id}"));
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
            tracing::info!(pup = %pup_id, dir = %dir.display(), "removed container state");
        }
        Ok(())
    }

    async fn copy_tree(&self, src: &Path, dest: &Path) -> Result<(), DriverError> {
        std::fs::create_dir_all(dest)?;
        let src_contents = format!("{}/.", src.display());
        let dest_str = dest.display().to_string();
        self.run("cp", &["-a", src_contents.as_str(), dest_str.as_str()]).await?;
        self.chown_container_user(dest).await
    }
}

/// Write with mode 0600 via temp + rename.
fn write_private_file(path: &Path, contents: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let parent = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent)?;
    let tmp = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
    }
    std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "systemd_tests.rs"]
mod tests;
