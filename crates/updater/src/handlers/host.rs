// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-level actions: SSH, binary caches, Tailscale, network uplink, and
//! the full system update. Thin pass-throughs that persist the flag in the
//! state store and re-render the affected declarative files.

use crate::error::UpdaterError;
use crate::joblog::JobLogger;
use crate::updater::SystemUpdater;
use dbx_core::store::BinaryCache;
use dbx_core::{Clock, DogeboxConfig};
use dbx_patch::{NetworkConfig, SystemContainerConfig, SystemSettings};

impl<C: Clock + 'static> SystemUpdater<C> {
    fn system_settings(config: &DogeboxConfig) -> SystemSettings {
        SystemSettings {
            hostname: config.hostname.clone(),
            ssh_enabled: config.ssh_enabled,
            ssh_keys: config.ssh_keys.clone(),
            binary_caches: config.binary_caches.clone(),
            tailscale_auth: config.tailscale_auth.clone(),
        }
    }

    /// Re-render system settings and apply.
    async fn apply_system_settings(
        &self,
        config: &DogeboxConfig,
        log: &JobLogger,
    ) -> Result<(), UpdaterError> {
        let mut patch = self.manager().new_patch();
        patch.update_system(&Self::system_settings(config))?;
        log.cmd("nix rebuild (system)");
        patch.apply(self.deps.rebuild.as_ref()).await?;
        Ok(())
    }

    /// Rebuild the host against its current declarative configuration,
    /// including the storage overlay when a storage device is configured.
    pub(crate) async fn handle_system_update(&self, log: &JobLogger) -> Result<(), UpdaterError> {
        let config = self.deps.store.get()?;
        let mut patch = self.manager().new_patch();
        patch.update_system(&Self::system_settings(&config))?;
        if !config.storage_device.is_empty() {
            patch.update_storage_overlay(&config.storage_device)?;
        }
        patch.update_includes_file(&self.include_ids(None, None))?;
        log.cmd("nix rebuild (system)");
        patch.apply(self.deps.rebuild.as_ref()).await?;
        log.log("system update complete");
        Ok(())
    }

    pub(crate) async fn handle_enable_ssh(
        &self,
        enabled: bool,
        log: &JobLogger,
    ) -> Result<(), UpdaterError> {
        let mut config = self.deps.store.get()?;
        config.ssh_enabled = enabled;
        self.deps.store.set_dogebox(&config)?;

        self.apply_system_settings(&config, log).await?;
        log.log(if enabled { "ssh enabled" } else { "ssh disabled" });
        Ok(())
    }

    pub(crate) async fn handle_add_binary_cache(
        &self,
        url: &str,
        key: &str,
        log: &JobLogger,
    ) -> Result<(), UpdaterError> {
        let mut config = self.deps.store.get()?;
        if !config.binary_caches.iter().any(|c| c.url == url) {
            config
                .binary_caches
                .push(BinaryCache { url: url.to_string(), key: key.to_string() });
            self.deps.store.set_dogebox(&config)?;
        }

        self.apply_system_settings(&config, log).await?;
        log.log(&format!("binary cache {url} added"));
        Ok(())
    }

    /// Store the Tailscale auth key and enable the service; an empty key
    /// disables it. The key is consumed by the host's tailscale setup, not
    /// written into the rendered configuration.
    pub(crate) async fn handle_enable_tailscale(
        &self,
        auth_key: &str,
        log: &JobLogger,
    ) -> Result<(), UpdaterError> {
        let mut config = self.deps.store.get()?;
        config.tailscale_auth = auth_key.to_string();
        self.deps.store.set_dogebox(&config)?;

        self.apply_system_settings(&config, log).await?;
        log.log(if auth_key.is_empty() { "tailscale disabled" } else { "tailscale enabled" });
        Ok(())
    }

    /// Reconfigure the uplink interface; the pup NAT egress follows it.
    pub(crate) async fn handle_update_network(
        &self,
        interface: &str,
        dhcp: bool,
        log: &JobLogger,
    ) -> Result<(), UpdaterError> {
        let mut patch = self.manager().new_patch();
        patch.update_network(&NetworkConfig { interface: interface.to_string(), dhcp })?;
        patch.update_system_container_config(&SystemContainerConfig {
            external_interface: interface.to_string(),
        })?;
        log.cmd("nix rebuild (network)");
        patch.apply(self.deps.rebuild.as_ref()).await?;
        log.log(&format!("network configured on {interface}"));
        Ok(())
    }
}
