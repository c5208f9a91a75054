// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generated-file operations and their templates.
//!
//! Each operation produces or removes one file inside the nix directory via
//! textual substitution. Rendering happens when the op is queued; the write
//! is deferred until `Patch::apply`.

use crate::template::{nix_bool, nix_string, nix_string_list, render};
use dbx_core::store::BinaryCache;
use dbx_core::{PupId, PupState};
use std::path::{Path, PathBuf};

/// Host IP inside the pup subnet.
pub(crate) const HOST_IP: &str = "10.69.0.1";

/// A queued file mutation with a human-readable name for logs.
#[derive(Debug, Clone)]
pub(crate) struct PatchOp {
    pub name: String,
    pub file: FileOp,
}

#[derive(Debug, Clone)]
pub(crate) enum FileOp {
    Write { rel_path: PathBuf, contents: String },
    Remove { rel_path: PathBuf },
}

/// Host-wide settings rendered into `system.nix`.
#[derive(Debug, Clone, Default)]
pub struct SystemSettings {
    pub hostname: String,
    pub ssh_enabled: bool,
    pub ssh_keys: Vec<String>,
    pub binary_caches: Vec<BinaryCache>,
    /// Tailscale auth key; empty disables the service. The key itself
    /// stays in the state store, only the enable bit is rendered.
    pub tailscale_auth: String,
}

/// One allowed inbound port, rendered into `firewall.nix`.
#[derive(Debug, Clone)]
pub struct FirewallRule {
    pub port: u16,
    pub description: String,
}

/// Uplink configuration rendered into `network.nix`.
#[derive(Debug, Clone, Default)]
pub struct NetworkConfig {
    pub interface: String,
    pub dhcp: bool,
}

/// NAT and bridge settings for the pup container network.
#[derive(Debug, Clone, Default)]
pub struct SystemContainerConfig {
    pub external_interface: String,
}

const SYSTEM_TEMPLATE: &str = r#"{ pkgs, lib, ... }:
{
  networking.hostName = {{hostname}};
  services.openssh.enable = {{ssh_enabled}};
  services.tailscale.enable = {{tailscale_enabled}};
  users.users.dogebox.openssh.authorizedKeys.keys = [ {{ssh_keys}} ];
  nix.settings.substituters = [ {{cache_urls}} ];
  nix.settings.trusted-public-keys = [ {{cache_keys}} ];
}
"#;

const FIREWALL_TEMPLATE: &str = r#"{ ... }:
{
  networking.firewall.enable = true;
  networking.firewall.allowedTCPPorts = [ {{ports}} ];
}
"#;

const NETWORK_TEMPLATE: &str = r#"{ ... }:
{
  networking.interfaces.{{interface}}.useDHCP = {{dhcp}};
}
"#;

const INCLUDES_TEMPLATE: &str = r#"{ ... }:
{
  imports = [
{{imports}}
  ];
}
"#;

const PUP_TEMPLATE: &str = r#"{ pkgs, lib, ... }:
{
  containers.pup-{{id}} = {
    autoStart = {{enabled}};
    privateNetwork = true;
    hostAddress = {{host_ip}};
    localAddress = {{pup_ip}};
    bindMounts."/storage" = {
      hostPath = {{storage_path}};
      isReadOnly = false;
    };
    config = import {{nix_file}};
  };
}
"#;

const STORAGE_OVERLAY_TEMPLATE: &str = r#"{ ... }:
{
  fileSystems."/opt/dogebox" = {
    device = {{device}};
    fsType = "ext4";
    options = [ "nofail" ];
  };
}
"#;

const SYSTEM_CONTAINER_TEMPLATE: &str = r#"{ ... }:
{
  networking.nat.enable = true;
  networking.nat.internalInterfaces = [ "ve-+" ];
  networking.nat.externalInterface = {{external_interface}};
}
"#;

/// File name of a pup's declarative fragment.
pub(crate) fn pup_file_name(id: &PupId) -> String {
    format!("pup_{id}.nix")
}

pub(crate) fn render_system(settings: &SystemSettings) -> Result<String, String> {
    let cache_urls: Vec<String> = settings.binary_caches.iter().map(|c| c.url.clone()).collect();
    let cache_keys: Vec<String> = settings.binary_caches.iter().map(|c| c.key.clone()).collect();
    render(
        SYSTEM_TEMPLATE,
        &[
            ("hostname", nix_string(&settings.hostname)),
            ("ssh_enabled", nix_bool(settings.ssh_enabled)),
            ("tailscale_enabled", nix_bool(!settings.tailscale_auth.is_empty())),
            ("ssh_keys", nix_string_list(&settings.ssh_keys)),
            ("cache_urls", nix_string_list(&cache_urls)),
            ("cache_keys", nix_string_list(&cache_keys)),
        ],
    )
}

pub(crate) fn render_firewall(rules: &[FirewallRule]) -> Result<String, String> {
    let ports =
        rules.iter().map(|r| r.port.to_string()).collect::<Vec<_>>().join(" ");
    render(FIREWALL_TEMPLATE, &[("ports", ports)])
}

pub(crate) fn render_network(config: &NetworkConfig) -> Result<String, String> {
    render(
        NETWORK_TEMPLATE,
        &[("interface", config.interface.clone()), ("dhcp", nix_bool(config.dhcp))],
    )
}

pub(crate) fn render_includes(pup_ids: &[PupId]) -> Result<String, String> {
    let mut ids: Vec<&PupId> = pup_ids.iter().collect();
    ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    let imports = ids
        .iter()
        .map(|id| format!("    ./{}", pup_file_name(id)))
        .collect::<Vec<_>>()
        .join("\n");
    render(INCLUDES_TEMPLATE, &[("imports", imports)])
}

pub(crate) fn render_pup(state: &PupState, data_dir: &Path) -> Result<String, String> {
    let pup_dir = data_dir.join("pups").join(state.id.as_str());
    let storage_dir = data_dir.join("pups").join("storage").join(state.id.as_str());
    let nix_file = pup_dir.join(&state.manifest.container.build.nix_file);
    render(
        PUP_TEMPLATE,
        &[
            ("id", state.id.to_string()),
            ("enabled", nix_bool(state.enabled)),
            ("host_ip", nix_string(HOST_IP)),
            ("pup_ip", nix_string(&state.ip.to_string())),
            ("storage_path", nix_string(&storage_dir.display().to_string())),
            ("nix_file", nix_string(&nix_file.display().to_string())),
        ],
    )
}

pub(crate) fn render_storage_overlay(device: &str) -> Result<String, String> {
    render(STORAGE_OVERLAY_TEMPLATE, &[("device", nix_string(device))])
}

pub(crate) fn render_system_container(config: &SystemContainerConfig) -> Result<String, String> {
    render(
        SYSTEM_CONTAINER_TEMPLATE,
        &[("external_interface", nix_string(&config.external_interface))],
    )
}

#[cfg(test)]
#[path = "ops_tests.rs"]
mod tests;
