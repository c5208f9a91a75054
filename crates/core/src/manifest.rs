// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parsed pup manifest: build inputs, container services, exposed ports,
//! dependencies, provided interfaces, and the user config schema.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structured description of a pup, produced by the source registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PupManifest {
    #[serde(default)]
    pub manifest_version: u32,
    pub meta: ManifestMeta,
    pub container: ManifestContainer,
    #[serde(default)]
    pub dependencies: Vec<ManifestDependency>,
    #[serde(default)]
    pub interfaces: Vec<ManifestInterface>,
    #[serde(default)]
    pub config: ManifestConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestMeta {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub logo_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestContainer {
    pub build: ManifestBuild,
    #[serde(default)]
    pub services: Vec<ManifestService>,
    #[serde(default)]
    pub exposes: Vec<ManifestExpose>,
    #[serde(default)]
    pub requires_internet: bool,
}

/// Build inputs: the container expression file and its expected digest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestBuild {
    pub nix_file: String,
    pub nix_file_sha256: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestService {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestExpose {
    pub name: String,
    pub port: u16,
    /// Host-side port override; defaults to `port` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
    #[serde(default)]
    pub web_ui: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestDependency {
    pub interface_name: String,
    /// Version requirement on the providing interface, e.g. `"1.0"`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestInterface {
    pub name: String,
    pub version: String,
}

/// User config schema declared by the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestConfig {
    #[serde(default)]
    pub fields: Vec<ManifestConfigField>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestConfigField {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl PupManifest {
    /// Config values seeded from the schema's declared defaults.
    pub fn default_config(&self) -> BTreeMap<String, String> {
        self.config
            .fields
            .iter()
            .filter_map(|f| f.default.as_ref().map(|d| (f.name.clone(), d.clone())))
            .collect()
    }

    /// Names of required config keys not present in `config`.
    pub fn missing_required_config(&self, config: &BTreeMap<String, String>) -> Vec<String> {
        self.config
            .fields
            .iter()
            .filter(|f| f.required && !config.contains_key(&f.name))
            .map(|f| f.name.clone())
            .collect()
    }

    /// Service names declared for the container.
    pub fn service_names(&self) -> Vec<String> {
        self.container.services.iter().map(|s| s.name.clone()).collect()
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
