use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::pkg::ident;

/// Parsed `gost.mod`. Read-only here: dependency acquisition and manifest
/// edits belong to `gs mod get`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModFile {
    pub module: String,
    #[serde(default)]
    pub require: Vec<Require>,
    #[serde(default)]
    pub replace: Vec<Replace>,
    #[serde(default)]
    pub source: Vec<Source>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Require {
    pub module: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Replace {
    pub module: String,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Source {
    pub module: String,
    pub url: String,
}

impl ModFile {
    pub fn parse(toml_text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str::<ModFile>(toml_text)?)
    }

    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let p = root.join("gost.mod");
        let text = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
        Self::parse(&text)
    }

    /// Module roots known to this project: the main module, every require,
    /// and every replace. This is the boundary set import paths are decoded
    /// against. Require paths written with a `/vN` suffix are normalized to
    /// the bare root, per the packaging convention, so imports of any major
    /// line decode against the same boundary.
    pub fn boundaries(&self) -> Vec<String> {
        let mut out = vec![self.module.clone()];
        out.extend(
            self.require
                .iter()
                .map(|r| ident::bare_prefix(&r.module).to_string()),
        );
        out.extend(
            self.replace
                .iter()
                .map(|r| ident::bare_prefix(&r.module).to_string()),
        );
        out.sort();
        out.dedup();
        out
    }

    pub fn required_version(&self, module: &str) -> Option<&str> {
        self.require
            .iter()
            .find(|r| r.module == module)
            .map(|r| r.version.as_str())
    }

    /// `[[source]]` URL for `module`, if one is declared.
    pub fn source_url(&self, module: &str) -> Option<&str> {
        self.source
            .iter()
            .find(|s| s.module == module)
            .map(|s| s.url.as_str())
    }
}

pub fn find_mod_root(mut p: PathBuf) -> Option<PathBuf> {
    loop {
        if p.join("gost.mod").exists() {
            return Some(p);
        }
        if !p.pop() {
            break;
        }
    }
    None
}
