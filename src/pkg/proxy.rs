// Purpose: Registry client for the module proxy protocol.
// Inputs/Outputs: Fetches `{module}/@v/list` over http(s) or file:// bases.
// Invariants: "not found" is a negative result, never conflated with transport failure.
// Gotchas: file:// bases are load-bearing for tests and air-gapped mirrors.

use anyhow::bail;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use crate::pkg::modfile::ModFile;

const DEFAULT_PROXY: &str = "https://proxy.gost.dev";

// Transient transport failures get this many attempts before surfacing.
const FETCH_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct Proxy {
    base: String,
}

impl Proxy {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Proxy base for `module`: a `proxy+` `[[source]]` entry wins, then the
    /// GOST_PROXY environment variable, then the default public proxy.
    pub fn for_module(mf: Option<&ModFile>, module: &str) -> Self {
        if let Some(url) = mf.and_then(|m| m.source_url(module))
            && let Some(rest) = url.strip_prefix("proxy+")
        {
            return Self::new(rest);
        }
        if let Ok(proxy) = std::env::var("GOST_PROXY") {
            let p = proxy.trim();
            if !p.is_empty() {
                return Self::new(p);
            }
        }
        Self::new(DEFAULT_PROXY)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Published version tags for `modpath`, or `None` when the registry has
    /// no such module path. Transport errors are retried a bounded number of
    /// times and then surfaced.
    pub fn list(&self, modpath: &str) -> anyhow::Result<Option<Vec<String>>> {
        let rel = format!("{}/@v/list", modpath);
        let body = match self.read_text(&rel)? {
            Some(body) => body,
            None => return Ok(None),
        };
        let mut out = Vec::new();
        for line in body.lines() {
            let t = line.trim();
            if !t.is_empty() {
                out.push(t.to_string());
            }
        }
        Ok(Some(out))
    }

    fn read_text(&self, rel: &str) -> anyhow::Result<Option<String>> {
        if let Some(base_dir) = file_url_to_path(&self.base) {
            let p = base_dir.join(rel);
            return match fs::read_to_string(&p) {
                Ok(s) => Ok(Some(s)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(anyhow::anyhow!("read {}: {}", p.display(), e)),
            };
        }
        let url = format!("{}/{}", self.base, rel);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match ureq::get(&url).call() {
                Ok(resp) => {
                    let mut body = String::new();
                    resp.into_reader().read_to_string(&mut body)?;
                    return Ok(Some(body));
                }
                Err(ureq::Error::Status(404 | 410, _)) => return Ok(None),
                Err(ureq::Error::Status(code, _)) => {
                    bail!("http GET {} failed: status {}", url, code)
                }
                Err(ureq::Error::Transport(t)) => {
                    if attempt >= FETCH_ATTEMPTS {
                        bail!("http GET {} failed: {}", url, t);
                    }
                    std::thread::sleep(RETRY_BACKOFF);
                }
            }
        }
    }
}

fn file_url_to_path(url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix("file://")?;
    #[cfg(windows)]
    {
        if rest.len() >= 3 && rest.starts_with('/') && rest.as_bytes()[2] == b':' {
            return Some(PathBuf::from(&rest[1..]));
        }
    }
    Some(PathBuf::from(rest))
}
