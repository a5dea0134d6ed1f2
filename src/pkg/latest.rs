// Purpose: Discover the newest published version across a module's major lines.
// Inputs/Outputs: Probes the proxy for each /vN line and selects the best tag.
// Invariants: Lines are introduced contiguously; the first absent line stops the walk.
// Gotchas: Concurrent probing is window-scoped so it can never reorder the stop decision.

use anyhow::bail;
use regex::Regex;
use semver::Version;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::pkg::ident::{ModuleIdent, parse_version_loose};
use crate::pkg::proxy::Proxy;

// Major lines probed per concurrent window.
const PROBE_WINDOW: u64 = 4;

/// Outcome of probing one major line. Ephemeral within a single resolution.
#[derive(Debug)]
struct VersionProbe {
    line: u64,
    versions: Option<Vec<String>>,
}

fn probe_window_size() -> u64 {
    std::env::var("GSMAJOR_JOBS")
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(PROBE_WINDOW)
}

fn line_mod_path(prefix: &str, line: u64) -> String {
    ModuleIdent {
        prefix: prefix.to_string(),
        major: if line >= 2 { Some(line) } else { None },
        subdir: String::new(),
    }
    .mod_path()
}

fn probe_lines(proxy: &Proxy, prefix: &str, lines: &[u64]) -> anyhow::Result<Vec<VersionProbe>> {
    let mut probes = Vec::with_capacity(lines.len());
    thread::scope(|scope| -> anyhow::Result<()> {
        let mut handles = Vec::with_capacity(lines.len());
        for &line in lines {
            let modpath = line_mod_path(prefix, line);
            handles.push((
                line,
                scope.spawn(move || proxy.list(&modpath)),
            ));
        }
        for (line, h) in handles {
            let versions = h
                .join()
                .map_err(|_| anyhow::anyhow!("probe worker panicked for line {}", line))??;
            probes.push(VersionProbe { line, versions });
        }
        Ok(())
    })?;
    probes.sort_by_key(|p| p.line);
    Ok(probes)
}

/// Newest version of the module rooted at `prefix`, looking across every
/// major-version line the registry knows about. Stable tags win; pre-release
/// and pseudo-version tags are only eligible when a line has nothing else.
pub fn latest(prefix: &str, proxy: &Proxy, cancel: &AtomicBool) -> anyhow::Result<String> {
    let window = probe_window_size();
    let mut best: Option<(u64, Vec<String>)> = None;
    let mut start = 1u64;
    loop {
        if cancel.load(Ordering::Relaxed) {
            bail!("canceled while probing {}", prefix);
        }
        let lines: Vec<u64> = (start..start + window).collect();
        let mut stopped = false;
        for probe in probe_lines(proxy, prefix, &lines)? {
            match probe.versions {
                Some(versions) => best = Some((probe.line, versions)),
                None => {
                    if probe.line == 1 {
                        bail!("module not found: {}", prefix);
                    }
                    stopped = true;
                    break;
                }
            }
        }
        if stopped {
            break;
        }
        start += window;
    }
    let (line, versions) = match best {
        Some(found) => found,
        None => bail!("module not found: {}", prefix),
    };
    select_version(&versions)
        .ok_or_else(|| anyhow::anyhow!("no usable versions for {}", line_mod_path(prefix, line)))
}

/// Highest tag under semver ordering, preferring stable releases. When a line
/// has no stable tag, pre-releases beat pseudo-versions, and pseudo-versions
/// are a last resort.
fn select_version(tags: &[String]) -> Option<String> {
    let mut best_stable: Option<(Version, &str)> = None;
    let mut best_pre: Option<(Version, &str)> = None;
    let mut best_pseudo: Option<(Version, &str)> = None;
    for tag in tags {
        let Some(ver) = parse_version_loose(tag) else {
            continue;
        };
        let slot = if ver.pre.is_empty() {
            &mut best_stable
        } else if is_pseudo_version(&ver) {
            &mut best_pseudo
        } else {
            &mut best_pre
        };
        if slot.as_ref().map(|(b, _)| ver > *b).unwrap_or(true) {
            *slot = Some((ver, tag));
        }
    }
    best_stable
        .or(best_pre)
        .or(best_pseudo)
        .map(|(_, tag)| tag.to_string())
}

/// Pseudo-versions carry a `yyyymmddhhmmss-abcdefabcdef` tail in the
/// pre-release field, synthesized from VCS metadata.
pub fn is_pseudo_version(v: &Version) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^\d{14}-[0-9a-f]{12}$").unwrap());
    v.pre
        .as_str()
        .rsplit('.')
        .next()
        .map(|tail| re.is_match(tail))
        .unwrap_or(false)
}
