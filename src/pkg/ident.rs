use anyhow::bail;
use semver::Version;

/// Decoded form of an import path: module root, optional major-version line,
/// and the package directory beneath the module root.
///
/// `major` is `None` for the v0/v1 line (which has no path suffix) and
/// `Some(n)` with `n >= 2` otherwise. Values are never mutated after
/// construction; derive new idents with [`ModuleIdent::with_version`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleIdent {
    pub prefix: String,
    pub major: Option<u64>,
    pub subdir: String,
}

impl ModuleIdent {
    /// Module path as it appears on the registry: prefix plus `/vN` suffix.
    pub fn mod_path(&self) -> String {
        match self.major {
            Some(n) => format!("{}/v{}", self.prefix, n),
            None => self.prefix.clone(),
        }
    }

    /// Full import path: module path plus package subdirectory.
    pub fn encode(&self) -> String {
        let mut out = self.mod_path();
        if !self.subdir.is_empty() {
            out.push('/');
            out.push_str(&self.subdir);
        }
        out
    }

    /// Splits `raw` against the known module boundaries. The longest boundary
    /// that is a segment-wise prefix of `raw` wins, so a nested module root
    /// always takes precedence over an enclosing one. A `vN` segment directly
    /// after the boundary is classified as a major line only when `n >= 2`;
    /// a literal directory that merely looks like one (or a boundary that
    /// itself ends in `vN`) is left alone by the longest-match rule.
    pub fn decode(raw: &str, boundaries: &[String]) -> Option<ModuleIdent> {
        let mut best: Option<&str> = None;
        for b in boundaries {
            if (raw == b || raw.starts_with(&format!("{}/", b)))
                && best.map(|cur| cur.len() < b.len()).unwrap_or(true)
            {
                best = Some(b.as_str());
            }
        }
        let prefix = best?;
        let rest = raw[prefix.len()..].trim_start_matches('/');
        let (major, subdir) = match rest.split_once('/') {
            Some((head, tail)) if major_segment(head).is_some() => {
                (major_segment(head), tail.to_string())
            }
            _ => match major_segment(rest) {
                Some(n) => (Some(n), String::new()),
                None => (None, rest.to_string()),
            },
        };
        Some(ModuleIdent {
            prefix: prefix.to_string(),
            major,
            subdir,
        })
    }

    /// Re-derives the ident for `version`, holding prefix and subdir fixed.
    /// This answers "what should this import path become after upgrading".
    pub fn with_version(&self, version: &str) -> anyhow::Result<ModuleIdent> {
        let v = match parse_version_loose(version) {
            Some(v) => v,
            None => bail!("invalid version: {}", version),
        };
        Ok(ModuleIdent {
            prefix: self.prefix.clone(),
            major: if v.major >= 2 { Some(v.major) } else { None },
            subdir: self.subdir.clone(),
        })
    }
}

/// Returns the major line encoded by a path segment: `v2`, `v10`, ... with no
/// leading zero. `v0` and `v1` never carry a path suffix, so they are not
/// major segments.
pub fn major_segment(seg: &str) -> Option<u64> {
    let digits = seg.strip_prefix('v')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    let n: u64 = digits.parse().ok()?;
    if n >= 2 { Some(n) } else { None }
}

/// Module root without a trailing major-version suffix: `x.dev/m/v2` -> `x.dev/m`.
pub fn bare_prefix(modpath: &str) -> &str {
    match modpath.rsplit_once('/') {
        Some((parent, last)) if major_segment(last).is_some() => parent,
        _ => modpath,
    }
}

/// Splits `module[@version]` on the last `@`.
pub fn split_spec(spec: &str) -> (String, Option<String>) {
    match spec.rfind('@') {
        Some(i) => (spec[..i].to_string(), Some(spec[i + 1..].to_string())),
        None => (spec.to_string(), None),
    }
}

pub fn parse_version_loose(raw: &str) -> Option<Version> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    let t = t.strip_prefix('v').unwrap_or(t);
    Version::parse(t).ok()
}

/// Canonical `vX.Y.Z[-pre]` form for a loosely written version.
pub fn canonical_version(raw: &str) -> anyhow::Result<String> {
    match parse_version_loose(raw) {
        Some(v) => Ok(format!("v{}", v)),
        None => bail!("invalid version: {}", raw),
    }
}
