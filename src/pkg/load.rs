// Purpose: Resolve a user-supplied package path to its module identity.
// Inputs/Outputs: Decodes against gost.mod boundaries, falling back to proxy probing.
// Invariants: Manifest boundaries always win over probing; probing walks prefixes
//             longest-first so nested module roots are found before enclosing ones.

use anyhow::Context;
use strsim::jaro_winkler;

use crate::pkg::ident::{self, ModuleIdent};
use crate::pkg::modfile::ModFile;
use crate::pkg::proxy::Proxy;

/// Turns `pkgpath` into a `ModuleIdent`. When a project manifest is in reach
/// its boundary set decides; otherwise the proxy is probed with successively
/// shorter prefixes of `pkgpath` until one answers.
pub fn load(pkgpath: &str, mf: Option<&ModFile>, proxy: &Proxy) -> anyhow::Result<ModuleIdent> {
    if let Some(mf) = mf
        && let Some(id) = ModuleIdent::decode(pkgpath, &mf.boundaries())
    {
        return Ok(id);
    }
    let mut cut = pkgpath;
    loop {
        if proxy.list(cut)?.is_some() {
            let boundary = ident::bare_prefix(cut).to_string();
            return ModuleIdent::decode(pkgpath, &[boundary])
                .context("decode against probed boundary");
        }
        match cut.rfind('/') {
            Some(i) => cut = &cut[..i],
            None => break,
        }
    }
    match mf.and_then(|m| suggest_require(pkgpath, m)) {
        Some(s) => anyhow::bail!(
            "unknown module for {}\nhelp: did you mean \"{}\"?",
            pkgpath,
            s
        ),
        None => anyhow::bail!("unknown module for {}", pkgpath),
    }
}

fn suggest_require(pkgpath: &str, mf: &ModFile) -> Option<String> {
    let mut best: Option<(String, f64)> = None;
    for r in &mf.require {
        let root = ident::bare_prefix(&r.module);
        let score = jaro_winkler(pkgpath, root);
        if best.as_ref().map(|(_, s)| score > *s).unwrap_or(true) {
            best = Some((root.to_string(), score));
        }
    }
    match best {
        Some((name, score)) if score >= 0.84 => Some(name),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::load;
    use crate::pkg::modfile::ModFile;
    use crate::pkg::proxy::Proxy;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time drift")
            .as_nanos();
        std::env::temp_dir().join(format!("gsmajor-{}-{}-{}", prefix, std::process::id(), nonce))
    }

    fn file_proxy(base: &PathBuf) -> Proxy {
        Proxy::new(&format!(
            "file://{}",
            base.to_string_lossy().replace('\\', "/")
        ))
    }

    fn empty_proxy(prefix: &str) -> (PathBuf, Proxy) {
        let base = temp_dir(prefix);
        fs::create_dir_all(&base).expect("create base");
        let proxy = file_proxy(&base);
        (base, proxy)
    }

    #[test]
    fn load_prefers_manifest_boundaries() {
        let mf = ModFile::parse(
            "module = \"example.com/you/project\"\n\n[[require]]\nmodule = \"x.dev/acme/lib\"\nversion = \"v1.4.0\"\n",
        )
        .expect("parse");
        let (base, proxy) = empty_proxy("load-manifest");

        let id = load("x.dev/acme/lib/v2/util", Some(&mf), &proxy).expect("load");
        assert_eq!(id.prefix, "x.dev/acme/lib");
        assert_eq!(id.major, Some(2));
        assert_eq!(id.subdir, "util");

        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn load_probes_proxy_when_no_manifest_matches() {
        let base = temp_dir("load-probe");
        let vdir = base.join("x.dev/acme/lib/v2").join("@v");
        fs::create_dir_all(&vdir).expect("create proxy dir");
        fs::write(vdir.join("list"), "v2.0.0\n").expect("write list");
        let proxy = file_proxy(&base);

        let id = load("x.dev/acme/lib/v2/util", None, &proxy).expect("load");
        assert_eq!(id.prefix, "x.dev/acme/lib");
        assert_eq!(id.major, Some(2));
        assert_eq!(id.subdir, "util");

        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn load_suggests_near_miss_requires() {
        let mf = ModFile::parse(
            "module = \"example.com/you/project\"\n\n[[require]]\nmodule = \"x.dev/acme/lib\"\nversion = \"v1.4.0\"\n",
        )
        .expect("parse");
        let (base, proxy) = empty_proxy("load-suggest");

        let err = load("x.dev/acme/lob", Some(&mf), &proxy).expect_err("must fail");
        let msg = err.to_string();
        assert!(msg.contains("unknown module"), "{}", msg);
        assert!(msg.contains("did you mean \"x.dev/acme/lib\""), "{}", msg);

        let _ = fs::remove_dir_all(base);
    }
}
