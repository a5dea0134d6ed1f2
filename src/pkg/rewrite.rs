// Purpose: Rewrite import paths across a source tree according to a decision callback.
// Inputs/Outputs: Walks .gs files under a root, edits import string literals in place.
// Invariants: Only the quoted import path changes; aliases, only-lists, and every
//             other byte of a file are preserved. Unchanged files are never written.
// Gotchas: Vendored subtrees are snapshots owned by their origin module and must
//          never be rewritten.

use anyhow::{Context, bail};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// One applied import edit, for CLI reporting. The engine itself prints nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub file: PathBuf,
    pub old: String,
    pub new: String,
}

#[derive(Debug, Default)]
pub struct RewriteReport {
    pub changes: Vec<Change>,
    /// True when a cancellation signal stopped the walk early. Writes that
    /// already happened stay committed; the report lists them.
    pub canceled: bool,
}

/// Applies `decide` to every import path in every source file under `root`.
/// `decide` returns the replacement path, or `None` to keep an import as is;
/// returning the identical path also counts as "keep". A file is written back
/// only when at least one import actually changed, so a run with nothing to do
/// leaves the tree byte-for-byte untouched. An unparsable import section
/// aborts the whole run.
pub fn rewrite<F>(root: &Path, cancel: &AtomicBool, decide: F) -> anyhow::Result<RewriteReport>
where
    F: Fn(&Path, &str) -> Option<String>,
{
    let mut report = RewriteReport::default();
    for file in collect_gs_files(root)? {
        if cancel.load(Ordering::Relaxed) {
            report.canceled = true;
            return Ok(report);
        }
        let text =
            fs::read_to_string(&file).with_context(|| format!("read {}", file.display()))?;
        let (out, edits) = rewrite_text(&file, &text, &decide)?;
        if edits.is_empty() {
            continue;
        }
        fs::write(&file, out).with_context(|| format!("write {}", file.display()))?;
        for (old, new) in edits {
            report.changes.push(Change {
                file: file.clone(),
                old,
                new,
            });
        }
    }
    Ok(report)
}

fn import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^\s*import\s+"([^"]+)""#).unwrap())
}

// An import keyword at the start of a line opens an import statement; anything
// after it other than a string literal is a parse error.
fn opens_import(line: &str) -> bool {
    match line.trim_start().strip_prefix("import") {
        Some(rest) => rest.is_empty() || rest.starts_with([' ', '\t', '"']),
        None => false,
    }
}

fn rewrite_text<F>(
    file: &Path,
    text: &str,
    decide: &F,
) -> anyhow::Result<(String, Vec<(String, String)>)>
where
    F: Fn(&Path, &str) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut edits = Vec::new();
    for line in text.split_inclusive('\n') {
        if !opens_import(line) {
            out.push_str(line);
            continue;
        }
        let caps = match import_re().captures(line) {
            Some(caps) => caps,
            None => bail!(
                "{}: expected string literal after import",
                file.display()
            ),
        };
        let m = caps.get(1).expect("import path capture");
        let old = m.as_str();
        match decide(file, old) {
            Some(new) if new != old => {
                out.push_str(&line[..m.start()]);
                out.push_str(&new);
                out.push_str(&line[m.end()..]);
                edits.push((old.to_string(), new));
            }
            _ => out.push_str(line),
        }
    }
    Ok((out, edits))
}

fn is_skip_dir(name: &str) -> bool {
    matches!(
        name,
        ".git" | "target" | "node_modules" | ".gost" | ".idea" | ".vscode" | "vendor"
    )
}

fn collect_gs_files(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> anyhow::Result<()> {
        for ent in fs::read_dir(dir).with_context(|| format!("read_dir {}", dir.display()))? {
            let ent = ent?;
            let p = ent.path();
            if p.is_dir() {
                if let Some(name) = p.file_name().and_then(|s| s.to_str())
                    && is_skip_dir(name)
                {
                    continue;
                }
                walk(&p, out)?;
            } else if p.extension().and_then(|s| s.to_str()) == Some("gs") {
                out.push(p);
            }
        }
        Ok(())
    }

    let mut out = vec![];
    walk(root, &mut out)?;
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::rewrite;
    use crate::pkg::ident::ModuleIdent;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time drift")
            .as_nanos();
        std::env::temp_dir().join(format!("gsmajor-{}-{}-{}", prefix, std::process::id(), nonce))
    }

    const MAIN_GS: &str = concat!(
        "package main\n",
        "\n",
        "import \"std/fmt\"\n",
        "import \"x.dev/acme/lib\"\n",
        "import \"x.dev/acme/lib/util\" as u { helper, Thing }\n",
        "\n",
        "fn main() {\n",
        "    u.helper()\n",
        "}\n",
    );

    // Upgrade decision used across tests: move x.dev/acme/lib to v2.
    fn upgrade_to_v2(_file: &Path, path: &str) -> Option<String> {
        let bounds = vec!["x.dev/acme/lib".to_string()];
        let id = ModuleIdent::decode(path, &bounds)?;
        let next = id.with_version("v2.1.0").ok()?;
        Some(next.encode())
    }

    #[test]
    fn rewrite_replaces_only_the_import_literal() {
        let root = temp_dir("rewrite-basic");
        fs::create_dir_all(&root).expect("mkdir");
        let file = root.join("main.gs");
        fs::write(&file, MAIN_GS).expect("write main.gs");

        let cancel = AtomicBool::new(false);
        let report = rewrite(&root, &cancel, upgrade_to_v2).expect("rewrite");
        assert_eq!(report.changes.len(), 2);
        assert!(!report.canceled);

        let text = fs::read_to_string(&file).expect("read back");
        assert!(text.contains("import \"std/fmt\"\n"));
        assert!(text.contains("import \"x.dev/acme/lib/v2\"\n"));
        assert!(
            text.contains("import \"x.dev/acme/lib/v2/util\" as u { helper, Thing }\n"),
            "alias and only-list must survive: {}",
            text
        );
        assert!(text.ends_with("fn main() {\n    u.helper()\n}\n"));

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn rewrite_is_idempotent() {
        let root = temp_dir("rewrite-idem");
        fs::create_dir_all(&root).expect("mkdir");
        fs::write(root.join("main.gs"), MAIN_GS).expect("write main.gs");

        let cancel = AtomicBool::new(false);
        let first = rewrite(&root, &cancel, upgrade_to_v2).expect("first run");
        assert_eq!(first.changes.len(), 2);
        let second = rewrite(&root, &cancel, upgrade_to_v2).expect("second run");
        assert!(second.changes.is_empty(), "second run must be a no-op");

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn rewrite_with_keep_decision_touches_nothing() {
        let root = temp_dir("rewrite-keep");
        fs::create_dir_all(&root).expect("mkdir");
        let file = root.join("main.gs");
        fs::write(&file, MAIN_GS).expect("write main.gs");
        let plain = root.join("noimports.gs");
        fs::write(&plain, "package data\n\nconst X = 1\n").expect("write noimports.gs");
        let before_main = fs::metadata(&file).and_then(|m| m.modified()).expect("mtime");
        let before_plain = fs::metadata(&plain).and_then(|m| m.modified()).expect("mtime");

        let cancel = AtomicBool::new(false);
        let report = rewrite(&root, &cancel, |_, _| None).expect("rewrite");
        assert!(report.changes.is_empty());
        assert_eq!(fs::read_to_string(&file).expect("read"), MAIN_GS);
        let after_main = fs::metadata(&file).and_then(|m| m.modified()).expect("mtime");
        let after_plain = fs::metadata(&plain).and_then(|m| m.modified()).expect("mtime");
        assert_eq!(before_main, after_main);
        assert_eq!(before_plain, after_plain);

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn rewrite_identical_decision_is_not_a_change() {
        let root = temp_dir("rewrite-same");
        fs::create_dir_all(&root).expect("mkdir");
        fs::write(root.join("main.gs"), MAIN_GS).expect("write main.gs");

        let cancel = AtomicBool::new(false);
        let report =
            rewrite(&root, &cancel, |_, path| Some(path.to_string())).expect("rewrite");
        assert!(report.changes.is_empty());

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn rewrite_never_touches_vendored_subtrees() {
        let root = temp_dir("rewrite-vendor");
        fs::create_dir_all(root.join("vendor/x.dev/acme/lib")).expect("mkdir vendor");
        let vendored = root.join("vendor/x.dev/acme/lib/lib.gs");
        fs::write(&vendored, "package lib\n\nimport \"x.dev/acme/lib/util\"\n")
            .expect("write vendored");

        let cancel = AtomicBool::new(false);
        let report = rewrite(&root, &cancel, |_, path| Some(format!("{}/v9", path)))
            .expect("rewrite");
        assert!(report.changes.is_empty());
        assert_eq!(
            fs::read_to_string(&vendored).expect("read vendored"),
            "package lib\n\nimport \"x.dev/acme/lib/util\"\n"
        );

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn rewrite_aborts_on_malformed_import() {
        let root = temp_dir("rewrite-bad");
        fs::create_dir_all(&root).expect("mkdir");
        fs::write(root.join("bad.gs"), "package main\n\nimport util\n").expect("write bad.gs");

        let cancel = AtomicBool::new(false);
        let err = rewrite(&root, &cancel, upgrade_to_v2).expect_err("must fail");
        assert!(err.to_string().contains("bad.gs"), "{}", err);

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn rewrite_reports_cancellation_before_starting_new_files() {
        let root = temp_dir("rewrite-cancel");
        fs::create_dir_all(&root).expect("mkdir");
        let file = root.join("main.gs");
        fs::write(&file, MAIN_GS).expect("write main.gs");

        let cancel = AtomicBool::new(false);
        cancel.store(true, Ordering::Relaxed);
        let report = rewrite(&root, &cancel, upgrade_to_v2).expect("rewrite");
        assert!(report.canceled);
        assert!(report.changes.is_empty());
        assert_eq!(fs::read_to_string(&file).expect("read"), MAIN_GS);

        let _ = fs::remove_dir_all(root);
    }
}
