use anyhow::{Context, bail};
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::AtomicBool;
use std::thread;

use crate::pkg::ident::{self, ModuleIdent, parse_version_loose};
use crate::pkg::latest::latest;
use crate::pkg::load::load;
use crate::pkg::modfile::{self, ModFile};
use crate::pkg::proxy::Proxy;
use crate::pkg::rewrite::rewrite;

pub fn run_cli<I>(args: I) -> i32
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let cmd = match args.next() {
        Some(c) => c,
        None => {
            print_usage();
            return 1;
        }
    };
    let rest: Vec<String> = args.collect();
    let res = match cmd.as_str() {
        "get" => cmd_get(&rest),
        "list" => cmd_list(&rest),
        "path" => cmd_path(&rest),
        "help" | "-h" | "--help" => {
            print_usage();
            return 0;
        }
        _ => {
            eprintln!("unknown command: {}", cmd);
            print_usage();
            return 1;
        }
    };
    match res {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{:#}", err);
            1
        }
    }
}

fn print_usage() {
    eprintln!("usage: gsmajor get [-no-get] [-no-rewrite] <module[@version]>");
    eprintln!("   or: gsmajor list");
    eprintln!("   or: gsmajor path <module[@version]>");
}

fn project_manifest() -> anyhow::Result<(PathBuf, Option<ModFile>)> {
    let cwd = std::env::current_dir().context("determine working directory")?;
    match modfile::find_mod_root(cwd.clone()) {
        Some(root) => {
            let mf = ModFile::load(&root)?;
            Ok((root, Some(mf)))
        }
        None => Ok((cwd, None)),
    }
}

fn cmd_get(args: &[String]) -> anyhow::Result<()> {
    let mut no_get = false;
    let mut no_rewrite = false;
    let mut spec: Option<&str> = None;
    for arg in args {
        match arg.as_str() {
            "-no-get" => no_get = true,
            "-no-rewrite" => no_rewrite = true,
            s if s.starts_with('-') => bail!("unknown flag: {}", s),
            s => {
                if spec.is_some() {
                    bail!("unexpected argument: {}", s);
                }
                spec = Some(s);
            }
        }
    }
    let spec = spec.context("missing module spec")?;
    let (pkgpath, version_arg) = ident::split_spec(spec);

    let (root, mf) = project_manifest()?;
    let proxy = Proxy::for_module(mf.as_ref(), &pkgpath);
    let cancel = AtomicBool::new(false);

    let id = load(&pkgpath, mf.as_ref(), &proxy)?;
    let version = match version_arg.as_deref() {
        None | Some("latest") => {
            let proxy = Proxy::for_module(mf.as_ref(), &id.prefix);
            latest(&id.prefix, &proxy, &cancel)?
        }
        Some(v) => {
            if parse_version_loose(v).is_none() {
                bail!("invalid version: {}", v);
            }
            v.to_string()
        }
    };
    let target = id.with_version(&version)?;
    let canonical = ident::canonical_version(&version)?;

    let already = mf
        .as_ref()
        .and_then(|m| m.required_version(&target.mod_path()))
        .and_then(parse_version_loose)
        .map(|cur| Some(cur) == parse_version_loose(&canonical))
        .unwrap_or(false);
    if already {
        eprintln!("nothing to do: {} already at {}", target.mod_path(), canonical);
    }

    if !no_get && !already {
        let get_spec = format!("{}@{}", target.mod_path(), canonical);
        eprintln!("gs mod get {}", get_spec);
        let status = Command::new("gs")
            .args(["mod", "get", &get_spec])
            .status()
            .context("failed to execute gs")?;
        if !status.success() {
            bail!("gs mod get {} failed", get_spec);
        }
    }

    if no_rewrite {
        return Ok(());
    }
    let bounds = vec![id.prefix.clone()];
    let only_subdir = id.subdir.clone();
    let report = rewrite(&root, &cancel, move |_file, old| {
        let found = ModuleIdent::decode(old, &bounds)?;
        if !only_subdir.is_empty() && found.subdir != only_subdir {
            return None;
        }
        let next = found.with_version(&version).ok()?;
        let new = next.encode();
        (new != old).then_some(new)
    })?;
    for c in &report.changes {
        println!("{}: {} -> {}", c.file.display(), c.old, c.new);
    }
    if report.changes.is_empty() {
        eprintln!("no import paths to rewrite");
    }
    if report.canceled {
        bail!(
            "rewrite canceled after {} change(s); completed edits are kept",
            report.changes.len()
        );
    }
    Ok(())
}

fn list_job_count(task_count: usize) -> usize {
    if task_count == 0 {
        return 1;
    }
    let from_env = std::env::var("GSMAJOR_JOBS")
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|n| *n > 0);
    let default = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    from_env.unwrap_or(default).clamp(1, task_count)
}

fn cmd_list(args: &[String]) -> anyhow::Result<()> {
    if !args.is_empty() {
        bail!("unexpected argument: {}", args[0]);
    }
    let (_root, mf) = project_manifest()?;
    let mf = mf.context("gost.mod not found (run inside a module)")?;
    if mf.require.is_empty() {
        eprintln!("no requires in gost.mod");
        return Ok(());
    }
    let cancel = AtomicBool::new(false);

    // One independent resolver call per require, with a bounded fan-out.
    let mut rows: Vec<(String, String, anyhow::Result<String>)> = Vec::new();
    let jobs = list_job_count(mf.require.len());
    let mf_ref = &mf;
    let cancel_ref = &cancel;
    for chunk in mf.require.chunks(jobs) {
        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(chunk.len());
            for r in chunk {
                let prefix = ident::bare_prefix(&r.module).to_string();
                handles.push((
                    r,
                    scope.spawn(move || {
                        let proxy = Proxy::for_module(Some(mf_ref), &prefix);
                        latest(&prefix, &proxy, cancel_ref)
                    }),
                ));
            }
            for (r, h) in handles {
                let res = match h.join() {
                    Ok(res) => res,
                    Err(_) => Err(anyhow::anyhow!("resolver worker panicked")),
                };
                rows.push((r.module.clone(), r.version.clone(), res));
            }
        });
    }

    for (module, current, res) in rows {
        match res {
            Ok(newest) => {
                let up_to_date = match (parse_version_loose(&current), parse_version_loose(&newest))
                {
                    (Some(cur), Some(new)) => cur >= new,
                    _ => false,
                };
                if up_to_date {
                    println!("{} {} (up to date)", module, current);
                } else {
                    println!("{} {} -> {}", module, current, newest);
                }
            }
            Err(err) => println!("{} {} (error: {:#})", module, current, err),
        }
    }
    Ok(())
}

fn cmd_path(args: &[String]) -> anyhow::Result<()> {
    let spec = match args {
        [one] => one.as_str(),
        [] => bail!("missing module spec"),
        _ => bail!("unexpected argument: {}", args[1]),
    };
    let (pkgpath, version_arg) = ident::split_spec(spec);
    let (_root, mf) = project_manifest()?;
    let id = match mf.as_ref().and_then(|m| ModuleIdent::decode(&pkgpath, &m.boundaries())) {
        Some(id) => id,
        None => {
            let boundary = ident::bare_prefix(&pkgpath).to_string();
            ModuleIdent::decode(&pkgpath, &[boundary]).context("unparsable module path")?
        }
    };
    let out = match version_arg.as_deref() {
        Some(v) if v != "latest" => id.with_version(v)?.encode(),
        _ => id.encode(),
    };
    println!("{}", out);
    Ok(())
}
