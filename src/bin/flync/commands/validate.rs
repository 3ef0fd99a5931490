//! `flync validate` command

use std::path::PathBuf;

use anyhow::{Context, Result};
use miette::Diagnostic as _;
use serde::Serialize;

use crate::cli::ValidateArgs;
use crate::commands::{expected_name, workspace_config};
use flync::util::diagnostic::{render_report, Diagnostic, LoadError};
use flync::{Loader, Workspace};

/// JSON shape of a validation run.
#[derive(Serialize)]
struct JsonReport<'a> {
    workspace: &'a str,
    root: PathBuf,
    valid: bool,
    errors: usize,
    warnings: usize,
    diagnostics: &'a [Diagnostic],
}

/// JSON shape of a load that aborted.
#[derive(Serialize)]
struct JsonFatal {
    workspace: String,
    valid: bool,
    fatal: FatalError,
}

#[derive(Serialize)]
struct FatalError {
    code: Option<String>,
    message: String,
    help: Option<String>,
}

pub fn execute(args: ValidateArgs, color: bool) -> Result<i32> {
    let mut config = workspace_config(&args.path);
    if args.sequential {
        config.load.parallel = Some(false);
    }
    let deny_warnings = args.deny_warnings || config.report.deny_warnings;
    let name = expected_name(&args.path, args.name)?;

    let mut loader = Loader::new(config.load);
    let ws = match loader.load(&name, &args.path) {
        Ok(ws) => ws,
        Err(err) => {
            report_fatal(&name, err, args.json)?;
            return Ok(1);
        }
    };

    let valid = !ws.has_errors() && !(deny_warnings && ws.warnings().next().is_some());
    if args.json {
        print_json(&ws, valid)?;
    } else {
        print_text(&ws, valid, color);
    }
    Ok(if valid { 0 } else { 1 })
}

fn print_text(ws: &Workspace, valid: bool, color: bool) {
    if !ws.diagnostics().is_empty() {
        print!("{}", render_report(ws.diagnostics(), color));
        println!();
    }

    let errors = ws.errors().count();
    let warnings = ws.warnings().count();
    if valid {
        println!(
            "workspace `{}` is valid ({} entities, {} references, {} warnings)",
            ws.name(),
            ws.entity_count(),
            ws.graph().edge_count(),
            warnings
        );
    } else {
        println!(
            "workspace `{}` is invalid: {} errors, {} warnings",
            ws.name(),
            errors,
            warnings
        );
    }
}

fn print_json(ws: &Workspace, valid: bool) -> Result<()> {
    let report = JsonReport {
        workspace: ws.name(),
        root: ws.root().to_path_buf(),
        valid,
        errors: ws.errors().count(),
        warnings: ws.warnings().count(),
        diagnostics: ws.diagnostics(),
    };
    let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
    println!("{}", json);
    Ok(())
}

fn report_fatal(name: &str, err: LoadError, json: bool) -> Result<()> {
    if !json {
        eprintln!("{:?}", miette::Report::new(err));
        return Ok(());
    }
    let fatal = JsonFatal {
        workspace: name.to_string(),
        valid: false,
        fatal: FatalError {
            code: err.code().map(|c| c.to_string()),
            message: err.to_string(),
            help: err.help().map(|h| h.to_string()),
        },
    };
    let json = serde_json::to_string_pretty(&fatal).context("failed to serialize report")?;
    println!("{}", json);
    Ok(())
}
