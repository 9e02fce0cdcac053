//! Command dispatch: maps parsed arguments onto services and output.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::generate;
use itertools::Itertools;
use tracing::{debug, instrument};

use crate::application::digest::{channel_digest, short_digest};
use crate::application::{build_preview, PreviewOptions};
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{expand_path, global_config_path, project_config_path, Settings};
use crate::domain::{Choices, Database, Resolution};
use crate::infrastructure::traits::{FileSystem, RealFileSystem};
use crate::infrastructure::{InfraError, InfraResult, ServiceContainer};

/// Execute the parsed command line.
pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let project_dir = project_dir(cli)?;
    let Some(command) = &cli.command else {
        return Err(CliError::Usage(
            "no command given, see `chnav --help`".to_string(),
        ));
    };

    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Commands::Config { command } => cmd_config(command, &project_dir),
        other => {
            let settings = Settings::load(Some(&project_dir))?;
            let container = ServiceContainer::new(settings);
            let path = database_path(cli, &container)?;
            debug!("database: {}", path.display());
            match other {
                Commands::Validate { deep } => cmd_validate(&container, &path, *deep),
                Commands::List {
                    limit,
                    count,
                    digest,
                    paths,
                } => {
                    let db = container.catalog.load(&path)?;
                    if *count {
                        output::info(&db.channel_count());
                        Ok(())
                    } else if *digest {
                        let (digest, n) = channel_digest(&db);
                        output::info(&format!("{}  {} channels", digest, n));
                        Ok(())
                    } else {
                        let limit = limit.or(container.settings.enumerate.limit);
                        cmd_list(&db, limit, *paths)
                    }
                }
                Commands::Children { prefix } => {
                    let db = container.catalog.load(&path)?;
                    cmd_children(&db, prefix)
                }
                Commands::Resolve { prefix } => {
                    let db = container.catalog.load(&path)?;
                    cmd_resolve(&db, prefix)
                }
                Commands::Preview {
                    depth,
                    max_items,
                    focus,
                } => {
                    let db = container.catalog.load(&path)?;
                    let opts = PreviewOptions {
                        depth: depth.unwrap_or(container.settings.preview.depth),
                        max_items: max_items.unwrap_or(container.settings.preview.max_items),
                        focus: focus.clone(),
                    };
                    if opts.max_items == 0 {
                        return Err(CliError::InvalidArgs(
                            "--max-items must be at least 1".to_string(),
                        ));
                    }
                    let tree = build_preview(&db, &opts)?;
                    print!("{}", tree);
                    Ok(())
                }
                Commands::Convert { output: target } => {
                    cmd_convert(&container, &path, target.as_deref())
                }
                Commands::Config { .. } | Commands::Completion { .. } => Ok(()),
            }
        }
    }
}

fn project_dir(cli: &Cli) -> CliResult<PathBuf> {
    match &cli.project_dir {
        Some(dir) => Ok(expand_path(dir)),
        None => std::env::current_dir()
            .map_err(|e| InfraError::io("determine current directory", e).into()),
    }
}

/// `--db` wins over the configured database.
fn database_path(cli: &Cli, container: &ServiceContainer) -> CliResult<PathBuf> {
    if let Some(db) = &cli.database {
        return Ok(expand_path(db));
    }
    container
        .settings
        .database
        .clone()
        .ok_or_else(|| crate::application::ApplicationError::NoDatabase.into())
}

#[instrument(skip(container))]
fn cmd_validate(container: &ServiceContainer, path: &Path, deep: bool) -> CliResult<()> {
    let report = container.catalog.check(path, deep)?;
    output::success(&format!(
        "{}: valid {} database, {} levels, {} channels",
        path.display(),
        report.format,
        report.levels,
        report.channels
    ));
    for diagnostic in &report.diagnostics {
        output::warning(diagnostic);
    }

    let Some(enumeration) = report.enumeration else {
        return Ok(());
    };
    output::detail(&format!(
        "enumerated {} channels, digest {}",
        enumeration.enumerated,
        short_digest(&enumeration.digest)
    ));
    if enumeration.enumerated != report.channels {
        output::failure(&format!(
            "enumerated {} channels but computed {}",
            enumeration.enumerated, report.channels
        ));
        return Err(CliError::Check("channel count mismatch".to_string()));
    }
    if enumeration.duplicates.is_empty() {
        output::success_detail(&"all identifiers unique");
        return Ok(());
    }
    for id in &enumeration.duplicates {
        output::failure(&format!("duplicate identifier {}", id));
    }
    Err(CliError::Check(format!(
        "{} duplicate identifier(s)",
        enumeration.duplicates.len()
    )))
}

#[instrument(skip(db))]
fn cmd_list(db: &Database, limit: Option<usize>, paths: bool) -> CliResult<()> {
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let channels = db.enumerate_all().take(limit.unwrap_or(usize::MAX));
    for channel in channels {
        let written = if paths {
            writeln!(out, "{}\t{}", channel.identifier, channel.path)
        } else {
            writeln!(out, "{}", channel.identifier)
        };
        match written {
            Ok(()) => {}
            // Reader went away (e.g. `| head`)
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
            Err(e) => return Err(InfraError::io("write channel list", e).into()),
        }
    }
    match out.flush() {
        Err(e) if e.kind() != io::ErrorKind::BrokenPipe => {
            Err(InfraError::io("write channel list", e).into())
        }
        _ => Ok(()),
    }
}

#[instrument(skip(db))]
fn cmd_children(db: &Database, prefix: &[String]) -> CliResult<()> {
    match db.children_at(prefix) {
        Choices::Branches { level, branches } => {
            output::header(&format!("{} ({})", level.name, branches.len()));
            for branch in branches {
                let mut notes = Vec::new();
                if let Some(part) = branch.channel_part.as_deref().filter(|p| *p != branch.key) {
                    notes.push(format!("part '{}'", part));
                }
                if branch.is_channel() {
                    notes.push("channel".to_string());
                }
                if let Some(desc) = &branch.description {
                    notes.push(desc.clone());
                }
                let note = (!notes.is_empty()).then(|| notes.join(", "));
                output::choice(&branch.key, note.as_deref());
            }
            Ok(())
        }
        Choices::Instances {
            level,
            expansion,
            description,
        } => {
            output::header(&format!("{} ({} values)", level.name, expansion.len()));
            output::choice(&expansion.to_string(), description);
            Ok(())
        }
        Choices::Terminal => {
            output::info(&"(leaf: no further choices)");
            Ok(())
        }
        Choices::Invalid(invalid) => Err(CliError::Unresolved(invalid.to_string())),
    }
}

#[instrument(skip(db))]
fn cmd_resolve(db: &Database, prefix: &[String]) -> CliResult<()> {
    match db.resolve(prefix) {
        Resolution::Leaf { identifier, path } => {
            debug!("path: {}", path);
            output::info(&identifier);
            Ok(())
        }
        Resolution::Ambiguous {
            remaining_levels,
            channel: Some(channel),
        } => {
            output::info(&channel);
            output::warning(&format!(
                "{} is itself a channel; deeper levels remain: {}",
                channel,
                remaining_levels.iter().join(", ")
            ));
            Ok(())
        }
        Resolution::Ambiguous {
            remaining_levels,
            channel: None,
        } => Err(CliError::Unresolved(format!(
            "ambiguous prefix, choices remain at: {}",
            remaining_levels.iter().join(", ")
        ))),
        Resolution::Invalid(invalid) => Err(CliError::Unresolved(invalid.to_string())),
    }
}

#[instrument(skip(container))]
fn cmd_convert(container: &ServiceContainer, path: &Path, target: Option<&Path>) -> CliResult<()> {
    let converted = container.catalog.convert(path)?;
    match target {
        Some(target) => {
            write_file(container.fs.as_ref(), target, &converted)?;
            output::action("Converted", &format!("{} -> {}", path.display(), target.display()));
        }
        None => output::info(&converted),
    }
    Ok(())
}

#[instrument]
fn cmd_config(command: &ConfigCommands, project_dir: &Path) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = Settings::load(Some(project_dir))?;
            print!("{}", settings.to_toml()?);
            Ok(())
        }
        ConfigCommands::Path => {
            let local = project_config_path(project_dir);
            match global_config_path() {
                Some(global) => output::detail(&format!(
                    "global: {} {}",
                    global.display(),
                    exists_marker(&global)
                )),
                None => output::detail(&"global: (no config directory on this platform)"),
            }
            output::detail(&format!(
                "local:  {} {}",
                local.display(),
                exists_marker(&local)
            ));
            Ok(())
        }
        ConfigCommands::Init { global } => {
            let target = if *global {
                global_config_path().ok_or_else(|| {
                    CliError::Usage("no global config directory on this platform".to_string())
                })?
            } else {
                project_config_path(project_dir)
            };
            let fs = RealFileSystem;
            if fs.exists(&target) {
                return Err(CliError::Usage(format!(
                    "config already exists: {}",
                    target.display()
                )));
            }
            write_file(&fs, &target, &Settings::template())?;
            output::action("Created", &target.display());
            Ok(())
        }
    }
}

fn write_file(fs: &dyn FileSystem, target: &Path, content: &str) -> InfraResult<()> {
    fs.ensure_parent(target)
        .map_err(|e| InfraError::io(format!("create parent of {}", target.display()), e))?;
    fs.write(target, content)
        .map_err(|e| InfraError::io(format!("write {}", target.display()), e))
}

fn exists_marker(path: &Path) -> &'static str {
    if path.exists() {
        "(exists)"
    } else {
        "(not found)"
    }
}
