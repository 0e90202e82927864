use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use pkiup_core::{default_instance_root, default_upgrade_root, Version};
use pkiup_engine::{ActionCatalog, Upgrader, UpgraderOptions, VersionStage};

mod console;
mod render;
#[cfg(test)]
mod tests;

use console::{ProgressConsole, StdioConsole};
use render::{current_output_style, render_status_line, OutputStyle, StageProgress};

#[derive(Parser, Debug)]
#[command(name = "pki-upgrade")]
#[command(about = "Tracks and replays PKI instance upgrade steps", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    instance_root: Option<PathBuf>,
    #[arg(long, global = true)]
    upgrade_root: Option<PathBuf>,
    #[arg(long, global = true)]
    target_version: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Run {
        #[arg(long)]
        version: Option<String>,
        #[arg(long, requires = "version")]
        index: Option<u32>,
        #[arg(long)]
        silent: bool,
        #[arg(long)]
        verbose: bool,
    },
    Status,
    ResetTracker,
    RemoveTracker,
    Doctor,
    Version,
    Completions {
        #[arg(long, value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let Cli {
        instance_root,
        upgrade_root,
        target_version,
        command,
    } = Cli::parse();

    match command {
        Commands::Run {
            version,
            index,
            silent,
            verbose,
        } => {
            let options = build_options(
                instance_root,
                upgrade_root,
                target_version.as_deref(),
                version.as_deref(),
                index,
                silent,
                verbose,
            )?;
            run_upgrade_command(options)
        }
        Commands::Status => {
            let options = build_options(
                instance_root,
                upgrade_root,
                target_version.as_deref(),
                None,
                None,
                true,
                false,
            )?;
            run_status_command(options)
        }
        Commands::ResetTracker => {
            let options = build_options(
                instance_root,
                upgrade_root,
                target_version.as_deref(),
                None,
                None,
                true,
                false,
            )?;
            run_reset_tracker_command(options)
        }
        Commands::RemoveTracker => {
            let options = build_options(
                instance_root,
                upgrade_root,
                target_version.as_deref(),
                None,
                None,
                true,
                false,
            )?;
            run_remove_tracker_command(options)
        }
        Commands::Doctor => {
            let options = build_options(
                instance_root,
                upgrade_root,
                target_version.as_deref(),
                None,
                None,
                true,
                false,
            )?;
            run_doctor_command(options)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "pki-upgrade", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn build_options(
    instance_root: Option<PathBuf>,
    upgrade_root: Option<PathBuf>,
    target_version: Option<&str>,
    version_filter: Option<&str>,
    index_filter: Option<u32>,
    silent: bool,
    verbose: bool,
) -> Result<UpgraderOptions> {
    let target = match target_version {
        Some(text) => Version::parse(text)?,
        None => Version::parse(env!("CARGO_PKG_VERSION"))
            .context("invalid build-time package version")?,
    };
    let version_filter = version_filter.map(Version::parse).transpose()?;

    Ok(UpgraderOptions {
        instance_root: instance_root.unwrap_or_else(default_instance_root),
        upgrade_root: upgrade_root.unwrap_or_else(default_upgrade_root),
        target,
        version_filter,
        index_filter,
        silent,
        verbose,
    })
}

fn run_upgrade_command(options: UpgraderOptions) -> Result<()> {
    let style = current_output_style();
    let silent = options.silent;
    let mut upgrader = Upgrader::open(options, ActionCatalog::builtin())?;

    let stages = upgrader.discover_versions()?;
    if upgrader.verbose() {
        print_pending_plan(&upgrader, &stages)?;
    }

    if stages.is_empty() {
        return report_outcome(style, &upgrader);
    }

    if silent && style == OutputStyle::Rich {
        run_stages_with_progress(&mut upgrader, &stages, style)?;
    } else {
        let mut console = StdioConsole::new(upgrader.verbose());
        for stage in &stages {
            upgrader.run_version(&mut console, stage)?;
        }
    }

    report_outcome(style, &upgrader)
}

fn run_stages_with_progress(
    upgrader: &mut Upgrader,
    stages: &[VersionStage],
    style: OutputStyle,
) -> Result<()> {
    let mut total = 0_u64;
    for stage in stages {
        total += upgrader.discover_scriptlets(&stage.version)?.len() as u64;
    }

    let mut console = ProgressConsole::new(
        StageProgress::start(style, "upgrade", total),
        upgrader.verbose(),
    );
    for stage in stages {
        match upgrader.run_version(&mut console, stage) {
            Ok(summary) => {
                let steps = (summary.applied + summary.skipped + summary.failed) as u64;
                console.advance(steps);
            }
            Err(err) => {
                console.finish_abandon();
                return Err(err);
            }
        }
    }
    console.finish_success();
    Ok(())
}

fn print_pending_plan(upgrader: &Upgrader, stages: &[VersionStage]) -> Result<()> {
    for stage in stages {
        let steps = upgrader.discover_scriptlets(&stage.version)?;
        println!(
            "pending version {} ({} steps, next {})",
            stage.version,
            steps.len(),
            stage.next
        );
    }
    Ok(())
}

fn report_outcome(style: OutputStyle, upgrader: &Upgrader) -> Result<()> {
    let tracked = upgrader.tracker().version()?;
    if upgrader.is_complete()? {
        println!(
            "{}",
            render_status_line(
                style,
                "done",
                &format!("upgrade complete: version {tracked}")
            )
        );
        return Ok(());
    }

    let index = upgrader.tracker().index()?;
    let state = if index > 0 {
        format!("version {tracked}, last completed step {index}")
    } else {
        format!("version {tracked}")
    };
    println!(
        "{}",
        render_status_line(
            style,
            "pending",
            &format!("upgrade incomplete: {state}, target {}", upgrader.target())
        )
    );
    Ok(())
}

fn run_status_command(options: UpgraderOptions) -> Result<()> {
    let style = current_output_style();
    let upgrader = Upgrader::open(options, ActionCatalog::builtin())?;

    println!("tracker: {}", upgrader.tracker().path().display());
    println!("tracked version: {}", upgrader.tracker().version()?);
    let index = upgrader.tracker().index()?;
    if index > 0 {
        println!("last completed step: {index}");
    }
    println!("target version: {}", upgrader.target());

    let stages = upgrader.discover_versions()?;
    print_pending_plan(&upgrader, &stages)?;

    report_outcome(style, &upgrader)
}

fn run_reset_tracker_command(options: UpgraderOptions) -> Result<()> {
    let style = current_output_style();
    let mut upgrader = Upgrader::open(options, ActionCatalog::builtin())?;
    upgrader.reset_tracker()?;
    println!(
        "{}",
        render_status_line(
            style,
            "done",
            &format!("tracker reset to version {}", upgrader.target())
        )
    );
    Ok(())
}

fn run_remove_tracker_command(options: UpgraderOptions) -> Result<()> {
    let style = current_output_style();
    let mut upgrader = Upgrader::open(options, ActionCatalog::builtin())?;
    upgrader.remove_tracker()?;
    println!(
        "{}",
        render_status_line(style, "done", "tracker state removed")
    );
    Ok(())
}

fn run_doctor_command(options: UpgraderOptions) -> Result<()> {
    let style = current_output_style();
    let upgrade_root = options.upgrade_root.clone();
    let catalog = ActionCatalog::builtin();
    let actions = catalog.action_names().join(", ");
    let upgrader = Upgrader::open(options, catalog)?;

    println!("instance root: {}", upgrader.layout().root().display());
    println!("tracker file: {}", upgrader.tracker().path().display());
    println!("upgrade root: {}", upgrade_root.display());
    println!("tracked version: {}", upgrader.tracker().version()?);
    println!("target version: {}", upgrader.target());
    println!("actions: {actions}");

    let stages = upgrader.discover_versions()?;
    let mut steps = 0_usize;
    for stage in &stages {
        steps += upgrader.discover_scriptlets(&stage.version)?.len();
    }
    println!("pending versions: {}", stages.len());
    println!("pending steps: {steps}");
    println!(
        "{}",
        render_status_line(style, "ok", "upgrade tree is well-formed")
    );
    Ok(())
}
