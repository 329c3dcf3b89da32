use std::{
    fs,
    io::{self, IsTerminal},
    process::ExitCode,
};

use anyhow::{bail, Result};
use clap::{Arg, ArgAction, Command};
use tracing_subscriber::EnvFilter;
use weave_core::{init_tracing, WeaveConfig};
use weave_repl::{Repl, ReplCommand};

fn main() -> Result<ExitCode> {
    // Parse command line arguments
    let matches = Command::new("weave-repl")
        .version(weave_core::VERSION)
        .about("Interactive inspector for Weave mixin configurations")
        .arg(
            Arg::new("manifest")
                .long("manifest")
                .short('m')
                .value_name("FILE")
                .help("JSON manifest to load on startup"),
        )
        .arg(
            Arg::new("validate")
                .long("validate")
                .help("Build every configured class, print the outcome and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("file")
                .value_name("SCRIPT")
                .help("Run REPL commands from a file instead of the terminal")
                .index(1),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Enable debug mode")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    // Extract command line options
    let manifest = matches.get_one::<String>("manifest").cloned();
    let script = matches.get_one::<String>("file").cloned();
    let validate = matches.get_flag("validate");
    let debug = matches.get_flag("debug");

    // Initialize logging
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("weave_core=debug,weave_repl=debug"))
            .init();
    } else {
        init_tracing();
    }

    let config = WeaveConfig {
        debug,
        ..Default::default()
    };
    let mut repl = Repl::new(config);

    if let Some(path) = &manifest {
        match repl.handle_command(ReplCommand::Load(path.clone())) {
            Ok(msg) => repl.notifier().on_output(&msg),
            Err(e) => {
                repl.notifier().on_error(&format!("Error: {e:#}"));
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    if validate {
        if manifest.is_none() {
            bail!("--validate requires --manifest <FILE>");
        }
        let report = repl.validate()?;
        repl.notifier().on_validation(&report);
        return Ok(if report.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    println!("Weave REPL v{}", weave_core::VERSION);
    if debug {
        println!("Debug mode: enabled");
    }
    println!("Type .help for help, .quit to exit");
    println!();

    run_repl(&mut repl, script)?;
    Ok(ExitCode::SUCCESS)
}

fn run_repl(repl: &mut Repl, script: Option<String>) -> Result<()> {
    use rustyline::{error::ReadlineError, DefaultEditor};

    let mut rl = DefaultEditor::new()?;

    let script_lines: Option<Vec<String>> = match script {
        Some(filename) => {
            let content = fs::read_to_string(filename)?;
            Some(content.lines().map(|s| s.to_string()).collect())
        }
        None => None,
    };

    let is_interactive = script_lines.is_none() && io::stdin().is_terminal();
    let mut script_iter = script_lines.as_ref().map(|lines| lines.iter());

    while repl.is_running() {
        // Get the next line from either the script or interactive input
        let line_result = match script_iter.as_mut() {
            Some(iter) => match iter.next() {
                Some(line) => Ok(line.clone()),
                None => break,
            },
            None => rl.readline("weave> "),
        };

        match line_result {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                rl.add_history_entry(trimmed)?;

                // Echo input in non-interactive mode
                if !is_interactive {
                    println!("weave> {trimmed}");
                }

                let command = match repl.parse_input(trimmed) {
                    Ok(command) => command,
                    Err(e) => {
                        repl.notifier().on_error(&format!("Error: {e}"));
                        continue;
                    }
                };

                if command == ReplCommand::Validate {
                    match repl.validate() {
                        Ok(report) => repl.notifier().on_validation(&report),
                        Err(e) => repl.notifier().on_error(&format!("Error: {e:#}")),
                    }
                } else if command.is_timed() {
                    match repl.execute(command) {
                        Ok((output, duration)) => {
                            repl.notifier().on_result(&output, duration, repl.is_quiet())
                        }
                        Err(e) => repl.notifier().on_error(&format!("Error: {e:#}")),
                    }
                } else {
                    match repl.handle_command(command) {
                        Ok(output) => repl.notifier().on_output(&output),
                        Err(e) => repl.notifier().on_error(&format!("Error: {e:#}")),
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Use .quit to exit");
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        }
    }

    // Show exit statistics
    repl.show_exit_stats();

    Ok(())
}
