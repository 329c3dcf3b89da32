//! REPL (Read-Eval-Print Loop) functionality for Weave
//!
//! This module provides interactive command-line interface components that wrap
//! the composition registry with user-friendly features like:
//! - Command history and editing
//! - REPL commands (.help, .load, .describe, etc.)
//! - Output formatting and notifications

use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{anyhow, Result};
use weave_core::{
    ClassContext, CompositionRegistry, MemberVisibility, MixinKind, TypeUniverse, WeaveConfig,
};

use crate::manifest;

pub mod commands;
pub mod notifier;

pub use commands::ReplCommand;
pub use notifier::{BufferedNotifier, DefaultNotifier, ReplNotifier};

/// Build outcome of one configured class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationEntry {
    pub class: String,
    /// Mixin count of the built definition, or the build error
    pub outcome: std::result::Result<usize, String>,
}

impl ValidationEntry {
    pub fn is_failure(&self) -> bool {
        self.outcome.is_err()
    }

    pub fn line(&self) -> String {
        match &self.outcome {
            Ok(mixins) => format!("  ok      {} ({} mixins)", self.class, mixins),
            Err(error) => format!("  FAILED  {}: {}", self.class, error),
        }
    }
}

/// Per-class outcome of building every configured class
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub entries: Vec<ValidationEntry>,
}

impl ValidationReport {
    pub fn failures(&self) -> usize {
        self.entries.iter().filter(|e| e.is_failure()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }

    /// Names of the classes that failed to build
    pub fn failed_classes(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.is_failure())
            .map(|e| e.class.as_str())
            .collect()
    }

    pub fn summary(&self) -> String {
        format!("{} classes, {} failed", self.entries.len(), self.failures())
    }

    pub fn render(&self) -> String {
        let mut lines: Vec<String> = self.entries.iter().map(ValidationEntry::line).collect();
        lines.push(self.summary());
        lines.join("\n")
    }
}

/// Interactive inspector for mixin configurations
pub struct Repl {
    /// Registry over the loaded manifest
    registry: Option<CompositionRegistry>,
    /// Manifest the registry was loaded from
    source: Option<PathBuf>,
    /// Engine configuration used for every load
    config: WeaveConfig,
    /// Current notifier for output
    notifier: Box<dyn ReplNotifier>,
    /// Whether the REPL is running
    running: bool,
    /// Quiet mode (suppress timing info)
    quiet: bool,
}

impl Repl {
    /// Create a new REPL with no model loaded
    pub fn new(config: WeaveConfig) -> Self {
        Self {
            registry: None,
            source: None,
            config,
            notifier: Box::new(DefaultNotifier),
            running: true,
            quiet: false,
        }
    }

    /// Create a REPL and load a manifest into it
    pub fn with_manifest<P: AsRef<Path>>(path: P, config: WeaveConfig) -> Result<Self> {
        let mut repl = Self::new(config);
        repl.load(path.as_ref())?;
        Ok(repl)
    }

    /// Set the notifier for this REPL
    pub fn set_notifier(&mut self, notifier: Box<dyn ReplNotifier>) {
        self.notifier = notifier;
    }

    /// Get a reference to the current notifier
    pub fn notifier(&self) -> &dyn ReplNotifier {
        self.notifier.as_ref()
    }

    /// Check if the REPL is still running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Set quiet mode
    pub fn set_quiet(&mut self, quiet: bool) {
        self.quiet = quiet;
    }

    pub fn is_debug(&self) -> bool {
        self.config.debug
    }

    /// Set debug mode
    pub fn set_debug(&mut self, debug: bool) {
        self.config.debug = debug;
    }

    pub fn registry(&self) -> Option<&CompositionRegistry> {
        self.registry.as_ref()
    }

    /// Parse REPL input into a command
    pub fn parse_input(&self, input: &str) -> Result<ReplCommand> {
        commands::parse_command(input)
    }

    /// Handle a REPL command
    pub fn handle_command(&mut self, command: ReplCommand) -> Result<String> {
        match command {
            ReplCommand::Help => Ok(self.get_help_text()),
            ReplCommand::Quit => {
                self.running = false;
                Ok("Goodbye!".to_string())
            }
            ReplCommand::Clear => {
                print!("\x1B[2J\x1B[1;1H");
                Ok("Screen cleared.".to_string())
            }
            ReplCommand::Quiet => {
                self.quiet = !self.quiet;
                Ok(format!(
                    "Quiet mode: {}",
                    if self.quiet { "on" } else { "off" }
                ))
            }
            ReplCommand::Debug => {
                self.config.debug = !self.config.debug;
                Ok(format!(
                    "Debug mode: {}",
                    if self.config.debug { "on" } else { "off" }
                ))
            }
            ReplCommand::Load(path) => self.load(Path::new(&path)),
            ReplCommand::Classes => self.list_classes(),
            ReplCommand::Context(class) => self.show_context(&class),
            ReplCommand::Describe(class) => self.describe(&class),
            ReplCommand::Validate => Ok(self.validate()?.render()),
        }
    }

    /// Handle a command, measuring how long it took
    pub fn execute(&mut self, command: ReplCommand) -> Result<(String, u64)> {
        let start = Instant::now();
        let output = self.handle_command(command)?;
        Ok((output, start.elapsed().as_millis() as u64))
    }

    fn loaded(&self) -> Result<&CompositionRegistry> {
        self.registry
            .as_ref()
            .ok_or_else(|| anyhow!("No manifest loaded. Use .load <manifest.json>"))
    }

    /// Load a manifest, replacing the current model
    pub fn load(&mut self, path: &Path) -> Result<String> {
        let loaded = manifest::load_file(path)?;
        let classes = loaded.configuration.len();
        let types = loaded.universe.type_count();
        self.registry = Some(CompositionRegistry::with_config(
            loaded.universe,
            loaded.configuration,
            self.config.clone(),
        ));
        self.source = Some(path.to_path_buf());
        Ok(format!(
            "Loaded {} types and {} configured classes from {}",
            types,
            classes,
            path.display()
        ))
    }

    fn list_classes(&self) -> Result<String> {
        let registry = self.loaded()?;
        let universe = registry.universe();
        let configuration = registry.configuration();
        if configuration.is_empty() {
            return Ok("No configured classes.".to_string());
        }
        let lines: Vec<String> = configuration
            .configured_classes()
            .filter_map(|class| {
                configuration.exact_context(class).map(|context| {
                    format!(
                        "  {} ({} mixins)",
                        universe.name(class),
                        context.mixin_count()
                    )
                })
            })
            .collect();
        Ok(format!("Configured classes:\n{}", lines.join("\n")))
    }

    fn show_context(&self, class: &str) -> Result<String> {
        let registry = self.loaded()?;
        let universe = registry.universe();
        let class_type = manifest::lookup(universe, class)?;
        match registry.class_context(class_type) {
            Some(context) => Ok(format_context(universe, &context, self.config.debug)),
            None => Ok(format!("'{}' has no mixin configuration.", universe.name(class_type))),
        }
    }

    fn describe(&self, class: &str) -> Result<String> {
        let registry = self.loaded()?;
        let universe = registry.universe();
        let class_type = manifest::lookup(universe, class)?;
        let definition = registry.target_class_definition(class_type)?;
        Ok(definition.describe(universe))
    }

    /// Build every configured class and report each outcome
    pub fn validate(&self) -> Result<ValidationReport> {
        let registry = self.loaded()?;
        let universe = registry.universe();
        let entries = registry
            .validate_all()
            .into_iter()
            .map(|(class, outcome)| ValidationEntry {
                class: universe.name(class).to_string(),
                outcome: outcome
                    .map(|definition| definition.mixins().len())
                    .map_err(|e| e.to_string()),
            })
            .collect();
        Ok(ValidationReport { entries })
    }

    /// Get help text
    fn get_help_text(&self) -> String {
        r#"Weave REPL Commands:
  .help              - Show this help message
  .quit              - Exit the REPL
  .clear             - Clear the screen
  .quiet             - Toggle quiet mode (hide timing info)
  .debug             - Toggle debug mode (show mixin origins)

Model Commands:
  .load <file>       - Load a JSON manifest
  .classes           - List configured target classes
  .context <class>   - Show the resolved class context
  .describe <class>  - Build and show the target class definition
  .validate          - Build every configured class

Class names are written as declared, e.g. Customer or Repository<Customer>."#
            .to_string()
    }

    /// Show exit statistics
    pub fn show_exit_stats(&self) {
        if self.quiet {
            return;
        }
        match (&self.registry, &self.source) {
            (Some(registry), Some(source)) => println!(
                "\nSession complete. {} definitions built from {}.",
                registry.cached_definition_count(),
                source.display()
            ),
            _ => println!("\nSession complete."),
        }
    }
}

fn format_context(universe: &TypeUniverse, context: &ClassContext, debug: bool) -> String {
    let mut lines = vec![format!("{}:", universe.name(context.class_type()))];
    if context.is_empty() {
        lines.push("  (no mixins)".to_string());
    }
    for mixin in context.mixins() {
        let kind = match mixin.kind() {
            MixinKind::Extending => "extends",
            MixinKind::Used => "used",
        };
        let visibility = match mixin.introduced_member_visibility() {
            MemberVisibility::Private => "private",
            MemberVisibility::Public => "public",
        };
        let mut line = format!("  {} ({kind}, {visibility})", universe.name(mixin.mixin_type()));
        if !mixin.explicit_dependencies().is_empty() {
            let dependencies: Vec<&str> = mixin
                .explicit_dependencies()
                .iter()
                .map(|d| universe.name(*d))
                .collect();
            line.push_str(&format!(" after {}", dependencies.join(", ")));
        }
        if debug {
            line.push_str(&format!("\n    from {}", mixin.origin()));
        }
        lines.push(line);
    }
    for interface in context.composed_interfaces() {
        lines.push(format!("  composed {}", universe.name(*interface)));
    }
    lines.join("\n")
}
