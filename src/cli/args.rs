//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Hierarchical channel naming: compile a level schema into channel names and navigate it
#[derive(Parser, Debug)]
#[command(name = "chnav")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output, repeat for more (-d, -dd, -ddd)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Project directory for local config (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    /// Channel database (default: `database` from config)
    #[arg(long = "db", global = true, value_hint = ValueHint::FilePath)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the database and report every violation
    Validate {
        /// Also enumerate all channels: duplicates and digest
        #[arg(long)]
        deep: bool,
    },

    /// Enumerate channel identifiers
    List {
        /// Stop after N channels
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Print the channel count only (computed, not enumerated)
        #[arg(long, conflicts_with = "digest")]
        count: bool,
        /// Print a SHA-256 digest of the full listing
        #[arg(long)]
        digest: bool,
        /// Show the resolved path next to each identifier
        #[arg(short, long)]
        paths: bool,
    },

    /// Show the valid next choices after a prefix
    Children {
        /// Navigational keys, one per chosen level
        prefix: Vec<String>,
    },

    /// Resolve a prefix to a channel identifier
    Resolve {
        /// Navigational keys, one per chosen level
        prefix: Vec<String>,
    },

    /// Print the hierarchy as a tree
    Preview {
        /// Levels to show (default: from config)
        #[arg(long)]
        depth: Option<usize>,
        /// Children per node (default: from config)
        #[arg(long)]
        max_items: Option<usize>,
        /// Start at this prefix, keys separated by '/'
        #[arg(long, value_delimiter = '/')]
        focus: Vec<String>,
    },

    /// Convert a legacy document to the explicit format
    Convert {
        /// Write to file instead of stdout
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Create config template
    Init {
        /// Create global config
        #[arg(short, long)]
        global: bool,
    },

    /// Show config paths
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn given_focus_with_slashes_when_parsing_then_splits_keys() {
        let cli = Cli::try_parse_from(["chnav", "preview", "--focus", "MAG/QF"]).unwrap();
        let Some(Commands::Preview { focus, .. }) = cli.command else {
            panic!("expected preview");
        };
        assert_eq!(focus, vec!["MAG", "QF"]);
    }

    #[test]
    fn given_repeated_debug_flag_when_parsing_then_counts() {
        let cli = Cli::try_parse_from(["chnav", "-dd", "--db", "x.json", "resolve", "A"]).unwrap();
        assert_eq!(cli.debug, 2);
        assert_eq!(cli.database, Some(PathBuf::from("x.json")));
    }
}
