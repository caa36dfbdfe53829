use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use mqlhelp::formatter::Mode;

#[derive(Debug, Parser)]
#[command(
    name = "mqlhelp",
    about = "Offline MQL5 documentation lookup and compiler error knowledge base"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Directory holding MQL5_HELP, MQL5_Algo_Book and Neural_Networks_Book
    #[arg(long, global = true)]
    pub docs_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start MCP server for AI agent integration
    Mcp,
    /// Answer an error message, function name or question
    Query(QueryArgs),
    /// Search documentation keys
    Search(SearchArgs),
    /// Print a documentation page
    Get(GetArgs),
    /// Browse documentation categories
    Browse {
        /// Category to list (omit for all categories)
        category: Option<String>,
    },
    /// Manage the compiler error database
    Errors {
        #[command(subcommand)]
        action: ErrorsAction,
    },
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Quick,
    Detailed,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Quick => Mode::Quick,
            ModeArg::Detailed => Mode::Detailed,
        }
    }
}

#[derive(Debug, Parser)]
pub struct QueryArgs {
    /// The query text
    pub query: String,

    /// Answer verbosity
    #[arg(short, long, value_enum, default_value = "quick")]
    pub mode: ModeArg,

    /// Output the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Keyword or error text
    pub query: String,

    /// Number of results to return
    #[arg(short = 'n', long, default_value = "10")]
    pub count: usize,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct GetArgs {
    /// Document name, extension optional
    pub filename: String,
}

// -- Error database --

#[derive(Debug, Subcommand)]
pub enum ErrorsAction {
    /// Record an occurrence of a compiler error
    Log {
        /// Error code, e.g. E512
        code: String,
        /// Full error message
        message: String,
        /// Source file the error came from
        #[arg(long)]
        file: Option<String>,
        /// How the error was fixed
        #[arg(long)]
        solution: Option<String>,
        /// Related documents as a JSON array
        #[arg(long)]
        related_docs: Option<String>,
    },
    /// List the most frequent errors
    List {
        /// Number of errors to list
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },
    /// Find errors by code or by keywords
    Search {
        /// Error code (e.g. E512) or free text
        query: String,
        /// Only match messages containing this text (needs an error code in the query)
        #[arg(long)]
        message: Option<String>,
    },
    /// Print the database as JSON
    Export {
        /// Drop file paths
        #[arg(long)]
        anonymize: bool,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Merge a JSON export into the database
    Import {
        /// File to read, or "-" for stdin
        input: PathBuf,
    },
    /// Show database statistics
    Stats,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "mqlhelp",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_query_defaults() {
        let cli = Cli::parse_from(["mqlhelp", "query", "OrderSend"]);
        match cli.command {
            Command::Query(args) => {
                assert_eq!(args.query, "OrderSend");
                assert_eq!(Mode::from(args.mode), Mode::Quick);
                assert!(!args.json);
            }
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn parse_errors_log_with_options() {
        let cli = Cli::parse_from([
            "mqlhelp",
            "--data-dir",
            "/tmp/data",
            "errors",
            "log",
            "E512",
            "undeclared identifier 'ResultCode'",
            "--solution",
            "Use ResultRetcode()",
        ]);
        assert_eq!(cli.data_dir.as_deref(), Some(std::path::Path::new("/tmp/data")));
        match cli.command {
            Command::Errors {
                action:
                    ErrorsAction::Log {
                        code,
                        solution,
                        file,
                        ..
                    },
            } => {
                assert_eq!(code, "E512");
                assert_eq!(solution.as_deref(), Some("Use ResultRetcode()"));
                assert!(file.is_none());
            }
            _ => panic!("expected errors log command"),
        }
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["mqlhelp", "-v", "-q", "mcp"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
