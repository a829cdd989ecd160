//! List subcommand: extract and filter vault tasks from the command line.

use clap::Args;
use std::path::PathBuf;

/// Arguments for the list subcommand
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Query text, one clause per line (e.g. "not done")
    #[arg(short, long, conflicts_with = "query_file")]
    pub query: Option<String>,

    /// Read the query from a file
    #[arg(long, value_name = "FILE")]
    pub query_file: Option<PathBuf>,

    /// Output format: json or markdown
    #[arg(long, default_value = "markdown")]
    pub format: String,
}

impl ListArgs {
    /// The query text, empty when none was given.
    pub fn query_text(&self) -> std::io::Result<String> {
        match (&self.query, &self.query_file) {
            (Some(query), _) => Ok(query.replace("\\n", "\n")),
            (None, Some(path)) => std::fs::read_to_string(path),
            (None, None) => Ok(String::new()),
        }
    }
}
