//! `tidemark hash` command handler

use std::io::Write;

use serde::Serialize;

use tidemark_session::navigation_hash;

use crate::cli::HashArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `hash` command.
pub fn execute(args: HashArgs, writer: &OutputWriter) -> Result<(), CliError> {
    let report = HashReport {
        hash: navigation_hash(&args.url),
        url: args.url,
    };
    writer.render(&report)
}

/// Navigation hash of a URL.
#[derive(Debug, Serialize)]
pub struct HashReport {
    pub url: String,
    pub hash: String,
}

impl Render for HashReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "{}", self.hash)
    }
}
