//! semmodel CLI entry point.
//!
//! Parses arguments, runs the selected command, and renders any failure
//! through the colored error display before exiting non-zero.

use clap::Parser;
use semmodel_cli::cli::Cli;
use semmodel_cli::core::display_error;

fn main() {
    let cli = Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    if let Err(e) = cli.execute() {
        display_error(&e);
        std::process::exit(1);
    }
}
