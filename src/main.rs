//! # tidy CLI
//!
//! Command-line interface for the file organizer.
//!
//! ## Usage
//! ```bash
//! tidy run
//! tidy run --scope ~/Downloads --output json
//! tidy watch --config ./tidy.json
//! tidy check
//! ```

mod cli;

use file_tidy::Result;

fn main() -> Result<()> {
    file_tidy::init_tracing();
    cli::run()
}
