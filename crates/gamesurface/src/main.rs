mod bindings;
mod cli;
#[cfg(feature = "egl")]
mod preview;
mod run;

use anyhow::Result;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::run(cli)
}
