//! SpinBook command-line runner

use anyhow::Result;
use clap::Parser;

use sb_cli::{Cli, KernelRegistry, run};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    log::debug!("spinbook {} {:?}", sb_core::VERSION, cli);

    run(&cli, &KernelRegistry::with_builtin())?;
    Ok(())
}
