//! tmxbake - bake Tiled maps into engine ready json documents

use std::process::ExitCode;

use tmxbake::cli;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    cli::run()
}
