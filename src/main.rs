// podtunnel 入口

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use podtunnel::cli::Cli;
use podtunnel::commands::StaticRegistry;
use podtunnel::runner;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // 日志写到 stderr，stdout 只输出响应
    // RUST_LOG 可覆盖，例如：RUST_LOG=russh=debug
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match try_main(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn try_main(cli: Cli) -> anyhow::Result<u8> {
    if cli.list_commands {
        runner::list_commands(&StaticRegistry, &mut io::stdout().lock())
            .context("failed to write command list")?;
        return Ok(0);
    }

    let config = cli.into_run_config()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    Ok(runtime.block_on(runner::run(config)))
}
