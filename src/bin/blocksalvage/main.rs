use anyhow::Result;
use env_logger::{Builder, Env};
use log::error;

mod cli;
mod util;
mod cmd_create;
mod cmd_put;
mod cmd_get;
mod cmd_addr;
mod cmd_salvage;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт - info.
    // Пример: RUST_LOG=debug blocksalvage salvage --path ./data.bs
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        // Логируем ошибку и выходим с кодом 1.
        error!("{:?}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse_args();
    match cli.cmd {
        cli::Cmd::Create { path, allocsize, checksum } =>
            cmd_create::exec(path, allocsize, checksum),

        cli::Cmd::Put { path, value, page_type, codec } =>
            cmd_put::exec(path, value, page_type, codec),

        cli::Cmd::Get { path, addr, out } =>
            cmd_get::exec(path, addr, out),

        cli::Cmd::Addr { addr } =>
            cmd_addr::exec(addr),

        cli::Cmd::Salvage { path, allocsize, max_page_size, json, commit } =>
            cmd_salvage::exec(path, allocsize, max_page_size, json, commit),
    }
}
