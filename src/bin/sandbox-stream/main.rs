//! Sandbox stream server - run sandboxed commands and stream their output

mod cli;
mod logging;

use clap::Parser;
use cli::Cli;
use console::style;
use sandbox_stream::StreamServer;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    logging::init_logger(cli.verbose);

    let server = match StreamServer::new(cli.into_config()) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    server.run().await
}
