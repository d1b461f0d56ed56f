use clap::Parser;
use kiln_cli::{
    cli::{Cli, Command},
    commands, error, logger,
};

#[tokio::main]
async fn main() -> miette::Result<()> {
    let args = Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);

    let result = match args.command {
        Command::Build(build_args) => commands::build::execute(build_args, args.quiet).await,
    };

    result.map_err(error::cli_error_to_miette)
}
