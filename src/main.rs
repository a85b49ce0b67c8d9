use buy_vs_rent::api::{Cli, Command, CommandError, run_http_server, run_project_command};
use clap::Parser;

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Project { args, format } => match run_project_command(&args, format) {
            Ok(rendered) => print!("{rendered}"),
            Err(CommandError::Projection(err)) => {
                for violation in err.violations() {
                    eprintln!("invalid parameter: {violation}");
                }
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("Output error: {e}");
                std::process::exit(1);
            }
        },
        Command::Serve { port } => {
            if let Err(e) = run_http_server(port).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
        }
    }
}
