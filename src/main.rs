use log::error;
use std::io;
use std::process;

use ws::cli::Cli;
use ws::config::{AppConfig, AppPaths};
use ws::log_tail::{self, TAIL_LINES};
use ws::logger::{self, CRITICAL_TARGET};
use ws::server::StaticServer;
use ws::supervisor::{self, ServerCommand, Supervisor};

fn main() {
    let cli = Cli::parse_normalized();

    if cli.serve {
        process::exit(serve(cli.port));
    }

    let code = launch(&cli);
    log::logger().flush();
    process::exit(code);
}

/// Child mode: serve the working directory until killed.
fn serve(port: u16) -> i32 {
    logger::init_serve_console();

    let root = match std::env::current_dir() {
        Ok(root) => root,
        Err(e) => {
            error!("Can't determine the working directory: {}", e);
            return 1;
        }
    };

    match StaticServer::bind(port, root) {
        Ok(server) => {
            server.run();
            0
        }
        Err(e) => {
            error!("Can't bind port {}: {}", port, e);
            1
        }
    }
}

fn launch(cli: &Cli) -> i32 {
    let paths = match AppPaths::resolve() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };

    let config = AppConfig::load(&paths.config_file());
    if let Err(e) = config.persist(&paths.config_file()) {
        eprintln!("{e}");
        return 1;
    }

    let (_logger, log_path) =
        match logger::init(&config, config.style(), cli.log_level, &paths.log_file()) {
            Ok(initialized) => initialized,
            Err(e) => {
                eprintln!("{e}");
                return 1;
            }
        };

    if cli.log {
        let shown = log_tail::tail(&log_path, TAIL_LINES, &mut io::stdout().lock());
        if let Err(e) = shown {
            error!("Can't read log file {}: {}", log_path.display(), e);
            return 1;
        }
        return 0;
    }

    let interrupts = match supervisor::interrupt_channel() {
        Ok(rx) => rx,
        Err(e) => {
            error!(target: CRITICAL_TARGET, "Can't install the Ctrl+C handler: {}", e);
            return 1;
        }
    };

    let command = match ServerCommand::for_port(cli.port) {
        Ok(command) => command,
        Err(e) => {
            error!("Error starting the web server: {}", e);
            return 1;
        }
    };

    Supervisor::new(cli.port).run(&command, &interrupts)
}
