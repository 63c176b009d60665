use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use mio::Poll;

use httpserver::config::Config;
use httpserver::server::{Server, RUN_FLAG};

extern "C" fn handle_sigpipe(_signum: libc::c_int) {}

extern "C" fn handle_term_signal(_signum: libc::c_int) {
    RUN_FLAG.store(false, Ordering::Relaxed);
}

fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGPIPE, handle_sigpipe as usize as libc::sighandler_t);
        libc::signal(libc::SIGABRT, handle_term_signal as usize as libc::sighandler_t);
        libc::signal(libc::SIGINT, handle_term_signal as usize as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handle_term_signal as usize as libc::sighandler_t);
    }
}

fn main() -> ExitCode {
    let config = match Config::load(Path::new("server.config")) {
        Ok(config) => config,
        Err(e) => {
            srvlog::errors!("{e}");
            return ExitCode::FAILURE;
        }
    };
    config.display();

    install_signal_handlers();

    let poll = match Poll::new() {
        Ok(poll) => poll,
        Err(e) => {
            srvlog::errors!("failed to create event notifier: {e}");
            return ExitCode::FAILURE;
        }
    };

    let server = match Server::new(&config, &poll) {
        Ok(server) => server,
        Err(e) => {
            srvlog::errors!("{e}");
            return ExitCode::FAILURE;
        }
    };

    srvlog::info!("listening on 0.0.0.0:{}", config.port);

    match server.run(poll) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            srvlog::errors!("{e}");
            ExitCode::FAILURE
        }
    }
}
