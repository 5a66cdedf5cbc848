#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

mod application;
mod configuration;
mod domain;
mod infrastructure;

use std::env;
use std::process;

use anyhow::Error;
use yansi::Paint;

use crate::application::api;
use crate::application::cli;
use crate::application::console;

fn handle_error(err: Error) {
    eprintln!(
        "{}",
        Paint::red(format!(
            "Easel has failed with the following version and error.\n\nVersion: {}\nError: {}",
            env!("CARGO_PKG_VERSION"),
            err
        ))
    );

    let backtrace = err.backtrace();
    if backtrace.to_string() == "disabled backtrace" {
        let args = env::args().collect::<Vec<String>>().join(" ");
        eprintln!("\nRunning the following can help explain further what the issue is:");
        eprintln!("\nRUST_BACKTRACE=1 {args}");
    } else {
        eprintln!("\n{}", backtrace);
    }

    process::exit(1);
}

#[tokio::main]
async fn main() {
    let debug_log_dir = env::var("EASEL_LOG_DIR").unwrap_or_else(|_| {
        return dirs::cache_dir()
            .unwrap()
            .join("easel")
            .to_string_lossy()
            .to_string();
    });

    let file_appender = tracing_appender::rolling::never(debug_log_dir, "debug.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    if env::var("RUST_LOG")
        .unwrap_or_else(|_| return "".to_string())
        .contains("easel")
    {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(writer)
            .init();
    }

    let dispatch = match cli::parse().await {
        Ok(dispatch) => dispatch,
        Err(err) => {
            handle_error(err);
            return;
        }
    };

    let res = match dispatch {
        cli::Dispatch::Exit => Ok(()),
        cli::Dispatch::Serve => api::serve().await,
        cli::Dispatch::Run { task, code } => console::start(task, code).await,
    };

    if let Err(err) = res {
        handle_error(err);
    }

    process::exit(0);
}
