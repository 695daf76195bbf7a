//! print-spool - print spool simulation
//!
//! Starts client threads that submit print jobs into a bounded buffer and
//! printer threads that drain it, then shuts everything down once the clients
//! are done.

use clap::{Parser, ValueEnum};
use print_spool::spool::{PageSource, SpoolConfig, SpoolController, SpoolReport};
use print_spool::sync::PrimitiveBackend;
use std::num::NonZeroUsize;
use std::process::ExitCode;
use std::time::Duration;

/// Where the buffer's synchronization primitives live
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Primitives {
    /// In-process semaphores
    Local,
    /// POSIX named semaphores (Linux)
    Named,
}

impl Primitives {
    fn platform_default() -> Self {
        if cfg!(target_os = "linux") {
            Primitives::Named
        } else {
            Primitives::Local
        }
    }

    fn backend(self) -> PrimitiveBackend {
        match self {
            Primitives::Local => PrimitiveBackend::InProcess,
            Primitives::Named => PrimitiveBackend::named(),
        }
    }
}

/// print-spool - clients submit print jobs to a bounded buffer, printers drain it
#[derive(Parser, Debug)]
#[command(name = "print-spool")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Number of client threads
    #[arg(short, long, default_value = "4")]
    clients: NonZeroUsize,

    /// Number of printer threads
    #[arg(short, long, default_value = "2")]
    printers: NonZeroUsize,

    /// Buffer capacity in jobs
    #[arg(short, long, default_value = "3")]
    buffer: NonZeroUsize,

    /// Jobs each client submits
    #[arg(short, long, default_value = "1")]
    jobs_per_client: NonZeroUsize,

    /// Largest page count of a job (page counts are random in 1..=N)
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..))]
    max_pages: u32,

    /// Simulated printing time per page in milliseconds
    #[arg(long, default_value = "50")]
    ms_per_page: u64,

    /// Synchronization primitive backend
    #[arg(long, value_enum, default_value_t = Primitives::platform_default())]
    primitives: Primitives,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn config(&self) -> SpoolConfig {
        SpoolConfig::new(
            self.clients.get(),
            self.printers.get(),
            self.buffer.get(),
        )
        .with_jobs_per_client(self.jobs_per_client.get())
        .with_pages(PageSource::Random {
            max: self.max_pages,
        })
        .with_time_per_page(Duration::from_millis(self.ms_per_page))
        .with_backend(self.primitives.backend())
    }
}

fn print_summary(report: &SpoolReport) {
    println!(
        "{} jobs ({} pages) printed from {} submitted; buffer of {}, high water {}",
        report.jobs_printed(),
        report.pages_printed(),
        report.jobs_submitted(),
        report.capacity,
        report.queue.high_water_mark
    );
    for printer in &report.printers {
        println!(
            "  {}: {} jobs, {} pages",
            printer.name, printer.jobs_printed, printer.pages_printed
        );
    }
    let blocked: usize = report.clients.iter().map(|c| c.times_blocked).sum();
    println!("  clients found the buffer full {} times", blocked);
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cli.log_level.as_str()),
    )
    .format_timestamp_millis()
    .init();

    let config = cli.config();
    log::debug!("{:?}", config);

    let report = match SpoolController::run(config) {
        Ok(report) => report,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("print-spool: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Shutting down.");
    if cli.json {
        match report.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("print-spool: cannot serialize report: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_summary(&report);
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["print-spool"]).unwrap();
        assert_eq!(cli.clients.get(), 4);
        assert_eq!(cli.printers.get(), 2);
        assert_eq!(cli.buffer.get(), 3);
        assert_eq!(cli.jobs_per_client.get(), 1);
        assert_eq!(cli.ms_per_page, 50);
        assert!(!cli.json);

        let config = cli.config();
        assert_eq!((config.clients, config.printers, config.capacity), (4, 2, 3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from([
            "print-spool", "-c", "6", "-p", "3", "-b", "5", "-j", "2", "--primitives", "local",
        ])
        .unwrap();
        let config = cli.config();
        assert_eq!(config.clients, 6);
        assert_eq!(config.printers, 3);
        assert_eq!(config.capacity, 5);
        assert_eq!(config.jobs_per_client, 2);
        assert_eq!(config.backend, PrimitiveBackend::InProcess);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for args in [
            vec!["print-spool", "-b", "0"],
            vec!["print-spool", "-c", "x"],
            vec!["print-spool", "-p", "-1"],
            vec!["print-spool", "--max-pages", "0"],
            vec!["print-spool", "--primitives", "shared"],
        ] {
            let err = Cli::try_parse_from(args.iter().copied()).unwrap_err();
            assert_ne!(err.exit_code(), 0, "{:?} should fail", args);
        }
    }

    #[test]
    fn test_help_exits_successfully() {
        let err = Cli::try_parse_from(["print-spool", "-h"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 0);
    }
}
