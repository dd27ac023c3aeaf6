//! romflash - Host-side programmer for 27xx EPROMs
//!
//! The EPROM sits in a socket driven by a small microcontroller. romflash
//! talks to that controller over a serial link (or a TCP serial bridge)
//! and runs the programming session:
//!
//! 1. wait for the controller to announce itself
//! 2. dump the chip to `eprom_before.txt`
//! 3. with programming voltage applied, send the image in acknowledged chunks
//! 4. with programming voltage removed, dump the chip to `eprom_after.txt`
//! 5. compare the image with the dump and print a diff of any differences

mod cli;
mod commands;
mod config;
mod link;

use clap::Parser;
use cli::{Cli, Commands, LinkArgs};
use commands::program::Artifacts;
use config::{FileConfig, Settings};
use romflash_serial::LinkError;

fn main() {
    let cli = Cli::parse();

    // Initialize logger; RUST_LOG still overrides the verbosity flags
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(cli.verbose)),
    )
    .init();

    if let Err(e) = run(cli) {
        let code = exit_code(e.as_ref());
        if code == 0 {
            eprintln!("Could not open the controller link: {}", e);
            eprintln!("Check the device name and that the controller is connected.");
            return;
        }
        eprintln!("Error: {}", e);
        std::process::exit(code);
    }
}

/// Default log filter for the number of `-v` flags
fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Process exit status for a failed command
///
/// A missing controller is not a failure of the tool. Everything else,
/// a verification mismatch included, is.
fn exit_code(e: &(dyn std::error::Error + 'static)) -> i32 {
    match e.downcast_ref::<LinkError>() {
        Some(LinkError::TransportUnavailable(_)) => 0,
        _ => 1,
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = |link: &LinkArgs| -> Result<Settings, Box<dyn std::error::Error>> {
        let file = FileConfig::load(cli.config.as_deref())?;
        Ok(Settings::resolve(link, &file)?)
    };

    match &cli.command {
        Commands::Program {
            input,
            before,
            after,
            yes,
            link,
        } => commands::program::run_program(
            &settings(link)?,
            input,
            Artifacts { before, after },
            *yes,
        ),
        Commands::Read { output, link } => commands::read::run_read(&settings(link)?, output),
        Commands::Verify {
            input,
            after,
            link,
        } => commands::verify::run_verify(&settings(link)?, input, after.as_deref()),
        Commands::ListChips => {
            commands::list_chips();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_follows_verbosity() {
        assert_eq!(log_filter(0), "info");
        assert_eq!(log_filter(1), "debug");
        assert_eq!(log_filter(2), "trace");
        assert_eq!(log_filter(5), "trace");
    }

    #[test]
    fn test_verbose_filter_enables_debug_records() {
        let logger = env_logger::Builder::new()
            .parse_filters(log_filter(1))
            .build();
        let debug = log::Metadata::builder()
            .level(log::Level::Debug)
            .target("romflash_serial")
            .build();
        let trace = log::Metadata::builder()
            .level(log::Level::Trace)
            .target("romflash_serial")
            .build();
        assert!(log::Log::enabled(&logger, &debug));
        assert!(!log::Log::enabled(&logger, &trace));
    }

    #[test]
    fn test_exit_codes() {
        let unavailable: Box<dyn std::error::Error> =
            LinkError::TransportUnavailable("/dev/ttyUSB0: not found".into()).into();
        assert_eq!(exit_code(unavailable.as_ref()), 0);

        let stall: Box<dyn std::error::Error> = LinkError::ProtocolStall {
            expected: "DONE".into(),
        }
        .into();
        assert_eq!(exit_code(stall.as_ref()), 1);

        let mismatch: Box<dyn std::error::Error> =
            romflash_core::Error::VerificationMismatch { differing: 2 }.into();
        assert_eq!(exit_code(mismatch.as_ref()), 1);

        let other: Box<dyn std::error::Error> = "Failed to load x.txt".into();
        assert_eq!(exit_code(other.as_ref()), 1);
    }
}
