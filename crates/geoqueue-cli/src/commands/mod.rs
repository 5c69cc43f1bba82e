mod batch;
mod providers;
mod resolve;

use std::process::ExitCode;

use geoqueue_core::source::parse_provider_list;
use geoqueue_core::GeocoderConfig;
use serde::Serialize;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let mut config = GeocoderConfig::from_env()?;
    apply_overrides(&mut config, cli)?;

    match &cli.command {
        Command::Resolve(args) => resolve::run(args, config, cli.pretty).await,
        Command::Batch(args) => batch::run(args, config, cli.pretty).await,
        Command::Providers => providers::run(&config, cli.pretty),
    }
}

/// Layers command-line flags over the environment-derived configuration.
fn apply_overrides(config: &mut GeocoderConfig, cli: &Cli) -> Result<(), CliError> {
    if let Some(providers) = &cli.providers {
        config.providers = parse_provider_list(providers)?;
    }
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(delay_ms) = cli.delay_ms {
        config.inter_batch_delay_ms = delay_ms;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.request_timeout_ms = timeout_ms;
    }
    if let Some(max_attempts) = cli.max_attempts {
        config.max_attempts = max_attempts;
    }
    if cli.allow_outside_brazil {
        config.restrict_to_brazil = false;
    }
    config.validate()?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), CliError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use geoqueue_core::{ConfigError, ProviderId};

    use super::*;

    #[test]
    fn flags_override_configuration() {
        let cli = Cli::try_parse_from([
            "geoqueue",
            "--providers",
            "awesomeapi,viacep",
            "--batch-size",
            "4",
            "--delay-ms",
            "0",
            "--allow-outside-brazil",
            "providers",
        ])
        .expect("parses");
        let mut config = GeocoderConfig::default();

        apply_overrides(&mut config, &cli).expect("valid overrides");

        assert_eq!(
            config.providers,
            vec![ProviderId::Awesomeapi, ProviderId::ViacepNominatim]
        );
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.inter_batch_delay_ms, 0);
        assert!(!config.restrict_to_brazil);
    }

    #[test]
    fn invalid_overrides_are_config_errors() {
        let cli = Cli::try_parse_from(["geoqueue", "--max-attempts", "0", "providers"])
            .expect("parses");
        let mut config = GeocoderConfig::default();

        let error = apply_overrides(&mut config, &cli).expect_err("zero attempts");

        assert!(matches!(
            error,
            CliError::Config(ConfigError::MustBePositive { field: "max_attempts" })
        ));
        assert_eq!(error.exit_code(), 2);
    }
}
