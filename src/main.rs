use chrono::Utc;
use clap::Parser;
use std::{process::ExitCode, sync::Arc};
use tracing::debug;

use domain_expiry_check::{
    config::Config, errors::ExpiryError, ExpiryClient, ExpiryReport, LookupResult,
};

/// Exit code for bad command-line usage.
const EXIT_USAGE: u8 = 64;

#[derive(Parser)]
#[command(name = "domain-expiry-check", version)]
#[command(about = "Check whether a domain registration is nearing expiry.")]
struct Cli {
    /// Domain, IP address or URL to look up
    target: String,

    /// Print the report as a single JSON object
    #[arg(long)]
    json: bool,

    /// Also print every parsed whois field as JSON
    #[arg(long)]
    fields: bool,

    /// Warning window before expiry, in hours
    #[arg(long, value_name = "HOURS")]
    window_hours: Option<u64>,

    /// Kill the whois client after this many seconds (0 disables)
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// whois client to run, by name or path
    #[arg(long, value_name = "PATH")]
    whois_binary: Option<String>,

    /// Log lookup steps to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Extra arguments passed verbatim to the whois client (after `--`)
    #[arg(last = true, value_name = "WHOIS_ARGS")]
    whois_args: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            if e.print().is_err() || e.use_stderr() {
                return ExitCode::from(EXIT_USAGE);
            }
            return ExitCode::SUCCESS;
        }
    };

    // Initialize tracing; stdout is reserved for the report
    let default_filter = if cli.verbose {
        "domain_expiry_check=debug"
    } else {
        "domain_expiry_check=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()))
        .with_writer(std::io::stderr)
        .init();

    match run(&cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error [{}]: {}", e.stage(), e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: &Cli) -> Result<u8, ExpiryError> {
    let config = Arc::new(load_config(cli)?);
    debug!("Configuration loaded: {:?}", config);

    let client = ExpiryClient::new_with_config(config);
    let result = client.lookup(&cli.target, &cli.whois_args).await?;
    let report = client.evaluate(&result, Utc::now())?;

    if cli.json {
        print_json(&report)?;
    } else {
        print_text(&report);
    }
    if cli.fields {
        print_fields(&result)?;
    }

    Ok(report.verdict.exit_code())
}

fn load_config(cli: &Cli) -> Result<Config, ExpiryError> {
    let mut config = Config::load()?;

    if let Some(hours) = cli.window_hours {
        config.warning_window_hours = hours;
    }
    if let Some(seconds) = cli.timeout {
        config.whois_timeout_seconds = seconds;
    }
    if let Some(binary) = &cli.whois_binary {
        config.whois_binary = binary.clone();
    }

    // Fail before running the client if the window cannot be represented
    config.warning_window()?;

    Ok(config)
}

fn print_text(report: &ExpiryReport) {
    println!("Domain:      {}", report.domain);
    println!("Expires:     {}", report.expiry.to_rfc3339());
    println!("Warn after:  {}", report.threshold.to_rfc3339());
    println!("Window:      {}h", report.window_hours);
    println!("Verdict:     {}", report.verdict);
}

fn print_json(report: &ExpiryReport) -> Result<(), ExpiryError> {
    let json = serde_json::to_string(report)?;
    println!("{}", json);
    Ok(())
}

fn print_fields(result: &LookupResult) -> Result<(), ExpiryError> {
    let json = result.to_json()?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("domain-expiry-check").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_flags_override_config() {
        let cli = parse(&[
            "example.com",
            "--window-hours",
            "24",
            "--timeout",
            "0",
            "--whois-binary",
            "/usr/local/bin/whois",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.warning_window_hours, 24);
        assert_eq!(config.whois_timeout(), None);
        assert_eq!(config.whois_binary, "/usr/local/bin/whois");
    }

    #[test]
    fn test_out_of_range_window_flag_is_a_usage_error() {
        for hours in ["18446744073709551615", "10000000000000000"] {
            let cli = parse(&["example.com", "--window-hours", hours]);
            let err = load_config(&cli).unwrap_err();
            assert!(matches!(err, ExpiryError::InvalidWindow(_)));
            assert_eq!(err.exit_code(), EXIT_USAGE);
        }
    }

    #[test]
    fn test_whois_args_after_separator() {
        let cli = parse(&["example.com", "--json", "--", "-h", "whois.verisign-grs.com"]);
        assert!(cli.json);
        assert_eq!(cli.whois_args, vec!["-h", "whois.verisign-grs.com"]);
    }
}
