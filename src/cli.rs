use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show critical errors
    Quiet,
    /// Show standard information
    #[default]
    Normal,
    /// Show request details
    Verbose,
}

impl VerbosityLevel {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            VerbosityLevel::Quiet
        } else if verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    /// Default tracing filter directive for this level
    pub fn filter_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "info",
            VerbosityLevel::Verbose => "debug",
        }
    }
}

/// How the end-of-run report is written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Summary block plus failed endpoints
    #[default]
    Human,
    /// Machine-readable summary and results
    Json,
    /// Counters only
    Summary,
}

/// Validate a live API against its OpenAPI contract
#[derive(Parser, Debug, Clone)]
#[command(name = "validate-api")]
#[command(about = "Validate a live HTTP API against its OpenAPI contract")]
#[command(
    after_help = "Environment variables:\n  VALIDATE_API_HOSTNAME      target host\n  VALIDATE_API_PORT          target port\n  VALIDATE_API_ACCESS_TOKEN  access token sent as basic-auth user"
)]
#[command(version)]
pub struct Cli {
    /// Path to the OpenAPI contract (YAML or JSON)
    #[arg(help = "OpenAPI contract file")]
    pub contract: PathBuf,

    /// Also exercise DELETE and other destructive operations
    #[arg(long = "allow-destructive")]
    pub allow_destructive: bool,

    /// HTTP request timeout in seconds
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,

    /// Number of concurrent workers
    #[arg(long = "max-workers")]
    pub max_workers: Option<usize>,

    /// Validate one endpoint at a time
    #[arg(long = "sequential")]
    pub sequential: bool,

    /// Endpoint id to start from (1-based)
    #[arg(long = "start-from")]
    pub start_from: Option<usize>,

    /// Write detailed results as JSON to this file
    #[arg(long = "export", value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", help = "Enable verbose output")]
    pub verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Quiet mode",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Open the interactive inspector after the run
    #[arg(long = "divein")]
    pub divein: bool,

    /// Configuration file (TOML or JSON)
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(long = "format", value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Path prefix of the API on the target host
    #[arg(long = "base-path")]
    pub base_path: Option<String>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        VerbosityLevel::from_flags(self.verbose, self.quiet)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.contract.exists() {
            return Err(format!(
                "Contract file does not exist: {}",
                self.contract.display()
            ));
        }
        if self.start_from == Some(0) {
            return Err("Invalid start-from value: 0. Must be >= 1".to_string());
        }
        if self.max_workers == Some(0) {
            return Err("Number of workers must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_basic_cli_parsing() {
        let args = vec!["validate-api", "openapi.yaml"];
        let cli = Cli::try_parse_from(args).unwrap();

        assert_eq!(cli.contract, PathBuf::from("openapi.yaml"));
        assert!(!cli.allow_destructive);
        assert!(!cli.sequential);
        assert_eq!(cli.timeout, None);
        assert_eq!(cli.max_workers, None);
        assert_eq!(cli.start_from, None);
        assert_eq!(cli.output_format, None);
        assert_eq!(cli.verbosity(), VerbosityLevel::Normal);
    }

    #[test]
    fn test_full_cli_parsing() {
        let args = vec![
            "validate-api",
            "openapi.yml",
            "--allow-destructive",
            "--timeout",
            "10",
            "--max-workers",
            "8",
            "--sequential",
            "--start-from",
            "42",
            "--export",
            "out.json",
            "--verbose",
            "--divein",
            "--format",
            "json",
            "--base-path",
            "/v2",
        ];
        let cli = Cli::try_parse_from(args).unwrap();

        assert!(cli.allow_destructive);
        assert_eq!(cli.timeout, Some(10));
        assert_eq!(cli.max_workers, Some(8));
        assert!(cli.sequential);
        assert_eq!(cli.start_from, Some(42));
        assert_eq!(cli.export, Some(PathBuf::from("out.json")));
        assert!(cli.divein);
        assert_eq!(cli.output_format, Some(OutputFormat::Json));
        assert_eq!(cli.base_path.as_deref(), Some("/v2"));
        assert_eq!(cli.verbosity(), VerbosityLevel::Verbose);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        let args = vec!["validate-api", "openapi.yml", "-v", "-q"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_contract_is_required() {
        assert!(Cli::try_parse_from(vec!["validate-api"]).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cli = Cli::try_parse_from(vec!["validate-api", "Cargo.toml", "--start-from", "0"])
            .unwrap();
        assert!(cli.validate().unwrap_err().contains("start-from"));

        let cli = Cli::try_parse_from(vec!["validate-api", "does-not-exist.yaml"]).unwrap();
        assert!(cli.validate().unwrap_err().contains("does not exist"));
    }

    #[test]
    fn test_verbosity_filters() {
        assert_eq!(VerbosityLevel::Quiet.filter_directive(), "error");
        assert_eq!(VerbosityLevel::Normal.filter_directive(), "info");
        assert_eq!(VerbosityLevel::Verbose.filter_directive(), "debug");
    }
}
