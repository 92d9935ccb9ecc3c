use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use kubemap_core::{DuplicatePolicy, MapperConfig, Mode, DEFAULT_MAX_INPUT_BYTES, DEFAULT_SEPARATOR};
use kubemap_mapper::ConvertReport;
use tracing::{error, info};

/// Convert YAML streams of Kubernetes objects into a single YAML mapping with predictable paths.
///
/// SOURCE is expected to contain a YAML stream of objects. DESTINATION gets the resulting
/// mapping, keyed by namespace, name and kind.
#[derive(Parser, Debug)]
#[command(name = "kubemap", version)]
struct Cli {
    /// YAML stream of objects
    source: PathBuf,

    /// File the resulting YAML mapping is written to
    destination: PathBuf,

    /// Build namespace/name/kind mapping levels instead of separator-joined keys
    #[arg(short = 'n', long = "nested", action = ArgAction::SetTrue)]
    nested: bool,

    /// Separator used when joining key elements
    #[arg(
        short = 's',
        long = "separator",
        env = "KUBEMAP_SEPARATOR",
        default_value = DEFAULT_SEPARATOR,
        value_parser = parse_separator
    )]
    separator: String,

    /// Verify the destination after conversion (on by default)
    #[arg(long = "verify", action = ArgAction::SetTrue, overrides_with = "no_verify")]
    verify: bool,

    /// Skip verification
    #[arg(long = "no-verify", action = ArgAction::SetTrue, overrides_with = "verify")]
    no_verify: bool,

    /// Fail on a repeated namespace/name/kind instead of keeping the later object
    #[arg(long = "reject-duplicates", action = ArgAction::SetTrue)]
    reject_duplicates: bool,

    /// Refuse sources larger than this many bytes
    #[arg(
        long = "max-input-bytes",
        env = "KUBEMAP_MAX_INPUT_BYTES",
        default_value_t = DEFAULT_MAX_INPUT_BYTES
    )]
    max_input_bytes: u64,

    /// Report format
    #[arg(short = 'o', long = "output", value_enum, default_value_t = Output::Human)]
    output: Output,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

fn parse_separator(s: &str) -> Result<String, String> {
    if s.is_empty() {
        Err("separator must not be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

impl Cli {
    fn config(&self) -> MapperConfig {
        MapperConfig {
            mode: if self.nested { Mode::Nested } else { Mode::flat(self.separator.clone()) },
            duplicates: if self.reject_duplicates { DuplicatePolicy::Reject } else { DuplicatePolicy::Overwrite },
            verify: self.verify || !self.no_verify,
            max_input_bytes: self.max_input_bytes,
        }
    }
}

fn init_tracing() {
    let env = std::env::var("KUBEMAP_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn render_human(r: &ConvertReport) -> String {
    let layout = match &r.mode {
        Mode::Flat { separator } => format!("flat, separator {:?}", separator),
        Mode::Nested => "nested".to_string(),
    };
    let check = if r.verified { "verified" } else { "not verified" };
    let mut line = format!(
        "{} -> {}: {} records, {} entries ({}), {}",
        r.source, r.destination, r.stats.records, r.stats.entries, layout, check
    );
    if r.stats.overwritten > 0 {
        line.push_str(&format!(", {} overwritten", r.stats.overwritten));
    }
    line
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.config();
    info!(source = %cli.source.display(), destination = %cli.destination.display(), ?config, "convert invoked");

    let report = match kubemap_mapper::convert(&cli.source, &cli.destination, &config) {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "conversion failed");
            return Err(e).with_context(|| {
                format!("converting {} into {}", cli.source.display(), cli.destination.display())
            });
        }
    };

    match cli.output {
        Output::Human => println!("{}", render_human(&report)),
        Output::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("kubemap").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_flat_dot_verified() {
        let cli = parse(&["in.yaml", "out.yaml"]);
        if std::env::var_os("KUBEMAP_SEPARATOR").is_none() && std::env::var_os("KUBEMAP_MAX_INPUT_BYTES").is_none() {
            assert_eq!(cli.config(), MapperConfig::default());
        }
        assert_eq!(cli.output, Output::Human);
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = parse(&["-n", "--no-verify", "--reject-duplicates", "in.yaml", "out.yaml"]);
        let cfg = cli.config();
        assert_eq!(cfg.mode, Mode::Nested);
        assert!(!cfg.verify);
        assert_eq!(cfg.duplicates, DuplicatePolicy::Reject);

        let cli = parse(&["-s", "/", "--max-input-bytes", "4096", "in.yaml", "out.yaml"]);
        assert_eq!(cli.config().mode, Mode::flat("/"));
        assert_eq!(cli.config().max_input_bytes, 4096);
    }

    #[test]
    fn last_verify_flag_wins() {
        assert!(!parse(&["--verify", "--no-verify", "a", "b"]).config().verify);
        assert!(parse(&["--no-verify", "--verify", "a", "b"]).config().verify);
        assert!(parse(&["--verify", "a", "b"]).config().verify);
    }

    #[test]
    fn empty_separator_is_a_usage_error() {
        let res = Cli::try_parse_from(["kubemap", "-s", "", "a", "b"]);
        assert!(res.is_err());
    }

    #[test]
    fn both_paths_are_required() {
        assert!(Cli::try_parse_from(["kubemap", "only-one.yaml"]).is_err());
    }

    #[test]
    fn human_report_mentions_overwrites() {
        let report = ConvertReport {
            source: "in.yaml".into(),
            destination: "out.yaml".into(),
            mode: Mode::flat("."),
            stats: kubemap_mapper::AggregateStats { records: 3, entries: 2, overwritten: 1 },
            verified: false,
        };
        let line = render_human(&report);
        assert_eq!(line, "in.yaml -> out.yaml: 3 records, 2 entries (flat, separator \".\"), not verified, 1 overwritten");
    }

    #[test]
    fn json_report_flattens_mode_and_stats() {
        let report = ConvertReport {
            source: "in.yaml".into(),
            destination: "out.yaml".into(),
            mode: Mode::Nested,
            stats: kubemap_mapper::AggregateStats { records: 2, entries: 2, overwritten: 0 },
            verified: true,
        };
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["mode"], "nested");
        assert_eq!(v["entries"], 2);
        assert_eq!(v["verified"], true);
    }
}
