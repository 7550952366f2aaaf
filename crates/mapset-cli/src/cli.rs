use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "mapset",
    about = "Lease-locked merging of mapsets",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML file with the merge configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Merge source mapsets into a target mapset
    Merge(MergeArgs),
    /// List live leases in a lease directory
    Leases(LeasesArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct MergeArgs {
    /// Database root holding the locations
    #[arg(long)]
    pub root: PathBuf,
    #[arg(short, long)]
    pub location: String,
    #[arg(short, long)]
    pub target: String,
    /// Source mapsets, merged in the given order
    #[arg(required = true)]
    pub sources: Vec<String>,
    /// Lease directory shared by every process merging in this root
    /// [default: <root>/.leases]
    #[arg(long)]
    pub lease_dir: Option<PathBuf>,
    /// User the job runs as [default: $USER]
    #[arg(short, long)]
    pub user: Option<String>,
}

#[derive(Args)]
pub struct LeasesArgs {
    #[arg(long)]
    pub lease_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_merge() {
        let cli = Cli::try_parse_from([
            "mapset", "merge", "--root", "/data", "-l", "nc", "-t", "T", "A", "B", "--user", "alice",
        ])
        .unwrap();
        match cli.command {
            Command::Merge(args) => {
                assert_eq!(args.root, PathBuf::from("/data"));
                assert_eq!(args.location, "nc");
                assert_eq!(args.target, "T");
                assert_eq!(args.sources, vec!["A", "B"]);
                assert_eq!(args.user.as_deref(), Some("alice"));
                assert!(args.lease_dir.is_none());
            }
            _ => panic!("expected merge"),
        }
    }

    #[test]
    fn merge_needs_sources() {
        assert!(Cli::try_parse_from(["mapset", "merge", "--root", "/d", "-l", "nc", "-t", "T"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "mapset", "leases", "--lease-dir", "/tmp/l", "--format", "json", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Command::Leases(_)));
    }

    #[test]
    fn config_takes_file() {
        let cli = Cli::try_parse_from(["mapset", "config", "--config", "merge.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("merge.toml")));
    }
}
