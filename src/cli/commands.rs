use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mangascrape", version)]
#[command(about = "Scrape manga catalogues concurrently into JSON files")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(long, value_delimiter = ',', help = "Comma-separated list of sites to scrape")]
    pub sites: Option<Vec<String>>,

    #[arg(short, long, allow_negative_numbers = true, help = "Number of pool workers (<= 0 uses the default)")]
    pub workers: Option<i64>,

    #[arg(short, long, help = "Output directory")]
    pub out: Option<PathBuf>,

    #[arg(long, help = "Exit with a non-zero status when any source fails")]
    pub strict: bool,

    #[arg(long, short, global = true, help = "Path to a configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// List available sources
    Sources,

    /// Initialize the configuration file
    Init {
        #[arg(short, long, help = "Force overwrite existing configuration")]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flags() {
        let args = Args::parse_from([
            "mangascrape", "--sites", "mangadex, batoto", "-w", "-2", "--out", "data", "--strict",
        ]);

        assert_eq!(args.command, None);
        assert_eq!(args.sites, Some(vec!["mangadex".to_string(), " batoto".to_string()]));
        assert_eq!(args.workers, Some(-2));
        assert_eq!(args.out, Some(PathBuf::from("data")));
        assert!(args.strict);
    }

    #[test]
    fn test_subcommands() {
        let args = Args::parse_from(["mangascrape", "init", "--force", "-v"]);
        assert_eq!(args.command, Some(Commands::Init { force: true }));
        assert!(args.verbose);

        let args = Args::parse_from(["mangascrape", "sources"]);
        assert_eq!(args.command, Some(Commands::Sources));
    }
}
