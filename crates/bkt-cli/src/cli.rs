use std::net::SocketAddr;
use std::path::PathBuf;

use clap::builder::FalseyValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bkt", about = "Browse an S3 bucket as a directory tree", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(
        short,
        long,
        global = true,
        env = "DEBUG",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    pub verbose: bool,

    /// TOML configuration file; flags and environment override it.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve the bucket over HTTP
    Serve(ServeArgs),
    /// List one directory, or a whole subtree
    List(ListArgs),
    /// Show a single file or directory
    Stat(StatArgs),
}

#[derive(Args, Clone, Debug, Default)]
pub struct BucketArgs {
    #[arg(long, env = "BUCKET_NAME")]
    pub bucket: Option<String>,
    #[arg(long, env = "BUCKET_REGION")]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services
    #[arg(long, env = "S3_ENDPOINT")]
    pub endpoint: Option<String>,
    #[arg(long)]
    pub path_style: bool,
}

#[derive(Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub bucket: BucketArgs,
    #[arg(long, env = "LISTEN")]
    pub listen: Option<SocketAddr>,
    /// Index file names tried in order for directory requests
    #[arg(long, env = "DIRECTORY_INDEX", value_delimiter = ' ')]
    pub directory_index: Vec<String>,
    /// Files shown above directory listings
    #[arg(long, env = "DIRECTORY_HEADER", value_delimiter = ' ')]
    pub directory_header: Vec<String>,
    /// Files shown below directory listings
    #[arg(long, env = "DIRECTORY_FOOTER", value_delimiter = ' ')]
    pub directory_footer: Vec<String>,
    /// Header that must be present to allow PUT and DELETE
    #[arg(long, env = "MODIFY_ALLOW_HEADER")]
    pub modify_allow_header: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub bucket: BucketArgs,
    /// Directory path; the bucket root when omitted
    #[arg(default_value = "")]
    pub path: String,
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Args)]
pub struct StatArgs {
    #[command(flatten)]
    pub bucket: BucketArgs,
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_flags() {
        let cli = Cli::try_parse_from([
            "bkt",
            "serve",
            "--bucket",
            "assets",
            "--listen",
            "127.0.0.1:9000",
            "--directory-index",
            "index.html index.htm",
            "--modify-allow-header",
            "X-Allow-Write",
        ])
        .unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.bucket.bucket.as_deref(), Some("assets"));
        assert_eq!(args.listen.unwrap().port(), 9000);
        assert_eq!(args.directory_index, vec!["index.html", "index.htm"]);
        assert_eq!(args.modify_allow_header.as_deref(), Some("X-Allow-Write"));
    }

    #[test]
    fn list_defaults_to_root() {
        let cli = Cli::try_parse_from(["bkt", "list", "--bucket", "b", "-r"]).unwrap();
        let Command::List(args) = cli.command else {
            panic!("expected list");
        };
        assert_eq!(args.path, "");
        assert!(args.recursive);
    }
}
