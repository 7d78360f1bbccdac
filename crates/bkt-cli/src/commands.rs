use std::sync::Arc;

use anyhow::Context;
use bkt_namespace::{BucketNamespace, Entry, Listing};
use bkt_server::render::{self, ListingDoc};
use bkt_server::{BucketServer, ServerConfig};
use bkt_store::{ObjectStore, S3ObjectStore};
use colored::Colorize;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args).await,
        Command::List(args) => cmd_list(config, args, &cli.format).await,
        Command::Stat(args) => cmd_stat(config, args, &cli.format).await,
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    match &cli.config {
        Some(path) => ServerConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(ServerConfig::default()),
    }
}

fn apply_bucket_args(config: &mut ServerConfig, args: BucketArgs) {
    if let Some(bucket) = args.bucket {
        config.s3.bucket = bucket;
    }
    if let Some(region) = args.region {
        config.s3.region = region;
    }
    if args.endpoint.is_some() {
        config.s3.endpoint = args.endpoint;
    }
    if args.path_style {
        config.s3.path_style = true;
    }
}

async fn connect(config: &ServerConfig) -> Arc<dyn ObjectStore> {
    tracing::debug!(bucket = %config.s3.bucket, region = %config.s3.region, "connecting");
    Arc::new(S3ObjectStore::connect(&config.s3).await)
}

async fn cmd_serve(mut config: ServerConfig, args: ServeArgs) -> anyhow::Result<()> {
    apply_bucket_args(&mut config, args.bucket);
    if let Some(listen) = args.listen {
        config.bind_addr = listen;
    }
    if !args.directory_index.is_empty() {
        config.directory_index = args.directory_index;
    }
    if !args.directory_header.is_empty() {
        config.directory_header = args.directory_header;
    }
    if !args.directory_footer.is_empty() {
        config.directory_footer = args.directory_footer;
    }
    if args.modify_allow_header.is_some() {
        config.modify_allow_header = args.modify_allow_header;
    }

    let store = connect(&config).await;
    println!(
        "{} Serving bucket {} on {}",
        "✓".green().bold(),
        config.s3.bucket.yellow(),
        config.bind_addr.to_string().bold()
    );
    BucketServer::new(config, store).serve().await?;
    Ok(())
}

async fn cmd_list(mut config: ServerConfig, args: ListArgs, format: &OutputFormat) -> anyhow::Result<()> {
    apply_bucket_args(&mut config, args.bucket);
    let store = connect(&config).await;
    let namespace = BucketNamespace::new(store, &config.namespace);

    let listings = if args.recursive {
        namespace.list_recursive(&args.path).await?
    } else {
        vec![namespace.list(&args.path).await?]
    };

    match format {
        OutputFormat::Json if args.recursive => {
            let docs: Vec<ListingDoc<'_>> = listings.iter().map(ListingDoc::from).collect();
            println!("{}", serde_json::to_string_pretty(&docs)?);
        }
        OutputFormat::Json => {
            let entries = listings.first().map(|l| l.entries.as_slice()).unwrap_or(&[]);
            println!("{}", serde_json::to_string_pretty(&render::entry_docs(entries))?);
        }
        OutputFormat::Text => {
            for (i, listing) in listings.iter().enumerate() {
                if args.recursive {
                    if i > 0 {
                        println!();
                    }
                    println!("{}:", format!("/{}", listing.path).bold());
                }
                print_listing(listing);
            }
        }
    }
    Ok(())
}

async fn cmd_stat(mut config: ServerConfig, args: StatArgs, format: &OutputFormat) -> anyhow::Result<()> {
    apply_bucket_args(&mut config, args.bucket);
    let store = connect(&config).await;
    let namespace = BucketNamespace::new(store, &config.namespace);
    let entry = namespace.resolve(&args.path).await?;

    match format {
        OutputFormat::Json => {
            let doc = render::EntryDoc::from(&entry);
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        OutputFormat::Text => {
            let kind = if entry.is_directory() { "directory" } else { "file" };
            println!("{} ({})", entry.name().bold(), kind.cyan());
            println!("  Size: {} ({} bytes)", render::human_size(entry.size()), entry.size());
            if let Some(count) = entry.count() {
                println!("  Objects: {count}");
            }
            if let Some(modified) = entry.modified() {
                println!("  Modified: {}", modified.format("%Y-%m-%d %H:%M:%S"));
            }
            if let Some(class) = entry.storage_class() {
                println!("  Storage class: {class}");
            }
            if let Some(file) = entry.as_file() {
                println!("  ETag: {}", file.etag.dimmed());
            }
        }
    }
    Ok(())
}

fn print_listing(listing: &Listing) {
    for entry in &listing.entries {
        let modified = entry
            .modified()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".repeat(19));
        let name = match entry {
            Entry::Directory(_) => entry.name().blue().bold(),
            Entry::File(_) => entry.name().normal(),
        };
        println!(
            "{:>9}  {}  {}  {}",
            render::human_size(entry.size()),
            modified.dimmed(),
            name,
            entry.checksum().unwrap_or("").dimmed()
        );
    }
}
