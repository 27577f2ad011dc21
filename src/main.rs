use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use pixload::domain::entities::Source;
use pixload::infrastructure::config::Command;
use pixload::infrastructure::image::{Blur, Grayscale, StorageStats};
use pixload::infrastructure::{CliArgs, ConfigStore, LoaderConfig};
use pixload::{ImageLoader, RequestBuilder};

fn init_logging(config: &LoaderConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry().with(filter).init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<LoaderConfig> {
    let store = match &args.config {
        Some(path) => ConfigStore::with_dir(
            path.parent().map(PathBuf::from).unwrap_or_default(),
        ),
        None => ConfigStore::new()?,
    };
    let mut config = store.load_config(args.config.as_deref())?;
    config.merge_with_args(args);
    Ok(config)
}

/// `scheme://...` is a URI, `res:name` a resource, anything else a path.
fn parse_source(raw: &str) -> Source {
    if raw.contains("://") {
        Source::Uri(raw.to_string())
    } else if let Some(name) = raw.strip_prefix("res:") {
        Source::resource(name)
    } else {
        Source::File(PathBuf::from(raw))
    }
}

async fn fetch(
    loader: &ImageLoader,
    source: Source,
    size: Option<(u32, u32)>,
    grayscale: bool,
    blur: Option<f32>,
    output: PathBuf,
) -> Result<()> {
    let mut request: RequestBuilder<'_> = loader.request(source.clone())?;
    if let Some((width, height)) = size {
        request = request.resize(width, height);
    }
    if grayscale {
        request = request.transform(Grayscale);
    }
    if let Some(sigma) = blur {
        request = request.transform(Blur { sigma });
    }

    let loaded = request
        .fetch()
        .await
        .wrap_err_with(|| format!("failed to load {source}"))?;
    info!(source = %source, from = %loaded.source, "Fetched image");

    let image = loaded.image.clone();
    let target = output.clone();
    tokio::task::spawn_blocking(move || image.save(&target))
        .await?
        .wrap_err_with(|| format!("failed to write {}", output.display()))?;

    println!(
        "{} -> {} ({}x{}, from {})",
        source,
        output.display(),
        loaded.image.width(),
        loaded.image.height(),
        loaded.source
    );

    loader.flush().await;
    Ok(())
}

/// The memory tier starts empty in every process, so only storage is reported.
fn storage_report(stats: Option<StorageStats>) -> String {
    stats.map_or_else(|| "Storage cache disabled".to_string(), |stats| stats.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(&args)?;
    init_logging(&config)?;

    info!(version = pixload::VERSION, "Starting pixload");

    let loader = ImageLoader::builder().config(config).build().await?;

    match args.command {
        Command::Fetch {
            source,
            width,
            height,
            grayscale,
            blur,
            output,
        } => {
            let size = width.zip(height);
            fetch(&loader, parse_source(&source), size, grayscale, blur, output).await?;
        }
        Command::Invalidate { source } => {
            loader.request(parse_source(&source))?.invalidate().await;
            println!("Invalidated {source}");
        }
        Command::Clear => {
            loader.clear_caches().await;
            println!("Caches cleared");
        }
        Command::Stats => println!("{}", storage_report(loader.storage_stats())),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source() {
        assert_eq!(parse_source("https://a/b.png"), Source::Uri("https://a/b.png".into()));
        assert_eq!(parse_source("file:///tmp/a.png"), Source::Uri("file:///tmp/a.png".into()));
        assert_eq!(parse_source("res:icons/logo.png"), Source::resource("icons/logo.png"));
        assert_eq!(parse_source("./a.png"), Source::File(PathBuf::from("./a.png")));
    }

    #[test]
    fn test_storage_report() {
        assert_eq!(storage_report(None), "Storage cache disabled");

        let report = storage_report(Some(StorageStats {
            bytes: 10,
            entries: 2,
            max_bytes: 100,
            sweeps: 1,
            peak_concurrent_sweeps: 1,
        }));
        assert_eq!(report, "Storage cache: 2 images, 10/100 bytes, 1 fit passes");
        assert!(!report.contains("Memory"));
    }
}
