use crate::{
    parse_headers, timeout_from_secs, CaptureInvoker, ChromeRenderer, Config, ConfigError,
    Dispatcher, Renderer,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

/// Long flags that are also accepted with a single leading dash (`-proxy`).
const SINGLE_DASH_LONG_FLAGS: &[&str] = &["proxy", "threads", "config", "chrome", "verbose"];

#[derive(Parser, Debug)]
#[command(name = "urlshot")]
#[command(about = "Capture screenshots of many URLs with headless Chromium")]
#[command(version)]
pub struct Cli {
    #[arg(short = 'u', help = "Target URL (required unless -f is provided)")]
    pub url: Option<String>,

    #[arg(short = 'f', help = "File containing list of URLs (one per line)")]
    pub file: Option<PathBuf>,

    #[arg(short = 'o', help = "Output directory for screenshots [default: .]")]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Proxy server to use (e.g. http://127.0.0.1:8080)")]
    pub proxy: Option<String>,

    #[arg(
        long,
        allow_negative_numbers = true,
        help = "Number of concurrent capture workers [default: 4]"
    )]
    pub threads: Option<i64>,

    #[arg(
        short = 't',
        allow_negative_numbers = true,
        help = "Seconds to wait for each page (0 for unlimited) [default: 0]"
    )]
    pub timeout: Option<i64>,

    #[arg(
        short = 'H',
        help = "Custom headers for browser requests (comma-separated key:value)"
    )]
    pub headers: Option<String>,

    #[arg(long, help = "Configuration file path (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long = "chrome", help = "Chrome executable path")]
    pub chrome_path: Option<String>,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,
}

impl Cli {
    /// Parse process arguments, accepting single-dash long flags.
    pub fn parse_args() -> Self {
        Self::parse_from(normalize_args(std::env::args()))
    }

    /// Apply command-line overrides on top of `config`.
    pub fn apply_to(&self, mut config: Config) -> Config {
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(proxy) = &self.proxy {
            config.proxy = Some(proxy.clone());
        }
        if let Some(threads) = self.threads {
            config.threads = usize::try_from(threads).unwrap_or(0);
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout_from_secs(timeout);
        }
        if let Some(headers) = &self.headers {
            config.headers.extend(parse_headers(headers));
        }
        if let Some(chrome_path) = &self.chrome_path {
            config.chrome_path = Some(chrome_path.clone());
        }
        config
    }
}

/// Rewrite `-proxy value` style flags into `--proxy value`.
pub fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .map(|arg| {
            let is_single_dash_long = arg
                .strip_prefix('-')
                .filter(|rest| !rest.starts_with('-'))
                .map(|rest| rest.split('=').next().unwrap_or(rest))
                .is_some_and(|name| SINGLE_DASH_LONG_FLAGS.contains(&name));

            if is_single_dash_long {
                format!("-{arg}")
            } else {
                arg
            }
        })
        .collect()
}

/// Load the base configuration: the `--config` file if given, else defaults.
pub async fn load_config(args: &Cli) -> Result<Config, ConfigError> {
    let config = match &args.config {
        Some(path) => {
            let content = fs::read_to_string(path)
                .await
                .map_err(|e| ConfigError::ConfigFile {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            Config::from_json(path, &content)?
        }
        None => Config::default(),
    };

    let config = args.apply_to(config);
    config.validate()?;
    Ok(config)
}

pub struct CliRunner {
    pub config: Arc<Config>,
    pub urls: Vec<String>,
}

impl CliRunner {
    /// Resolve everything a batch needs. Fails before any capture work starts.
    pub async fn new(args: &Cli) -> Result<Self, ConfigError> {
        if args.url.is_none() && args.file.is_none() {
            return Err(ConfigError::MissingInput);
        }

        let config = load_config(args).await?;
        prepare_output_dir(&config.output_dir).await?;

        let mut urls = Vec::new();
        if let Some(url) = &args.url {
            urls.push(url.clone());
        }
        if let Some(path) = &args.file {
            let from_file = read_urls_from_file(path).await?;
            info!("Loaded {} URLs from {}", from_file.len(), path.display());
            urls.extend(from_file);
        }

        info!("Output directory: {}", config.output_dir.display());
        info!("Workers: {}", config.threads);
        match config.timeout {
            Some(timeout) => info!("Capture timeout: {:?}", timeout),
            None => info!("Capture timeout: unlimited"),
        }
        if let Some(proxy) = config.proxy() {
            info!("Proxy: {}", proxy);
        }
        if !config.headers.is_empty() {
            info!(
                "Extra headers: {}",
                config.headers.keys().cloned().collect::<Vec<_>>().join(", ")
            );
        }

        Ok(Self {
            config: Arc::new(config),
            urls,
        })
    }

    pub async fn run(&self) {
        let renderer = Arc::new(ChromeRenderer::new(&self.config));
        self.run_with(renderer).await;
    }

    /// Capture every URL with the given renderer; returns once all workers have exited.
    pub async fn run_with(&self, renderer: Arc<dyn Renderer>) {
        if self.urls.is_empty() {
            warn!("No URLs to capture");
        }

        let invoker = Arc::new(CaptureInvoker::new(renderer, self.config.clone()));
        let dispatcher = Dispatcher::new(self.config.threads, invoker);
        dispatcher.run(self.urls.clone()).await;
    }
}

/// Create the output directory (recursively) and check that files can be created in it.
pub async fn prepare_output_dir(path: &Path) -> Result<(), ConfigError> {
    fs::create_dir_all(path)
        .await
        .map_err(|source| ConfigError::OutputDir {
            path: path.to_path_buf(),
            source,
        })?;

    let dir = path.to_path_buf();
    let created = tokio::task::spawn_blocking(move || {
        tempfile::Builder::new()
            .prefix(".urlshot-")
            .tempfile_in(&dir)
            .map(drop)
    })
    .await
    .unwrap_or_else(|e| Err(std::io::Error::other(e)));

    created.map_err(|source| ConfigError::OutputDirNotWritable {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a newline-delimited URL list. Lines are trimmed; blank lines are skipped.
pub async fn read_urls_from_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::ReadUrls {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

pub fn setup_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("urlshot")
            .chain(list.iter().copied())
            .map(str::to_string)
            .collect()
    }

    fn parse(list: &[&str]) -> Cli {
        Cli::try_parse_from(normalize_args(args(list))).unwrap()
    }

    #[test]
    fn test_normalize_args() {
        assert_eq!(
            normalize_args(args(&["-proxy", "http://p:1", "-threads=8", "-u", "http://x"])),
            args(&["--proxy", "http://p:1", "--threads=8", "-u", "http://x"])
        );
        assert_eq!(
            normalize_args(args(&["--proxy", "a", "-o", "out", "-t", "5"])),
            args(&["--proxy", "a", "-o", "out", "-t", "5"])
        );
    }

    #[test]
    fn test_parse_all_flags() {
        let cli = parse(&[
            "-u", "http://ok.test", "-f", "urls.txt", "-o", "shots", "-proxy",
            "http://127.0.0.1:8080", "-threads", "8", "-t", "30", "-H", "A: 1, B:2",
        ]);
        assert_eq!(cli.url.as_deref(), Some("http://ok.test"));
        assert_eq!(cli.file, Some(PathBuf::from("urls.txt")));
        assert_eq!(cli.threads, Some(8));

        let config = cli.apply_to(Config::default());
        assert_eq!(config.output_dir, PathBuf::from("shots"));
        assert_eq!(config.proxy(), Some("http://127.0.0.1:8080"));
        assert_eq!(config.threads, 8);
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.headers.len(), 2);
        assert_eq!(config.headers["A"], "1");
    }

    #[test]
    fn test_defaults_come_from_config() {
        let config = parse(&["-u", "http://ok.test"]).apply_to(Config::default());
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert_eq!(config.threads, 4);
        assert!(config.timeout.is_none());
        assert!(config.proxy().is_none());
    }

    #[test]
    fn test_non_positive_values() {
        let config = parse(&["-u", "x", "-threads", "-2", "-t", "-1"]).apply_to(Config::default());
        assert_eq!(config.threads, 0);
        assert!(config.timeout.is_none());

        let config = parse(&["-u", "x", "-t", "0"]).apply_to(Config::default());
        assert!(config.timeout.is_none());
    }

    #[tokio::test]
    async fn test_missing_input_is_config_error() {
        let cli = parse(&["-o", "somewhere"]);
        let err = CliRunner::new(&cli).await.err().unwrap();
        assert!(matches!(err, ConfigError::MissingInput));
    }

    #[tokio::test]
    async fn test_runner_collects_urls_and_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let list = dir.path().join("urls.txt");
        std::fs::write(&list, "http://a.test\n\n   \n  http://b.test  \r\nhttp://c.test").unwrap();
        let out = dir.path().join("nested/out");

        let cli = parse(&[
            "-u",
            "http://first.test",
            "-f",
            list.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ]);
        let runner = CliRunner::new(&cli).await.unwrap();

        assert_eq!(
            runner.urls,
            vec!["http://first.test", "http://a.test", "http://b.test", "http://c.test"]
        );
        assert!(out.is_dir());
    }

    #[tokio::test]
    async fn test_unreadable_url_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.txt");
        let cli = parse(&["-f", missing.to_str().unwrap(), "-o", dir.path().to_str().unwrap()]);

        let err = CliRunner::new(&cli).await.err().unwrap();
        assert!(matches!(err, ConfigError::ReadUrls { .. }));
    }

    #[tokio::test]
    async fn test_load_config_file_with_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"threads": 2, "timeout": 10, "headers": {"X-From-File": "yes"}}"#,
        )
        .unwrap();

        let cli = parse(&["-u", "x", "-config", path.to_str().unwrap(), "-t", "3", "-H", "X-Cli:1"]);
        let config = load_config(&cli).await.unwrap();

        assert_eq!(config.threads, 2);
        assert_eq!(config.timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.headers["X-From-File"], "yes");
        assert_eq!(config.headers["X-Cli"], "1");
    }

    #[tokio::test]
    async fn test_prepare_output_dir_leaves_no_files_behind() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("a/b");

        prepare_output_dir(&out).await.unwrap();

        assert!(out.is_dir());
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_output_dir_that_is_a_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, "").unwrap();

        let err = prepare_output_dir(&file).await.unwrap_err();
        assert!(matches!(err, ConfigError::OutputDir { .. }));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_output_dir_refusing_new_files_is_rejected() {
        // procfs accepts no new files, whatever the mode bits or uid say.
        let err = prepare_output_dir(Path::new("/proc")).await.unwrap_err();
        assert!(matches!(err, ConfigError::OutputDirNotWritable { .. }));
        assert!(err.to_string().contains("/proc"));
    }

    #[tokio::test]
    async fn test_read_urls_from_file_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("urls.txt");
        std::fs::write(&path, "\n\nhttp://only.test\n\n").unwrap();

        let urls = read_urls_from_file(&path).await.unwrap();
        assert_eq!(urls, vec!["http://only.test"]);
    }
}
