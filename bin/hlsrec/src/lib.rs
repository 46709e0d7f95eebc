use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context;
use hlsrec::{
    hls::DurationMode,
    util::http::DEFAULT_USER_AGENT,
    HttpClient, RecordLength, Recorder, RecorderConfig,
};
use log::LevelFilter;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, Url,
};

#[derive(clap::Parser, Debug, Clone)]
#[clap(name = "hlsrec", version, about = "HTTP Live Streaming (HLS) recorder")]
pub struct HlsrecArgs {
    /// Recording duration (0 == infinite)
    ///
    /// Seconds, or a duration such as "1h30m", "45s" or "01:30:00".
    #[clap(short = 't', long, default_value = "0")]
    duration: RecordLength,

    /// Use local time to track duration instead of supplied metadata
    #[clap(short = 'l', long)]
    local_time: bool,

    /// User-Agent for HTTP client
    #[clap(long = "ua", alias = "user-agent", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// HTTP Header used to download
    ///
    /// Custom header. eg. "Referer: https://example.com/".
    #[clap(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Cookies used to download
    #[clap(long)]
    cookies: Option<String>,

    /// Set AES-128 key manually in hex, instead of fetching key URIs
    #[clap(long)]
    key: Option<String>,

    /// Timeout seconds for each playlist/key/chunk request
    #[clap(long, default_value = "60")]
    timeout: u64,

    /// Number of recently seen chunks remembered to avoid duplicates
    #[clap(long, default_value = "64")]
    cache_size: usize,

    /// Maximum number of chunks waiting to be downloaded
    #[clap(long, default_value = "1024")]
    queue_size: usize,

    /// Debug output
    #[clap(long, alias = "debug")]
    verbose: bool,

    /// Media playlist URL
    #[clap(value_parser = parse_playlist_url)]
    playlist: String,

    /// Output file path, "-" for stdout
    output: PathBuf,
}

fn parse_playlist_url(input: &str) -> Result<String, String> {
    let url = Url::from_str(input).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(input.to_string()),
        scheme => Err(format!("unsupported scheme {scheme}, expected http or https")),
    }
}

impl HlsrecArgs {
    fn client(&self) -> anyhow::Result<HttpClient> {
        let mut headers = HeaderMap::new();
        if let Some(cookies) = &self.cookies {
            headers.insert(
                reqwest::header::COOKIE,
                HeaderValue::from_str(cookies).context("Invalid cookie")?,
            );
        }

        for header in &self.headers {
            let (key, value) = header
                .split_once(':')
                .with_context(|| format!("Invalid header: {header}"))?;
            headers.insert(
                HeaderName::from_str(key.trim()).context("Invalid header name")?,
                HeaderValue::from_str(value.trim()).context("Invalid header value")?,
            );
        }

        let builder = Client::builder()
            .default_headers(headers)
            .user_agent(&self.user_agent)
            .timeout(Duration::from_secs(self.timeout));
        Ok(HttpClient::new(builder)?)
    }

    fn config(&self) -> anyhow::Result<RecorderConfig> {
        let mode = if self.local_time {
            DurationMode::Local
        } else {
            DurationMode::Playlist
        };

        Ok(RecorderConfig::new(&self.playlist, self.output.clone())?
            .with_target(self.duration.as_duration())
            .with_duration_mode(mode)
            .with_cache_capacity(self.cache_size)
            .with_queue_capacity(self.queue_size)
            .with_manual_key(self.key.as_deref())?)
    }

    fn init_logger(&self) {
        let level = if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };

        let mut builder = pretty_env_logger::formatted_builder();
        builder.filter_level(level);
        if let Ok(filters) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filters);
        }
        _ = builder.try_init();
    }

    pub async fn run(self) -> anyhow::Result<()> {
        self.init_logger();
        log::info!(
            "hlsrec {} - HTTP Live Streaming (HLS) recorder",
            env!("CARGO_PKG_VERSION")
        );

        let client = self.client()?;
        let config = self.config()?;
        if self.duration.is_unbounded() {
            log::info!("Recording until the playlist ends");
        } else {
            log::info!("Recording {:?}", self.duration.as_duration());
        }

        Recorder::new(client, config).run().await.inspect_err(|e| {
            log::error!("{e}");
        })?;
        Ok(())
    }
}
