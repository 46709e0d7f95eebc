use thiserror::Error;

#[derive(Error, Debug)]
pub enum HlsrecError {
    #[error("HTTP error: {0}")]
    HttpError(reqwest::StatusCode),

    #[error("Invalid m3u8 file: {0}")]
    M3u8ParseError(String),

    #[error("Not a valid media playlist")]
    NotMediaPlaylist,

    #[error("Invalid AES-128 key: {0:?}")]
    InvalidAes128Key(Vec<u8>),

    #[error("Invalid initialization vector: {0}")]
    InvalidIv(String),

    #[error("URI field in key must exist")]
    MissingKeyUri,

    #[error("Cipher text length {0} is not a multiple of the AES block size")]
    InvalidCipherLength(usize),

    #[error("Playlist URL must use http or https: {0}")]
    UnsupportedScheme(String),

    #[error("Can not open output {path}: {source}")]
    OutputOpenError {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    HexDecodeError(#[from] hex::FromHexError),

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),
}

pub type HlsrecResult<T> = Result<T, HlsrecError>;

impl HlsrecError {
    /// Errors worth retrying after a short delay: network failures and bad
    /// responses that a later request may not repeat.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RequestError(_) | Self::HttpError(_) | Self::InvalidAes128Key(_)
        )
    }
}
