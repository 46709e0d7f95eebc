use std::collections::HashMap;

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
use url::Url;

use crate::{
    error::{HlsrecError, HlsrecResult},
    hls::KeyDescriptor,
    util::http::HttpClient,
};

const AES_BLOCK_SIZE: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMethod {
    Aes128,
    Other(String),
}

impl KeyMethod {
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("AES-128") {
            Self::Aes128
        } else {
            Self::Other(name.to_string())
        }
    }
}

/// Key material attached to a chunk job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkKey {
    Aes128 {
        key: [u8; 16],
        /// Explicit IV from the key tag. Derived from the sequence number if absent.
        iv: Option<[u8; 16]>,
    },
    /// A method this recorder can not decrypt. Chunks are written as-is.
    Unsupported(String),
}

impl ChunkKey {
    /// Decrypts a whole chunk payload in place and returns it.
    pub fn decrypt(&self, sequence: u64, mut data: Vec<u8>) -> HlsrecResult<Vec<u8>> {
        match self {
            Self::Aes128 { key, iv } => {
                let iv = iv.unwrap_or_else(|| implicit_iv(sequence));
                if data.len() % AES_BLOCK_SIZE != 0 {
                    return Err(HlsrecError::InvalidCipherLength(data.len()));
                }

                let length = data.len();
                cbc::Decryptor::<aes::Aes128>::new(key.into(), (&iv).into())
                    .decrypt_padded_mut::<NoPadding>(&mut data)
                    .map_err(|_| HlsrecError::InvalidCipherLength(length))?;
                Ok(data)
            }
            Self::Unsupported(method) => {
                log::warn!("Unsupported encryption method {method}, writing chunk {sequence} as-is");
                Ok(data)
            }
        }
    }
}

/// IV used when a key tag omits one: 8 zero bytes followed by the media
/// sequence number as a big-endian u64.
pub fn implicit_iv(sequence: u64) -> [u8; 16] {
    (sequence as u128).to_be_bytes()
}

/// Parses an explicit IV attribute, e.g. `0x00000000000000000000000000000001`.
pub fn parse_iv(iv: &str) -> HlsrecResult<[u8; 16]> {
    let digits = iv
        .strip_prefix("0x")
        .or_else(|| iv.strip_prefix("0X"))
        .unwrap_or(iv);
    if digits.is_empty() || digits.len() > 32 {
        return Err(HlsrecError::InvalidIv(iv.to_string()));
    }
    u128::from_str_radix(digits, 16)
        .map(u128::to_be_bytes)
        .map_err(|_| HlsrecError::InvalidIv(iv.to_string()))
}

/// Decryption keys fetched so far, by key URI. Entries live for the whole run.
pub struct KeyStore {
    client: HttpClient,
    keys: HashMap<Url, [u8; 16]>,
    manual_key: Option<[u8; 16]>,
}

impl KeyStore {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            keys: HashMap::new(),
            manual_key: None,
        }
    }

    /// Use `key` for every AES-128 chunk instead of fetching key URIs.
    pub fn with_manual_key(mut self, key: Option<[u8; 16]>) -> Self {
        self.manual_key = key;
        self
    }

    pub async fn get(&mut self, uri: &Url) -> HlsrecResult<[u8; 16]> {
        if let Some(key) = self.keys.get(uri) {
            return Ok(*key);
        }

        log::debug!("Fetching key {uri}");
        let bytes = self.client.get_bytes(uri.clone()).await?;
        let key: [u8; 16] = bytes
            .to_vec()
            .try_into()
            .map_err(HlsrecError::InvalidAes128Key)?;
        self.keys.insert(uri.clone(), key);
        Ok(key)
    }

    /// Turns a key tag into key material, fetching the key on first use.
    pub async fn resolve(
        &mut self,
        descriptor: &KeyDescriptor,
        playlist_url: &Url,
    ) -> HlsrecResult<ChunkKey> {
        match &descriptor.method {
            KeyMethod::Aes128 => {
                let iv = descriptor.iv.as_deref().map(parse_iv).transpose()?;
                let key = match self.manual_key {
                    Some(key) => key,
                    None => {
                        let uri = descriptor.uri.as_deref().ok_or(HlsrecError::MissingKeyUri)?;
                        let uri = playlist_url.join(uri)?;
                        self.get(&uri).await?
                    }
                };
                Ok(ChunkKey::Aes128 { key, iv })
            }
            KeyMethod::Other(method) => Ok(ChunkKey::Unsupported(method.clone())),
        }
    }
}
