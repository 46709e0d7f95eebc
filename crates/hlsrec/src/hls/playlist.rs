use std::time::Duration;

use m3u8_rs::{KeyMethod as M3u8KeyMethod, Playlist};

use crate::{
    decrypt::KeyMethod,
    error::{HlsrecError, HlsrecResult},
};

/// Cryptographic attributes of an `#EXT-X-KEY` tag, as written in the playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescriptor {
    pub method: KeyMethod,
    /// Key URI, relative to the playlist
    pub uri: Option<String>,
    /// Explicit IV in hex
    pub iv: Option<String>,
}

impl KeyDescriptor {
    /// Returns `None` for `METHOD=NONE`.
    fn from_m3u8(key: &m3u8_rs::Key) -> Option<Self> {
        let method = match &key.method {
            M3u8KeyMethod::None => return None,
            M3u8KeyMethod::AES128 => KeyMethod::Aes128,
            M3u8KeyMethod::SampleAES => KeyMethod::Other("SAMPLE-AES".to_string()),
            M3u8KeyMethod::Other(name) if name.eq_ignore_ascii_case("NONE") => return None,
            M3u8KeyMethod::Other(name) => KeyMethod::from_name(name),
        };

        Some(Self {
            method,
            uri: key.uri.clone(),
            iv: key.iv.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkDescriptor {
    /// Relative or absolute chunk URI
    pub uri: String,
    pub duration: Duration,
    /// Key tag in effect for this chunk
    pub key: Option<KeyDescriptor>,
}

/// One parsed poll of a media playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistSnapshot {
    pub chunks: Vec<ChunkDescriptor>,
    pub media_sequence: u64,
    pub target_duration: Duration,
    /// `#EXT-X-ENDLIST` was present
    pub end_list: bool,
}

impl PlaylistSnapshot {
    /// Parses playlist bytes. Anything other than a media playlist is rejected.
    pub fn parse(bytes: &[u8]) -> HlsrecResult<Self> {
        let playlist = match m3u8_rs::parse_playlist_res(bytes) {
            Ok(Playlist::MediaPlaylist(playlist)) => playlist,
            Ok(Playlist::MasterPlaylist(_)) => return Err(HlsrecError::NotMediaPlaylist),
            Err(error) => return Err(HlsrecError::M3u8ParseError(error.to_string())),
        };

        // m3u8-rs drops `METHOD=NONE` key tags, so clear-key resets are found here
        let resets = clear_key_resets(bytes);

        let mut key = None;
        let mut chunks = Vec::with_capacity(playlist.segments.len());
        for (i, segment) in playlist.segments.into_iter().enumerate() {
            if let Some(k) = &segment.key {
                key = KeyDescriptor::from_m3u8(k);
            } else if resets.get(i).copied().unwrap_or(false) {
                key = None;
            }

            chunks.push(ChunkDescriptor {
                uri: segment.uri,
                duration: Duration::try_from_secs_f32(segment.duration).unwrap_or_default(),
                key: key.clone(),
            });
        }

        Ok(Self {
            chunks,
            media_sequence: playlist.media_sequence,
            target_duration: Duration::try_from_secs_f64(playlist.target_duration as f64)
                .unwrap_or_default(),
            end_list: playlist.end_list,
        })
    }

    /// Key tag shared by every chunk, if the playlist uses a single one.
    pub fn shared_key(&self) -> Option<&KeyDescriptor> {
        let first = self.chunks.first()?.key.as_ref()?;
        self.chunks
            .iter()
            .all(|c| c.key.as_ref() == Some(first))
            .then_some(first)
    }

    /// Media sequence number of the chunk at `index`. `None` if it overflows.
    pub fn sequence_of(&self, index: usize) -> Option<u64> {
        u64::try_from(index)
            .ok()
            .and_then(|index| self.media_sequence.checked_add(index))
    }
}

/// For each segment URI line, whether the last key tag before it was `METHOD=NONE`.
fn clear_key_resets(bytes: &[u8]) -> Vec<bool> {
    let text = String::from_utf8_lossy(bytes);
    let mut resets = Vec::new();
    let mut pending = false;
    for line in text.lines().map(str::trim) {
        if let Some(attributes) = line.strip_prefix("#EXT-X-KEY:") {
            pending = attributes.split(',').any(|attribute| {
                attribute
                    .trim()
                    .strip_prefix("METHOD=")
                    .is_some_and(|method| method.eq_ignore_ascii_case("NONE"))
            });
        } else if !line.is_empty() && !line.starts_with('#') {
            resets.push(pending);
            pending = false;
        }
    }
    resets
}
