use std::time::Duration;

use aes::cipher::{block_padding::NoPadding, BlockEncryptMut, KeyIvInit};
use hlsrec::{
    decrypt::implicit_iv,
    hls::DurationMode,
    sink::{OutputSink, OutputTarget},
    HlsrecError, Recorder, RecorderConfig,
};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::hls::{client, media_playlist, HlsMock};

fn config(server: &MockServer) -> RecorderConfig {
    RecorderConfig::new(
        &format!("{}/playlist.m3u8", server.uri()),
        OutputTarget::Stdout,
    )
    .unwrap()
    .with_retry_backoff(Duration::from_millis(50))
}

async fn record(config: RecorderConfig) -> hlsrec::HlsrecResult<(Vec<u8>, hlsrec::pipeline::PipelineStats)> {
    let mut sink = OutputSink::new(Vec::new());
    let stats = Recorder::new(client(), config)
        .run_with_sink(&mut sink)
        .await?;
    Ok((sink.finish().await?, stats))
}

fn encrypt(key: &[u8; 16], iv: &[u8; 16], data: &[u8]) -> Vec<u8> {
    cbc::Encryptor::<aes::Aes128>::new(key.into(), iv.into())
        .encrypt_padded_vec_mut::<NoPadding>(data)
}

#[tokio::test]
async fn writes_chunks_in_playlist_order() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    server
        .mock(
            "/playlist.m3u8",
            media_playlist(0, &[("a.ts", 1.), ("b.ts", 1.), ("c.ts", 1.)], true),
        )
        .await
        .mock_chunk("/a.ts", "AAAA", 1)
        .await
        .mock_chunk("/b.ts", "BB", 1)
        .await
        .mock_chunk("/c.ts", "CCCCCC", 1)
        .await;

    let (output, stats) = record(config(&server)).await?;
    assert_eq!(output, b"AAAABBCCCCCC");
    assert_eq!(stats.written, 3);
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.bytes, 12);
    Ok(())
}

#[tokio::test]
async fn slow_chunks_do_not_reorder_output() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    server
        .mock(
            "/playlist.m3u8",
            media_playlist(0, &[("slow.ts", 1.), ("fast.ts", 1.)], true),
        )
        .await;
    Mock::given(method("GET"))
        .and(path("/slow.ts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("slow")
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    server.mock("/fast.ts", "fast").await;

    let (output, _) = record(config(&server)).await?;
    assert_eq!(output, b"slowfast");
    Ok(())
}

#[tokio::test]
async fn live_playlist_is_followed_without_duplicates() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    server
        .mock_times(
            "/playlist.m3u8",
            media_playlist(0, &[("0.ts", 1.), ("1.ts", 1.)], false),
            1,
        )
        .await
        .mock_times(
            "/playlist.m3u8",
            media_playlist(1, &[("1.ts", 1.), ("2.ts", 1.)], false),
            1,
        )
        .await
        .mock(
            "/playlist.m3u8",
            media_playlist(2, &[("2.ts", 1.), ("3.ts", 1.)], true),
        )
        .await
        .mock_chunk("/0.ts", "0", 1)
        .await
        .mock_chunk("/1.ts", "1", 1)
        .await
        .mock_chunk("/2.ts", "2", 1)
        .await
        .mock_chunk("/3.ts", "3", 1)
        .await;

    let (output, stats) = record(config(&server)).await?;
    assert_eq!(output, b"0123");
    assert_eq!(stats.written, 4);
    Ok(())
}

#[tokio::test]
async fn target_duration_ends_recording() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    server
        .mock(
            "/playlist.m3u8",
            media_playlist(10, &[("10.ts", 6.), ("11.ts", 6.), ("12.ts", 6.)], false),
        )
        .await
        .mock_chunk("/10.ts", "ten,", 1)
        .await
        .mock_chunk("/11.ts", "eleven", 1)
        .await
        .mock_chunk("/12.ts", "twelve", 0)
        .await;

    let config = config(&server)
        .with_target(Duration::from_secs(12))
        .with_duration_mode(DurationMode::Playlist);
    let (output, stats) = record(config).await?;
    assert_eq!(output, b"ten,eleven");
    assert_eq!(stats.written, 2);
    Ok(())
}

#[tokio::test]
async fn failed_chunk_is_skipped() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    server
        .mock(
            "/playlist.m3u8",
            media_playlist(0, &[("a.ts", 1.), ("gone.ts", 1.), ("c.ts", 1.)], true),
        )
        .await
        .mock("/a.ts", "A")
        .await
        .mock("/c.ts", "C")
        .await;
    Mock::given(method("GET"))
        .and(path("/gone.ts"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .expect(1)
        .mount(&server)
        .await;

    let (output, stats) = record(config(&server)).await?;
    assert_eq!(output, b"AC");
    assert_eq!(stats.written, 2);
    assert_eq!(stats.skipped, 1);
    Ok(())
}

#[tokio::test]
async fn aes128_chunks_are_decrypted() -> anyhow::Result<()> {
    let key = *b"0123456789abcdef";
    let first: Vec<u8> = (0..32u8).collect();
    let second: Vec<u8> = (32..64u8).collect();

    let server = MockServer::start().await;
    server
        .mock(
            "/playlist.m3u8",
            "#EXTM3U
#EXT-X-TARGETDURATION:1
#EXT-X-MEDIA-SEQUENCE:5
#EXT-X-KEY:METHOD=AES-128,URI=\"enc.key\"
#EXTINF:1.0,
5.ts
#EXTINF:1.0,
6.ts
#EXT-X-ENDLIST
",
        )
        .await
        .mock_chunk("/enc.key", key, 1)
        .await
        .mock("/5.ts", encrypt(&key, &implicit_iv(5), &first))
        .await
        .mock("/6.ts", encrypt(&key, &implicit_iv(6), &second))
        .await;

    let (output, stats) = record(config(&server)).await?;
    assert_eq!(output, [first, second].concat());
    assert_eq!(stats.written, 2);
    Ok(())
}

#[tokio::test]
async fn manual_key_overrides_key_uri() -> anyhow::Result<()> {
    let key = [0x11u8; 16];
    let iv = [0x22u8; 16];
    let plain = vec![0x33u8; 48];

    let server = MockServer::start().await;
    server
        .mock(
            "/playlist.m3u8",
            "#EXTM3U
#EXT-X-TARGETDURATION:1
#EXT-X-KEY:METHOD=AES-128,URI=\"never-fetched.key\",IV=0x22222222222222222222222222222222
#EXTINF:1.0,
0.ts
#EXT-X-ENDLIST
",
        )
        .await
        .mock_chunk("/never-fetched.key", [0u8; 16], 0)
        .await
        .mock("/0.ts", encrypt(&key, &iv, &plain))
        .await;

    let config = config(&server).with_manual_key(Some(hex::encode(key).as_str()))?;
    let (output, _) = record(config).await?;
    assert_eq!(output, plain);
    Ok(())
}

#[tokio::test]
async fn partial_cipher_block_is_skipped() -> anyhow::Result<()> {
    let key = [0x11u8; 16];
    let server = MockServer::start().await;
    server
        .mock(
            "/playlist.m3u8",
            "#EXTM3U
#EXT-X-TARGETDURATION:1
#EXT-X-KEY:METHOD=AES-128,URI=\"k\"
#EXTINF:1.0,
0.ts
#EXTINF:1.0,
1.ts
#EXT-X-ENDLIST
",
        )
        .await
        .mock("/k", key)
        .await
        .mock("/0.ts", [0u8; 20])
        .await
        .mock("/1.ts", encrypt(&key, &implicit_iv(1), &[7u8; 16]))
        .await;

    let (output, stats) = record(config(&server)).await?;
    assert_eq!(output, [7u8; 16]);
    assert_eq!(stats.skipped, 1);
    Ok(())
}

#[tokio::test]
async fn master_playlist_is_fatal() {
    let server = MockServer::start().await;
    server
        .mock(
            "/playlist.m3u8",
            "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=1280000
low.m3u8
",
        )
        .await;

    let result = record(config(&server)).await;
    assert!(matches!(result, Err(HlsrecError::NotMediaPlaylist)));
}

#[tokio::test]
async fn unopenable_output_fetches_nothing() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let output = dir.path().join("missing").join("out.ts");
    let config = RecorderConfig::new(&format!("{}/playlist.m3u8", server.uri()), output)?;

    let result = Recorder::new(client(), config).run().await;
    assert!(matches!(result, Err(HlsrecError::OutputOpenError { .. })));
    Ok(())
}

#[tokio::test]
async fn recording_to_file() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    server
        .mock(
            "/playlist.m3u8",
            media_playlist(0, &[("a.ts", 1.), ("b.ts", 1.)], true),
        )
        .await
        .mock("/a.ts", "first-")
        .await
        .mock("/b.ts", "second")
        .await;

    let dir = tempfile::tempdir()?;
    let output = dir.path().join("out.ts");
    let config = RecorderConfig::new(&format!("{}/playlist.m3u8", server.uri()), output.clone())?;

    let stats = Recorder::new(client(), config).run().await?;
    assert_eq!(stats.written, 2);
    assert_eq!(std::fs::read(output)?, b"first-second");
    Ok(())
}
