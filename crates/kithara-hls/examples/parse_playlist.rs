use std::{env, error::Error, sync::Arc, time::Duration};

use kithara_hls::{
    EventEmitter, HlsConfig, KeyManager, NetRetrieve, PlaylistParser, RefreshDriver,
};
use kithara_net::{HttpClient, NetExt};
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::default()
                // Override via `RUST_LOG=...` (e.g. `kithara_hls=trace,kithara_net=debug`)
                .add_directive("kithara_hls=debug".parse()?)
                .add_directive("kithara_net=info".parse()?),
        )
        .with_line_number(true)
        .with_file(true)
        .init();

    let url = env::args()
        .nth(1)
        .unwrap_or_else(|| "https://stream.silvercomet.top/hls/master.m3u8".to_string());
    let config = HlsConfig::new(Url::parse(&url)?)
        .with_live_window(32)
        .with_min_refresh_interval(Duration::from_secs(2));

    let net = Arc::new(
        HttpClient::new(config.net.clone())?
            .with_timeout(config.net.request_timeout)
            .with_retry(config.net.retry_policy.clone()),
    );
    let events = EventEmitter::from_config(&config);
    let keys = KeyManager::new(net.clone(), config.keys.clone(), Some(events.clone()));
    let parser = PlaylistParser::from_config(&config).with_keyring(Arc::new(keys));
    let driver = RefreshDriver::from_config(NetRetrieve::new(net), &config)
        .with_parser(parser)
        .with_events(events.clone());

    let mut rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            info!(?event, "hls event");
        }
    });

    let mut playlist = driver.open(&url).await?;
    let Some(rep_id) = playlist
        .representations()
        .max_by_key(|rep| rep.bandwidth)
        .map(|rep| rep.id.clone())
    else {
        return Err("playlist has no representations".into());
    };

    if !playlist.representation(&rep_id).is_some_and(|r| r.loaded) {
        driver.load(&mut playlist, &rep_id).await?;
    }
    playlist.debug_dump();

    let stopper = driver.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        stopper.cancel();
    });

    let playlist = Arc::new(Mutex::new(playlist));
    match driver.run(playlist.clone(), &rep_id).await {
        Ok(()) | Err(kithara_hls::HlsError::Cancelled) => {}
        Err(e) => return Err(e.into()),
    }

    let playlist = playlist.lock().await;
    if let Some(rep) = playlist.representation(&rep_id) {
        info!(
            representation = %rep.id,
            segments = rep.segments().len(),
            live = rep.live,
            "done"
        );
    }
    Ok(())
}
