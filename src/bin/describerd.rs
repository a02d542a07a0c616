//! describerd - capture/detect/describe daemon
//!
//! This daemon:
//! 1. Runs the display loop (capture → detect → render) on a fixed tick
//! 2. Serves the loopback control API (health / status / trigger)
//! 3. On trigger, runs one describe-and-retry cycle on the controller worker:
//!    snapshot → detect → remote description → spoken caption → voice-confirmed
//!    retry loop

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use scene_describer::api::{ApiConfig, ApiServer};
use scene_describer::config::DescriberConfig;
use scene_describer::describe::{DescribeConfig, DescriptionClient};
use scene_describer::voice::{CommandVoice, CommandVoiceConfig};
use scene_describer::{
    detect, open_source, Controller, ControllerHandle, DisplayLoop, FrameStore, LogRenderer,
    StubDetector,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = DescriberConfig::load()?;

    let store = FrameStore::new();
    let detector = detect::share(StubDetector::new());
    {
        let mut guard = detector.lock().unwrap_or_else(|e| e.into_inner());
        guard.warm_up()?;
        log::info!("detector backend: {}", guard.name());
    }

    let client = DescriptionClient::new(DescribeConfig {
        endpoint: config.service.endpoint(),
        timeout: config.service.timeout,
    });
    let voice = CommandVoice::new(CommandVoiceConfig {
        speak_command: config.voice.speak_command.clone(),
        listen_command: config.voice.listen_command.clone(),
    })?;

    let controller = Controller::new(
        store.clone(),
        detector.clone(),
        Box::new(client),
        Box::new(voice),
        config.voice.listen_timeout,
    );
    let controller_handle = Arc::new(ControllerHandle::spawn(controller));

    let api_config = ApiConfig {
        addr: config.api_addr.clone(),
        token_path: config.api_token_path.clone(),
    };
    let api_handle = ApiServer::new(api_config, controller_handle.clone(), store.clone()).spawn()?;
    log::info!("control api listening on {}", api_handle.addr);
    if let Some(path) = &api_handle.token_path {
        log::info!("control api capability token written to {}", path.display());
    } else {
        log::warn!(
            "control api capability token (handle securely): {}",
            api_handle.token
        );
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_signal = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_signal.store(true, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    let source = open_source(&config.capture_url, config.capture_fps)?;
    let mut display = DisplayLoop::new(
        source,
        detector,
        store,
        Box::new(LogRenderer::default()),
        config.tick,
        shutdown,
    );

    log::info!("describerd running. trigger a description with POST /describe");
    display.run()?;

    log::info!("shutting down: stopping control api and controller worker...");
    api_handle.stop()?;
    match Arc::try_unwrap(controller_handle) {
        Ok(handle) => handle.stop()?,
        Err(_) => log::warn!("controller handle still shared at shutdown; skipping join"),
    }

    Ok(())
}
