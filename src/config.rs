use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CAPTURE_URL: &str = "stub://demo_camera";
const DEFAULT_CAPTURE_FPS: u32 = 10;
const DEFAULT_TICK_MS: u64 = 100;
const DEFAULT_API_ADDR: &str = "127.0.0.1:8941";
const DEFAULT_SERVICE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";
const DEFAULT_SERVICE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LISTEN_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Deserialize, Default)]
struct DescriberConfigFile {
    capture: Option<CaptureConfigFile>,
    display: Option<DisplayConfigFile>,
    service: Option<ServiceConfigFile>,
    voice: Option<VoiceConfigFile>,
    api: Option<ApiConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    tick_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ServiceConfigFile {
    url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct VoiceConfigFile {
    speak_command: Option<Vec<String>>,
    listen_command: Option<Vec<String>>,
    listen_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
    token_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DescriberConfig {
    pub capture_url: String,
    pub capture_fps: u32,
    pub tick: Duration,
    pub service: ServiceSettings,
    pub voice: VoiceSettings,
    pub api_addr: String,
    pub api_token_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl ServiceSettings {
    /// Full request URL. The reference service wants the key as a query
    /// parameter; services that authenticate differently just omit the key.
    pub fn endpoint(&self) -> String {
        match &self.api_key {
            Some(key) => format!("{}?key={}", self.url, key),
            None => self.url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VoiceSettings {
    pub speak_command: Vec<String>,
    pub listen_command: Vec<String>,
    pub listen_timeout: Duration,
}

impl DescriberConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("DESCRIBER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: DescriberConfigFile) -> Self {
        let capture_url = file
            .capture
            .as_ref()
            .and_then(|capture| capture.url.clone())
            .unwrap_or_else(|| DEFAULT_CAPTURE_URL.to_string());
        let capture_fps = file
            .capture
            .as_ref()
            .and_then(|capture| capture.target_fps)
            .unwrap_or(DEFAULT_CAPTURE_FPS);
        let tick = Duration::from_millis(
            file.display
                .as_ref()
                .and_then(|display| display.tick_ms)
                .unwrap_or(DEFAULT_TICK_MS),
        );
        let service = ServiceSettings {
            url: file
                .service
                .as_ref()
                .and_then(|service| service.url.clone())
                .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string()),
            api_key: file.service.as_ref().and_then(|service| service.api_key.clone()),
            timeout: Duration::from_secs(
                file.service
                    .as_ref()
                    .and_then(|service| service.timeout_secs)
                    .unwrap_or(DEFAULT_SERVICE_TIMEOUT_SECS),
            ),
        };
        let voice = VoiceSettings {
            speak_command: file
                .voice
                .as_ref()
                .and_then(|voice| voice.speak_command.clone())
                .unwrap_or_else(|| vec!["espeak".to_string()]),
            listen_command: file
                .voice
                .as_ref()
                .and_then(|voice| voice.listen_command.clone())
                .unwrap_or_else(|| vec!["listen-once".to_string()]),
            listen_timeout: Duration::from_secs(
                file.voice
                    .as_ref()
                    .and_then(|voice| voice.listen_timeout_secs)
                    .unwrap_or(DEFAULT_LISTEN_TIMEOUT_SECS),
            ),
        };
        let api_addr = file
            .api
            .as_ref()
            .and_then(|api| api.addr.clone())
            .unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
        let api_token_path = file.api.and_then(|api| api.token_path);
        Self {
            capture_url,
            capture_fps,
            tick,
            service,
            voice,
            api_addr,
            api_token_path,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("DESCRIBER_CAPTURE_URL") {
            if !url.trim().is_empty() {
                self.capture_url = url;
            }
        }
        if let Ok(addr) = std::env::var("DESCRIBER_API_ADDR") {
            if !addr.trim().is_empty() {
                self.api_addr = addr;
            }
        }
        if let Ok(path) = std::env::var("DESCRIBER_API_TOKEN_PATH") {
            if !path.trim().is_empty() {
                self.api_token_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(url) = std::env::var("DESCRIBER_SERVICE_URL") {
            if !url.trim().is_empty() {
                self.service.url = url;
            }
        }
        if let Ok(key) = std::env::var("DESCRIBER_SERVICE_KEY") {
            if !key.trim().is_empty() {
                self.service.api_key = Some(key);
            }
        }
        if let Ok(tick) = std::env::var("DESCRIBER_TICK_MS") {
            let ms: u64 = tick
                .parse()
                .map_err(|_| anyhow!("DESCRIBER_TICK_MS must be an integer number of ms"))?;
            self.tick = Duration::from_millis(ms);
        }
        if let Ok(timeout) = std::env::var("DESCRIBER_LISTEN_TIMEOUT_SECS") {
            let seconds: u64 = timeout.parse().map_err(|_| {
                anyhow!("DESCRIBER_LISTEN_TIMEOUT_SECS must be an integer number of seconds")
            })?;
            self.voice.listen_timeout = Duration::from_secs(seconds);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.tick.is_zero() {
            return Err(anyhow!("display tick must be greater than zero"));
        }
        if self.voice.listen_timeout.is_zero() {
            return Err(anyhow!("listen timeout must be greater than zero"));
        }
        if self.service.timeout.is_zero() {
            return Err(anyhow!("service timeout must be greater than zero"));
        }
        if self.voice.speak_command.is_empty() || self.voice.listen_command.is_empty() {
            return Err(anyhow!("voice commands must not be empty"));
        }
        let service_url = url::Url::parse(&self.service.url)
            .map_err(|e| anyhow!("invalid service url '{}': {}", self.service.url, e))?;
        if !matches!(service_url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "service url must be http(s), got '{}'",
                service_url.scheme()
            ));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<DescriberConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
