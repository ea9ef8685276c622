//! Chrome/Chromium discovery and launch
//!
//! Finds a local browser (or downloads a managed Chromium) and starts it with
//! the flags the catalog needs to serve its full SPA to a headless client.

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

use crate::config::BrowserConfig;

/// Environment variable that overrides browser discovery
pub const CHROMIUM_PATH_ENV: &str = "CHROMIUM_PATH";

#[cfg(target_os = "windows")]
const CANDIDATE_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files\Chromium\Application\chrome.exe",
];

#[cfg(target_os = "macos")]
const CANDIDATE_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "~/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "~/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/homebrew/bin/chromium",
];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const CANDIDATE_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/usr/local/bin/chromium",
    "/opt/google/chrome/chrome",
];

/// Binary names tried with `which` on Unix
const WHICH_NAMES: &[&str] = &["chromium", "chromium-browser", "google-chrome", "chrome"];

/// Benign CDP decode errors raised for events chromiumoxide does not model
///
/// Reference: https://github.com/mattsse/chromiumoxide/issues/167
const BENIGN_HANDLER_ERRORS: &[&str] = &[
    "data did not match any variant of untagged enum Message",
    "Failed to deserialize WS response",
];

/// Removes the profile directory on drop unless the launch succeeded
struct ProfileDirGuard {
    path: PathBuf,
    keep: bool,
}

impl ProfileDirGuard {
    fn create(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path).context("Failed to create user data directory")?;
        Ok(Self { path, keep: false })
    }

    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for ProfileDirGuard {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => info!("Removed profile dir after launch failure: {}", self.path.display()),
            Err(e) => warn!("Failed to remove profile dir {}: {}", self.path.display(), e),
        }
    }
}

/// Expand a leading `~/` against the home directory
fn expand_home(candidate: &str) -> Option<PathBuf> {
    match candidate.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(candidate)),
    }
}

/// Find a Chrome/Chromium executable: `$CHROMIUM_PATH`, platform paths, then `which`
pub async fn find_browser_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Using browser from {}: {}", CHROMIUM_PATH_ENV, path.display());
            return Ok(path);
        }
        warn!("{} points to a missing file: {}", CHROMIUM_PATH_ENV, path.display());
    }

    if let Some(path) = CANDIDATE_PATHS
        .iter()
        .filter_map(|candidate| expand_home(candidate))
        .find(|path| path.exists())
    {
        info!("Found browser at: {}", path.display());
        return Ok(path);
    }

    if !cfg!(target_os = "windows") {
        for name in WHICH_NAMES {
            let Ok(output) = Command::new("which").arg(name).output() else {
                continue;
            };
            let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if output.status.success() && !found.is_empty() {
                info!("Found browser using 'which {}': {}", name, found);
                return Ok(PathBuf::from(found));
            }
        }
    }

    warn!("No Chrome/Chromium executable found, falling back to managed download");
    Err(anyhow::anyhow!("Chrome/Chromium executable not found"))
}

/// Download a managed Chromium into the user cache dir and return its executable
pub async fn download_managed_browser() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(|| std::env::temp_dir().join(".cache"))
        .join("library_holdings/chromium");
    info!("Downloading managed Chromium into {}", cache_dir.display());

    std::fs::create_dir_all(&cache_dir).context("Failed to create cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );
    let revision = fetcher.fetch().await.context("Failed to fetch browser")?;

    info!("Downloaded Chromium to: {}", revision.folder_path.display());
    Ok(revision.executable_path)
}

/// Launch the shared browser and spawn its CDP handler task
///
/// The caller owns `user_data_dir` once this returns `Ok`, and must remove it
/// after the browser process has exited.
pub async fn launch_browser(
    config: &BrowserConfig,
    user_data_dir: &Path,
) -> Result<(Browser, JoinHandle<()>)> {
    let chrome_path = match find_browser_executable().await {
        Ok(path) => path,
        Err(_) => download_managed_browser().await?,
    };

    let profile = ProfileDirGuard::create(user_data_dir.to_path_buf())?;

    let mut builder = BrowserConfigBuilder::default()
        .request_timeout(Duration::from_secs(config.request_timeout_secs))
        .window_size(config.window.width, config.window.height)
        .user_data_dir(user_data_dir)
        .chrome_executable(chrome_path);

    builder = if config.headless {
        builder.headless_mode(HeadlessMode::default())
    } else {
        builder.with_head()
    };

    for arg in launch_args(config, should_disable_sandbox()) {
        builder = builder.arg(arg);
    }

    let browser_config = builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

    debug!("Launching browser with config: {:?}", browser_config);
    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .context("Failed to launch browser")?;

    let handler_task = task::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                let message = e.to_string();
                if BENIGN_HANDLER_ERRORS.iter().any(|benign| message.contains(benign)) {
                    trace!("Suppressed benign CDP error: {}", message);
                } else {
                    error!("Browser handler error: {:?}", e);
                }
            }
        }
        info!("Browser handler task completed");
    });

    profile.keep();
    Ok((browser, handler_task))
}

/// Command-line flags for the browser process
fn launch_args(config: &BrowserConfig, in_container: bool) -> Vec<String> {
    let mut args: Vec<String> = [
        "--disable-blink-features=AutomationControlled",
        "--disable-infobars",
        "--disable-notifications",
        "--disable-print-preview",
        "--disable-software-rasterizer",
        "--no-first-run",
        "--no-default-browser-check",
        "--disable-extensions",
        "--disable-popup-blocking",
        "--disable-background-networking",
        "--disable-background-timer-throttling",
        "--disable-backgrounding-occluded-windows",
        "--disable-breakpad",
        "--disable-features=TranslateUI",
        "--disable-hang-monitor",
        "--metrics-recording-only",
        "--password-store=basic",
        "--use-mock-keychain",
        "--hide-scrollbars",
        "--mute-audio",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect();

    args.insert(0, format!("--user-agent={}", config.user_agent));

    if config.disable_security {
        warn!("Disabling browser security features (disable_security=true)");
        args.extend(
            [
                "--disable-web-security",
                "--disable-features=IsolateOrigins,site-per-process",
                "--ignore-certificate-errors",
            ]
            .map(String::from),
        );
    }

    if in_container || config.disable_security {
        if in_container {
            info!("Detected containerized environment, disabling sandbox");
        }
        args.extend(["--no-sandbox", "--disable-setuid-sandbox"].map(String::from));
    }

    args
}

/// setuid sandboxing does not work inside Docker or Kubernetes
fn should_disable_sandbox() -> bool {
    Path::new("/.dockerenv").exists()
        || std::env::var("container").is_ok()
        || std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_comes_first() {
        let config = BrowserConfig {
            user_agent: "TestAgent/1.0".to_string(),
            ..BrowserConfig::default()
        };
        let args = launch_args(&config, false);
        assert_eq!(args[0], "--user-agent=TestAgent/1.0");
        assert!(!args.iter().any(|a| a == "--no-sandbox"));
        assert!(!args.iter().any(|a| a == "--disable-web-security"));
    }

    #[test]
    fn container_disables_sandbox_only() {
        let args = launch_args(&BrowserConfig::default(), true);
        assert!(args.iter().any(|a| a == "--no-sandbox"));
        assert!(!args.iter().any(|a| a == "--disable-web-security"));
    }

    #[test]
    fn disable_security_adds_flags() {
        let config = BrowserConfig {
            disable_security: true,
            ..BrowserConfig::default()
        };
        let args = launch_args(&config, false);
        assert!(args.iter().any(|a| a == "--disable-web-security"));
        assert!(args.iter().any(|a| a == "--no-sandbox"));
    }

    #[test]
    fn absolute_candidates_are_unchanged() {
        assert_eq!(
            expand_home("/usr/bin/chromium"),
            Some(PathBuf::from("/usr/bin/chromium"))
        );
    }
}
