use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::session::SessionConfig;

pub const HELP_KEYS: &str = "\
Key Bindings:
  Wheel          : Scroll
  Ctrl + Wheel   : Zoom in / out
  + / -          : Zoom in / out
  Up / Down      : Page up / down
  PgUp / PgDn    : Page up / down
  Home / End     : Top / bottom of folder
  Left           : Page up (images) / Back (folders)
  Right          : Page down (images)
  Backspace      : Back to previous folder
  Click          : Open folder / header buttons
  Esc            : Toggle fullscreen
  i              : Toggle info overlay
  ?              : Toggle help overlay
  q              : Quit
";

#[derive(Parser)]
#[command(
    name = "fv",
    about = "Browse folders of images as one long strip",
    after_help = HELP_KEYS
)]
pub struct Cli {
    /// Folder to start in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Start in a window instead of fullscreen
    #[arg(long)]
    pub windowed: bool,

    /// Cap decoded image memory (e.g. 512MB, 2GB, auto = 10% of RAM). Unbounded if unset.
    #[arg(short, long)]
    pub memory: Option<String>,

    /// Delay in ms between scrolling and loading newly visible images
    #[arg(long, default_value = "50")]
    pub scroll_debounce: u64,

    /// Delay in ms before the scroll position is restored after a zoom
    #[arg(long, default_value = "100")]
    pub settle_delay: u64,

    /// Pixels scrolled per mouse wheel line
    #[arg(long, default_value = "60")]
    pub line_step: f32,
}

impl Cli {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            scroll_debounce: Duration::from_millis(self.scroll_debounce),
            settle_delay: Duration::from_millis(self.settle_delay),
            line_step: self.line_step.max(1.0),
            cache_budget: self.memory.as_deref().map(parse_memory_budget),
        }
    }
}

pub fn parse_memory_budget(s: &str) -> u64 {
    let s = s.trim().to_uppercase();
    if s == "AUTO" {
        default_memory_budget()
    } else if let Some(num) = s.strip_suffix("GB") {
        (num.trim().parse::<f64>().unwrap_or(1.0) * 1024.0 * 1024.0 * 1024.0) as u64
    } else if let Some(num) = s.strip_suffix("MB") {
        (num.trim().parse::<f64>().unwrap_or(512.0) * 1024.0 * 1024.0) as u64
    } else {
        (s.parse::<f64>().unwrap_or(512.0) * 1024.0 * 1024.0) as u64
    }
}

pub fn default_memory_budget() -> u64 {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    sys.total_memory() / 10
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn test_parse_memory_budget_units() {
        assert_eq!(parse_memory_budget("2GB"), 2 * 1024 * MB);
        assert_eq!(parse_memory_budget("1.5gb"), 1536 * MB);
        assert_eq!(parse_memory_budget(" 256 MB "), 256 * MB);
        assert_eq!(parse_memory_budget("64"), 64 * MB);
        assert_eq!(parse_memory_budget("lots"), 512 * MB);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["fv"]);
        assert_eq!(cli.path, PathBuf::from("."));
        assert!(!cli.windowed);
        let config = cli.session_config();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_flags_reach_session_config() {
        let cli = Cli::parse_from([
            "fv",
            "comics",
            "--windowed",
            "-m",
            "1GB",
            "--scroll-debounce",
            "20",
            "--settle-delay",
            "250",
            "--line-step",
            "120",
        ]);
        assert_eq!(cli.path, PathBuf::from("comics"));
        assert!(cli.windowed);
        let config = cli.session_config();
        assert_eq!(config.scroll_debounce, Duration::from_millis(20));
        assert_eq!(config.settle_delay, Duration::from_millis(250));
        assert_eq!(config.line_step, 120.0);
        assert_eq!(config.cache_budget, Some(1024 * MB));
    }
}
