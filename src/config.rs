use std::time::Duration;

use crate::browser::Browser;
use crate::error::Result;

pub struct BrowserConfig {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub chrome_path: Option<String>,
    /// Default timeout for `wait_for_selector` and navigation waits (default: 30s).
    pub default_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            chrome_path: None,
            default_timeout: Duration::from_secs(30),
        }
    }
}

pub struct BrowserBuilder {
    config: BrowserConfig,
}

impl BrowserBuilder {
    pub fn new() -> Self {
        Self {
            config: BrowserConfig::default(),
        }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        self
    }

    pub fn chrome_path(mut self, path: impl Into<String>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    pub fn build_config(self) -> BrowserConfig {
        self.config
    }

    pub async fn build(self) -> Result<Browser> {
        Browser::launch(self.build_config()).await
    }
}

impl Default for BrowserBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Fill execution settings.
#[derive(Debug, Clone)]
pub struct FillConfig {
    /// Budget for one field's whole interaction sequence.
    pub action_timeout: Duration,
    /// Pause after opening a panel or typing, so the page can react.
    pub settle_delay: Duration,
    /// Values longer than this are truncated in fill records.
    pub display_chars: usize,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            action_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_millis(150),
            display_chars: 50,
        }
    }
}

impl FillConfig {
    pub fn action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn display_chars(mut self, chars: usize) -> Self {
        self.display_chars = chars;
        self
    }
}

/// Agent loop limits.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Hard ceiling on observe/decide/act cycles (default: 40).
    pub max_steps: usize,
    /// Action-history entries sent with each prompt.
    pub history_window: usize,
    /// Sliding window of action keys inspected for repetition.
    pub loop_window: usize,
    /// Occurrences of one key inside the window that count as a loop.
    pub loop_threshold: usize,
    /// Consecutive failed actions that end the run.
    pub max_consecutive_failures: usize,
    pub oracle_timeout: Duration,
    /// Wall-clock limit for the whole run; `None` means step-bounded only.
    pub run_budget: Option<Duration>,
    /// Pause after each action before observing again.
    pub step_delay: Duration,
    pub fill: FillConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 40,
            history_window: 5,
            loop_window: 5,
            loop_threshold: 3,
            max_consecutive_failures: 5,
            oracle_timeout: Duration::from_secs(60),
            run_budget: None,
            step_delay: Duration::from_millis(500),
            fill: FillConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn max_steps(mut self, steps: usize) -> Self {
        self.max_steps = steps;
        self
    }

    pub fn oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }

    pub fn run_budget(mut self, budget: Duration) -> Self {
        self.run_budget = Some(budget);
        self
    }

    pub fn step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn fill(mut self, fill: FillConfig) -> Self {
        self.fill = fill;
        self
    }
}
