//! Browser fingerprint patching — hide automation signals.

use crate::config::BrowserOptions;

/// Installed on every new document before any page script runs.
pub const STEALTH_SCRIPT: &str = r#"
(() => {
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true,
    });

    if (!window.chrome) {
        window.chrome = {};
    }
    if (!window.chrome.runtime) {
        window.chrome.runtime = {
            connect: function() {},
            sendMessage: function() {},
        };
    }

    Object.defineProperty(navigator, 'plugins', {
        get: () => [1, 2, 3, 4, 5],
        configurable: true,
    });

    Object.defineProperty(navigator, 'languages', {
        get: () => ['ko-KR', 'ko', 'en-US', 'en'],
        configurable: true,
    });
})();
"#;

/// Switches that drop the automation flag Chromium exposes to page scripts.
const AUTOMATION_SWITCHES: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-dev-shm-usage",
    "--log-level=3",
];

/// Command-line switches for a launch with `options`.
pub fn launch_args(options: &BrowserOptions) -> Vec<String> {
    let mut args: Vec<String> = AUTOMATION_SWITCHES.iter().map(|s| s.to_string()).collect();
    args.push(format!("--user-agent={}", options.user_agent));
    args.push(format!("--lang={}", primary_language(&options.accept_language)));
    args.extend(options.extra_args.iter().cloned());
    args
}

/// First tag of an Accept-Language value (`ko-KR,ko;q=0.9` → `ko-KR`).
fn primary_language(accept_language: &str) -> &str {
    accept_language
        .split([',', ';'])
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("en-US")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_args_hide_automation() {
        let options = BrowserOptions {
            extra_args: vec!["--mute-audio".to_string()],
            ..BrowserOptions::default()
        };
        let args = launch_args(&options);
        assert!(args.contains(&"--disable-blink-features=AutomationControlled".to_string()));
        assert!(args.iter().any(|a| a.starts_with("--user-agent=Mozilla/5.0")));
        assert!(args.contains(&"--lang=ko-KR".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--mute-audio"));
    }

    #[test]
    fn test_primary_language() {
        assert_eq!(primary_language("ko-KR,ko;q=0.9"), "ko-KR");
        assert_eq!(primary_language(""), "en-US");
    }

    #[test]
    fn test_script_hides_webdriver() {
        assert!(STEALTH_SCRIPT.contains("'webdriver'"));
        assert!(STEALTH_SCRIPT.contains("get: () => undefined"));
    }
}
