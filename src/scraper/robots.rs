use reqwest::Client;
use texting_robots::Robot;
use tracing::{debug, warn};
use url::Url;

/// Crawl-permission rules for one site, loaded once per session.
///
/// Fails open: if robots.txt cannot be fetched or parsed for any reason,
/// every URL is considered fetchable.
pub struct RobotsPolicy {
    robot: Option<Robot>,
}

impl RobotsPolicy {
    /// Single load attempt against `<origin>/robots.txt`. No retries.
    pub async fn load(client: &Client, base: &Url) -> Self {
        let robots_url = match base.join("/robots.txt") {
            Ok(u) => u,
            Err(e) => {
                warn!("Cannot build robots.txt URL for {}: {}", base, e);
                return Self { robot: None };
            }
        };

        let body = match client.get(robots_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.bytes().await {
                Ok(b) => b,
                Err(e) => {
                    debug!("robots.txt body read failed for {}: {}", base, e);
                    return Self { robot: None };
                }
            },
            Ok(resp) => {
                debug!("robots.txt for {} returned {}", base, resp.status());
                return Self { robot: None };
            }
            Err(e) => {
                debug!("robots.txt fetch failed for {}: {}", base, e);
                return Self { robot: None };
            }
        };

        Self::from_rules(&body)
    }

    /// Parse rules for the wildcard agent; unparseable rules fail open.
    pub fn from_rules(txt: &[u8]) -> Self {
        match Robot::new("*", txt) {
            Ok(robot) => Self { robot: Some(robot) },
            Err(e) => {
                debug!("robots.txt parse failed: {}", e);
                Self { robot: None }
            }
        }
    }

    /// Policy with no rules loaded; everything is fetchable.
    pub fn open() -> Self {
        Self { robot: None }
    }

    pub fn can_fetch(&self, url: &str) -> bool {
        match &self.robot {
            Some(robot) => robot.allowed(url),
            None => true,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_open_without_rules() {
        let policy = RobotsPolicy::open();
        assert!(policy.can_fetch("https://www.boe.es/anything"));
    }

    #[test]
    fn test_disallow_honoured() {
        let rules = b"User-agent: *\nDisallow: /private/\n";
        let policy = RobotsPolicy::from_rules(rules);
        assert!(!policy.can_fetch("https://www.boe.es/private/doc.php"));
        assert!(policy.can_fetch("https://www.boe.es/diario_boe/xml.php?id=1"));
    }

    #[test]
    fn test_garbage_rules_fail_open() {
        // texting_robots is lenient, but whatever it cannot use must not
        // block fetching
        let policy = RobotsPolicy::from_rules(&[0xff, 0xfe, 0x00]);
        assert!(policy.can_fetch("https://www.boe.es/"));
    }
}
