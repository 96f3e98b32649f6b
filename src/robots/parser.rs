//! Robots.txt rules for the tracked marketplace, matched with the robotstxt crate

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Robots.txt rules as they apply to this crawler
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    /// Product token matched against User-agent groups
    agent: String,
}

impl RobotsPolicy {
    /// Creates a policy from raw robots.txt content
    pub fn from_content(content: &str, agent: &str) -> Self {
        Self {
            content: content.to_string(),
            agent: agent.to_string(),
        }
    }

    /// A permissive policy, used when robots.txt is absent or not respected
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            agent: String::new(),
        }
    }

    /// Checks if a URL may be fetched
    pub fn is_allowed(&self, url: &str) -> bool {
        if self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, &self.agent, url)
    }

    /// The Crawl-delay that applies to this agent, if any
    ///
    /// A group naming this agent wins over the wildcard group.
    pub fn crawl_delay(&self) -> Option<Duration> {
        let agent = self.agent.to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut group_closed = false;
        let mut wildcard = None;
        let mut specific = None;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_lowercase().as_str() {
                "user-agent" => {
                    // A User-agent line after rules starts a new group
                    if group_closed {
                        group.clear();
                        group_closed = false;
                    }
                    group.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    group_closed = true;
                    let Ok(seconds) = value.parse::<f64>() else {
                        continue;
                    };
                    if seconds < 0.0 || !seconds.is_finite() {
                        continue;
                    }
                    if group.iter().any(|ua| ua != "*" && agent.contains(ua.as_str())) {
                        specific = Some(seconds);
                    } else if group.iter().any(|ua| ua == "*") {
                        wildcard = Some(seconds);
                    }
                }
                _ => group_closed = true,
            }
        }

        specific.or(wildcard).map(Duration::from_secs_f64)
    }
}
