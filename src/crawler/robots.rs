//! robots.txt parsing and `Allow`/`Disallow` rule evaluation.

use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct Rule {
    pub allow: Vec<String>,
    pub disallow: Vec<String>,
    pub delay: u64,
}

#[derive(Debug, Clone, Default)]
pub struct RobotsTxt {
    pub rules: HashMap<String, Rule>,
}

impl RobotsTxt {
    pub fn parse(content: &str) -> Self {
        let mut rules: HashMap<String, Rule> = HashMap::new();
        let mut current_agent: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.splitn(2, char::is_whitespace);
            let directive = match parts.next() {
                Some(d) => d.to_lowercase(),
                None => continue,
            };
            let value = match parts.next() {
                Some(v) => v.trim().to_string(),
                None => continue,
            };

            match directive.as_str() {
                "user-agent:" => {
                    current_agent = Some(value.clone());
                    rules.entry(value).or_default();
                }
                "allow:" => {
                    if let Some(agent) = &current_agent {
                        rules.entry(agent.clone()).or_default().allow.push(value);
                    }
                }
                "disallow:" => {
                    if let Some(agent) = &current_agent {
                        rules.entry(agent.clone()).or_default().disallow.push(value);
                    }
                }
                "crawl-delay:" => {
                    if let Some(agent) = &current_agent {
                        if let Ok(d) = value.parse::<u64>() {
                            rules.entry(agent.clone()).or_default().delay = d;
                        }
                    }
                }
                _ => {}
            }
        }

        RobotsTxt { rules }
    }

    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        for agent in [user_agent, "*"] {
            if let Some(rule) = self.rules.get(agent) {
                if rule.disallow.iter().any(|d| path.starts_with(d.as_str())) {
                    return false;
                }
                if rule.allow.iter().any(|a| path.starts_with(a.as_str())) {
                    return true;
                }
                return true;
            }
        }
        true
    }

    pub fn wildcard_delay(&self) -> Option<u64> {
        self.rules.get("*").map(|r| r.delay).filter(|d| *d > 0)
    }
}

pub const ROBOTS_FETCH_TIMEOUT: Duration = Duration::from_secs(3);

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "User-agent: *\nDisallow: /private\nAllow: /private/public\nCrawl-delay: 5\n";

    #[test]
    fn disallow_prefix_blocks() {
        let robots = RobotsTxt::parse(SAMPLE);
        assert!(!robots.is_allowed("anybot", "/private/secret"));
    }

    #[test]
    fn allow_prefix_overrides_inside_disallowed_tree() {
        let robots = RobotsTxt::parse(SAMPLE);
        assert!(robots.is_allowed("anybot", "/private/public/page"));
    }

    #[test]
    fn unmatched_path_defaults_to_allowed() {
        let robots = RobotsTxt::parse(SAMPLE);
        assert!(robots.is_allowed("anybot", "/other"));
    }

    #[test]
    fn crawl_delay_is_parsed() {
        let robots = RobotsTxt::parse(SAMPLE);
        assert_eq!(robots.wildcard_delay(), Some(5));
    }
}
