//! Robots.txt parsing and per-host caching, ported from this
//! workspace's `extraction::crawlers::robots` almost unchanged — the
//! parser and `is_allowed` matching logic are a direct fit for a
//! robots policy gate. What's new here is the TTL-bounded cache
//! (`RobotsCache`), since the original crawler fetched robots.txt
//! fresh on every call.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
pub struct RobotsTxt {
    rules: HashMap<String, AgentRules>,
    default_rules: AgentRules,
    crawl_delay: Option<f64>,
    sitemaps: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct AgentRules {
    disallow: Vec<String>,
    allow: Vec<String>,
    crawl_delay: Option<f64>,
}

impl RobotsTxt {
    pub fn parse(content: &str) -> Self {
        let mut robots = Self::default();
        let mut current_agents: Vec<String> = Vec::new();
        let mut current_rules = AgentRules::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    if !current_agents.is_empty() {
                        for agent in &current_agents {
                            if agent == "*" {
                                robots.default_rules = current_rules.clone();
                            } else {
                                robots.rules.insert(agent.clone(), current_rules.clone());
                            }
                        }
                        current_rules = AgentRules::default();
                        current_agents.clear();
                    }
                    current_agents.push(value.to_lowercase());
                }
                "disallow" => {
                    if !value.is_empty() {
                        current_rules.disallow.push(value.to_string());
                    }
                }
                "allow" => {
                    if !value.is_empty() {
                        current_rules.allow.push(value.to_string());
                    }
                }
                "crawl-delay" => {
                    if let Ok(delay) = value.parse::<f64>() {
                        current_rules.crawl_delay = Some(delay);
                        if robots.crawl_delay.is_none() {
                            robots.crawl_delay = Some(delay);
                        }
                    }
                }
                "sitemap" => robots.sitemaps.push(value.to_string()),
                _ => {}
            }
        }

        for agent in current_agents {
            if agent == "*" {
                robots.default_rules = current_rules.clone();
            } else {
                robots.rules.insert(agent, current_rules.clone());
            }
        }

        robots
    }

    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let agent_lower = user_agent.to_lowercase();

        let rules = self
            .rules
            .get(&agent_lower)
            .or_else(|| {
                self.rules
                    .iter()
                    .find(|(k, _)| agent_lower.contains(k.as_str()))
                    .map(|(_, v)| v)
            })
            .unwrap_or(&self.default_rules);

        for allow in &rules.allow {
            if path.starts_with(allow) {
                return true;
            }
        }
        for disallow in &rules.disallow {
            if disallow == "/" {
                return false;
            }
            if path.starts_with(disallow) {
                return false;
            }
        }
        true
    }

    #[allow(dead_code)]
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        let agent_lower = user_agent.to_lowercase();
        self.rules
            .get(&agent_lower)
            .and_then(|r| r.crawl_delay)
            .or(self.crawl_delay)
            .map(Duration::from_secs_f64)
    }

    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }
}

async fn fetch_robots_txt(client: &reqwest::Client, site_origin: &str) -> RobotsTxt {
    let url = format!("{}/robots.txt", site_origin.trim_end_matches('/'));
    match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => match response.text().await {
            Ok(content) => RobotsTxt::parse(&content),
            Err(_) => RobotsTxt::default(),
        },
        // No robots.txt, or it errored — allow all, the conventional
        // default when a site doesn't publish one.
        _ => RobotsTxt::default(),
    }
}

struct CacheEntry {
    robots: RobotsTxt,
    fetched_at: Instant,
}

/// TTL-bounded, per-host robots.txt cache (`robots_ttl`).
pub struct RobotsCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl RobotsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns whether `path` on `origin` (scheme://host[:port]) is
    /// allowed for `user_agent`, fetching and caching robots.txt for
    /// `origin` if the cache entry is missing or stale.
    ///
    /// The fetch itself happens with no lock held: holding the single
    /// cache-wide mutex across a network call would serialize robots
    /// lookups for every host behind whichever one is currently
    /// fetching, quietly defeating `max_concurrent_company_crawls`. A
    /// stale entry can race two concurrent fetches for the same
    /// origin; the second one's result just overwrites the first's,
    /// which is harmless for a cache.
    pub async fn is_allowed(
        &self,
        client: &reqwest::Client,
        origin: &str,
        user_agent: &str,
        path: &str,
    ) -> bool {
        let fresh = {
            let entries = self.entries.lock().await;
            entries
                .get(origin)
                .map(|entry| entry.fetched_at.elapsed() < self.ttl)
                .unwrap_or(false)
        };

        if !fresh {
            let robots = fetch_robots_txt(client, origin).await;
            let mut entries = self.entries.lock().await;
            entries.insert(
                origin.to_string(),
                CacheEntry {
                    robots,
                    fetched_at: Instant::now(),
                },
            );
        }

        let entries = self.entries.lock().await;
        entries
            .get(origin)
            .map(|entry| entry.robots.is_allowed(user_agent, path))
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_public_disallows_private() {
        let content = "User-agent: *\nDisallow: /private/\nAllow: /public/\n";
        let robots = RobotsTxt::parse(content);
        assert!(robots.is_allowed("AnyBot", "/public/page"));
        assert!(!robots.is_allowed("AnyBot", "/private/page"));
    }

    #[test]
    fn specific_agent_overrides_wildcard() {
        let content = "User-agent: *\nDisallow: /\n\nUser-agent: goodbot\nDisallow:\nAllow: /\n";
        let robots = RobotsTxt::parse(content);
        assert!(!robots.is_allowed("BadBot", "/page"));
        assert!(robots.is_allowed("GoodBot", "/page"));
    }

    #[test]
    fn allow_overrides_more_specific_disallow() {
        let content = "User-agent: *\nDisallow: /private/\nAllow: /private/public/\n";
        let robots = RobotsTxt::parse(content);
        assert!(!robots.is_allowed("Bot", "/private/secret"));
        assert!(robots.is_allowed("Bot", "/private/public/page"));
    }

    #[test]
    fn empty_robots_allows_everything() {
        let robots = RobotsTxt::parse("");
        assert!(robots.is_allowed("AnyBot", "/any/path"));
    }
}
