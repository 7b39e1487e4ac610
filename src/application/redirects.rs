//! Ordered redirect rules.
//!
//! Rules are tried in stored order and the first match wins, regardless of
//! how specific a later rule is. A `from` starting with `~` is an unanchored
//! regular expression tested against the raw request path.

use std::borrow::Cow;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::settings::{RedirectList, SettingsStore, SettingsStoreError};
use crate::cache::{rw_read, rw_write};
use crate::domain::redirects::{MAX_REDIRECTS, RedirectRule, RulePattern, exact_matches};
use crate::domain::types::RedirectType;

const SOURCE: &str = "application::redirects";

/// Compiled rules are reloaded from storage after this long so that writes
/// from other processes become visible.
const SNAPSHOT_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("invalid redirect: {0}")]
    Validation(String),
    #[error("redirect limit of {max} rules reached")]
    LimitReached { max: usize },
    #[error("no redirect from `{0}`")]
    NotFound(String),
    #[error(transparent)]
    Settings(#[from] SettingsStoreError),
}

/// Result of a successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectMatch {
    pub from: String,
    pub location: String,
    pub kind: RedirectType,
}

/// Import entry; fields are optional so missing ones can be reported.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportRule {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<u16>,
    #[serde(default)]
    pub hits: Option<u64>,
}

impl From<RedirectRule> for ImportRule {
    fn from(rule: RedirectRule) -> Self {
        Self {
            from: Some(rule.from),
            to: Some(rule.to),
            kind: Some(rule.kind.status_code()),
            hits: Some(rule.hits),
        }
    }
}

struct CompiledRule {
    rule: RedirectRule,
    /// `None` for exact rules and for regex rules that failed to compile.
    regex: Option<Regex>,
}

struct Snapshot {
    rules: Vec<CompiledRule>,
    loaded_at: Instant,
}

impl Snapshot {
    fn compile(list: RedirectList) -> Self {
        let rules = list
            .rules
            .into_iter()
            .map(|rule| {
                let regex = match rule.pattern() {
                    RulePattern::Exact(_) => None,
                    RulePattern::Regex(expression) => match Regex::new(expression) {
                        Ok(regex) => Some(regex),
                        Err(err) => {
                            warn!(
                                target = SOURCE,
                                from = %rule.from,
                                error = %err,
                                "skipping redirect with malformed pattern"
                            );
                            None
                        }
                    },
                };
                CompiledRule { rule, regex }
            })
            .collect();
        Self {
            rules,
            loaded_at: Instant::now(),
        }
    }

    fn find(&self, path: &str) -> Option<RedirectMatch> {
        self.rules.iter().find_map(|compiled| {
            let rule = &compiled.rule;
            match rule.pattern() {
                RulePattern::Exact(from) => exact_matches(from, path).then(|| RedirectMatch {
                    from: rule.from.clone(),
                    location: rule.to.clone(),
                    kind: rule.kind,
                }),
                RulePattern::Regex(_) => {
                    let captures = compiled.regex.as_ref()?.captures(path)?;
                    let mut location = String::new();
                    captures.expand(&brace_group_refs(&rule.to), &mut location);
                    Some(RedirectMatch {
                        from: rule.from.clone(),
                        location,
                        kind: rule.kind,
                    })
                }
            }
        })
    }
}

pub struct RedirectMatcher {
    settings: SettingsStore,
    max_rules: usize,
    hit_tracking: bool,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    /// Held across every read-modify-write of the stored list so a hit
    /// counter update cannot overwrite an admin edit.
    writes: Mutex<()>,
}

impl RedirectMatcher {
    pub fn new(settings: SettingsStore, max_rules: usize, hit_tracking: bool) -> Self {
        Self {
            settings,
            max_rules: max_rules.clamp(1, MAX_REDIRECTS),
            hit_tracking,
            snapshot: RwLock::new(None),
            writes: Mutex::new(()),
        }
    }

    pub fn max_rules(&self) -> usize {
        self.max_rules
    }

    pub fn hit_tracking(&self) -> bool {
        self.hit_tracking
    }

    /// First rule matching `path`, with capture groups substituted into the
    /// target for regex rules.
    pub async fn find(&self, path: &str) -> Result<Option<RedirectMatch>, RedirectError> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.find(path))
    }

    /// Increments the hit counter of the rule with `from`, if it still
    /// exists. Writers in other processes may still lose increments.
    pub async fn record_hit(&self, from: &str) -> Result<(), RedirectError> {
        let _guard = self.writes.lock().await;
        let mut list = self.settings.redirects().await?;
        let Some(rule) = list.rules.iter_mut().find(|rule| rule.from == from) else {
            return Ok(());
        };
        rule.hits = rule.hits.saturating_add(1);
        self.settings.save_redirects(&list).await?;
        metrics::counter!("waymark_redirect_hit_total").increment(1);
        Ok(())
    }

    /// Appends a permanent redirect for a renamed published item unless the
    /// paths are equal, a rule from `old_path` already exists, or the list is
    /// full. Returns whether a rule was added.
    pub async fn record_rename(&self, old_path: &str, new_path: &str) -> Result<bool, RedirectError> {
        let (old_path, new_path) = (old_path.trim(), new_path.trim());
        if old_path.is_empty() || new_path.is_empty() || old_path == new_path {
            return Ok(false);
        }

        let _guard = self.writes.lock().await;
        let mut list = self.settings.redirects().await?;
        if list.rules.iter().any(|rule| rule.from == old_path) {
            debug!(target = SOURCE, from = old_path, "rename redirect already present");
            return Ok(false);
        }
        if list.rules.len() >= self.max_rules {
            warn!(
                target = SOURCE,
                from = old_path,
                to = new_path,
                max = self.max_rules,
                "redirect limit reached, rename not recorded"
            );
            return Ok(false);
        }

        list.rules.push(RedirectRule::permanent(old_path, new_path));
        self.save(&list).await?;
        info!(target = SOURCE, from = old_path, to = new_path, "rename redirect recorded");
        Ok(true)
    }

    /// Adds a rule, replacing any rule with the same `from`. The new rule
    /// goes to the end of the match order.
    pub async fn add(
        &self,
        from: &str,
        to: &str,
        kind: Option<u16>,
    ) -> Result<RedirectRule, RedirectError> {
        let (from, to) = (from.trim(), to.trim());
        if from.is_empty() || to.is_empty() {
            return Err(RedirectError::Validation(
                "both `from` and `to` are required".into(),
            ));
        }
        if let RulePattern::Regex(expression) = RedirectRule::permanent(from, to).pattern() {
            Regex::new(expression).map_err(|err| {
                RedirectError::Validation(format!("`{from}` is not a valid pattern: {err}"))
            })?;
        }

        let _guard = self.writes.lock().await;
        let mut list = self.settings.redirects().await?;
        list.rules.retain(|rule| rule.from != from);
        if list.rules.len() >= self.max_rules {
            return Err(RedirectError::LimitReached {
                max: self.max_rules,
            });
        }

        let rule = RedirectRule {
            from: from.to_string(),
            to: to.to_string(),
            kind: kind.map(RedirectType::from).unwrap_or_default(),
            hits: 0,
        };
        list.rules.push(rule.clone());
        self.save(&list).await?;
        info!(target = SOURCE, from, to, status = rule.kind.status_code(), "redirect added");
        Ok(rule)
    }

    pub async fn delete(&self, from: &str) -> Result<(), RedirectError> {
        let _guard = self.writes.lock().await;
        let mut list = self.settings.redirects().await?;
        let before = list.rules.len();
        list.rules.retain(|rule| rule.from != from);
        if list.rules.len() == before {
            return Err(RedirectError::NotFound(from.to_string()));
        }
        self.save(&list).await?;
        info!(target = SOURCE, from, "redirect deleted");
        Ok(())
    }

    /// Replaces the whole list, hit counts included. Nothing is written if
    /// any entry lacks `from` or `to`, or the list exceeds the limit.
    pub async fn import(&self, entries: Vec<ImportRule>) -> Result<usize, RedirectError> {
        let mut rules: Vec<RedirectRule> = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            let from = entry.from.as_deref().map(str::trim).unwrap_or_default();
            let to = entry.to.as_deref().map(str::trim).unwrap_or_default();
            if from.is_empty() || to.is_empty() {
                return Err(RedirectError::Validation(format!(
                    "entry {index} is missing `from` or `to`"
                )));
            }
            rules.retain(|rule| rule.from != from);
            rules.push(RedirectRule {
                from: from.to_string(),
                to: to.to_string(),
                kind: entry.kind.map(RedirectType::from).unwrap_or_default(),
                hits: entry.hits.unwrap_or(0),
            });
        }
        if rules.len() > self.max_rules {
            return Err(RedirectError::LimitReached {
                max: self.max_rules,
            });
        }

        let count = rules.len();
        let _guard = self.writes.lock().await;
        self.save(&RedirectList { rules }).await?;
        info!(target = SOURCE, count, "redirects imported");
        Ok(count)
    }

    pub async fn export(&self) -> Result<Vec<RedirectRule>, RedirectError> {
        Ok(self.settings.redirects().await?.rules)
    }

    async fn save(&self, list: &RedirectList) -> Result<(), RedirectError> {
        self.settings.save_redirects(list).await?;
        *rw_write(&self.snapshot, SOURCE, "save.reset") = None;
        Ok(())
    }

    async fn snapshot(&self) -> Result<Arc<Snapshot>, RedirectError> {
        if let Some(snapshot) = rw_read(&self.snapshot, SOURCE, "snapshot.read").clone()
            && snapshot.loaded_at.elapsed() < SNAPSHOT_TTL
        {
            return Ok(snapshot);
        }

        let list = self.settings.redirects().await?;
        let snapshot = Arc::new(Snapshot::compile(list));
        *rw_write(&self.snapshot, SOURCE, "snapshot.write") = Some(snapshot.clone());
        Ok(snapshot)
    }
}

/// Rewrites `$N` as `${N}` so a digit reference followed by text is not
/// read as a named group.
fn brace_group_refs(target: &str) -> Cow<'_, str> {
    if !target.contains('$') {
        return Cow::Borrowed(target);
    }

    let mut out = String::with_capacity(target.len() + 4);
    let mut chars = target.char_indices().peekable();
    while let Some((_, ch)) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }
        match chars.peek() {
            Some((_, '$')) => {
                out.push_str("$$");
                chars.next();
            }
            Some((_, next)) if next.is_ascii_digit() => {
                out.push_str("${");
                while let Some((_, digit)) = chars.peek().copied().filter(|(_, c)| c.is_ascii_digit())
                {
                    out.push(digit);
                    chars.next();
                }
                out.push('}');
            }
            _ => out.push('$'),
        }
    }
    Cow::Owned(out)
}
