//! Intent classification.
//!
//! An ordered table of `(name, pattern, extractor)` rules is tried against
//! the lowercased message text; the first rule that matches decides the
//! intent. Text that matches nothing becomes a knowledge lookup.
//!
//! Lowercasing is done per character with an offset map back into the
//! original, so rules that echo text (`learn` responses, `say_this`) return
//! it with its original casing.
//!
//! Rule order (highest priority first):
//!
//! | rule          | example                                                   |
//! |---------------|-----------------------------------------------------------|
//! | `shut_up`     | `trufa callate durante 5 minutos`                         |
//! | `unmute`      | `trufa ya puedes hablar`                                  |
//! | `forget`      | `trufa olvidate de "hola"`                                |
//! | `learn`       | `trufa aprende a contestar "buenas" cuando digan "hola"` |
//! | `send_cat`    | `trufa dame un gato`                                      |
//! | `send_dog`    | `amigo dame un perro`                                     |
//! | `admin_spam`  | `patataspa`, `trufa spamea a to dios`                     |
//! | `start_game`  | `/start partida`                                          |
//! | `say_this`    | `trufa di "hola a todos"`                                 |

use chrono::{DateTime, Duration, Utc};
use regex_lite::{Captures, Match, Regex};
use tracing::debug;
use trufa_config::BotConfig;
use trufa_core::channel::IncomingMessage;
use trufa_core::error::Error;
use trufa_core::media::MediaKind;

/// What a message asks the bot to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Learn { trigger: String, response: String },
    Forget { trigger: String },
    SendMedia { kind: MediaKind },
    AdminSpam,
    StartGame,
    SayThis { text: String },
    /// `minutes` is whatever the user typed; validation happens when muting
    ShutUp { minutes: Option<i64> },
    Unmute,
    KnownPhraseLookup { text: String },
    None,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Learn { .. } => "learn",
            Self::Forget { .. } => "forget",
            Self::SendMedia { .. } => "send_media",
            Self::AdminSpam => "admin_spam",
            Self::StartGame => "start_game",
            Self::SayThis { .. } => "say_this",
            Self::ShutUp { .. } => "shut_up",
            Self::Unmute => "unmute",
            Self::KnownPhraseLookup { .. } => "known_phrase_lookup",
            Self::None => "none",
        }
    }
}

/// Message text lowercased character by character, remembering where each
/// folded character came from.
struct Folded<'a> {
    original: &'a str,
    lower: String,
    /// `(offset in lower, offset in original)` at every character start, plus
    /// the two end offsets.
    offsets: Vec<(usize, usize)>,
}

impl<'a> Folded<'a> {
    fn new(original: &'a str) -> Self {
        let mut lower = String::with_capacity(original.len());
        let mut offsets = Vec::with_capacity(original.len() + 1);
        for (at, ch) in original.char_indices() {
            for folded in ch.to_lowercase() {
                offsets.push((lower.len(), at));
                lower.push(folded);
            }
        }
        offsets.push((lower.len(), original.len()));
        Self {
            original,
            lower,
            offsets,
        }
    }

    /// Map an offset in the folded text to the nearest character boundary of
    /// the original at or after it.
    fn origin(&self, folded_at: usize) -> usize {
        let i = self.offsets.partition_point(|(lower, _)| *lower < folded_at);
        self.offsets
            .get(i)
            .map_or(self.original.len(), |(_, original)| *original)
    }

    /// The original text behind a match on the folded text.
    fn verbatim(&self, m: Match<'_>) -> &'a str {
        let start = self.origin(m.start());
        let end = self.origin(m.end()).max(start);
        self.original.get(start..end).unwrap_or_default()
    }
}

/// A rule match: captures on the folded text plus the way back to the
/// original.
struct Matched<'c, 'h, 'o> {
    caps: &'c Captures<'h>,
    text: &'c Folded<'o>,
}

impl Matched<'_, '_, '_> {
    /// A group as lowercased text.
    fn lower(&self, name: &str) -> String {
        self.caps
            .name(name)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }

    /// A group with the casing the user typed.
    fn verbatim(&self, name: &str) -> String {
        self.caps
            .name(name)
            .map(|m| self.text.verbatim(m).to_string())
            .unwrap_or_default()
    }
}

type Extractor = fn(&Matched<'_, '_, '_>) -> Intent;

struct Rule {
    name: &'static str,
    pattern: Regex,
    extract: Extractor,
}

/// Maps message text to exactly one [`Intent`].
pub struct Classifier {
    rules: Vec<Rule>,
    stale_after: Duration,
}

impl Classifier {
    /// Build the rule table for the given bot names.
    pub fn new(aliases: &[String], stale_after_secs: u64) -> Result<Self, Error> {
        let names: Vec<String> = aliases
            .iter()
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .map(|a| regex_lite::escape(&a))
            .collect();
        if names.is_empty() {
            return Err(Error::Config {
                message: "at least one bot alias is required".into(),
            });
        }
        let alias = format!("(?:{})", names.join("|"));

        let table: [(&'static str, String, Extractor); 9] = [
            (
                "shut_up",
                format!(r"{alias} c[aá]llate(?: durante (?P<minutes>-?\d+) minutos?)?"),
                |c| Intent::ShutUp {
                    minutes: c.lower("minutes").parse().ok(),
                },
            ),
            (
                "unmute",
                format!(r"{alias} (?:ya )?puedes hablar"),
                |_| Intent::Unmute,
            ),
            (
                "forget",
                format!(r#"{alias} olv[ií]date de "(?P<trigger>.+)""#),
                |c| Intent::Forget {
                    trigger: c.lower("trigger"),
                },
            ),
            (
                "learn",
                format!(r#"{alias} aprende a contestar "(?P<response>.+)" cuando digan "(?P<trigger>.+)""#),
                |c| Intent::Learn {
                    trigger: c.lower("trigger"),
                    response: c.verbatim("response"),
                },
            ),
            (
                "send_cat",
                format!(r"{alias} dame un gato"),
                |_| Intent::SendMedia {
                    kind: MediaKind::Cat,
                },
            ),
            (
                "send_dog",
                format!(r"{alias} dame un perro"),
                |_| Intent::SendMedia {
                    kind: MediaKind::Dog,
                },
            ),
            (
                "admin_spam",
                format!(r"patataspa|{alias} spam(?:ea)? a to dios"),
                |_| Intent::AdminSpam,
            ),
            ("start_game", r"^/start.+".to_string(), |_| Intent::StartGame),
            (
                "say_this",
                format!(r#"{alias} di "(?P<text>.+)""#),
                |c| Intent::SayThis {
                    text: c.verbatim("text"),
                },
            ),
        ];

        let rules = table
            .into_iter()
            .map(|(name, source, extract)| {
                let pattern = Regex::new(&format!("(?i){source}")).map_err(|e| Error::Config {
                    message: format!("classifier rule {name}: {e}"),
                })?;
                Ok(Rule {
                    name,
                    pattern,
                    extract,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self {
            rules,
            stale_after: i64::try_from(stale_after_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
        })
    }

    pub fn from_config(config: &BotConfig) -> Result<Self, Error> {
        Self::new(&config.aliases, config.stale_after_secs)
    }

    /// Classify one inbound message as of `now`.
    ///
    /// Non-text messages and messages older than the staleness threshold are
    /// [`Intent::None`].
    pub fn classify(&self, message: &IncomingMessage, now: DateTime<Utc>) -> Intent {
        let Some(text) = message.text.as_deref().filter(|t| !t.is_empty()) else {
            return Intent::None;
        };

        if now - message.sent_at > self.stale_after {
            debug!(chat_id = %message.chat_id, sent_at = %message.sent_at, "Ignoring stale message");
            return Intent::None;
        }

        self.classify_text(text)
    }

    /// Classify bare text, skipping the staleness check.
    pub fn classify_text(&self, text: &str) -> Intent {
        let folded = Folded::new(text);
        for rule in &self.rules {
            if let Some(caps) = rule.pattern.captures(&folded.lower) {
                debug!(rule = rule.name, "Rule matched");
                return (rule.extract)(&Matched {
                    caps: &caps,
                    text: &folded,
                });
            }
        }
        Intent::KnownPhraseLookup { text: folded.lower }
    }
}
