use crate::types::Intent;
use crate::utils::text::is_upper_case;
use interfaces::defs::InboundEvent;
use url::Url;

pub const WHO_PREFIX: &str = "!who";
pub const DECIDE_PREFIX: &str = "!decide";
pub const VOTEKICK_PREFIX: &str = "!votekick";

/// At most this many links are looked up per message
pub const MAX_URLS_PER_MESSAGE: usize = 2;

/// Shouts must be longer than this many characters.
const MIN_SHOUT_LEN: usize = 5;

/// Whether `event` counts as a shout: all-caps text with at least one letter,
/// longer than five characters, not sent by the bot itself.
pub fn qualifies_as_shout(event: &InboundEvent) -> bool {
    !event.is_self && event.text.chars().count() > MIN_SHOUT_LEN && is_upper_case(&event.text)
}

/// Classify one message into the intents it triggers.
///
/// Shout, `!who`, `!decide` and `!votekick` are mutually exclusive and checked
/// in that order. Links are collected from every message regardless.
pub fn classify(text: &str, is_shout: bool) -> Vec<Intent> {
    let mut intents = Vec::new();

    if let Some(command) = classify_command(text, is_shout) {
        intents.push(command);
    }

    intents.extend(scan_urls(text).into_iter().map(Intent::UrlCandidate));
    intents
}

fn classify_command(text: &str, is_shout: bool) -> Option<Intent> {
    if is_shout {
        return Some(Intent::Shout);
    }

    if let Some(rest) = text.strip_prefix(WHO_PREFIX) {
        return Some(Intent::WhoQuery(rest.trim().to_string()));
    }

    if let Some(rest) = text.strip_prefix(DECIDE_PREFIX) {
        return Some(Intent::Decide(rest.to_string()));
    }

    if let Some(rest) = text.strip_prefix(VOTEKICK_PREFIX) {
        let target = rest.trim();
        if target.is_empty() {
            return None;
        }
        return Some(Intent::Votekick(target.to_string()));
    }

    None
}

/// Space-separated tokens of `text` that are absolute http(s) URLs, in order,
/// capped at [`MAX_URLS_PER_MESSAGE`].
pub fn scan_urls(text: &str) -> Vec<Url> {
    text.split(' ')
        .filter_map(parse_absolute_url)
        .take(MAX_URLS_PER_MESSAGE)
        .collect()
}

fn parse_absolute_url(token: &str) -> Option<Url> {
    let url = Url::parse(token).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(url),
        _ => None,
    }
}
