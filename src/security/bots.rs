//! Crawler and link-unfurler detection.
//!
//! Chat clients fetch links pasted into a conversation to render previews.
//! On a single-use server that fetch would burn the link before the intended
//! recipient opens it, so these agents get their connection dropped before
//! any handler runs.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::USER_AGENT, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use regex::RegexSet;

use crate::http::response::Abort;

/// Built-in crawler signatures, matched case-sensitively against `User-Agent`.
pub const CRAWLER_PATTERNS: &[&str] = &[
    r"Googlebot",
    r"Googlebot-Image|Googlebot-Video|Googlebot-News",
    r"Google-InspectionTool",
    r"AdsBot-Google",
    r"Mediapartners-Google",
    r"APIs-Google",
    r"FeedFetcher-Google",
    r"Google-Read-Aloud",
    r"bingbot",
    r"BingPreview",
    r"msnbot",
    r"Slurp",
    r"DuckDuckBot",
    r"Baiduspider",
    r"YandexBot|YandexImages|YandexMobileBot",
    r"Sogou",
    r"Exabot",
    r"ia_archiver",
    r"archive\.org_bot",
    r"facebookexternalhit",
    r"facebookcatalog",
    r"Facebot",
    r"Twitterbot",
    r"LinkedInBot",
    r"Pinterest(bot)?",
    r"Slackbot",
    r"Slack-ImgProxy",
    r"Discordbot",
    r"TelegramBot",
    r"WhatsApp",
    r"SkypeUriPreview",
    r"Iframely",
    r"Embedly",
    r"redditbot",
    r"Applebot",
    r"AhrefsBot",
    r"SemrushBot",
    r"MJ12bot",
    r"DotBot",
    r"PetalBot",
    r"Bytespider",
    r"GPTBot",
    r"ChatGPT-User",
    r"ClaudeBot",
    r"CCBot",
    r"PerplexityBot",
    r"Mastodon",
    r"MetaInspector",
    r"Qwantify",
    r"SeznamBot",
    r"[a-z0-9\-_]*(bot|crawler|archiver|transcoder|spider|uptime|validator|fetcher)",
];

/// Compiled set of user agents that are refused.
#[derive(Debug, Clone)]
pub struct BotFilter {
    patterns: RegexSet,
}

impl BotFilter {
    /// Built-in signatures plus `extra` patterns.
    pub fn new<I, S>(extra: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extra: Vec<String> = extra.into_iter().map(|s| s.as_ref().to_string()).collect();
        let patterns = RegexSet::new(
            CRAWLER_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .chain(extra),
        )?;
        Ok(Self { patterns })
    }

    pub fn is_bot(&self, user_agent: &str) -> bool {
        self.patterns.is_match(user_agent)
    }

    /// Returns the user agent when it belongs to a known bot.
    pub fn matching_user_agent<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .filter(|ua| self.is_bot(ua))
    }
}

/// First stage of the filter chain: drop bots before routing.
pub async fn reject_bots(
    State(filter): State<Arc<BotFilter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(user_agent) = filter.matching_user_agent(req.headers()) {
        tracing::debug!(
            user_agent = %user_agent,
            path = %req.uri().path(),
            "Denied request from bot"
        );
        return Abort.into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn filter() -> BotFilter {
        BotFilter::new(Vec::<String>::new()).unwrap()
    }

    #[test]
    fn detects_crawlers_and_unfurlers() {
        let filter = filter();
        for ua in [
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
            "Slackbot-LinkExpanding 1.0 (+https://api.slack.com/robots)",
            "Mozilla/5.0 (compatible; Discordbot/2.0; +https://discordapp.com)",
            "facebookexternalhit/1.1 (+http://www.facebook.com/externalhit_uatext.php)",
            "TelegramBot (like TwitterBot)",
            "WhatsApp/2.23.20.0",
            "curl-validator/1.0",
        ] {
            assert!(filter.is_bot(ua), "{ua} should be treated as a bot");
        }
    }

    #[test]
    fn lets_browsers_through() {
        let filter = filter();
        for ua in [
            "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
            "curl/8.5.0",
        ] {
            assert!(!filter.is_bot(ua), "{ua} should not be treated as a bot");
        }
    }

    #[test]
    fn extra_patterns_extend_the_list() {
        let filter = BotFilter::new(["InternalScanner"]).unwrap();
        assert!(filter.is_bot("InternalScanner/3.1"));
        assert!(BotFilter::new(["(unclosed"]).is_err());
    }

    #[test]
    fn missing_user_agent_is_not_a_bot() {
        let filter = filter();
        let mut headers = HeaderMap::new();
        assert_eq!(filter.matching_user_agent(&headers), None);

        headers.insert(USER_AGENT, HeaderValue::from_static("Twitterbot/1.0"));
        assert_eq!(filter.matching_user_agent(&headers), Some("Twitterbot/1.0"));
    }
}
