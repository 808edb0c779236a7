use once_cell::sync::Lazy;
use regex::Regex;

/// Token name used when no pattern matches.
pub const UNKNOWN_TOKEN: &str = "Unknown Token";

/// A named token-name heuristic. Group 1 holds the name.
#[derive(Debug)]
pub struct TokenPattern {
    pub name: &'static str,
    pub regex: Regex,
}

/// Token-name heuristics in priority order; the first match wins.
pub static TOKEN_NAME_PATTERNS: Lazy<Vec<TokenPattern>> = Lazy::new(|| {
    [
        // "PEPE Started ..." / "PEPE Just ..."
        ("status_suffix", r"(?i)^(.*?)\s(?:Started|Just)"),
        // "🚀 PEPE 🚀"
        ("rocket_pair", r"(?i)^🚀\s*(.*?)\s*🚀"),
        ("token_label", r"(?i)^Token:\s*(\S+)"),
        ("launching", r"(?i)Launching\s*(\S+)"),
        ("new_shill", r"(?i)^New Shill:\s*(\S+)"),
    ]
    .into_iter()
    .map(|(name, re)| TokenPattern { name, regex: Regex::new(re).unwrap() })
    .collect()
});

/// Name captured by the first matching pattern, with the pattern that produced it.
pub fn match_token_name(text: &str) -> Option<(&'static str, String)> {
    TOKEN_NAME_PATTERNS.iter().find_map(|p| {
        p.regex
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| (p.name, m.as_str().trim().to_string()))
    })
}

pub fn extract_token_name(text: &str) -> String {
    match match_token_name(text) {
        Some((_, name)) => name,
        None => UNKNOWN_TOKEN.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_pattern_matches_on_its_own() {
        let cases = [
            ("PEPE Started trending", "status_suffix", "PEPE"),
            ("🚀 Moon Cat 🚀", "rocket_pair", "Moon Cat"),
            ("token: WIF\nmore", "token_label", "WIF"),
            ("We are launching BONK today", "launching", "BONK"),
            ("New Shill: $DOGE", "new_shill", "$DOGE"),
        ];
        for (text, pattern, expected) in cases {
            let (name, token) = match_token_name(text).unwrap();
            assert_eq!(name, pattern, "{text}");
            assert_eq!(token, expected, "{text}");
        }
    }

    #[test]
    fn earlier_pattern_wins_when_several_match() {
        let (name, token) = match_token_name("🚀 FOO 🚀 Just launched").unwrap();
        assert_eq!(name, "status_suffix");
        assert_eq!(token, "🚀 FOO 🚀");
    }

    #[test]
    fn falls_back_to_unknown() {
        assert_eq!(extract_token_name("gm everyone"), UNKNOWN_TOKEN);
    }
}
