use once_cell::sync::Lazy;
use regex::Regex;

// Navigation banner the channel appends to every alert.
static RE_BANNER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"📈 Chart   ⏫ Trending   ✳️ Events").unwrap()
});

// Raid counter line, e.g. "🐬 | D.RAIDBOARD #412 | 25⚡️"
static RE_RAID_COUNTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"🐬 \| D\.RAIDBOARD #[0-9]+ \| [0-9]+⚡️").unwrap()
});

// Decorative glyphs, including the emoji variation selector.
static RE_GLYPHS: Lazy<Regex> = Lazy::new(|| {
    Regex::new("[\u{1F433}\u{1F42C}\u{26A1}\u{FE0F}]").unwrap()
});

/// Strips channel boilerplate from a message body and trims surrounding whitespace.
pub fn clean_text(input: &str) -> String {
    // Banner and counter contain glyphs from the class below, so they go first.
    let s = RE_BANNER.replace_all(input, "");
    let s = RE_RAID_COUNTER.replace_all(s.trim(), "");
    let s = RE_GLYPHS.replace_all(s.trim(), "");
    s.trim().to_string()
}
