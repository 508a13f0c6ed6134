// src/traversal/block.rs

/// Phrases that show up on anti-automation interstitials, matched case-insensitively.
pub const BLOCK_INDICATORS: &[&str] = &[
    "blocked",
    "access denied",
    "forbidden",
    "captcha",
    "security check",
    "bot detected",
];

/// Returns the first block indicator found in the page's visible text.
pub fn detect_block(visible_text: &str) -> Option<&'static str> {
    let text = visible_text.to_lowercase();
    BLOCK_INDICATORS.iter().copied().find(|indicator| text.contains(indicator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicators_match_case_insensitively() {
        assert_eq!(detect_block("Please complete the CAPTCHA to continue"), Some("captcha"));
        assert_eq!(detect_block("Access Denied\nReference #18.2f"), Some("access denied"));
        assert_eq!(detect_block("It needs a human touch. Security Check"), Some("security check"));
        assert_eq!(detect_block("I will design a modern logo\nFrom $45"), None);
    }
}
