/// Returns true if `pattern` matches `event_type`.
///
/// A pattern is either an exact event type, or a single trailing wildcard
/// `ns.*` which matches any type beginning with `ns.`. Wildcards do not
/// chain — `ns.*.sub` is not a supported pattern and is matched literally
/// (and will therefore never match anything, since event types never
/// contain a literal `*`).
pub fn matches(pattern: &str, event_type: &str) -> bool {
    if pattern.ends_with(".*") {
        // Keep the trailing dot in the prefix so "emotion.*" doesn't match "emotionX.foo".
        let prefix = &pattern[..pattern.len() - 1];
        event_type.starts_with(prefix) && event_type.len() > prefix.len()
    } else {
        pattern == event_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pattern_matches_exact_type_only() {
        assert!(matches("dialogue.user_message", "dialogue.user_message"));
        assert!(!matches("dialogue.user_message", "dialogue.assistant_response"));
    }

    #[test]
    fn wildcard_matches_one_level_and_deeper() {
        assert!(matches("emotion.*", "emotion.analysis.started"));
        assert!(matches("emotion.*", "emotion.analysis.rule.scored"));
        assert!(!matches("emotion.*", "memory.recorded"));
    }

    #[test]
    fn wildcard_requires_dot_boundary() {
        // "emotionX.foo" should not match "emotion.*" despite the shared prefix "emotion".
        assert!(!matches("emotion.*", "emotionX.foo"));
    }

    #[test]
    fn wildcard_does_not_match_bare_namespace() {
        assert!(!matches("emotion.*", "emotion"));
    }

    #[test]
    fn wildcards_do_not_chain() {
        assert!(!matches("ns.*.sub", "ns.anything.sub"));
    }
}
