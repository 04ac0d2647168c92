//! Removal of markdown fencing from raw model output.
//!
//! Best-effort text cleanup, not a parser: the remaining text is never
//! checked for being well-formed source.

use std::sync::LazyLock;

use regex::Regex;

const FENCE: &str = "```";

/// Plain fences and fences tagged with a TypeScript/JavaScript variant,
/// each with an optional trailing newline. Longer tags come first so `tsx`
/// is not cut down to `ts`.
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)```(?:(?:typescript|tsx|ts|javascript|jsx|js)\b)?\r?\n?")
        .expect("fence pattern is valid")
});

/// Whether the raw output contains a fence marker at all.
pub fn contains_fence(raw: &str) -> bool {
    raw.contains(FENCE)
}

/// Remove every recognized fence marker and trim surrounding whitespace.
pub fn strip_fences(raw: &str) -> String {
    FENCE_RE.replace_all(raw, "").trim().to_string()
}

/// Cleaned code for the terminal record, or `None` when the output carried
/// no fence and stands as-is.
pub fn clean_completion(raw: &str) -> Option<String> {
    contains_fence(raw).then(|| strip_fences(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tsx_fence_is_stripped() {
        let raw = "```tsx\nimport React from 'react';\nexport default function App() {}\n```";
        assert_eq!(
            clean_completion(raw).as_deref(),
            Some("import React from 'react';\nexport default function App() {}")
        );
    }

    #[test]
    fn test_no_fence_means_no_cleanup() {
        assert_eq!(clean_completion("  import React from 'react';\n"), None);
    }

    #[test]
    fn test_tags_are_case_insensitive() {
        for tag in ["TSX", "TypeScript", "ts", "JavaScript", "jsx", "JS", ""] {
            let raw = format!("\n```{}\nconst x = 1;\n```\n", tag);
            assert_eq!(strip_fences(&raw), "const x = 1;", "tag {:?}", tag);
        }
    }

    #[test]
    fn test_prose_around_fence_is_kept_but_trimmed() {
        let raw = "Here you go:\n```jsx\nconst a = 1;\n```\n";
        assert_eq!(strip_fences(raw), "Here you go:\nconst a = 1;");
    }

    #[test]
    fn test_unrecognized_tag_keeps_its_name() {
        // Only the marker goes; `json` is not a recognized tag.
        assert_eq!(strip_fences("```json\n{}\n```"), "json\n{}");
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let raw = "```typescript\nexport const A = () => null;\n```\n\n```ts\nexport const B = 1;\n```";
        let once = strip_fences(raw);
        assert!(!once.contains('`'));
        assert_eq!(strip_fences(&once), once);

        let clean = "export default function App() {}";
        assert_eq!(strip_fences(clean), clean);
    }
}
