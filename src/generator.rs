use crate::rules;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;

pub const VARIANT_SEPARATOR: char = ':';
pub const SM_MIN_WIDTH: &str = "640px";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Hover,
    Sm,
}

impl Variant {
    pub fn parse(prefix: &str) -> Option<Self> {
        match prefix {
            "hover" => Some(Self::Hover),
            "sm" => Some(Self::Sm),
            _ => None,
        }
    }
}

/// The CSS produced for one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRule {
    pub selector: String,
    pub declarations: Cow<'static, str>,
    pub media: Option<String>,
}

impl fmt::Display for ResolvedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.media {
            Some(query) => write!(
                f,
                "@media {} {{ {} {{ {} }} }}",
                query, self.selector, self.declarations
            ),
            None => write!(f, "{} {{ {} }}", self.selector, self.declarations),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub css: String,
    pub class_count: usize,
}

/// Deduplicates `classes` (first occurrence wins), resolves each one and
/// joins the rules one per line. Unknown classes are dropped.
pub fn generate(classes: &[String]) -> GenerationResult {
    let mut seen = HashSet::new();
    let rules = classes
        .iter()
        .filter(|class| seen.insert(class.as_str()))
        .filter_map(|class| resolve(class))
        .map(|rule| rule.to_string())
        .collect::<Vec<_>>();

    GenerationResult {
        class_count: rules.len(),
        css: rules.join("\n"),
    }
}

pub fn resolve(class: &str) -> Option<ResolvedRule> {
    let (variants, base) = parse_variants(class);
    let declarations = rules::lookup(base)?;

    let hover = variants.contains(&Variant::Hover);
    let sm = variants.contains(&Variant::Sm);

    let mut selector = format!(".{}", escape_selector(class));
    if hover {
        selector.push_str(":hover");
    }
    let media = sm.then(|| format!("(min-width: {})", SM_MIN_WIDTH));

    Some(ResolvedRule {
        selector,
        declarations,
        media,
    })
}

/// Splits a class into its recognised variants and base utility. Unknown
/// prefixes are dropped; repeated variants collapse to one.
pub fn parse_variants(class: &str) -> (Vec<Variant>, &str) {
    let mut segments = class.split(VARIANT_SEPARATOR).collect::<Vec<_>>();
    let base = segments.pop().unwrap_or(class);

    let mut variants = Vec::new();
    for segment in segments {
        if let Some(variant) = Variant::parse(segment)
            && !variants.contains(&variant)
        {
            variants.push(variant);
        }
    }

    (variants, base)
}

pub fn escape_selector(class: &str) -> String {
    let mut escaped = String::with_capacity(class.len() * 2);
    for ch in class.chars() {
        if !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '-') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::{Variant, escape_selector, generate, parse_variants, resolve};

    fn css(class: &str) -> Option<String> {
        resolve(class).map(|rule| rule.to_string())
    }

    #[test]
    fn resolves_plain_utilities() {
        assert_eq!(css("p-4").as_deref(), Some(".p-4 { padding: 1rem; }"));
        assert_eq!(css("m-4").as_deref(), Some(".m-4 { margin: 1rem; }"));
        assert_eq!(
            css("bg-red-500").as_deref(),
            Some(".bg-red-500 { background-color: #ef4444; }")
        );
    }

    #[test]
    fn hover_appends_pseudo_class() {
        let plain = resolve("p-4").expect("p-4 should resolve");
        let hovered = resolve("hover:p-4").expect("hover:p-4 should resolve");
        assert!(!plain.selector.ends_with(":hover"));
        assert_eq!(hovered.selector, ".hover\\:p-4:hover");
        assert_eq!(hovered.media, None);
    }

    #[test]
    fn sm_wraps_in_media_block() {
        let expected =
            "@media (min-width: 640px) { .sm\\:bg-blue-500 { background-color: #3b82f6; } }";
        assert_eq!(css("sm:bg-blue-500").as_deref(), Some(expected));
        assert!(resolve("p-4").expect("p-4 should resolve").media.is_none());
    }

    #[test]
    fn combined_variants_apply_both() {
        let expected = "@media (min-width: 640px) { .sm\\:hover\\:p-4:hover { padding: 1rem; } }";
        assert_eq!(css("sm:hover:p-4").as_deref(), Some(expected));
        let expected = "@media (min-width: 640px) { .hover\\:sm\\:p-4:hover { padding: 1rem; } }";
        assert_eq!(css("hover:sm:p-4").as_deref(), Some(expected));
    }

    #[test]
    fn variant_presence_ignores_order_and_duplicates() {
        let (variants, base) = parse_variants("hover:sm:hover:p-2");
        assert_eq!(base, "p-2");
        assert_eq!(variants, vec![Variant::Hover, Variant::Sm]);
    }

    #[test]
    fn unknown_prefixes_are_ignored() {
        let expected = ".focus\\:p-4 { padding: 1rem; }";
        assert_eq!(css("focus:p-4").as_deref(), Some(expected));
    }

    #[test]
    fn unknown_tokens_do_not_resolve() {
        assert!(resolve("flex").is_none());
        assert!(resolve("hover:bg-purple-500").is_none());
        assert!(resolve("").is_none());
        assert!(resolve("p-4:").is_none());
    }

    #[test]
    fn resolution_is_deterministic() {
        for class in ["p-4", "hover:text-red-500", "sm:hover:rounded", "nope"] {
            assert_eq!(resolve(class), resolve(class));
        }
    }

    #[test]
    fn escapes_non_identifier_characters() {
        assert_eq!(escape_selector("sm:p-4"), "sm\\:p-4");
        assert_eq!(escape_selector("w-1/2"), "w-1\\/2");
        assert_eq!(escape_selector("a_b-c9"), "a_b-c9");
    }

    #[test]
    fn generate_deduplicates_in_first_occurrence_order() {
        let tokens = ["m-4", "p-4", "m-4", "flex", "p-4"]
            .iter()
            .map(|token| token.to_string())
            .collect::<Vec<_>>();
        let deduped = ["m-4", "p-4", "flex"]
            .iter()
            .map(|token| token.to_string())
            .collect::<Vec<_>>();

        let result = generate(&tokens);
        assert_eq!(result, generate(&deduped));
        assert_eq!(result.class_count, 2);
        assert_eq!(result.css, ".m-4 { margin: 1rem; }\n.p-4 { padding: 1rem; }");
    }

    #[test]
    fn generate_of_nothing_is_empty() {
        let result = generate(&[]);
        assert!(result.css.is_empty());
        assert_eq!(result.class_count, 0);
    }
}
