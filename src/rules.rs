use phf::phf_map;
use std::borrow::Cow;

pub static COLORS: phf::Map<&'static str, &'static str> = phf_map! {
    "red-500" => "#ef4444",
    "blue-500" => "#3b82f6",
    "green-500" => "#10b981",
    "gray-700" => "#374151",
};

pub static RULES: phf::Map<&'static str, &'static str> = phf_map! {
    "text-center" => "text-align: center;",
    "font-bold" => "font-weight: 700;",
    "p-4" => "padding: 1rem;",
    "m-4" => "margin: 1rem;",
    "rounded" => "border-radius: 0.25rem;",
};

/// A utility prefix whose remainder names an entry of [`COLORS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorFamily {
    pub prefix: &'static str,
    pub property: &'static str,
}

pub const COLOR_FAMILIES: &[ColorFamily] = &[
    ColorFamily {
        prefix: "bg-",
        property: "background-color",
    },
    ColorFamily {
        prefix: "text-",
        property: "color",
    },
];

/// A `<name>-<digit>` utility backed by the spacing scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleFamily {
    pub name: &'static str,
    pub property: &'static str,
}

pub const SCALE_FAMILIES: &[ScaleFamily] = &[ScaleFamily {
    name: "p",
    property: "padding",
}];

pub fn spacing_value(step: u32) -> Option<&'static str> {
    match step {
        1 => Some("0.25rem"),
        2 => Some("0.5rem"),
        3 => Some("0.75rem"),
        4 => Some("1rem"),
        5 => Some("1.25rem"),
        6 => Some("1.5rem"),
        _ => None,
    }
}

/// Looks up the declaration body for a base utility (no variant prefixes).
///
/// Literal entries win over color families, which win over the numeric
/// scale. Returns `None` when nothing matches.
pub fn lookup(base: &str) -> Option<Cow<'static, str>> {
    if let Some(body) = RULES.get(base) {
        return Some(Cow::Borrowed(*body));
    }
    lookup_color(base)
        .or_else(|| lookup_scale(base))
        .map(Cow::Owned)
}

fn lookup_color(base: &str) -> Option<String> {
    COLOR_FAMILIES.iter().find_map(|family| {
        let key = base.strip_prefix(family.prefix)?;
        let color = COLORS.get(key)?;
        Some(format!("{}: {};", family.property, color))
    })
}

fn lookup_scale(base: &str) -> Option<String> {
    let (name, digits) = base.split_once('-')?;
    let family = SCALE_FAMILIES.iter().find(|family| family.name == name)?;
    let mut chars = digits.chars();
    let step = chars.next()?.to_digit(10)?;
    if chars.next().is_some() {
        return None;
    }
    let value = spacing_value(step)?;
    Some(format!("{}: {};", family.property, value))
}

#[cfg(test)]
mod tests {
    use super::{lookup, spacing_value};

    #[test]
    fn literal_entries_resolve_verbatim() {
        assert_eq!(lookup("text-center").as_deref(), Some("text-align: center;"));
        assert_eq!(lookup("m-4").as_deref(), Some("margin: 1rem;"));
        assert_eq!(lookup("rounded").as_deref(), Some("border-radius: 0.25rem;"));
    }

    #[test]
    fn color_families_use_the_palette() {
        assert_eq!(
            lookup("bg-red-500").as_deref(),
            Some("background-color: #ef4444;")
        );
        assert_eq!(lookup("text-gray-700").as_deref(), Some("color: #374151;"));
        assert_eq!(lookup("bg-purple-500"), None);
    }

    #[test]
    fn padding_scale_accepts_single_digits_only() {
        assert_eq!(lookup("p-1").as_deref(), Some("padding: 0.25rem;"));
        assert_eq!(lookup("p-6").as_deref(), Some("padding: 1.5rem;"));
        assert_eq!(lookup("p-7"), None);
        assert_eq!(lookup("p-0"), None);
        assert_eq!(lookup("p-12"), None);
        assert_eq!(lookup("p-"), None);
        assert_eq!(lookup("m-2"), None);
    }

    #[test]
    fn spacing_scale_bounds() {
        assert_eq!(spacing_value(3), Some("0.75rem"));
        assert_eq!(spacing_value(0), None);
        assert_eq!(spacing_value(7), None);
    }
}
