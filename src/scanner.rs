use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CLASS_ATTR: &str = "class";
const CLASS_NAME_SUFFIX: &str = "Name";
const QUOTES: [char; 3] = ['"', '\'', '`'];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScanError {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobOptions {
    pub base_path: PathBuf,
    pub include_dotfiles: bool,
}

impl Default for GlobOptions {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            include_dotfiles: true,
        }
    }
}

/// Expands content globs into the files they match under `options.base_path`.
///
/// Each pattern is walked from its literal directory prefix, so absolute and
/// `../` patterns reach outside the base. Results follow pattern order, then
/// a file-name sorted walk, and never repeat.
pub fn expand_globs(
    patterns: &[String],
    options: &GlobOptions,
) -> Result<Vec<PathBuf>, ScanError> {
    if patterns.is_empty() {
        return Err(ScanError {
            message: "glob expansion requires at least one pattern".to_string(),
        });
    }
    if !options.base_path.is_dir() {
        return Err(ScanError {
            message: format!("path not found: {}", options.base_path.display()),
        });
    }

    let matcher = GlobMatcher::new(patterns, &options.base_path)?;
    let mut paths = Vec::new();
    let mut seen = HashSet::new();

    for root in glob_roots(patterns) {
        let root = if root == Path::new(".") {
            options.base_path.clone()
        } else {
            options.base_path.join(root)
        };
        if !root.is_dir() {
            log::debug!("no files under {}", root.display());
            continue;
        }

        let mut builder = WalkBuilder::new(&root);
        builder
            .hidden(!options.include_dotfiles)
            .parents(false)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .sort_by_file_name(|left, right| left.cmp(right));

        for entry in builder.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }
            let path = entry.path();
            if !matcher.is_match(path) {
                continue;
            }
            if seen.insert(path.to_path_buf()) {
                paths.push(path.to_path_buf());
            }
        }
    }

    Ok(paths)
}

/// Matches paths against content globs, relative to a base directory.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    set: GlobSet,
    bases: Vec<PathBuf>,
}

impl GlobMatcher {
    pub fn new(patterns: &[String], base: &Path) -> Result<Self, ScanError> {
        let set = build_globset(patterns)?;
        let mut bases = vec![base.to_path_buf()];
        // notify reports canonical paths
        if let Ok(canonical) = fs::canonicalize(base)
            && canonical != base
        {
            bases.push(canonical);
        }
        Ok(Self { set, bases })
    }

    pub fn is_match(&self, path: &Path) -> bool {
        for base in &self.bases {
            if let Ok(relative) = path.strip_prefix(base)
                && self.set.is_match(relative)
            {
                return true;
            }
        }
        self.set.is_match(path)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, ScanError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(normalize_pattern(pattern))
            .literal_separator(true)
            .build()
            .map_err(|err| ScanError {
                message: format!("invalid glob pattern '{}': {}", pattern, err),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|err| ScanError {
        message: format!("failed to build glob set: {}", err),
    })
}

/// Directories that together cover every file the patterns can match, one
/// per distinct literal prefix, relative to the base unless absolute.
pub fn glob_roots(patterns: &[String]) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    let mut seen = HashSet::new();

    for pattern in patterns {
        let root = glob_root(normalize_pattern(pattern));
        let root = if root.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            root
        };
        if seen.insert(root.clone()) {
            roots.push(root);
        }
    }

    roots
}

fn glob_root(pattern: &str) -> PathBuf {
    let first_meta = pattern
        .char_indices()
        .find(|(_, ch)| matches!(ch, '*' | '?' | '[' | '{'))
        .map(|(idx, _)| idx);

    let Some(first_meta) = first_meta else {
        if pattern.ends_with('/') || pattern.ends_with('\\') {
            return PathBuf::from(pattern);
        }
        let path = Path::new(pattern);
        if path.extension().is_some() {
            return path.parent().unwrap_or(Path::new(".")).to_path_buf();
        }
        return path.to_path_buf();
    };

    let prefix = &pattern[..first_meta];
    match prefix.rfind(['/', '\\']) {
        Some(0) => PathBuf::from(&prefix[..1]),
        Some(idx) => PathBuf::from(&prefix[..idx]),
        None => PathBuf::from("."),
    }
}

fn normalize_pattern(pattern: &str) -> &str {
    let mut pattern = pattern;
    while let Some(rest) = pattern.strip_prefix("./") {
        pattern = rest;
    }
    pattern
}

/// Extracts every token from `class="..."` / `className='...'` style
/// attributes, in source order and with duplicates.
///
/// The scan is purely lexical: any of the three quote characters closes the
/// value, and empty or unterminated values are skipped.
pub fn extract_classes(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut resume = 0;

    for (idx, _) in text.match_indices(CLASS_ATTR) {
        if idx < resume {
            continue;
        }
        let Some((value, end)) = quoted_value_after(text, idx + CLASS_ATTR.len()) else {
            continue;
        };
        out.extend(value.split_whitespace().map(str::to_string));
        resume = end;
    }

    out
}

fn quoted_value_after(text: &str, idx: usize) -> Option<(&str, usize)> {
    let mut pos = idx;
    if text[pos..].starts_with(CLASS_NAME_SUFFIX) {
        pos += CLASS_NAME_SUFFIX.len();
    }

    let (eq, size) = next_char(text, pos)?;
    if eq != '=' {
        return None;
    }
    pos += size;

    let (quote, size) = next_char(text, pos)?;
    if !QUOTES.contains(&quote) {
        return None;
    }
    pos += size;

    let len = text[pos..].find(|ch: char| QUOTES.contains(&ch))?;
    if len == 0 {
        return None;
    }
    let end = pos + len;
    Some((&text[pos..end], end + 1))
}

fn next_char(text: &str, idx: usize) -> Option<(char, usize)> {
    let ch = text.get(idx..)?.chars().next()?;
    Some((ch, ch.len_utf8()))
}
