use crate::generator;
use crate::scanner::{self, GlobOptions, ScanError};
use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::{self, StreamExt};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_READ_CONCURRENCY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    pub output: PathBuf,
    pub content: Vec<String>,
    pub base_dir: PathBuf,
    pub read_concurrency: usize,
}

impl BuildSettings {
    pub fn new(output: impl Into<PathBuf>, content: Vec<String>) -> Self {
        Self {
            output: output.into(),
            content,
            base_dir: PathBuf::from("."),
            read_concurrency: DEFAULT_READ_CONCURRENCY,
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// The output location, resolved against the base directory when relative.
    pub fn output_path(&self) -> PathBuf {
        self.base_dir.join(&self.output)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenCollection {
    pub tokens: Vec<String>,
    pub files_matched: usize,
    pub files_unreadable: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub output: PathBuf,
    pub files_matched: usize,
    pub files_unreadable: usize,
    pub token_count: usize,
    pub unique_token_count: usize,
    pub rule_count: usize,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("glob expansion task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("failed to create output directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Runs one full build: scan, resolve, and overwrite the output stylesheet.
pub async fn build_once(settings: &BuildSettings) -> Result<BuildReport, BuildError> {
    let collected = collect_tokens(settings).await?;
    let generated = generator::generate(&collected.tokens);
    let output = settings.output_path();

    let stylesheet = render_stylesheet(&generated.css, Utc::now());
    write_stylesheet(&output, &stylesheet).await?;

    let report = BuildReport {
        output,
        files_matched: collected.files_matched,
        files_unreadable: collected.files_unreadable,
        token_count: collected.tokens.len(),
        unique_token_count: count_unique(&collected.tokens),
        rule_count: generated.class_count,
    };
    log::info!(
        "built {} ({} tokens)",
        report.output.display(),
        report.token_count
    );
    Ok(report)
}

/// Expands the content globs and extracts every token from the matched
/// files, in file order. Unreadable files contribute nothing.
pub async fn collect_tokens(settings: &BuildSettings) -> Result<TokenCollection, BuildError> {
    let patterns = settings.content.clone();
    let options = GlobOptions {
        base_path: settings.base_dir.clone(),
        include_dotfiles: true,
    };
    let files =
        tokio::task::spawn_blocking(move || scanner::expand_globs(&patterns, &options)).await??;

    let contents = read_all(&files, settings.read_concurrency).await;

    let mut collection = TokenCollection {
        files_matched: files.len(),
        ..TokenCollection::default()
    };
    for (path, content) in files.iter().zip(contents) {
        match content {
            Ok(text) => collection.tokens.extend(scanner::extract_classes(&text)),
            Err(err) => {
                log::debug!("skipping unreadable file {}: {}", path.display(), err);
                collection.files_unreadable += 1;
            }
        }
    }

    Ok(collection)
}

/// Reads files concurrently, at most `limit` at a time, returning results in
/// input order.
async fn read_all(files: &[PathBuf], limit: usize) -> Vec<io::Result<String>> {
    stream::iter(files.iter().cloned())
        .map(|path| async move { tokio::fs::read_to_string(path).await })
        .buffered(limit.max(1))
        .collect()
        .await
}

pub fn render_stylesheet(css: &str, generated_at: DateTime<Utc>) -> String {
    format!(
        "/* minijit output - {} */\n{}",
        generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        css
    )
}

async fn write_stylesheet(path: &Path, contents: &str) -> Result<(), BuildError> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| BuildError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| BuildError::Write {
            path: path.to_path_buf(),
            source,
        })
}

fn count_unique(tokens: &[String]) -> usize {
    tokens
        .iter()
        .collect::<std::collections::HashSet<_>>()
        .len()
}
