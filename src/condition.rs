//! Condition evaluation.
//!
//! [`ConditionEvaluator`] answers "does this condition hold for this file"
//! and never fails: unreadable files, bad regular expressions and bad numeric
//! literals are logged as warnings and count as a non-match. One evaluator
//! lives for one top-level operation and owns that operation's metadata cache.

use crate::content;
use crate::events::EventSink;
use crate::metadata::{
    Extractors, FileMetadataCache, MetaKey, Metadata, MetadataFamily, display_name,
};
use crate::rule::{Condition, ConditionKind, Matcher, Rule};
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::path::Path;
use std::time::SystemTime;

const BYTES_PER_MB: f64 = 1_048_576.0;
const SECONDS_PER_DAY: u64 = 86_400;

/// Tolerance for f-stop equality, so `2.8` matches a stored `28/10`.
const FSTOP_EPSILON: f64 = 0.05;

pub struct ConditionEvaluator<'a> {
    extractors: &'a Extractors,
    sink: &'a EventSink,
    cache: FileMetadataCache,
    regexes: HashMap<String, Option<Regex>>,
    content_enabled: bool,
}

impl<'a> ConditionEvaluator<'a> {
    /// Creates an evaluator with an empty metadata cache.
    ///
    /// `content_enabled` should be true only when some loaded rule has a
    /// `content` condition; otherwise content checks are false without
    /// touching the file.
    pub fn new(extractors: &'a Extractors, sink: &'a EventSink, content_enabled: bool) -> Self {
        Self {
            extractors,
            sink,
            cache: FileMetadataCache::new(),
            regexes: HashMap::new(),
            content_enabled,
        }
    }

    /// Whether every usable condition of `rule` holds for `path`.
    ///
    /// Blank conditions are ignored. A rule with no usable condition never
    /// fires. Evaluation stops at the first failing condition.
    pub fn rule_matches(&mut self, path: &Path, rule: &Rule) -> bool {
        let mut usable = rule.conditions.iter().filter(|c| !c.is_blank()).peekable();
        if usable.peek().is_none() {
            return false;
        }
        usable.all(|condition| self.matches(path, condition))
    }

    /// Whether one condition holds for `path`.
    pub fn matches(&mut self, path: &Path, condition: &Condition) -> bool {
        if condition.is_blank() {
            return false;
        }

        match &condition.kind {
            ConditionKind::FileName => {
                let name = display_name(path);
                self.match_text(&name, condition)
            }
            ConditionKind::FolderName => {
                let folder = path
                    .parent()
                    .and_then(Path::file_name)
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.match_text(&folder, condition)
            }
            ConditionKind::Content => self.match_content(path, condition),
            ConditionKind::FileSizeMb => self.match_size(path, condition),
            ConditionKind::DateModifiedDays => self.match_age(path, condition),
            ConditionKind::CameraModel => {
                self.match_metadata_text(path, MetadataFamily::Image, MetaKey::CameraModel, condition)
            }
            ConditionKind::LensModel => {
                self.match_metadata_text(path, MetadataFamily::Image, MetaKey::LensModel, condition)
            }
            ConditionKind::Artist => {
                self.match_metadata_text(path, MetadataFamily::Image, MetaKey::Artist, condition)
            }
            ConditionKind::FStop => self.match_fstop(path, condition),
            ConditionKind::PdfAuthor => {
                self.match_metadata_text(path, MetadataFamily::Pdf, MetaKey::Author, condition)
            }
            ConditionKind::PdfTitle => {
                self.match_metadata_text(path, MetadataFamily::Pdf, MetaKey::Title, condition)
            }
            ConditionKind::DocxAuthor => {
                self.match_metadata_text(path, MetadataFamily::Docx, MetaKey::Author, condition)
            }
            ConditionKind::DocxTitle => {
                self.match_metadata_text(path, MetadataFamily::Docx, MetaKey::Title, condition)
            }
            ConditionKind::Unknown(raw) => {
                self.sink
                    .warn(format!("  - WARN: Unknown condition type '{raw}' ignored"));
                false
            }
        }
    }

    /// Cached metadata for `path`, extracting it on first use.
    pub fn metadata(&mut self, path: &Path, family: MetadataFamily) -> &Metadata {
        self.cache
            .get_or_extract(path, family, self.extractors, self.sink)
    }

    /// Drops all memoized metadata.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    fn match_metadata_text(
        &mut self,
        path: &Path,
        family: MetadataFamily,
        key: MetaKey,
        condition: &Condition,
    ) -> bool {
        let Some(text) = self.metadata(path, family).text(key).map(str::to_owned) else {
            return false;
        };
        self.match_text(&text, condition)
    }

    fn match_text(&mut self, text: &str, condition: &Condition) -> bool {
        let value = condition.value.to_lowercase();
        let text_lower = text.to_lowercase();
        match &condition.matcher {
            Matcher::Contains => text_lower.contains(&value),
            Matcher::StartsWith => text_lower.starts_with(&value),
            Matcher::EndsWith => text_lower.ends_with(&value),
            Matcher::Equals => text_lower == value,
            Matcher::Regex => self
                .regex(&condition.value)
                .is_some_and(|re| re.is_match(text)),
            other => self.unsupported(condition, other),
        }
    }

    fn regex(&mut self, pattern: &str) -> Option<&Regex> {
        let sink = self.sink;
        self.regexes
            .entry(pattern.to_string())
            .or_insert_with(|| {
                match RegexBuilder::new(pattern).case_insensitive(true).build() {
                    Ok(re) => Some(re),
                    Err(e) => {
                        sink.warn(format!("  - WARN: Invalid regex '{pattern}': {e}"));
                        None
                    }
                }
            })
            .as_ref()
    }

    fn match_content(&mut self, path: &Path, condition: &Condition) -> bool {
        if !self.content_enabled || !content::is_searchable(path) {
            return false;
        }
        match content::read_body(path) {
            Ok(Some(body)) => body
                .to_lowercase()
                .contains(&condition.value.to_lowercase()),
            Ok(None) => false,
            Err(e) => {
                self.sink.warn(format!(
                    "  - WARN: Could not read content of {}: {}",
                    display_name(path),
                    e
                ));
                false
            }
        }
    }

    fn match_size(&mut self, path: &Path, condition: &Condition) -> bool {
        let Some(limit) = self.parse_number(condition) else {
            return false;
        };
        let size_mb = match path.metadata() {
            Ok(metadata) => metadata.len() as f64 / BYTES_PER_MB,
            Err(e) => {
                self.sink.warn(format!(
                    "  - WARN: Could not read size of {}: {}",
                    display_name(path),
                    e
                ));
                return false;
            }
        };
        match &condition.matcher {
            Matcher::GreaterThan => size_mb > limit,
            Matcher::LessThan => size_mb < limit,
            other => self.unsupported(condition, other),
        }
    }

    fn match_age(&mut self, path: &Path, condition: &Condition) -> bool {
        let Some(days) = self.parse_number(condition) else {
            return false;
        };
        let modified = match path.metadata().and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                self.sink.warn(format!(
                    "  - WARN: Could not read modification time of {}: {}",
                    display_name(path),
                    e
                ));
                return false;
            }
        };
        // Files dated in the future are zero days old.
        let age_days = SystemTime::now()
            .duration_since(modified)
            .map(|age| age.as_secs() / SECONDS_PER_DAY)
            .unwrap_or(0) as f64;

        match &condition.matcher {
            Matcher::OlderThan | Matcher::GreaterThan => age_days > days,
            Matcher::NewerThan | Matcher::LessThan => age_days < days,
            other => self.unsupported(condition, other),
        }
    }

    fn match_fstop(&mut self, path: &Path, condition: &Condition) -> bool {
        let Some(target) = self.parse_number(condition) else {
            return false;
        };
        let Some(fnumber) = self.metadata(path, MetadataFamily::Image).number(MetaKey::FNumber)
        else {
            return false;
        };
        match &condition.matcher {
            Matcher::Equals | Matcher::Contains => (fnumber - target).abs() < FSTOP_EPSILON,
            Matcher::GreaterThan => fnumber > target,
            Matcher::LessThan => fnumber < target,
            other => self.unsupported(condition, other),
        }
    }

    /// Parses a condition value as a number, accepting an `f/` prefix.
    fn parse_number(&self, condition: &Condition) -> Option<f64> {
        let raw = condition.value.trim();
        let raw = raw
            .strip_prefix("f/")
            .or_else(|| raw.strip_prefix("F/"))
            .unwrap_or(raw);
        match raw.parse::<f64>() {
            Ok(number) if number.is_finite() => Some(number),
            _ => {
                self.sink.warn(format!(
                    "  - WARN: Invalid number '{}' for {} condition",
                    condition.value,
                    condition.kind.as_str()
                ));
                None
            }
        }
    }

    fn unsupported(&self, condition: &Condition, matcher: &Matcher) -> bool {
        self.sink.warn(format!(
            "  - WARN: Matcher '{}' is not supported for {} conditions",
            matcher.as_str(),
            condition.kind.as_str()
        ));
        false
    }
}
