//! User-defined rules and the actions they resolve to.
//!
//! A [`Rule`] is an ordered list of [`Condition`]s (all must hold) plus an
//! action. Conditions are stored in the external settings document as
//! `{type, value, matcher}` string triples; they are parsed into a
//! [`ConditionKind`] tag and a [`Matcher`] on load so evaluation can dispatch
//! on variants instead of strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// What a matching rule does with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    #[default]
    Move,
    Copy,
    Rename,
    Delete,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Move => "move",
            ActionKind::Copy => "copy",
            ActionKind::Rename => "rename",
            ActionKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The property of a file a condition inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionKind {
    FileName,
    Content,
    FileSizeMb,
    DateModifiedDays,
    FolderName,
    CameraModel,
    LensModel,
    Artist,
    FStop,
    PdfAuthor,
    PdfTitle,
    DocxAuthor,
    DocxTitle,
    /// A type string this version does not understand. Never matches.
    Unknown(String),
}

impl ConditionKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "filename" | "file name" => ConditionKind::FileName,
            "content" => ConditionKind::Content,
            "filesize_mb" => ConditionKind::FileSizeMb,
            "date_modified_days" => ConditionKind::DateModifiedDays,
            "original folder name" | "original-folder-name" | "folder" => {
                ConditionKind::FolderName
            }
            "camera model" | "camera-model" => ConditionKind::CameraModel,
            "lens model" | "lens-model" => ConditionKind::LensModel,
            "artist" => ConditionKind::Artist,
            "f-stop" | "fstop" => ConditionKind::FStop,
            "pdf author" | "pdf-author" => ConditionKind::PdfAuthor,
            "pdf title" | "pdf-title" => ConditionKind::PdfTitle,
            "docx author" | "docx-author" => ConditionKind::DocxAuthor,
            "docx title" | "docx-title" => ConditionKind::DocxTitle,
            _ => ConditionKind::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ConditionKind::FileName => "filename",
            ConditionKind::Content => "content",
            ConditionKind::FileSizeMb => "filesize_mb",
            ConditionKind::DateModifiedDays => "date_modified_days",
            ConditionKind::FolderName => "original folder name",
            ConditionKind::CameraModel => "camera model",
            ConditionKind::LensModel => "lens model",
            ConditionKind::Artist => "artist",
            ConditionKind::FStop => "f-stop",
            ConditionKind::PdfAuthor => "pdf author",
            ConditionKind::PdfTitle => "pdf title",
            ConditionKind::DocxAuthor => "docx author",
            ConditionKind::DocxTitle => "docx title",
            ConditionKind::Unknown(raw) => raw,
        }
    }
}

/// How a condition's value is compared against the file property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    Contains,
    StartsWith,
    EndsWith,
    Equals,
    Regex,
    GreaterThan,
    LessThan,
    OlderThan,
    NewerThan,
    Unknown(String),
}

impl Matcher {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "" | "contains" => Matcher::Contains,
            "startswith" | "starts_with" => Matcher::StartsWith,
            "endswith" | "ends_with" => Matcher::EndsWith,
            "equals" | "is" => Matcher::Equals,
            "regex" => Matcher::Regex,
            "greater_than" => Matcher::GreaterThan,
            "less_than" => Matcher::LessThan,
            "older_than" => Matcher::OlderThan,
            "newer_than" => Matcher::NewerThan,
            _ => Matcher::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Matcher::Contains => "contains",
            Matcher::StartsWith => "startswith",
            Matcher::EndsWith => "endswith",
            Matcher::Equals => "equals",
            Matcher::Regex => "regex",
            Matcher::GreaterThan => "greater_than",
            Matcher::LessThan => "less_than",
            Matcher::OlderThan => "older_than",
            Matcher::NewerThan => "newer_than",
            Matcher::Unknown(raw) => raw,
        }
    }
}

/// A single typed predicate over a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCondition", into = "RawCondition")]
pub struct Condition {
    pub kind: ConditionKind,
    pub matcher: Matcher,
    pub value: String,
}

impl Condition {
    pub fn new(kind: ConditionKind, matcher: Matcher, value: impl Into<String>) -> Self {
        Self {
            kind,
            matcher,
            value: value.into(),
        }
    }

    /// A condition with an empty type or value is ignored during evaluation.
    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
            || matches!(&self.kind, ConditionKind::Unknown(raw) if raw.trim().is_empty())
    }
}

/// On-disk shape of a condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawCondition {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    matcher: String,
}

impl From<RawCondition> for Condition {
    fn from(raw: RawCondition) -> Self {
        Self {
            kind: ConditionKind::parse(&raw.kind),
            matcher: Matcher::parse(&raw.matcher),
            value: raw.value,
        }
    }
}

impl From<Condition> for RawCondition {
    fn from(condition: Condition) -> Self {
        Self {
            kind: condition.kind.as_str().to_string(),
            value: condition.value,
            matcher: condition.matcher.as_str().to_string(),
        }
    }
}

/// An ordered precondition-to-action mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub action_type: ActionKind,
    /// Destination folder (move/copy) or file-name template (rename).
    #[serde(default)]
    pub action_value: String,
}

impl Rule {
    pub fn has_content_condition(&self) -> bool {
        self.conditions
            .iter()
            .any(|condition| condition.kind == ConditionKind::Content)
    }
}

/// The outcome of resolving a file against rules and categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAction {
    Delete,
    /// Rename in place: `directory` is the file's current directory.
    Rename { directory: PathBuf, file_name: String },
    /// Move into `relative_dir` under the organized root.
    Move { relative_dir: PathBuf, file_name: String },
    /// Copy into `relative_dir` under the organized root.
    Copy { relative_dir: PathBuf, file_name: String },
}

impl ResolvedAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            ResolvedAction::Delete => ActionKind::Delete,
            ResolvedAction::Rename { .. } => ActionKind::Rename,
            ResolvedAction::Move { .. } => ActionKind::Move,
            ResolvedAction::Copy { .. } => ActionKind::Copy,
        }
    }

    /// The candidate destination path, before conflict resolution.
    ///
    /// `None` for deletions.
    pub fn destination(&self, root: &Path) -> Option<PathBuf> {
        match self {
            ResolvedAction::Delete => None,
            ResolvedAction::Rename {
                directory,
                file_name,
            } => Some(directory.join(file_name)),
            ResolvedAction::Move {
                relative_dir,
                file_name,
            }
            | ResolvedAction::Copy {
                relative_dir,
                file_name,
            } => Some(root.join(relative_dir).join(file_name)),
        }
    }
}
