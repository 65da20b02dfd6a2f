//! Decides what happens to a file.
//!
//! Rules are tried in order and the first one whose conditions all hold
//! wins. Without a matching rule the file is moved into its extension
//! category; image files get a date, screenshot or camera subfolder when
//! their EXIF data allows it.

use crate::condition::ConditionEvaluator;
use crate::config::Settings;
use crate::conflict::split_name;
use crate::file_category::{IMAGES, normalize_extension};
use crate::metadata::{MetaKey, MetadataFamily};
use crate::rule::{ActionKind, ResolvedAction, Rule};
use chrono::{DateTime, Datelike, Local};
use std::path::{Path, PathBuf};

/// Value substituted for `{SeqNum}` in rename templates.
const SEQUENCE_NUMBER: &str = "1";

pub struct RuleResolver<'a> {
    settings: &'a Settings,
    evaluator: ConditionEvaluator<'a>,
}

impl<'a> RuleResolver<'a> {
    pub fn new(settings: &'a Settings, evaluator: ConditionEvaluator<'a>) -> Self {
        Self {
            settings,
            evaluator,
        }
    }

    /// Resolves the action for one file.
    pub fn resolve(&mut self, path: &Path) -> ResolvedAction {
        self.resolve_at(path, Local::now())
    }

    /// Resolves the action for one file with date placeholders taken from `now`.
    pub fn resolve_at(&mut self, path: &Path, now: DateTime<Local>) -> ResolvedAction {
        let settings = self.settings;
        for rule in &settings.rules {
            if !self.evaluator.rule_matches(path, rule) {
                continue;
            }
            if let Some(action) = apply_rule(rule, path, now) {
                tracing::debug!("Rule '{}' matched {}", rule.name, path.display());
                return action;
            }
        }
        self.categorize(path)
    }

    /// Drops metadata memoized by earlier resolutions.
    pub fn clear_cache(&mut self) {
        self.evaluator.clear_cache();
    }

    fn categorize(&mut self, path: &Path) -> ResolvedAction {
        let file_name = file_name_of(path);
        let extension = path
            .extension()
            .map(|ext| normalize_extension(&ext.to_string_lossy()))
            .unwrap_or_default();

        let is_image = self
            .settings
            .categories
            .extensions(IMAGES)
            .is_some_and(|extensions| extensions.contains(&extension));

        let relative_dir = if is_image {
            self.image_folder(path)
        } else {
            PathBuf::from(self.settings.categories.categorize(&extension))
        };

        ResolvedAction::Move {
            relative_dir,
            file_name,
        }
    }

    /// `Images/YYYY-MM`, `Images/Screenshots`, `Images/<Model>` or `Images`.
    fn image_folder(&mut self, path: &Path) -> PathBuf {
        let images = PathBuf::from(IMAGES);
        let metadata = self.evaluator.metadata(path, MetadataFamily::Image);

        if let Some(taken) = metadata
            .timestamp(MetaKey::DateTimeOriginal)
            .or_else(|| metadata.timestamp(MetaKey::DateTime))
        {
            return images.join(taken.format("%Y-%m").to_string());
        }

        if metadata
            .text(MetaKey::ImageDescription)
            .is_some_and(|description| description.to_lowercase().contains("screenshot"))
        {
            return images.join("Screenshots");
        }

        if let Some(model) = metadata.text(MetaKey::CameraModel) {
            let model = sanitize_model(model);
            if !model.is_empty() {
                return images.join(model);
            }
        }

        images
    }
}

/// Turns a matching rule into an action, or `None` if the rule has no
/// usable action value.
fn apply_rule(rule: &Rule, path: &Path, now: DateTime<Local>) -> Option<ResolvedAction> {
    if rule.action_type == ActionKind::Delete {
        return Some(ResolvedAction::Delete);
    }

    if rule.action_value.trim().is_empty() {
        tracing::debug!("Rule '{}' has no action value, skipping", rule.name);
        return None;
    }
    let value = expand_date_placeholders(&rule.action_value, now);

    let action = match rule.action_type {
        ActionKind::Rename => ResolvedAction::Rename {
            directory: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            file_name: rename_target(&value, path),
        },
        ActionKind::Move => ResolvedAction::Move {
            relative_dir: PathBuf::from(value),
            file_name: file_name_of(path),
        },
        ActionKind::Copy => ResolvedAction::Copy {
            relative_dir: PathBuf::from(value),
            file_name: file_name_of(path),
        },
        ActionKind::Delete => ResolvedAction::Delete,
    };
    Some(action)
}

/// Substitutes `{YYYY}`, `{MM}` and `{DD}`.
pub fn expand_date_placeholders(template: &str, now: DateTime<Local>) -> String {
    template
        .replace("{YYYY}", &format!("{:04}", now.year()))
        .replace("{MM}", &format!("{:02}", now.month()))
        .replace("{DD}", &format!("{:02}", now.day()))
}

/// Builds a new file name from a rename template.
///
/// `{OrigName}` is the old stem, `{Ext}` the old extension with its dot. The
/// original extension is appended when the result does not already end in it.
pub fn rename_target(template: &str, path: &Path) -> String {
    let (stem, extension) = split_name(path);
    let mut name = template
        .replace("{OrigName}", &stem)
        .replace("{Ext}", &extension)
        .replace("{SeqNum}", SEQUENCE_NUMBER);
    if !name.ends_with(&extension) {
        name.push_str(&extension);
    }
    name
}

/// Keeps alphanumerics, spaces and underscores; trims trailing spaces.
pub fn sanitize_model(model: &str) -> String {
    model
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '_')
        .collect::<String>()
        .trim()
        .to_string()
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;
    use crate::events::EventSink;
    use crate::metadata::{Extractors, MetaValue, Metadata, MetadataExtractor, parse_exif_datetime};
    use crate::rule::{Condition, ConditionKind, Matcher};
    use chrono::TimeZone;

    struct StubImage(Metadata);

    impl MetadataExtractor for StubImage {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn family(&self) -> MetadataFamily {
            MetadataFamily::Image
        }

        fn supports(&self, extension: &str) -> bool {
            extension == "jpg" || extension == "png"
        }

        fn extract(&self, _path: &Path) -> Result<Metadata, ExtractError> {
            Ok(self.0.clone())
        }
    }

    fn move_rule(name: &str, contains: &str, destination: &str) -> Rule {
        Rule {
            name: name.to_string(),
            conditions: vec![Condition::new(
                ConditionKind::FileName,
                Matcher::Contains,
                contains,
            )],
            action_type: ActionKind::Move,
            action_value: destination.to_string(),
        }
    }

    fn resolve_with(settings: &Settings, extractors: &Extractors, path: &str) -> ResolvedAction {
        let sink = EventSink::silent();
        let evaluator = ConditionEvaluator::new(extractors, &sink, false);
        let mut resolver = RuleResolver::new(settings, evaluator);
        let now = Local.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        resolver.resolve_at(Path::new(path), now)
    }

    fn moved_to(dir: &str, name: &str) -> ResolvedAction {
        ResolvedAction::Move {
            relative_dir: PathBuf::from(dir),
            file_name: name.to_string(),
        }
    }

    #[test]
    fn test_unknown_extension_goes_to_other() {
        let settings = Settings::default();
        let extractors = Extractors::new(Vec::new());
        assert_eq!(
            resolve_with(&settings, &extractors, "/r/data.qqq"),
            moved_to("Other", "data.qqq")
        );
        assert_eq!(
            resolve_with(&settings, &extractors, "/r/README"),
            moved_to("Other", "README")
        );
    }

    #[test]
    fn test_category_fallback() {
        let settings = Settings::default();
        let extractors = Extractors::new(Vec::new());
        assert_eq!(
            resolve_with(&settings, &extractors, "/r/song.MP3"),
            moved_to("Audio", "song.MP3")
        );
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let mut settings = Settings::default();
        settings.rules = vec![
            move_rule("first", "report", "Reports/{YYYY}-{MM}-{DD}"),
            move_rule("second", "report", "Elsewhere"),
        ];
        let extractors = Extractors::new(Vec::new());
        assert_eq!(
            resolve_with(&settings, &extractors, "/r/report.txt"),
            moved_to("Reports/2024-03-09", "report.txt")
        );
    }

    #[test]
    fn test_rule_without_value_falls_through() {
        let mut settings = Settings::default();
        settings.rules = vec![
            move_rule("empty", "report", ""),
            move_rule("real", "report", "Reports"),
        ];
        let extractors = Extractors::new(Vec::new());
        assert_eq!(
            resolve_with(&settings, &extractors, "/r/report.txt"),
            moved_to("Reports", "report.txt")
        );
    }

    #[test]
    fn test_delete_and_copy_rules() {
        let mut settings = Settings::default();
        let mut delete = move_rule("tmp", ".tmp", "");
        delete.action_type = ActionKind::Delete;
        let mut copy = move_rule("backup", "keep", "Archive");
        copy.action_type = ActionKind::Copy;
        settings.rules = vec![delete, copy];
        let extractors = Extractors::new(Vec::new());

        assert_eq!(
            resolve_with(&settings, &extractors, "/r/x.tmp"),
            ResolvedAction::Delete
        );
        assert_eq!(
            resolve_with(&settings, &extractors, "/r/keep.txt"),
            ResolvedAction::Copy {
                relative_dir: PathBuf::from("Archive"),
                file_name: "keep.txt".to_string(),
            }
        );
    }

    #[test]
    fn test_rename_rule() {
        let mut settings = Settings::default();
        let mut rename = move_rule("scan", "scan", "{YYYY}_{OrigName}_{SeqNum}");
        rename.action_type = ActionKind::Rename;
        settings.rules = vec![rename];
        let extractors = Extractors::new(Vec::new());

        assert_eq!(
            resolve_with(&settings, &extractors, "/r/inbox/scan.pdf"),
            ResolvedAction::Rename {
                directory: PathBuf::from("/r/inbox"),
                file_name: "2024_scan_1.pdf".to_string(),
            }
        );
    }

    #[test]
    fn test_rename_target_keeps_extension() {
        let path = Path::new("/r/photo.JPG");
        assert_eq!(rename_target("holiday", path), "holiday.JPG");
        assert_eq!(rename_target("{OrigName}-edit{Ext}", path), "photo-edit.JPG");
        assert_eq!(rename_target("notes", Path::new("/r/Makefile")), "notes");
    }

    #[test]
    fn test_image_refinement_priority() {
        let settings = Settings::default();

        let mut dated = Metadata::default();
        dated.insert(
            MetaKey::DateTime,
            MetaValue::Timestamp(parse_exif_datetime("2021:12:24 18:00:00").unwrap()),
        );
        dated.insert_text(MetaKey::ImageDescription, "Screenshot");
        dated.insert_text(MetaKey::CameraModel, "Pixel 7");
        let extractors = Extractors::new(vec![Box::new(StubImage(dated))]);
        assert_eq!(
            resolve_with(&settings, &extractors, "/r/a.jpg"),
            moved_to("Images/2021-12", "a.jpg")
        );

        let mut screenshot = Metadata::default();
        screenshot.insert_text(MetaKey::ImageDescription, "A screenshot of the app");
        screenshot.insert_text(MetaKey::CameraModel, "Pixel 7");
        let extractors = Extractors::new(vec![Box::new(StubImage(screenshot))]);
        assert_eq!(
            resolve_with(&settings, &extractors, "/r/a.png"),
            moved_to("Images/Screenshots", "a.png")
        );

        let mut camera = Metadata::default();
        camera.insert_text(MetaKey::CameraModel, "Canon EOS 5D Mark IV!");
        let extractors = Extractors::new(vec![Box::new(StubImage(camera))]);
        assert_eq!(
            resolve_with(&settings, &extractors, "/r/a.jpg"),
            moved_to("Images/Canon EOS 5D Mark IV", "a.jpg")
        );

        let extractors = Extractors::new(vec![Box::new(StubImage(Metadata::default()))]);
        assert_eq!(
            resolve_with(&settings, &extractors, "/r/a.jpg"),
            moved_to("Images", "a.jpg")
        );
        // No provider for gif: plain Images.
        assert_eq!(
            resolve_with(&settings, &extractors, "/r/a.gif"),
            moved_to("Images", "a.gif")
        );
    }

    #[test]
    fn test_sanitize_model() {
        assert_eq!(sanitize_model("NIKON D850"), "NIKON D850");
        assert_eq!(sanitize_model("iPhone 12/Pro"), "iPhone 12Pro");
        assert_eq!(sanitize_model("../.."), "");
    }
}
