//! Filename utilities for asset containers
//!
//! Asset display names are free text, but container filenames must be valid on
//! every platform a library might be synced to. These helpers turn names into
//! safe filename stems and compose them with the configured naming convention.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::config::NamingConfig;

/// File extension used by asset containers (without the dot).
pub const CONTAINER_EXTENSION: &str = "shelf";

/// Longest stem produced for a bare asset name.
pub const MAX_NAME_LENGTH: usize = 128;

/// Bundle name used when none is given.
pub const DEFAULT_BUNDLE_NAME: &str = "AssetBundle";

/// Longest stem produced for a fully composed filename.
pub const MAX_FILENAME_LENGTH: usize = 200;

/// Longest name produced for a single catalog directory component.
pub const MAX_DIR_COMPONENT_LENGTH: usize = 64;

static INVALID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"|?*\x00-\x1f]"#).expect("static regex is valid"));

/// Sanitize a name so it can be used as a single path component.
///
/// Path separators and characters that are invalid on Windows, macOS or Linux
/// become `_`. Leading and trailing dots and spaces are stripped so the result
/// can never be hidden or refer to a parent directory. Empty results fall back
/// to `asset`. The result is truncated to `max_length` characters.
pub fn sanitize_name(name: &str, max_length: usize) -> String {
    let replaced = name.replace(['/', '\\'], "_");
    let replaced = INVALID_CHARS.replace_all(&replaced, "_");
    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');

    let sanitized = if trimmed.is_empty() { "asset" } else { trimmed };
    sanitized.chars().take(max_length).collect()
}

/// Build a filename stem from an asset name and the naming convention.
///
/// The stem is `[prefix_]name[_suffix][_YYYY-MM-DD]`. Prefix and suffix are
/// sanitized on their own and have surrounding underscores removed, so a
/// configured `"PRE_"` does not produce a double underscore.
pub fn build_asset_filename(name: &str, naming: &NamingConfig, today: NaiveDate) -> String {
    let mut parts = Vec::new();

    if let Some(prefix) = affix(naming.prefix.as_deref()) {
        parts.push(prefix);
    }

    parts.push(sanitize_name(name, MAX_NAME_LENGTH));

    if let Some(suffix) = affix(naming.suffix.as_deref()) {
        parts.push(suffix);
    }

    if naming.include_date {
        parts.push(today.format("%Y-%m-%d").to_string());
    }

    sanitize_name(&parts.join("_"), MAX_FILENAME_LENGTH)
}

/// Same as [`build_asset_filename`] using the local date.
pub fn build_asset_filename_today(name: &str, naming: &NamingConfig) -> String {
    build_asset_filename(name, naming, chrono::Local::now().date_naive())
}

/// Stem of a bundle container: the sanitized name followed by the date.
///
/// A blank name falls back to [`DEFAULT_BUNDLE_NAME`].
pub fn bundle_stem(name: &str, today: NaiveDate) -> String {
    let name = if name.trim().is_empty() { DEFAULT_BUNDLE_NAME } else { name };
    format!("{}_{}", sanitize_name(name, MAX_NAME_LENGTH), today.format("%Y-%m-%d"))
}

fn affix(value: Option<&str>) -> Option<String> {
    let value = value?;
    if value.trim().is_empty() {
        return None;
    }
    let cleaned = sanitize_name(value, 32).trim_matches('_').to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// File name (stem plus extension) of a container for the given stem.
pub fn container_file_name(stem: &str) -> String {
    format!("{}.{}", stem, CONTAINER_EXTENSION)
}

/// True if the path has the container extension.
pub fn is_container_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(CONTAINER_EXTENSION))
}

/// Directory below a library root that mirrors a catalog path.
///
/// `Furniture/Chairs` becomes `Furniture/Chairs` with each component
/// sanitized; empty components are skipped.
pub fn catalog_subdirectory(catalog_path: &str) -> PathBuf {
    catalog_path
        .split('/')
        .filter(|part| !part.trim().is_empty())
        .map(|part| sanitize_name(part, MAX_DIR_COMPONENT_LENGTH))
        .collect()
}

/// Derive a non-colliding variant of `base` by appending `.001`, `.002`, ...
///
/// `taken` is asked for each candidate; the first free one wins.
pub fn dotted_increment<F>(base: &str, mut taken: F) -> String
where
    F: FnMut(&str) -> bool,
{
    if !taken(base) {
        return base.to_string();
    }
    let mut counter = 1u32;
    loop {
        let candidate = format!("{}.{:03}", base, counter);
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naming(prefix: &str, suffix: &str, include_date: bool) -> NamingConfig {
        NamingConfig {
            prefix: (!prefix.is_empty()).then(|| prefix.to_string()),
            suffix: (!suffix.is_empty()).then(|| suffix.to_string()),
            include_date,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn test_sanitize_name_replaces_invalid_chars() {
        assert_eq!(sanitize_name("Asset/Name", MAX_NAME_LENGTH), "Asset_Name");
        assert_eq!(sanitize_name("a\\b", MAX_NAME_LENGTH), "a_b");
        assert_eq!(sanitize_name("Asset*Name?", MAX_NAME_LENGTH), "Asset_Name_");
        assert_eq!(sanitize_name("x<y>z:\"|", MAX_NAME_LENGTH), "x_y_z___");
        assert_eq!(sanitize_name("tab\there", MAX_NAME_LENGTH), "tab_here");
    }

    #[test]
    fn test_sanitize_name_strips_dots_and_spaces() {
        assert_eq!(sanitize_name("  ..hidden. ", MAX_NAME_LENGTH), "hidden");
        assert_eq!(sanitize_name("..", MAX_NAME_LENGTH), "asset");
        assert_eq!(sanitize_name("", MAX_NAME_LENGTH), "asset");
    }

    #[test]
    fn test_sanitize_name_truncates_by_chars() {
        let long = "é".repeat(300);
        assert_eq!(sanitize_name(&long, 10).chars().count(), 10);
    }

    #[test]
    fn test_build_asset_filename_conventions() {
        assert_eq!(build_asset_filename("MyAsset", &naming("", "", false), date()), "MyAsset");
        assert_eq!(
            build_asset_filename("MyAsset", &naming("PRE", "", false), date()),
            "PRE_MyAsset"
        );
        assert_eq!(
            build_asset_filename("MyAsset", &naming("", "v1", false), date()),
            "MyAsset_v1"
        );
        assert_eq!(
            build_asset_filename("MyAsset", &naming("PRE_", "_v1", true), date()),
            "PRE_MyAsset_v1_2024-03-09"
        );
        assert_eq!(
            build_asset_filename("My Asset", &naming("", "", false), date()),
            "My Asset"
        );
    }

    #[test]
    fn test_blank_affixes_are_ignored() {
        assert_eq!(
            build_asset_filename("Chair", &naming("  ", "___", false), date()),
            "Chair"
        );
    }

    #[test]
    fn test_container_paths() {
        assert_eq!(container_file_name("Chair"), "Chair.shelf");
        assert!(is_container_path(Path::new("/lib/Chair.shelf")));
        assert!(is_container_path(Path::new("Chair.SHELF")));
        assert!(!is_container_path(Path::new("Chair.png")));
    }

    #[test]
    fn test_catalog_subdirectory() {
        assert_eq!(
            catalog_subdirectory("Furniture/Chairs"),
            PathBuf::from("Furniture").join("Chairs")
        );
        assert_eq!(catalog_subdirectory("/Props//Small/"), PathBuf::from("Props").join("Small"));
        assert_eq!(catalog_subdirectory("a:b"), PathBuf::from("a_b"));
    }

    #[test]
    fn test_bundle_stem() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(bundle_stem("Props: Kit", today), "Props_ Kit_2024-03-09");
        assert_eq!(bundle_stem("  ", today), "AssetBundle_2024-03-09");
    }

    #[test]
    fn test_dotted_increment() {
        let existing = ["Swatch", "Swatch.001"];
        let next = dotted_increment("Swatch", |c| existing.contains(&c));
        assert_eq!(next, "Swatch.002");
        assert_eq!(dotted_increment("Fresh", |_| false), "Fresh");
    }
}
