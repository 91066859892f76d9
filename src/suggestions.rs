//! # Error Suggestions
//!
//! Turns library errors into CLI messages that say what went wrong and what to
//! do about it.
//!
//! ```rust,ignore
//! use asset_shelf::suggestions;
//!
//! let err = suggestions::explain(error, &config);
//! ```

use std::path::Path;

use crate::config::EngineConfig;
use crate::error::Error;

/// Error for a missing configuration file.
pub fn config_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Configuration file not found: {path}\n\n\
         hint: Create it with a 'libraries' list of name/path entries\n\
         hint: Use --config to point at another file\n\
         hint: Set the ASSET_SHELF_CONFIG environment variable",
        path = path.display()
    )
}

/// Error for a library name that is not configured.
pub fn library_not_found(name: &str, config: &EngineConfig) -> anyhow::Error {
    let known: Vec<&str> = config.libraries.iter().map(|l| l.name.as_str()).collect();
    let did_you_mean = find_similar(name, &known)
        .map(|s| format!("\nhint: Did you mean '{s}'?"))
        .unwrap_or_default();
    let listing = if known.is_empty() {
        "No libraries are configured".to_string()
    } else {
        format!("Configured libraries: {}", known.join(", "))
    };
    anyhow::anyhow!("Library not configured: {name}{did_you_mean}\n\n{listing}")
}

/// Error for an invalid container glob.
pub fn invalid_glob(pattern: &str, error: &glob::PatternError) -> anyhow::Error {
    anyhow::anyhow!(
        "Invalid glob pattern: {pattern}\n\
         error: {error}\n\n\
         hint: Use * to match within a name and ? for a single character\n\
         hint: Use [abc] for character classes, [!abc] to negate"
    )
}

/// Wrap a library error with hints where one helps.
pub fn explain(error: Error, config: &EngineConfig) -> anyhow::Error {
    match &error {
        Error::LibraryNotFound { name } => library_not_found(name, config),
        Error::ConflictUnresolved { .. } => anyhow::anyhow!(
            "{error}\n\n\
             hint: Pass --on-conflict increment, overwrite or skip\n\
             hint: Set 'conflict_policy' in the configuration file"
        ),
        Error::ContainerLocked { .. } => anyhow::anyhow!(
            "{error}\n\n\
             hint: Another asset-shelf process is writing this container; retry when it finishes"
        ),
        // Keeps the typed error in the chain; the binary maps it to exit code 3.
        Error::WriteFailedPartial { .. } => anyhow::Error::new(error).context(
            "Some files were already replaced; inspect the container named below\n\
             hint: Run 'asset-shelf info' on it before retrying",
        ),
        Error::ContainerCorrupt { .. } => anyhow::anyhow!(
            "{error}\n\n\
             hint: The file was not written by this tool or is damaged; it was left untouched"
        ),
        _ => anyhow::Error::new(error),
    }
}

/// Closest candidate within edit distance 2, if any.
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&candidate| (candidate, edit_distance(input, candidate)))
        .filter(|&(_, distance)| distance <= 2 && distance < input.chars().count())
        .min_by_key(|&(_, distance)| distance)
        .map(|(candidate, _)| candidate)
}

/// Levenshtein distance over chars, two rows at a time.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        previous = current;
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::with_libraries([("Props", "/a"), ("Materials", "/b")])
    }

    #[test]
    fn test_config_not_found_includes_hints() {
        let message = config_not_found(Path::new("/x/asset-shelf.yaml")).to_string();
        assert!(message.contains("/x/asset-shelf.yaml"));
        assert!(message.contains("--config"));
        assert!(message.contains("ASSET_SHELF_CONFIG"));
    }

    #[test]
    fn test_library_not_found_suggests_similar() {
        let message = library_not_found("Prop", &config()).to_string();
        assert!(message.contains("Did you mean 'Props'?"));
        assert!(message.contains("Configured libraries: Props, Materials"));

        let message = library_not_found("Textures", &config()).to_string();
        assert!(!message.contains("Did you mean"));
    }

    #[test]
    fn test_explain_adds_conflict_hint() {
        let error = Error::ConflictUnresolved {
            destination: "/a/Chair.shelf".into(),
            message: "policy is 'prompt'".to_string(),
        };
        let message = explain(error, &config()).to_string();
        assert!(message.contains("--on-conflict"));
    }

    #[test]
    fn test_explain_keeps_partial_error_in_chain() {
        let error = Error::WriteFailedPartial {
            path: "/a/Chair.shelf".into(),
            message: "rename failed".to_string(),
            recovery: None,
        };
        let explained = explain(error, &config());
        assert!(explained.to_string().contains("already replaced"));
        assert!(explained
            .chain()
            .any(|cause| cause.downcast_ref::<Error>().is_some_and(Error::is_partial)));
    }

    #[test]
    fn test_explain_passes_other_errors_through() {
        let message = explain(Error::invalid("nope"), &config()).to_string();
        assert_eq!(message, "Invalid operation: nope");
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("Props", "Props"), 0);
        assert_eq!(edit_distance("Prop", "Props"), 1);
        assert_eq!(edit_distance("Porps", "Props"), 2);
        assert_eq!(edit_distance("", "abc"), 3);
    }
}
