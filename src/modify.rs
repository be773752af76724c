//! Modification stages applied to a scanned dependency map.
//!
//! Two independent stages exist:
//!
//! - **URL rewrite**: a directive string such as
//!   `prefix=https://github.com/ replace=git@github.com:` (repeatable) swaps
//!   the matching URL prefix of every dependency.
//! - **Structural modification**: a YAML mapping keyed by dependency name
//!   that can add, rename and edit entries:
//!
//! ```yaml
//! libfoo:
//!   add: true
//!   git: https://example.com/libfoo.git
//!   git_tag: v1.0.0
//! libbar:
//!   rename: libbaz
//!   cmake_condition: ""   # an empty value deletes the key
//! ```

use std::fs;
use std::path::Path;

use log::{error, info, warn};
use regex::Regex;

use crate::error::{Error, Result};
use crate::manifest::{yaml_scalar_to_string, Dependencies, Dependency};

const URL_REWRITE_PATTERN: &str = r"\s*prefix=(\S*)\s*replace=(\S*)";

/// One `prefix=<from> replace=<to>` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRewrite {
    pub prefix: String,
    pub replace: String,
}

impl UrlRewrite {
    /// Returns the rewritten URL if `url` starts with this directive's prefix.
    pub fn apply(&self, url: &str) -> Option<String> {
        url.strip_prefix(self.prefix.as_str())
            .map(|rest| format!("{}{}", self.replace, rest))
    }
}

/// Extracts every directive from `input`. Text between directives is ignored.
pub fn parse_url_rewrites(input: &str) -> Result<Vec<UrlRewrite>> {
    let regex = Regex::new(URL_REWRITE_PATTERN).map_err(Error::Regex)?;
    let rewrites: Vec<UrlRewrite> = regex
        .captures_iter(input)
        .map(|caps| UrlRewrite {
            prefix: caps[1].to_string(),
            replace: caps[2].to_string(),
        })
        .collect();
    for rewrite in rewrites.iter().filter(|r| r.replace.is_empty()) {
        warn!(
            "URL rewrite for prefix \"{}\" has an empty replacement, the prefix will be removed.",
            rewrite.prefix
        );
    }
    Ok(rewrites)
}

/// Rewrites the URLs of `dependencies` according to `input`.
///
/// Each directive is matched against the URL as it was before this stage ran,
/// so one directive never feeds another. An input without any directive is
/// logged and ignored.
pub fn modify_urls(dependencies: &mut Dependencies, input: &str) -> Result<()> {
    info!("Modifying dependencies with input: {}", input);
    let rewrites = parse_url_rewrites(input)?;
    if rewrites.is_empty() {
        warn!("Dependencies modifications could not be parsed, ignoring them.");
        return Ok(());
    }
    apply_url_rewrites(dependencies, &rewrites);
    Ok(())
}

pub fn apply_url_rewrites(dependencies: &mut Dependencies, rewrites: &[UrlRewrite]) {
    for dependency in dependencies.values_mut() {
        let Some(original) = dependency.git.clone() else {
            continue;
        };
        for rewrite in rewrites {
            if let Some(rewritten) = rewrite.apply(&original) {
                info!("Replaced dependency git URL '{}' with '{}'", original, rewritten);
                dependency.git = Some(rewritten);
            }
        }
    }
}

/// Structural changes for one named dependency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modification {
    /// Create the entry if it does not exist yet.
    pub add: bool,
    /// Move the entry to this name before editing it.
    pub rename: Option<String>,
    /// Keys to set, or to delete when the value is empty.
    pub fields: Vec<(String, serde_yaml::Value)>,
}

/// Ordered list of modifications as they appear in the file.
pub type Modifications = Vec<(String, Modification)>;

/// Parses a structural modification document.
pub fn parse_modifications(content: &str, source: &Path) -> Result<Modifications> {
    let parse_error = |message: String| Error::ConfigParse {
        path: source.to_path_buf(),
        message,
    };
    let value: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))?;
    let mapping = match value {
        serde_yaml::Value::Null => return Ok(Modifications::new()),
        serde_yaml::Value::Mapping(mapping) => mapping,
        _ => return Err(parse_error("top level is not a mapping".to_string())),
    };

    let mut modifications = Modifications::new();
    for (name, entry) in mapping {
        let name = yaml_scalar_to_string(&name)
            .ok_or_else(|| parse_error(format!("invalid dependency name {:?}", name)))?;
        let mut modification = Modification::default();
        if let serde_yaml::Value::Mapping(entry) = entry {
            for (key, value) in entry {
                let Some(key) = yaml_scalar_to_string(&key) else {
                    continue;
                };
                match key.as_str() {
                    "add" => modification.add = true,
                    "rename" => modification.rename = yaml_scalar_to_string(&value),
                    _ => modification.fields.push((key, value)),
                }
            }
        }
        modifications.push((name, modification));
    }
    Ok(modifications)
}

/// Applies `modifications` in order. Entries that do not exist and are not
/// flagged with `add` are skipped.
pub fn apply_modifications(dependencies: &mut Dependencies, modifications: &Modifications) {
    for (name, modification) in modifications {
        let mut name = name.clone();
        if !dependencies.contains_key(&name) {
            if !modification.add {
                continue;
            }
            dependencies.insert(name.clone(), Dependency::default());
        }

        if let Some(new_name) = &modification.rename {
            info!("Dependency \"{}\": Renaming to \"{}\"", name, new_name);
            if let Some(entry) = dependencies.remove(&name) {
                dependencies.insert(new_name.clone(), entry);
            }
            name = new_name.clone();
        }

        let Some(dependency) = dependencies.get_mut(&name) else {
            continue;
        };
        for (key, value) in &modification.fields {
            if is_empty_value(value) {
                if dependency.has_key(key) {
                    info!("Dependency \"{}\": Deleting \"{}\"", name, key);
                    dependency.remove_key(key);
                }
            } else {
                info!(
                    "Dependency \"{}\": Setting \"{}\" to \"{}\"",
                    name,
                    key,
                    display_value(value)
                );
                dependency.set_key(key, value.clone());
            }
        }
    }
}

/// Reads `path` and applies it to `dependencies`. A file that cannot be read
/// or parsed is logged and nothing is applied.
pub fn modify_from_file(dependencies: &mut Dependencies, path: &Path) {
    info!("Modifying dependencies with file: {}", path.display());
    let parsed = fs::read_to_string(path)
        .map_err(Error::from)
        .and_then(|content| parse_modifications(&content, path));
    match parsed {
        Ok(modifications) => apply_modifications(dependencies, &modifications),
        Err(e) => error!("Error parsing yaml of {}: {}", path.display(), e),
    }
}

fn is_empty_value(value: &serde_yaml::Value) -> bool {
    match value {
        serde_yaml::Value::Null => true,
        serde_yaml::Value::Bool(b) => !b,
        serde_yaml::Value::String(s) => s.is_empty(),
        serde_yaml::Value::Sequence(s) => s.is_empty(),
        serde_yaml::Value::Mapping(m) => m.is_empty(),
        serde_yaml::Value::Number(n) => n.as_f64() == Some(0.0),
        serde_yaml::Value::Tagged(_) => false,
    }
}

fn display_value(value: &serde_yaml::Value) -> String {
    yaml_scalar_to_string(value).unwrap_or_else(|| {
        serde_yaml::to_string(value)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default()
    })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn rewrite_only_touches_matching_urls(
            prefix in "[a-z]{1,8}://",
            replace in "[a-z]{1,8}://",
            matching in "[a-z/]{0,16}",
            other in "[A-Z]{1,16}",
        ) {
            let mut deps = Dependencies::new();
            deps.insert("hit".into(), Dependency::with_git(format!("{}{}", prefix, matching)));
            deps.insert("miss".into(), Dependency::with_git(other.clone()));
            let rewrite = UrlRewrite { prefix: prefix.clone(), replace: replace.clone() };
            apply_url_rewrites(&mut deps, std::slice::from_ref(&rewrite));

            let hit = deps["hit"].git.clone().unwrap_or_default();
            prop_assert_eq!(hit, format!("{}{}", replace, matching));
            prop_assert_eq!(deps["miss"].git.as_deref(), Some(other.as_str()));
        }

        #[test]
        fn parsed_directive_round_trips(
            prefix in "[a-zA-Z0-9:@./_-]{1,24}",
            replace in "[a-zA-Z0-9:@./_-]{1,24}",
        ) {
            let input = format!("prefix={} replace={}", prefix, replace);
            let rewrites = parse_url_rewrites(&input).unwrap();
            prop_assert_eq!(rewrites, vec![UrlRewrite { prefix, replace }]);
        }
    }
}
