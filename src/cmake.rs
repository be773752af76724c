//! CMake/CPM emitter.
//!
//! Renders the final dependency map into a file of `CPMAddPackage` calls.
//! Dependencies that are checked out in the workspace additionally get a
//! `CPM_<name>_SOURCE` override so CPM uses the local tree instead of
//! fetching. The template is compiled into the binary.

use std::path::Path;

use log::info;
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

use crate::config::write_atomic;
use crate::error::Result;
use crate::manifest::Dependencies;
use crate::workspace::{LocalCheckout, WorkspaceDirectory};

const CPM_TEMPLATE: &str = include_str!("templates/cpm.jinja");

#[derive(Debug, Serialize)]
struct PackageContext<'a> {
    name: &'a str,
    git: Option<&'a str>,
    git_tag: Option<&'a str>,
    cmake_condition: Option<&'a str>,
    options: &'a [String],
    local_path: Option<String>,
}

#[derive(Debug, Serialize)]
struct RenderContext<'a> {
    workspace: String,
    packages: Vec<PackageContext<'a>>,
}

/// Quotes a value as a CMake argument.
fn quote(value: String) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn environment() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_filter("quote", quote);
    env.add_template("cpm", CPM_TEMPLATE)?;
    Ok(env)
}

/// Renders the CMake text for `dependencies`.
pub fn render_cmake(
    dependencies: &Dependencies,
    checkouts: &[LocalCheckout],
    workspace: &WorkspaceDirectory,
) -> Result<String> {
    let packages = dependencies
        .iter()
        .map(|(name, entry)| PackageContext {
            name,
            git: entry.url(),
            git_tag: entry.tag(),
            cmake_condition: entry.cmake_condition.as_deref().filter(|c| !c.is_empty()),
            options: &entry.options,
            local_path: checkouts
                .iter()
                .find(|checkout| &checkout.name == name)
                .map(|checkout| checkout.path.display().to_string()),
        })
        .collect();
    let context = RenderContext {
        workspace: workspace.workspace.display().to_string(),
        packages,
    };

    let env = environment()?;
    let template = env.get_template("cpm")?;
    Ok(template.render(context)?)
}

/// Renders and writes the CMake file to `out`.
pub fn write_cmake(
    dependencies: &Dependencies,
    checkouts: &[LocalCheckout],
    workspace: &WorkspaceDirectory,
    out: &Path,
) -> Result<()> {
    let rendered = render_cmake(dependencies, checkouts, workspace)?;
    info!("Saving dependencies in: {}", out.display());
    write_atomic(out, rendered.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Dependency;
    use std::path::PathBuf;

    fn workspace() -> WorkspaceDirectory {
        WorkspaceDirectory {
            workspace: PathBuf::from("/ws"),
            ..WorkspaceDirectory::default()
        }
    }

    fn dependencies() -> Dependencies {
        let mut deps = Dependencies::new();
        deps.insert(
            "libocpp".into(),
            Dependency {
                git: Some("https://github.com/EVerest/libocpp.git".into()),
                git_tag: Some("v0.16.0".into()),
                cmake_condition: Some("EVEREST_DEPENDENCY_ENABLED_LIBOCPP".into()),
                ..Dependency::default()
            },
        );
        deps.insert(
            "nlohmann_json".into(),
            Dependency {
                git: Some("https://github.com/nlohmann/json".into()),
                git_tag: Some("v3.11.2".into()),
                options: vec!["JSON_BuildTests OFF".into(), "JSON_MultipleHeaders ON".into()],
                ..Dependency::default()
            },
        );
        deps.insert(
            "everest-framework".into(),
            Dependency {
                git: Some("https://github.com/EVerest/everest-framework.git".into()),
                git_tag: Some("main".into()),
                ..Dependency::default()
            },
        );
        deps
    }

    #[test]
    fn test_render_cmake() {
        let checkouts = vec![LocalCheckout {
            name: "everest-framework".into(),
            path: PathBuf::from("/ws/everest-framework"),
            git_tag: Some("main".into()),
        }];
        let rendered = render_cmake(&dependencies(), &checkouts, &workspace()).unwrap();
        insta::assert_snapshot!(rendered);
    }

    #[test]
    fn test_render_without_dependencies() {
        let rendered = render_cmake(&Dependencies::new(), &[], &workspace()).unwrap();
        assert_eq!(
            rendered,
            "# This file is generated by edm. Do not edit.\n# Workspace: /ws\n"
        );
    }

    #[test]
    fn test_render_entry_without_tag_omits_git_tag() {
        let mut deps = Dependencies::new();
        deps.insert("a".into(), Dependency::with_git("https://h/a.git"));
        let rendered = render_cmake(&deps, &[], &workspace()).unwrap();
        assert!(rendered.contains("GIT_REPOSITORY https://h/a.git\n)"));
        assert!(!rendered.contains("GIT_TAG"));
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("a \"b\"".into()), "\"a \\\"b\\\"\"");
    }
}
