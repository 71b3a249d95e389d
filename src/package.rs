//! Dependency types and listing

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::process::{run_json, IntoArgs};

/// Where a dependency was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyScope {
    /// Installed in the current project
    Local,
    /// Installed in the package manager's global store
    Global,
}

impl fmt::Display for DependencyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyScope::Local => write!(f, "local"),
            DependencyScope::Global => write!(f, "global"),
        }
    }
}

/// An installed package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Package name
    pub name: String,

    /// Install location on disk
    pub path: String,

    /// Version string
    pub version: String,

    pub scope: DependencyScope,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.name, self.version, self.scope)
    }
}

/// A package as reported by `<pm> list --json`
#[derive(Debug, Clone, Deserialize)]
struct ListedDependency {
    #[serde(default)]
    path: String,
    #[serde(default)]
    version: String,
}

/// One project entry of `<pm> list --json`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResult {
    #[serde(default)]
    dependencies: BTreeMap<String, ListedDependency>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, ListedDependency>,
}

impl ListResult {
    fn into_dependencies(self, scope: DependencyScope) -> impl Iterator<Item = Dependency> {
        self.dependencies
            .into_iter()
            .chain(self.dev_dependencies)
            .map(move |(name, listed)| Dependency {
                name,
                path: listed.path,
                version: listed.version,
                scope,
            })
    }
}

/// Flatten the output of a list command into dependencies
///
/// Only the first project of the listing is considered.
fn parse_listing(listing: Vec<ListResult>, scope: DependencyScope) -> Vec<Dependency> {
    listing
        .into_iter()
        .next()
        .map(|result| result.into_dependencies(scope).collect())
        .unwrap_or_default()
}

/// Query the package manager for local and global dependencies
pub fn fetch_dependencies(package_manager: &str) -> Result<Vec<Dependency>> {
    tracing::debug!("Fetching dependencies with {}", package_manager);

    let local: Vec<ListResult> = run_json(package_manager, &"list --json".into_args(), true)?;
    let global: Vec<ListResult> = run_json(package_manager, &"list --json -g".into_args(), true)?;

    let mut dependencies = parse_listing(local, DependencyScope::Local);
    dependencies.extend(parse_listing(global, DependencyScope::Global));

    tracing::debug!("Found {} dependencies", dependencies.len());
    Ok(dependencies)
}

/// Find a dependency by name, preferring local installs
pub fn find_dependency<'a>(dependencies: &'a [Dependency], name: &str) -> Option<&'a Dependency> {
    dependencies.iter().find(|dep| dep.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL_LISTING: &str = r#"[
        {
            "name": "my-lib",
            "version": "1.0.0",
            "path": "/work/my-lib",
            "dependencies": {
                "@rbxts/services": { "from": "@rbxts/services", "version": "1.5.4", "path": "/work/my-lib/node_modules/@rbxts/services" }
            },
            "devDependencies": {
                "eslint": { "from": "eslint", "version": "8.57.0", "path": "/work/my-lib/node_modules/eslint" },
                "prettier": { "from": "prettier", "version": "3.3.2", "path": "/work/my-lib/node_modules/prettier" }
            }
        }
    ]"#;

    fn parse(json: &str, scope: DependencyScope) -> Vec<Dependency> {
        parse_listing(serde_json::from_str(json).unwrap(), scope)
    }

    #[test]
    fn test_parse_listing() {
        let deps = parse(LOCAL_LISTING, DependencyScope::Local);
        let names: Vec<&str> = deps.iter().map(|dep| dep.name.as_str()).collect();

        assert_eq!(names, vec!["@rbxts/services", "eslint", "prettier"]);
        assert_eq!(deps[1].version, "8.57.0");
        assert_eq!(deps[1].path, "/work/my-lib/node_modules/eslint");
        assert!(deps.iter().all(|dep| dep.scope == DependencyScope::Local));
    }

    #[test]
    fn test_parse_listing_without_sections() {
        assert!(parse(r#"[{ "name": "empty" }]"#, DependencyScope::Global).is_empty());
        assert!(parse("[]", DependencyScope::Global).is_empty());
    }

    #[test]
    fn test_find_dependency() {
        let mut deps = parse(LOCAL_LISTING, DependencyScope::Local);
        deps.push(Dependency {
            name: "eslint".to_string(),
            path: "/global/eslint".to_string(),
            version: "9.0.0".to_string(),
            scope: DependencyScope::Global,
        });

        let eslint = find_dependency(&deps, "eslint").unwrap();
        assert_eq!(eslint.scope, DependencyScope::Local);
        assert_eq!(eslint.to_string(), "eslint@8.57.0 (local)");

        assert!(find_dependency(&deps, "@microsoft/api-extractor").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_fetch_dependencies_with_fake_package_manager() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let script = temp.path().join("fake-pm");
        std::fs::write(
            &script,
            r#"#!/bin/sh
if [ "$3" = "-g" ]; then
  echo '[{"dependencies":{"pm2":{"version":"5.4.0","path":"/global/pm2"}}}]'
else
  echo '[{"devDependencies":{"eslint":{"version":"8.57.0","path":"/work/eslint"}}}]'
fi
"#,
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let deps = fetch_dependencies(script.to_str().unwrap()).unwrap();

        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "eslint");
        assert_eq!(deps[0].scope, DependencyScope::Local);
        assert_eq!(deps[1].name, "pm2");
        assert_eq!(deps[1].scope, DependencyScope::Global);
    }
}
