use proptest::prelude::*;
use std::fs;
use std::path::Path;

/// Property test for workspace dependency consistency
///
/// Every member crate that uses a dependency declared in the root
/// `[workspace.dependencies]` table must inherit it with `workspace = true`
/// instead of pinning its own version.
#[cfg(test)]
mod dependency_consistency_tests {
    use super::*;

    const MEMBERS: &[&str] = &["scan-engine", "workspace-tests"];

    fn read_toml(path: &str) -> anyhow::Result<toml::Table> {
        let content = fs::read_to_string(path)?;
        Ok(content.parse::<toml::Table>()?)
    }

    fn workspace_dependencies() -> anyhow::Result<Vec<String>> {
        let root = read_toml("../Cargo.toml")?;
        let deps = root
            .get("workspace")
            .and_then(|workspace| workspace.get("dependencies"))
            .and_then(|deps| deps.as_table())
            .ok_or_else(|| anyhow::anyhow!("root Cargo.toml has no [workspace.dependencies]"))?;
        Ok(deps.keys().cloned().collect())
    }

    /// Dependencies in a manifest table that are declared in the workspace
    /// but do not inherit from it
    fn pinned_dependencies(manifest: &toml::Table, section: &str, workspace: &[String]) -> Vec<String> {
        let Some(table) = manifest.get(section).and_then(|deps| deps.as_table()) else {
            return Vec::new();
        };

        table
            .iter()
            .filter(|(name, _)| workspace.contains(name))
            .filter(|(_, spec)| {
                let inherited = spec
                    .as_table()
                    .and_then(|spec| spec.get("workspace"))
                    .and_then(|flag| flag.as_bool())
                    .unwrap_or(false);
                !inherited
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    proptest! {
        #[test]
        fn test_workspace_dependency_consistency(
            crate_name in prop::sample::select(MEMBERS.to_vec())
        ) {
            let manifest_path = format!("../{}/Cargo.toml", crate_name);
            prop_assume!(Path::new(&manifest_path).exists());

            let workspace = workspace_dependencies().unwrap();
            let manifest = read_toml(&manifest_path).unwrap();

            for section in ["dependencies", "dev-dependencies"] {
                let pinned = pinned_dependencies(&manifest, section, &workspace);
                prop_assert!(
                    pinned.is_empty(),
                    "{} [{}] pins workspace dependencies: {:?}",
                    crate_name,
                    section,
                    pinned
                );
            }
        }
    }

    #[test]
    fn test_root_manifest_lists_members() {
        let root = read_toml("../Cargo.toml").unwrap();
        let members: Vec<&str> = root["workspace"]["members"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|member| member.as_str())
            .collect();
        for member in MEMBERS {
            assert!(members.contains(member), "missing workspace member {}", member);
        }
        assert_eq!(root["workspace"]["resolver"].as_str(), Some("2"));
    }

    #[test]
    fn test_pinned_dependency_detection() {
        let workspace = vec!["tokio".to_string(), "serde".to_string()];

        let good: toml::Table = r#"
[dependencies]
tokio.workspace = true
serde = { workspace = true, features = ["derive"] }
local-only = "1.0"
"#
        .parse()
        .unwrap();
        assert!(pinned_dependencies(&good, "dependencies", &workspace).is_empty());

        let bad: toml::Table = r#"
[dependencies]
tokio = "1.0"
serde = { version = "1.0" }
"#
        .parse()
        .unwrap();
        let mut pinned = pinned_dependencies(&bad, "dependencies", &workspace);
        pinned.sort();
        assert_eq!(pinned, vec!["serde".to_string(), "tokio".to_string()]);
    }
}
