//! Discovers project files on disk and deserializes the `Project` document
//! out of each one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use riptide_core::project::{Project, ProjectsMapping};

/// Scans `search_dirs` for `riptide.yml` project files one directory deep
/// (mirrors the original's flat per-project-directory layout) and returns
/// a name -> path mapping for every file that parses far enough to read
/// its `project.name` field.
pub fn discover_projects(search_dirs: &[PathBuf]) -> ProjectsMapping {
    let mut mapping = HashMap::new();
    for dir in search_dirs {
        let Ok(entries) = std::fs::read_dir(dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let project_file = path.join("riptide.yml");
            if !project_file.is_file() {
                continue;
            }
            if let Some(name) = project_name_from_file(&project_file) {
                mapping.insert(name, project_file);
            }
        }
    }
    mapping
}

fn project_name_from_file(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let doc: serde_yaml::Value = serde_yaml::from_str(&contents).ok()?;
    doc.get("project")?
        .get("name")?
        .as_str()
        .map(|s| s.to_string())
}

/// Fully parses the project document at `path`.
pub fn load_project(path: &Path) -> anyhow::Result<Project> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading project file {}: {e}", path.display()))?;
    #[derive(serde::Deserialize)]
    struct Document {
        project: Project,
    }
    let doc: Document = serde_yaml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("parsing project file {}: {e}", path.display()))?;
    Ok(doc.project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_project(dir: &Path, name: &str, yaml_body: &str) -> PathBuf {
        let project_dir = dir.join(name);
        std::fs::create_dir_all(&project_dir).unwrap();
        let file_path = project_dir.join("riptide.yml");
        let mut f = std::fs::File::create(&file_path).unwrap();
        write!(f, "{yaml_body}").unwrap();
        file_path
    }

    #[test]
    fn discover_projects_finds_valid_project_files() {
        let tmp = std::env::temp_dir().join(format!(
            "riptide-loader-test-discover-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&tmp).unwrap();
        write_project(
            &tmp,
            "demo",
            "project:\n  name: demo\n  app:\n    services: {}\n",
        );

        let mapping = discover_projects(&[tmp.clone()]);
        assert!(mapping.contains_key("demo"));

        std::fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn load_project_parses_services() {
        let tmp = std::env::temp_dir().join(format!(
            "riptide-loader-test-load-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&tmp).unwrap();
        let path = write_project(
            &tmp,
            "demo",
            "project:\n  name: demo\n  app:\n    services:\n      web:\n        role: main\n",
        );

        let project = load_project(&path).unwrap();
        assert_eq!(project.name, "demo");
        assert_eq!(project.main_service_name(), Some("web"));

        std::fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn load_project_missing_file_errors() {
        let result = load_project(Path::new("/nonexistent/riptide.yml"));
        assert!(result.is_err());
    }
}
