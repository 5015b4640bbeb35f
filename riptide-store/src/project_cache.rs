//! §4.2 Project Cache — resolves a project name to a parsed [`Project`],
//! reloading the project-file mapping once on a miss and the parsed
//! document once its TTL entry goes stale.

use std::path::PathBuf;
use std::sync::RwLock;

use riptide_core::project::{Project, ProjectsMapping};

use crate::cache::TtlCache;
use crate::loader;

pub struct ProjectCache {
    /// project name -> project file path. Reloaded in full on a miss.
    mapping: RwLock<ProjectsMapping>,
    /// project file path -> parsed Project, TTL-refreshed on hit.
    parsed: TtlCache<PathBuf, ProjectDoc>,
    search_dirs: Vec<PathBuf>,
}

#[derive(Clone)]
struct ProjectDoc(std::sync::Arc<Project>);

/// Outcome of a project lookup: either a resolved project (with the
/// `Project` document parsed and cached), or `None` if no project by that
/// name exists even after a mapping reload.
pub enum Lookup {
    Found(std::sync::Arc<Project>),
    NotFound,
    LoadError(anyhow::Error),
}

impl ProjectCache {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self {
            mapping: RwLock::new(loader::discover_projects(&search_dirs)),
            parsed: TtlCache::new(),
            search_dirs,
        }
    }

    /// Resolves `project_name`, reloading the projects mapping once if the
    /// name isn't currently known (a project may have just been created).
    pub fn get_or_load(&self, project_name: &str) -> Lookup {
        let path = {
            let mapping = self.mapping.read().unwrap();
            mapping.get(project_name).cloned()
        };

        let path = match path {
            Some(p) => p,
            None => {
                let mut mapping = self.mapping.write().unwrap();
                *mapping = loader::discover_projects(&self.search_dirs);
                match mapping.get(project_name).cloned() {
                    Some(p) => p,
                    None => return Lookup::NotFound,
                }
            }
        };

        if let Some(doc) = self.parsed.get_fresh(&path) {
            return Lookup::Found(doc.0);
        }

        match loader::load_project(&path) {
            Ok(project) => {
                let arc = std::sync::Arc::new(project);
                self.parsed.insert(path, ProjectDoc(arc.clone()));
                Lookup::Found(arc)
            }
            Err(err) => Lookup::LoadError(err),
        }
    }

    /// Forces a full reload of the project-name mapping and flushes every
    /// cached parsed document. Used by the one-shot retry-after-stale-cache
    /// path (§4.5) and whenever the landing page enumerates all projects.
    pub fn flush(&self) {
        let mut mapping = self.mapping.write().unwrap();
        *mapping = loader::discover_projects(&self.search_dirs);
        self.parsed.clear();
    }

    /// All currently known project names, forcing a mapping reload first
    /// (matches the original's `get_all_projects`, used by the landing
    /// page).
    pub fn all_project_names(&self) -> Vec<String> {
        let mut mapping = self.mapping.write().unwrap();
        *mapping = loader::discover_projects(&self.search_dirs);
        mapping.keys().cloned().collect()
    }

    /// Every project that currently parses cleanly, plus `(name, error)`
    /// for every one that doesn't (§4.2's `get_all`, used by the landing
    /// page to list load failures alongside working projects). Sorted by
    /// project name, per spec.md §4.2.
    pub fn get_all(&self) -> (Vec<std::sync::Arc<Project>>, Vec<(String, anyhow::Error)>) {
        let mut names = self.all_project_names();
        names.sort();
        let mut projects = Vec::new();
        let mut errors = Vec::new();
        for name in names {
            match self.get_or_load(&name) {
                Lookup::Found(p) => projects.push(p),
                Lookup::LoadError(err) => errors.push((name, err)),
                Lookup::NotFound => {}
            }
        }
        (projects, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_project_dir(root: &PathBuf, name: &str, body: &str) {
        let project_dir = root.join(name);
        std::fs::create_dir_all(&project_dir).unwrap();
        let mut f = std::fs::File::create(project_dir.join("riptide.yml")).unwrap();
        write!(f, "{body}").unwrap();
    }

    fn tmp_root(suffix: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "riptide-project-cache-test-{}-{}",
            std::process::id(),
            suffix
        ));
        std::fs::create_dir_all(&root).unwrap();
        root
    }

    #[test]
    fn unknown_project_is_not_found() {
        let root = tmp_root("unknown");
        let cache = ProjectCache::new(vec![root.clone()]);
        assert!(matches!(cache.get_or_load("nope"), Lookup::NotFound));
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn known_project_loads_and_caches() {
        let root = tmp_root("known");
        make_project_dir(
            &root,
            "demo",
            "project:\n  name: demo\n  app:\n    services: {}\n",
        );
        let cache = ProjectCache::new(vec![root.clone()]);
        match cache.get_or_load("demo") {
            Lookup::Found(p) => assert_eq!(p.name, "demo"),
            _ => panic!("expected Found"),
        }
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn project_created_after_cache_construction_is_found_via_reload() {
        let root = tmp_root("created-later");
        let cache = ProjectCache::new(vec![root.clone()]);
        assert!(matches!(cache.get_or_load("late"), Lookup::NotFound));

        make_project_dir(
            &root,
            "late",
            "project:\n  name: late\n  app:\n    services: {}\n",
        );
        match cache.get_or_load("late") {
            Lookup::Found(p) => assert_eq!(p.name, "late"),
            _ => panic!("expected Found after reload"),
        }
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn get_all_separates_loadable_projects_from_failures() {
        let root = tmp_root("get-all");
        make_project_dir(
            &root,
            "good",
            "project:\n  name: good\n  app:\n    services: {}\n",
        );
        make_project_dir(
            &root,
            "bad",
            "project:\n  name: bad\n  app:\n    services: not-a-map\n",
        );
        let cache = ProjectCache::new(vec![root.clone()]);

        let (projects, errors) = cache.get_all();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "good");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "bad");

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn flush_forces_a_fresh_reparse() {
        let root = tmp_root("flush");
        make_project_dir(
            &root,
            "demo",
            "project:\n  name: demo\n  app:\n    services: {}\n",
        );
        let cache = ProjectCache::new(vec![root.clone()]);
        let _ = cache.get_or_load("demo");
        cache.flush();
        match cache.get_or_load("demo") {
            Lookup::Found(p) => assert_eq!(p.name, "demo"),
            _ => panic!("expected Found after flush"),
        }
        std::fs::remove_dir_all(&root).ok();
    }
}
