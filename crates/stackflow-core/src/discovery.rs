//! プロジェクトルートの検出と KDL ファイルの収集
//!
//! ```text
//! stack.kdl               (または .stackflow/stack.kdl)
//! services/**/*.kdl       パス順
//! stack.{stage}.kdl       ステージ指定時のみ
//! stack.local.kdl
//! .env
//! ```

use crate::error::{Result, StackError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const ROOT_FILE: &str = "stack.kdl";
pub const PROJECT_DIR: &str = ".stackflow";
pub const SERVICES_DIR: &str = "services";
pub const LOCAL_OVERRIDE_FILE: &str = "stack.local.kdl";
/// プロジェクトルートを直接指定する環境変数
pub const PROJECT_ROOT_ENV: &str = "STACKFLOW_PROJECT_ROOT";

#[derive(Debug, Clone, Default)]
pub struct DiscoveredFiles {
    pub root: Option<PathBuf>,
    pub services: Vec<PathBuf>,
    pub stage_override: Option<PathBuf>,
    pub local_override: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

impl DiscoveredFiles {
    /// 読み込み順（後のファイルが前のファイルを上書き）
    pub fn kdl_files(&self) -> Vec<&Path> {
        self.root
            .iter()
            .chain(&self.services)
            .chain(&self.stage_override)
            .chain(&self.local_override)
            .map(PathBuf::as_path)
            .collect()
    }
}

/// 直下 → .stackflow/ の順に探す
fn locate(project_root: &Path, name: &str) -> Option<PathBuf> {
    [project_root.join(name), project_root.join(PROJECT_DIR).join(name)]
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn is_project_root(dir: &Path) -> bool {
    locate(dir, ROOT_FILE).is_some()
}

/// カレントディレクトリを起点にプロジェクトルートを検出
#[tracing::instrument]
pub fn find_project_root() -> Result<PathBuf> {
    let start_dir = std::env::current_dir()?;
    find_project_root_from(&start_dir)
}

/// `STACKFLOW_PROJECT_ROOT` が有効ならそれを、なければ `start_dir` から親へ辿って探す
#[tracing::instrument(skip(start_dir), fields(start_dir = %start_dir.display()))]
pub fn find_project_root_from(start_dir: &Path) -> Result<PathBuf> {
    if let Ok(root) = std::env::var(PROJECT_ROOT_ENV) {
        let path = PathBuf::from(&root);
        if is_project_root(&path) {
            info!(project_root = %path.display(), "Project root from {}", PROJECT_ROOT_ENV);
            return Ok(path);
        }
        warn!(env_root = %root, "{} does not contain {}", PROJECT_ROOT_ENV, ROOT_FILE);
    }

    match start_dir.ancestors().find(|dir| {
        debug!(checking = %dir.display(), "Looking for {}", ROOT_FILE);
        is_project_root(dir)
    }) {
        Some(root) => {
            info!(project_root = %root.display(), "Found project root");
            Ok(root.to_path_buf())
        }
        None => {
            warn!(start_dir = %start_dir.display(), "Project root not found");
            Err(StackError::ProjectRootNotFound(start_dir.to_path_buf()))
        }
    }
}

pub fn discover_files(project_root: &Path) -> Result<DiscoveredFiles> {
    discover_files_with_stage(project_root, None)
}

#[tracing::instrument(skip(project_root), fields(project_root = %project_root.display()))]
pub fn discover_files_with_stage(
    project_root: &Path,
    stage: Option<&str>,
) -> Result<DiscoveredFiles> {
    let services_dir = project_root.join(SERVICES_DIR);
    let services = if services_dir.is_dir() {
        collect_kdl_files(&services_dir)?
    } else {
        Vec::new()
    };

    let discovered = DiscoveredFiles {
        root: locate(project_root, ROOT_FILE),
        services,
        stage_override: stage.and_then(|s| locate(project_root, &format!("stack.{}.kdl", s))),
        local_override: locate(project_root, LOCAL_OVERRIDE_FILE),
        env_file: locate(project_root, ".env"),
    };

    info!(
        services = discovered.services.len(),
        stage_override = discovered.stage_override.is_some(),
        local_override = discovered.local_override.is_some(),
        env_file = discovered.env_file.is_some(),
        "Discovered project files"
    );
    Ok(discovered)
}

fn walk_error(path: &Path) -> impl FnOnce(std::io::Error) -> StackError + use<> {
    let path = path.to_path_buf();
    move |source| StackError::WalkDir { path, source }
}

/// `dir` 配下の .kdl をパス順で返す。シンボリックリンクの循環は一度だけ辿る
fn collect_kdl_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut visited = HashSet::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let canonical = current.canonicalize().map_err(walk_error(&current))?;
        if !visited.insert(canonical) {
            warn!(dir = %current.display(), "Symlink loop detected, skipping");
            continue;
        }

        for entry in std::fs::read_dir(&current).map_err(walk_error(&current))? {
            let path = entry.map_err(walk_error(&current))?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "kdl") {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_discover_files() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_root = temp_dir.path();

        fs::write(project_root.join("stack.kdl"), "// root")?;
        fs::create_dir_all(project_root.join("services/backend"))?;
        fs::write(project_root.join("services/web.kdl"), "")?;
        fs::write(project_root.join("services/api.kdl"), "")?;
        fs::write(project_root.join("services/backend/worker.kdl"), "")?;
        fs::write(project_root.join("services/README.md"), "")?;
        fs::write(project_root.join("stack.prod.kdl"), "// prod")?;
        fs::write(project_root.join("stack.local.kdl"), "// local")?;
        fs::write(project_root.join(".env"), "KEY=value")?;

        let discovered = discover_files_with_stage(project_root, Some("prod"))?;

        assert!(discovered.root.is_some());
        assert_eq!(discovered.services.len(), 3);
        assert!(discovered.services[0].ends_with("services/api.kdl"));
        assert!(discovered.services[1].ends_with("services/backend/worker.kdl"));
        assert!(discovered.services[2].ends_with("services/web.kdl"));
        assert!(
            discovered
                .stage_override
                .as_ref()
                .unwrap()
                .ends_with("stack.prod.kdl")
        );
        assert!(discovered.local_override.is_some());
        assert!(discovered.env_file.is_some());

        // 読み込み順: root → services → stage → local
        let files = discovered.kdl_files();
        assert_eq!(files.len(), 6);
        assert!(files[0].ends_with("stack.kdl"));
        assert!(files[4].ends_with("stack.prod.kdl"));
        assert!(files[5].ends_with("stack.local.kdl"));

        Ok(())
    }

    #[test]
    fn test_discover_files_minimal() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_root = temp_dir.path();

        fs::write(project_root.join("stack.kdl"), "// root")?;
        fs::write(project_root.join("stack.prod.kdl"), "// prod")?;

        // ステージ未指定なら stack.prod.kdl は読み込まない
        let discovered = discover_files(project_root)?;

        assert!(discovered.root.is_some());
        assert!(discovered.services.is_empty());
        assert!(discovered.stage_override.is_none());
        assert!(discovered.local_override.is_none());
        assert!(discovered.env_file.is_none());

        Ok(())
    }

    #[test]
    fn test_root_file_priority_over_hidden_dir() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_root = temp_dir.path();

        fs::write(project_root.join("stack.kdl"), "// root")?;
        fs::create_dir_all(project_root.join(".stackflow"))?;
        fs::write(project_root.join(".stackflow/stack.kdl"), "// hidden")?;

        let discovered = discover_files(project_root)?;
        let root = discovered.root.unwrap();
        assert!(!root.to_string_lossy().contains(".stackflow"));

        Ok(())
    }

    #[test]
    fn test_discover_files_in_hidden_dir() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_root = temp_dir.path();

        fs::create_dir_all(project_root.join(".stackflow"))?;
        fs::write(project_root.join(".stackflow/stack.kdl"), "// hidden")?;
        fs::write(project_root.join(".stackflow/stack.local.kdl"), "// local")?;

        let discovered = discover_files(project_root)?;
        assert!(
            discovered
                .root
                .as_ref()
                .unwrap()
                .ends_with(".stackflow/stack.kdl")
        );
        assert!(
            discovered
                .local_override
                .as_ref()
                .unwrap()
                .ends_with(".stackflow/stack.local.kdl")
        );

        Ok(())
    }

    #[test]
    #[serial]
    fn test_find_project_root_walks_up() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_root = temp_dir.path().to_path_buf();
        fs::write(project_root.join("stack.kdl"), "// root").unwrap();
        let nested = project_root.join("app/src");
        fs::create_dir_all(&nested).unwrap();

        temp_env::with_var_unset(PROJECT_ROOT_ENV, || {
            let found = find_project_root_from(&nested).unwrap();
            assert_eq!(found, project_root);
        });
    }

    #[test]
    #[serial]
    fn test_find_project_root_from_env() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_root = temp_dir.path().join("elsewhere");
        fs::create_dir_all(project_root.join(".stackflow")).unwrap();
        fs::write(project_root.join(".stackflow/stack.kdl"), "// hidden").unwrap();

        let unrelated = tempfile::tempdir().unwrap();

        temp_env::with_var(PROJECT_ROOT_ENV, Some(project_root.as_os_str()), || {
            let found = find_project_root_from(unrelated.path()).unwrap();
            assert_eq!(found, project_root);
        });
    }

    #[test]
    #[serial]
    fn test_find_project_root_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();

        temp_env::with_var_unset(PROJECT_ROOT_ENV, || {
            let result = find_project_root_from(temp_dir.path());
            assert!(matches!(result, Err(StackError::ProjectRootNotFound(_))));
        });
    }
}
