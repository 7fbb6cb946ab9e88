use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// 3サービス構成のスターター
#[allow(dead_code)]
pub const STARTER: &str = r#"
stack "AppName" {
    region "eu-west-1"
    account "872821666058"
}

domain "example.com" {
    subdomain "site"
    certificate "0f1e2d3c"
}

tag "Application" "starter-app"

service "AppName1" {
    image "amazon/amazon-ecs-sample"
    path "/example*"
}

service "AppName2" {
    image "amazon/amazon-ecs-sample"
    path "/example2*"
}

service "AppName3" {
    image "amazon/amazon-ecs-sample"
    host "api.example.com"
}
"#;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn write_stack_kdl(&self, content: &str) {
        let path = self.root.path().join("stack.kdl");
        fs::write(path, content).unwrap();
    }

    #[allow(dead_code)]
    pub fn write_file(&self, relative: &str, content: &str) {
        let path = self.root.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    /// プロジェクト内で実行する `stack` コマンド（ユーザー設定は読まない）
    #[allow(deprecated)]
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("stack").unwrap();
        cmd.current_dir(self.path())
            .env_remove("STACKFLOW_PROJECT_ROOT")
            .env_remove("STACK_STAGE")
            .env("NO_COLOR", "1")
            .env(
                "STACKFLOW_CONFIG_PATH",
                self.path().join("no-such-config.yaml"),
            );
        cmd
    }
}
