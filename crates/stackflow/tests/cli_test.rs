#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

mod common;

use assert_cmd::Command;
use common::{STARTER, TestProject};
use predicates::prelude::*;

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("書いた順に、ルーティングになる。"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("synth"));
}

/// バージョン表示が正しく動作することを確認
#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stackflow"));
}

/// validateコマンドのヘルプが正しく表示されることを確認
#[test]
fn test_validate_help() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("validate")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[STAGE]"));
}

/// 不正なコマンドでエラーになることを確認
#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("invalid-command").assert().failure();
}

/// プロジェクトディレクトリ外で validate するとエラー
#[test]
fn test_validate_without_project() {
    let project = TestProject::new();
    project
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("プロジェクトルートが見つかりません"));
}

#[test]
fn test_validate_starter_project() {
    let project = TestProject::new();
    project.write_stack_kdl(STARTER);

    project
        .command()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("設定ファイルは正常です"))
        .stdout(predicate::str::contains("site.example.com"))
        .stdout(predicate::str::contains("priority 20"))
        .stdout(predicate::str::contains("priority 40"))
        .stdout(predicate::str::contains("404 Not Found"));
}

/// 書いた順に 20, 30, 40
#[test]
fn test_plan_json_priorities() {
    let project = TestProject::new();
    project.write_stack_kdl(STARTER);

    let output = project
        .command()
        .arg("plan")
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["stack_name"], "AppName");

    let rules = plan["routing"]["rules"].as_array().unwrap();
    let priorities: Vec<u64> = rules
        .iter()
        .map(|r| r["priority"].as_u64().unwrap())
        .collect();
    assert_eq!(priorities, vec![20, 30, 40]);
    assert_eq!(rules[2]["target"]["service_id"], "AppName3");
}

#[test]
fn test_plan_lists_resources() {
    let project = TestProject::new();
    project.write_stack_kdl(STARTER);

    project
        .command()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("AppNameHttpsListener"))
        .stdout(predicate::str::contains("AppName1HttpRule"))
        .stdout(predicate::str::contains("to create"));
}

#[test]
fn test_synth_writes_template() {
    let project = TestProject::new();
    project.write_stack_kdl(STARTER);

    project
        .command()
        .arg("synth")
        .arg("-o")
        .arg("out")
        .assert()
        .success()
        .stdout(predicate::str::contains("AppName.template.json"));

    let template_path = project.path().join("out/AppName.template.json");
    let content = std::fs::read_to_string(template_path).unwrap();
    let template: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(
        template["Resources"]["AppName1HttpRule"]["Properties"]["Priority"],
        20
    );
    assert!(project.path().join("out/manifest.json").exists());
}

/// 条件なしサービスが2つあると失敗し、何も出力しない
#[test]
fn test_multiple_default_services_fail() {
    let project = TestProject::new();
    project.write_stack_kdl(
        r#"
stack "AppName" {
    region "eu-west-1"
    account "872821666058"
}
domain "example.com" {
    certificate "0f1e2d3c"
}
service "web" {
    image "nginx"
}
service "api" {
    image "nginx"
}
"#,
    );

    project
        .command()
        .arg("synth")
        .arg("-o")
        .arg("out")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "More than one service without routing conditions",
        ));
    assert!(!project.path().join("out").exists());
}

#[test]
fn test_unknown_stage_fails() {
    let project = TestProject::new();
    project.write_stack_kdl(&format!("{}\nstage \"dev\" {{}}\n", STARTER));

    project
        .command()
        .arg("validate")
        .arg("staging")
        .assert()
        .failure()
        .stderr(predicate::str::contains("staging"));
}

/// -s/--stage フラグはhiddenだがパースは可能
#[test]
fn test_stage_flag_backward_compat() {
    let project = TestProject::new();
    project.write_stack_kdl(&format!("{}\nstage \"dev\" {{}}\n", STARTER));

    project
        .command()
        .arg("plan")
        .arg("-s")
        .arg("dev")
        .assert()
        .success()
        .stdout(predicate::str::contains("AppName-dev"));
}

/// 位置引数と-sフラグの同時指定はエラーになることを確認
#[test]
fn test_conflict_positional_and_flag() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("plan")
        .arg("prod")
        .arg("-s")
        .arg("dev")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

/// stack に region/account がなければユーザー設定で補完
#[test]
fn test_settings_fill_environment() {
    let project = TestProject::new();
    project.write_stack_kdl(
        r#"
domain "example.com" {
    certificate "0f1e2d3c"
}
service "web" {
    image "nginx"
}
"#,
    );
    project.write_file(
        "config.yaml",
        "default_region: ap-northeast-1\ndefault_account: \"123456789012\"\n",
    );

    let output = project
        .command()
        .env("STACKFLOW_CONFIG_PATH", project.path().join("config.yaml"))
        .arg("plan")
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        plan["domain"]["certificate_arn"],
        "arn:aws:acm:ap-northeast-1:123456789012:certificate/0f1e2d3c"
    );
    assert_eq!(plan["routing"]["default_action"]["type"], "forward");
}

/// region がないと証明書 ARN を組み立てられない
#[test]
fn test_missing_region_fails() {
    let project = TestProject::new();
    project.write_stack_kdl(
        r#"
domain "example.com" {
    certificate "0f1e2d3c"
}
service "web" {
    image "nginx"
}
"#,
    );

    project
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("設定エラー"));
}
