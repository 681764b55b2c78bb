use repo_snapshot::config;
use repo_snapshot::WriteMode;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

#[test]
fn test_load_repo_config_toml() {
    let config_path = PathBuf::from("config/config.toml");
    let config = config::load_config(&config_path).expect("Failed to load config");

    println!("\nLoaded {} organizations:", config.orgs.len());
    for org in &config.orgs {
        println!("  - {}", org);
    }

    assert!(config.orgs.iter().any(|o| o == "rust-lang"));
    assert_eq!(config.mode, WriteMode::Merge);
    assert_eq!(config.table, "github_repos");
    assert_eq!(config.db_path, PathBuf::from("data/output.duckdb"));
}

#[test]
fn test_load_config_from_temp_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[github]
orgs = ["apache"]

[output]
db_path = "out.duckdb"
mode = "append"
"#
    )
    .unwrap();

    let config = config::load_config(file.path()).expect("Failed to load config");
    assert_eq!(config.orgs, vec!["apache"]);
    assert_eq!(config.mode, WriteMode::Append);
    assert_eq!(config.table, config::DEFAULT_TABLE_NAME);
}

#[test]
fn test_load_missing_file_is_io_error() {
    let err = config::load_config(&PathBuf::from("does/not/exist.toml")).unwrap_err();
    assert!(matches!(err, repo_snapshot::RepoSnapshotError::Io(_)));
}
