use filetime::{set_file_mtime, FileTime};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

use pluginmaster_core::config::{
    DownloadCountMode, DownloadLinkStrategy, PipelineConfig, SourceMode, TimestampField,
};
use pluginmaster_core::contract::{MockDownloadCounter, ZeroCount};
use pluginmaster_core::master::read_master;
use pluginmaster_core::pipeline::build_master;
use pluginmaster_core::PipelineError;

fn branch_config(root: &Path) -> PipelineConfig {
    PipelineConfig {
        plugins_dir: root.join("plugins"),
        output: root.join("out/pluginmaster.json"),
        source: SourceMode::Loose,
        download_link: DownloadLinkStrategy::Branch {
            base_url: "https://raw.githubusercontent.com/org/repo".into(),
            branch: Some("main".into()),
            file_name: "latest.zip".into(),
        },
        download_count: DownloadCountMode::Zero,
        timestamp_field: TimestampField::LastUpdate,
        duplicate_download_links: true,
        reconcile: false,
        concurrency: 3,
        tag_prefix: "v".into(),
    }
}

fn write_plugin(root: &Path, name: &str, body: &str, mtime: i64) {
    let dir = root.join("plugins").join(name);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{name}.json"));
    fs::write(&path, body).unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
}

#[tokio::test]
async fn builds_expected_entry_for_loose_manifest() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    write_plugin(
        root,
        "Foo",
        r#"{"InternalName":"Foo","Name":"Foo Plugin","AssemblyVersion":"1.0.0","RepoUrl":"https://example.com/Foo","_Internal":"dropme"}"#,
        1_700_000_000,
    );
    fs::create_dir_all(root.join("plugins/Unpublished")).unwrap();
    let config = branch_config(root);

    let report = build_master(&config, &ZeroCount)
        .await
        .expect("build should succeed");
    assert_eq!(report.plugins.len(), 1);
    assert_eq!(report.plugins[0].internal_name, "Foo");
    assert!(report.reconciled.is_none());

    let text = fs::read_to_string(&config.output).unwrap();
    let doc: Value = serde_json::from_str(&text).unwrap();
    let link = "https://raw.githubusercontent.com/org/repo/main/plugins/Foo/latest.zip";
    assert_eq!(
        doc,
        json!([{
            "Name": "Foo Plugin",
            "InternalName": "Foo",
            "AssemblyVersion": "1.0.0",
            "RepoUrl": "https://example.com/Foo",
            "DownloadLinkInstall": link,
            "IsHide": false,
            "IsTestingExclusive": false,
            "ApplicableVersion": "any",
            "DownloadLinkTesting": link,
            "DownloadLinkUpdate": link,
            "DownloadCount": 0,
            "LastUpdate": "1700000000"
        }])
    );

    // Published keys first, derived keys appended in enrichment order.
    let keys: Vec<&str> = doc[0]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(
        keys,
        vec![
            "Name",
            "InternalName",
            "AssemblyVersion",
            "RepoUrl",
            "DownloadLinkInstall",
            "IsHide",
            "IsTestingExclusive",
            "ApplicableVersion",
            "DownloadLinkTesting",
            "DownloadLinkUpdate",
            "DownloadCount",
            "LastUpdate",
        ]
    );
    assert!(text.starts_with("[\n    {\n        \"Name\""));
}

#[tokio::test]
async fn rebuilding_unchanged_tree_is_byte_identical() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    write_plugin(root, "Zeta", r#"{"InternalName":"Zeta","AssemblyVersion":"0.1"}"#, 1_650_000_000);
    write_plugin(root, "Alpha", r#"{"InternalName":"Alpha","IsHide":true}"#, 1_660_000_000);
    let config = branch_config(root);

    build_master(&config, &ZeroCount).await.unwrap();
    let first = fs::read(&config.output).unwrap();
    build_master(&config, &ZeroCount).await.unwrap();
    let second = fs::read(&config.output).unwrap();
    assert_eq!(first, second);

    let master = read_master(&config.output).unwrap();
    let names: Vec<_> = master.iter().filter_map(|m| m.internal_name()).collect();
    assert_eq!(names, vec!["Alpha", "Zeta"]);
    assert_eq!(master[0].get("IsHide"), Some(&json!(true)));
}

#[tokio::test]
async fn author_written_derived_fields_are_recomputed() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    write_plugin(
        root,
        "Foo",
        r#"{"InternalName":"Foo","LastUpdated":"1","DownloadLinkTesting":"https://stale","DownloadCount":99,"IsHide":true}"#,
        1_700_000_000,
    );
    let config = branch_config(root);

    build_master(&config, &ZeroCount).await.unwrap();

    let master = read_master(&config.output).unwrap();
    let link = "https://raw.githubusercontent.com/org/repo/main/plugins/Foo/latest.zip";
    assert!(!master[0].contains("LastUpdated"), "stale schema field leaked");
    assert_eq!(master[0].get("LastUpdate"), Some(&json!("1700000000")));
    assert_eq!(master[0].get("DownloadLinkTesting"), Some(&json!(link)));
    assert_eq!(master[0].get("DownloadCount"), Some(&json!(0)));
    assert_eq!(master[0].get("IsHide"), Some(&json!(true)));
}

#[tokio::test]
async fn catalog_is_ordered_by_internal_name() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    // Directory names and InternalNames sort in opposite orders.
    write_plugin(root, "A", r#"{"InternalName":"Zed"}"#, 1_700_000_000);
    write_plugin(root, "B", r#"{"InternalName":"Alpha"}"#, 1_700_000_000);
    let config = branch_config(root);

    let report = build_master(&config, &ZeroCount).await.unwrap();
    let names: Vec<_> = report.plugins.iter().map(|p| p.internal_name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Zed"]);

    let master = read_master(&config.output).unwrap();
    let link = master[0].get("DownloadLinkInstall").and_then(|v| v.as_str());
    assert_eq!(
        link,
        Some("https://raw.githubusercontent.com/org/repo/main/plugins/Alpha/latest.zip")
    );
}

#[tokio::test]
async fn missing_internal_name_aborts_before_writing() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    write_plugin(root, "Good", r#"{"InternalName":"Good"}"#, 1_700_000_000);
    write_plugin(root, "Broken", r#"{"Name":"No identity"}"#, 1_700_000_000);
    let config = branch_config(root);
    fs::create_dir_all(config.output.parent().unwrap()).unwrap();
    fs::write(&config.output, "previous catalog").unwrap();

    let err = build_master(&config, &ZeroCount).await.unwrap_err();
    assert!(
        matches!(&err, PipelineError::MissingField { field, plugin } if field == "InternalName" && plugin == "Broken"),
        "got {err:?}"
    );
    assert_eq!(
        fs::read_to_string(&config.output).unwrap(),
        "previous catalog",
        "a failed run must leave the previous document untouched"
    );
}

#[tokio::test]
async fn branch_strategy_without_branch_is_rejected() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    write_plugin(root, "Foo", r#"{"InternalName":"Foo"}"#, 1_700_000_000);
    let mut config = branch_config(root);
    config.download_link = DownloadLinkStrategy::Branch {
        base_url: "https://raw.githubusercontent.com/org/repo".into(),
        branch: None,
        file_name: "latest.zip".into(),
    };

    let err = build_master(&config, &ZeroCount).await.unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)), "got {err:?}");
    assert!(!config.output.exists());
}

#[tokio::test]
async fn concurrent_counts_land_on_the_right_plugins() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    for (i, name) in ["A", "B", "C", "D", "E"].iter().enumerate() {
        write_plugin(
            root,
            name,
            &format!(r#"{{"InternalName":"{name}","AssemblyVersion":"1.{i}"}}"#),
            1_700_000_000,
        );
    }
    let config = branch_config(root);

    let mut counter = MockDownloadCounter::new();
    counter
        .expect_download_count()
        .times(5)
        .returning(|name, _tag| Ok(name.as_bytes()[0] as u64));

    let report = build_master(&config, &counter).await.unwrap();
    let counts: Vec<(String, u64)> = report
        .plugins
        .into_iter()
        .map(|p| (p.internal_name, p.download_count))
        .collect();
    assert_eq!(
        counts,
        vec![
            ("A".to_string(), b'A' as u64),
            ("B".to_string(), b'B' as u64),
            ("C".to_string(), b'C' as u64),
            ("D".to_string(), b'D' as u64),
            ("E".to_string(), b'E' as u64),
        ]
    );
}

#[tokio::test]
async fn empty_tree_writes_empty_catalog() {
    let tmp = tempdir().unwrap();
    let config = branch_config(tmp.path());

    let report = build_master(&config, &ZeroCount).await.unwrap();
    assert!(report.plugins.is_empty());
    assert_eq!(fs::read_to_string(&config.output).unwrap(), "[]");
}

#[tokio::test]
async fn reconcile_after_build_finds_nothing_to_change() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    write_plugin(root, "Foo", r#"{"InternalName":"Foo"}"#, 1_700_000_000);
    let mut config = branch_config(root);
    config.reconcile = true;

    let report = build_master(&config, &ZeroCount).await.unwrap();
    let reconciled = report.reconciled.expect("reconcile was requested");
    assert_eq!(reconciled.checked, 1);
    assert!(reconciled.updated.is_empty());
}
