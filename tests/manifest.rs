//! This module is an integration test that exercises the on-disk behaviour of
//! deployment manifests.
#![cfg(test)]

use std::{fs, fs::File, time::Duration};

use fs2::FileExt;
use serde_json::json;
use storage_layout_upgrades::{
    error::manifest::Error,
    layout::Layout,
    manifest::{Config, Deployment, ImplDeployment, Manifest, ManifestData},
};
use tempfile::TempDir;

/// The chain id of the network used throughout, whose manifest is
/// `goerli.json`.
const CHAIN_ID: u64 = 5;

fn manifest_in(dir: &TempDir) -> Manifest {
    let config = Config::default()
        .with_directory(dir.path())
        .with_lock_retries(1)
        .with_retry_interval(Duration::from_millis(1));
    Manifest::new(CHAIN_ID, config)
}

fn sample_layout() -> anyhow::Result<Layout> {
    Ok(serde_json::from_value(json!({
        "storage": [
            { "contract": "Box", "label": "value", "type": "t_uint256", "slot": "0", "offset": 0,
              "src": "contracts/Box.sol:5" }
        ],
        "types": {
            "t_uint256": { "label": "uint256", "numberOfBytes": "32", "kind": "value" }
        }
    }))?)
}

fn sample_data() -> anyhow::Result<ManifestData> {
    let mut data = ManifestData {
        admin: Some(Deployment {
            address: "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512".into(),
            tx_hash: None,
        }),
        ..ManifestData::default()
    };
    data.impls.insert("box-v1".into(), Some(ImplDeployment {
        deployment: Deployment {
            address: "0x5FbDB2315678afecb367f032d93F642f64180aa3".into(),
            tx_hash: Some("0x01".into()),
        },
        layout:     sample_layout()?,
    }));
    data.impls.insert("removed".into(), None);
    Ok(data)
}

#[test]
fn absent_manifests_read_as_empty() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut manifest = manifest_in(&dir);

    assert_eq!(manifest.read()?, ManifestData::default());
    assert_eq!(manifest.read()?.manifest_version, "3.1");
    assert!(!manifest.is_locked());
    assert!(!manifest.file().exists());

    Ok(())
}

#[test]
fn writing_requires_the_lock() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let manifest = manifest_in(&dir);

    assert!(matches!(manifest.write(&ManifestData::default()), Err(Error::NotLocked)));
    assert!(!manifest.file().exists());

    Ok(())
}

#[test]
fn round_trips_through_a_locked_run() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut manifest = manifest_in(&dir);
    let data = sample_data()?;

    manifest.locked_run(|locked| {
        assert!(locked.is_locked());
        let mut current = locked.read()?;
        current.admin.clone_from(&data.admin);
        current.impls.clone_from(&data.impls);
        locked.write(&current)
    })?;
    assert!(!manifest.is_locked());

    assert_eq!(manifest.read()?, data);
    let text = fs::read_to_string(dir.path().join("goerli.json"))?;
    assert!(text.ends_with("}\n"));
    let raw: serde_json::Value = serde_json::from_str(&text)?;
    assert_eq!(raw["manifestVersion"], "3.1");
    assert_eq!(raw["impls"]["box-v1"]["txHash"], "0x01");
    assert_eq!(raw["impls"]["box-v1"]["layout"]["storage"][0]["type"], "t_uint256");
    assert!(raw["impls"]["removed"].is_null());

    Ok(())
}

#[test]
fn writes_replace_the_whole_manifest() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut manifest = manifest_in(&dir);
    let data = sample_data()?;

    manifest.locked_run(|locked| locked.write(&data))?;
    manifest.locked_run(|locked| locked.write(&ManifestData::default()))?;
    assert_eq!(manifest.read()?, ManifestData::default());

    let mut names = fs::read_dir(dir.path())?
        .map(|entry| Ok(entry?.file_name().to_string_lossy().into_owned()))
        .collect::<anyhow::Result<Vec<_>>>()?;
    names.sort();
    assert_eq!(names, vec!["goerli.json", "goerli.json.lock"]);

    Ok(())
}

#[test]
fn locked_runs_do_not_nest() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut manifest = manifest_in(&dir);

    let result = manifest.locked_run(|locked| locked.locked_run(|_| Ok::<_, Error>(())));
    assert!(matches!(result, Err(Error::AlreadyLocked)));
    assert!(!manifest.is_locked());

    Ok(())
}

#[test]
fn failed_runs_release_the_lock() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut manifest = manifest_in(&dir);

    let result: anyhow::Result<()> = manifest.locked_run(|_| anyhow::bail!("deployment failed"));
    assert!(result.is_err());
    assert!(!manifest.is_locked());

    manifest.locked_run(|locked| locked.write(&ManifestData::default()))?;
    assert!(manifest.file().exists());

    Ok(())
}

#[test]
fn migrates_the_previous_schema_version() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(
        dir.path().join("goerli.json"),
        json!({ "manifestVersion": "3.0", "impls": {} }).to_string(),
    )?;
    let mut manifest = manifest_in(&dir);

    let data = manifest.read()?;
    assert_eq!(data.manifest_version, "3.1");
    assert!(data.impls.is_empty());

    Ok(())
}

#[test]
fn rejects_unsupported_schema_versions() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("goerli.json");
    let mut manifest = manifest_in(&dir);

    fs::write(&path, json!({ "manifestVersion": "2.1", "impls": {} }).to_string())?;
    assert!(matches!(manifest.read(), Err(Error::LegacyCli { version }) if version == "2.1"));

    fs::write(&path, json!({ "manifestVersion": "3.2", "impls": {} }).to_string())?;
    assert!(matches!(manifest.read(), Err(Error::UnknownVersion { version }) if version == "3.2"));

    fs::write(&path, json!({ "impls": {} }).to_string())?;
    assert!(matches!(manifest.read(), Err(Error::MissingVersion)));

    fs::write(&path, "{ not json")?;
    assert!(matches!(manifest.read(), Err(Error::Json { .. })));

    Ok(())
}

#[test]
fn gives_up_when_the_lock_is_held_elsewhere() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let holder = File::create(dir.path().join("goerli.json.lock"))?;
    holder.lock_exclusive()?;

    let mut manifest = manifest_in(&dir);
    match manifest.read() {
        Err(Error::LockContention { path, attempts }) => {
            assert_eq!(path, dir.path().join("goerli.json.lock"));
            assert_eq!(attempts, 2);
        }
        other => anyhow::bail!("expected lock contention, found {other:?}"),
    }
    assert!(!manifest.is_locked());

    FileExt::unlock(&holder)?;
    assert_eq!(manifest.read()?, ManifestData::default());

    Ok(())
}

#[test]
fn finds_deployments_by_address() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut manifest = manifest_in(&dir);
    let data = sample_data()?;
    manifest.locked_run(|locked| locked.write(&data))?;

    let found = manifest.deployment_from_address("0x5fbdb2315678afecb367f032d93f642f64180aa3")?;
    assert_eq!(found.deployment.tx_hash.as_deref(), Some("0x01"));
    assert_eq!(found.layout, sample_layout()?);

    assert!(matches!(
        manifest.deployment_from_address("0x0000000000000000000000000000000000000001"),
        Err(Error::DeploymentNotFound { .. })
    ));
    assert_eq!(manifest.admin()?, data.admin);

    Ok(())
}
