//! This module contains the handling of manifest schema versions.

use std::cmp::Ordering;

use serde_json::Value;
use tracing::info;

use crate::{
    constant::{CURRENT_MANIFEST_VERSION, OLDEST_SUPPORTED_MANIFEST_VERSION},
    error::manifest::{Error, Result},
};

/// The key under which a manifest records its schema version.
const VERSION_KEY: &str = "manifestVersion";

/// A dotted numeric version such as `3.1`, where missing components are zero.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ManifestVersion {
    components: [u64; 3],
}

impl ManifestVersion {
    /// Parses `version`, returning [`None`] if it is not made up of at most
    /// three dot-separated numbers.
    #[must_use]
    pub fn parse(version: &str) -> Option<Self> {
        let mut components = [0; 3];
        let mut parts = version.split('.');
        for component in &mut components {
            match parts.next() {
                Some(part) => *component = part.parse().ok()?,
                None => break,
            }
        }

        parts.next().is_none().then_some(Self { components })
    }
}

impl PartialOrd for ManifestVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ManifestVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

/// Checks that the raw manifest `data` has a supported schema version,
/// migrating it to the current version if it is one step behind.
///
/// # Errors
///
/// Returns [`Err`] if the version is missing, predates the oldest supported
/// version, or is newer than (or otherwise different to) the current one.
pub fn validate_or_migrate(data: &mut Value) -> Result<()> {
    let version = data
        .get(VERSION_KEY)
        .and_then(Value::as_str)
        .ok_or(Error::MissingVersion)?
        .to_string();
    let unknown = || Error::UnknownVersion {
        version: version.clone(),
    };

    let parsed = ManifestVersion::parse(&version).ok_or_else(unknown)?;
    let oldest = ManifestVersion::parse(OLDEST_SUPPORTED_MANIFEST_VERSION).ok_or_else(unknown)?;
    let current = ManifestVersion::parse(CURRENT_MANIFEST_VERSION).ok_or_else(unknown)?;

    if parsed < oldest {
        Err(Error::LegacyCli { version })
    } else if parsed < current {
        migrate(data)
    } else if version == CURRENT_MANIFEST_VERSION {
        Ok(())
    } else {
        Err(Error::UnknownVersion { version })
    }
}

/// Migrates the raw manifest `data` to the current schema version.
///
/// Only the previous version can be migrated, which differs from the current
/// one in nothing but its version number.
///
/// # Errors
///
/// Returns [`Err`] if `data` is of any version other than the previous one.
pub fn migrate(data: &mut Value) -> Result<()> {
    let version = data.get(VERSION_KEY).and_then(Value::as_str).map(ToString::to_string);
    match (version.as_deref(), data.as_object_mut()) {
        (Some(OLDEST_SUPPORTED_MANIFEST_VERSION), Some(object)) => {
            object.insert(VERSION_KEY.into(), CURRENT_MANIFEST_VERSION.into());
            info!(
                from = OLDEST_SUPPORTED_MANIFEST_VERSION,
                to = CURRENT_MANIFEST_VERSION,
                "Migrated manifest"
            );
            Ok(())
        }
        (Some(version), _) => Err(Error::MigrationUnavailable {
            version: version.to_string(),
        }),
        (None, _) => Err(Error::MissingVersion),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{
        error::manifest::Error,
        manifest::version::{migrate, validate_or_migrate, ManifestVersion},
    };

    #[test]
    fn orders_versions_numerically() {
        let parse = |v| ManifestVersion::parse(v);
        assert!(parse("3.10") > parse("3.9"));
        assert!(parse("2.2") < parse("3.0"));
        assert_eq!(parse("3"), parse("3.0.0"));
        assert_eq!(parse("3.x"), None);
        assert_eq!(parse("1.2.3.4"), None);
    }

    #[test]
    fn accepts_the_current_version() -> anyhow::Result<()> {
        let mut data = json!({ "manifestVersion": "3.1", "impls": {} });
        validate_or_migrate(&mut data)?;
        assert_eq!(data["manifestVersion"], "3.1");

        Ok(())
    }

    #[test]
    fn migrates_the_previous_version() -> anyhow::Result<()> {
        let mut data = json!({ "manifestVersion": "3.0", "impls": {} });
        validate_or_migrate(&mut data)?;
        assert_eq!(data["manifestVersion"], "3.1");

        Ok(())
    }

    #[test]
    fn rejects_unsupported_versions() {
        let check = |data| validate_or_migrate(&mut { data }).unwrap_err();

        assert!(matches!(check(json!({ "impls": {} })), Error::MissingVersion));
        assert!(matches!(check(json!({ "manifestVersion": 3.1 })), Error::MissingVersion));
        assert!(matches!(
            check(json!({ "manifestVersion": "2.2" })),
            Error::LegacyCli { version } if version == "2.2"
        ));
        assert!(matches!(
            check(json!({ "manifestVersion": "3.2" })),
            Error::UnknownVersion { version } if version == "3.2"
        ));
        assert!(matches!(
            check(json!({ "manifestVersion": "3.0.5" })),
            Error::MigrationUnavailable { .. }
        ));
    }

    #[test]
    fn migration_only_handles_the_previous_version() {
        let mut data = json!({ "manifestVersion": "2.0" });
        assert!(matches!(migrate(&mut data), Err(Error::MigrationUnavailable { .. })));
    }
}
