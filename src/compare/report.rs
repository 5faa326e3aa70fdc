//! This module contains the human-readable reporting of comparison results.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::{
    compare::{
        compare,
        operation::{ChangeKind, EnumOperation, StorageField, StorageOperation, TypeChange},
        Config,
    },
    error::{Error, Result},
    layout::{Layout, StorageItem},
};

/// The result of comparing two layouts, explained one operation at a time by
/// its [`Display`] implementation.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StorageReport {
    ops: Vec<StorageOperation<StorageItem>>,
}

impl StorageReport {
    /// Wraps the operations found by the comparator.
    #[must_use]
    pub fn new(ops: Vec<StorageOperation<StorageItem>>) -> Self {
        Self { ops }
    }

    /// Gets the reported operations.
    #[must_use]
    pub fn ops(&self) -> &[StorageOperation<StorageItem>] {
        &self.ops
    }

    /// Checks if nothing was reported, meaning that the upgrade is safe.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Gets the number of reported operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Unwraps the report into its operations.
    #[must_use]
    pub fn into_ops(self) -> Vec<StorageOperation<StorageItem>> {
        self.ops
    }
}

impl Display for StorageReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "The storage layouts are compatible");
        }

        writeln!(f, "New storage layout is incompatible")?;
        for op in &self.ops {
            writeln!(f)?;
            explain_operation(f, op, 0)?;
        }
        Ok(())
    }
}

/// Checks that `updated` can replace `original` without any reported changes.
///
/// # Errors
///
/// Returns [`Error::UnsafeUpgrade`] with the full report if any operation is
/// reported, and any error from [`compare`].
pub fn assert_storage_upgrade_safe(
    original: &Layout,
    updated: &Layout,
    config: &Config,
) -> Result<()> {
    let report = StorageReport::new(compare(original, updated, config)?);
    if report.is_empty() {
        Ok(())
    } else {
        Err(Error::UnsafeUpgrade(report))
    }
}

fn explain_operation<F: StorageField>(
    f: &mut Formatter<'_>,
    op: &StorageOperation<F>,
    depth: usize,
) -> std::fmt::Result {
    let indent = "  ".repeat(depth);
    let location = op
        .updated()
        .or(op.original())
        .and_then(StorageField::location)
        .map(|location| format!("{location}: "))
        .unwrap_or_default();
    write!(f, "{indent}{location}")?;

    match op {
        StorageOperation::Append { updated } => writeln!(f, "Added `{}`", updated.label()),
        StorageOperation::Delete { original } => {
            writeln!(f, "Deleted `{}`", original.label())?;
            writeln!(f, "{indent}  > Keep the variable even if unused")
        }
        StorageOperation::Rename { original, updated } => {
            writeln!(f, "Renamed `{}` to `{}`", original.label(), updated.label())
        }
        StorageOperation::Replace { original, updated } => {
            writeln!(
                f,
                "Replaced `{}` with `{}` of incompatible type",
                original.label(),
                updated.label()
            )
        }
        StorageOperation::TypeChange {
            updated, change, ..
        } => {
            writeln!(f, "Upgraded `{}` to an incompatible type", updated.label())?;
            explain_change(f, change, depth + 1)
        }
    }
}

fn explain_change(f: &mut Formatter<'_>, change: &TypeChange, depth: usize) -> std::fmt::Result {
    let indent = "  ".repeat(depth);
    let TypeChange {
        original, updated, ..
    } = change;

    match &change.kind {
        ChangeKind::ObviousMismatch => {
            writeln!(f, "{indent}- Bad upgrade from {original} to {updated}")
        }
        ChangeKind::MissingMembers => {
            writeln!(f, "{indent}- Insufficient data to compare {original} and {updated}")
        }
        ChangeKind::StructMembers { ops } => {
            writeln!(f, "{indent}- Bad upgrade to the members of {updated}")?;
            ops.iter().try_for_each(|op| explain_operation(f, op, depth + 1))
        }
        ChangeKind::EnumMembers { ops } => {
            writeln!(f, "{indent}- Bad upgrade to the members of {updated}")?;
            for op in ops {
                let line = match op {
                    EnumOperation::Delete { original } => format!("Deleted `{original}`"),
                    EnumOperation::Insert { updated } => format!("Inserted `{updated}`"),
                    EnumOperation::Replace { original, updated } => {
                        format!("Replaced `{original}` with `{updated}`")
                    }
                };
                writeln!(f, "{indent}  {line}")?;
            }
            Ok(())
        }
        ChangeKind::EnumResize => writeln!(
            f,
            "{indent}- Bad upgrade from {original} to {updated}: the enum needs a different number \
             of bytes"
        ),
        ChangeKind::MappingKey => {
            writeln!(f, "{indent}- In key of {updated}: bad upgrade from {original}")
        }
        ChangeKind::MappingValue { inner } => {
            writeln!(f, "{indent}- In value of {updated}")?;
            explain_change(f, inner, depth + 1)
        }
        ChangeKind::ArrayShrink => {
            writeln!(f, "{indent}- Bad array resize from {original} to {updated}")?;
            writeln!(f, "{indent}  Size cannot decrease")
        }
        ChangeKind::ArrayGrow => {
            writeln!(f, "{indent}- Bad array resize from {original} to {updated}")?;
            writeln!(f, "{indent}  Size cannot increase when the array is not the last item")
        }
        ChangeKind::ArrayDynamic => writeln!(
            f,
            "{indent}- Bad upgrade between fixed-size and dynamic arrays from {original} to \
             {updated}"
        ),
        ChangeKind::ArrayValue { inner } => {
            writeln!(f, "{indent}- In element of {updated}")?;
            explain_change(f, inner, depth + 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        compare::{
            operation::{ChangeKind, StorageOperation, TypeChange},
            report::{assert_storage_upgrade_safe, StorageReport},
            Config,
        },
        error::Error,
        layout::{Layout, StorageItem, TypeId, TypeItem, TypeKind},
    };

    fn item(label: &str, typ: &str) -> StorageItem {
        StorageItem {
            contract:     "C".into(),
            label:        label.into(),
            typ:          TypeId::new(typ),
            slot:         0_usize.into(),
            offset:       0,
            src:          Some("file.sol:1".into()),
            renamed_from: None,
        }
    }

    #[test]
    fn explains_deletions() {
        let report = StorageReport::new(vec![StorageOperation::Delete {
            original: item("x1", "t_uint256"),
        }]);
        let text = report.to_string();
        assert!(text.contains("file.sol:1: Deleted `x1`\n  > Keep the variable even if unused"));
    }

    #[test]
    fn explains_nested_changes() {
        let map = TypeId::new("t_mapping(t_uint256,t_uint256)");
        let to_map = TypeId::new("t_mapping(t_uint256,t_string_storage)");
        let report = StorageReport::new(vec![StorageOperation::TypeChange {
            original: item("m", map.as_str()),
            updated:  item("m", to_map.as_str()),
            change:   TypeChange::new(&map, &to_map, ChangeKind::MappingValue {
                inner: Box::new(TypeChange::new(
                    &TypeId::new("t_uint256"),
                    &TypeId::new("t_string_storage"),
                    ChangeKind::ObviousMismatch,
                )),
            }),
        }]);

        let text = report.to_string();
        assert!(text.contains("file.sol:1: Upgraded `m` to an incompatible type"));
        assert!(text.contains("  - In value of t_mapping(t_uint256,t_string_storage)"));
        assert!(text.contains("    - Bad upgrade from t_uint256 to t_string_storage"));
    }

    #[test]
    fn unsafe_upgrades_carry_their_report() {
        let uint = TypeItem {
            label:           "uint256".into(),
            number_of_bytes: 32_usize.into(),
            kind:            TypeKind::Value,
        };
        let v1 = Layout {
            storage: vec![item("a", "t_uint256"), item("b", "t_uint256")],
            types:   [(TypeId::new("t_uint256"), uint)].into_iter().collect(),
        };
        let mut v2 = v1.clone();
        v2.storage.pop();

        assert!(assert_storage_upgrade_safe(&v1, &v1, &Config::default()).is_ok());
        match assert_storage_upgrade_safe(&v1, &v2, &Config::default()) {
            Err(error @ Error::UnsafeUpgrade(_)) => {
                assert_eq!(error.report().map(StorageReport::len), Some(1));
                assert!(error.to_string().starts_with("New storage layout is incompatible"));
            }
            other => panic!("expected an unsafe upgrade, found {other:?}"),
        }
    }
}
