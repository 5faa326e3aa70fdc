//! This module contains the handling of compiler type identifiers.
//!
//! The compiler describes every type with an identifier string such as
//! `t_mapping$_t_uint256_$_t_struct$_Data_$42_storage_$`. Such identifiers
//! are awkward in two ways:
//!
//! - The brackets and commas of the type's structure are encoded (`(` as `$_`,
//!   `,` as `_$_` and `)` as `_$`), and the encoding is not prefix-free.
//! - User-defined types carry their declaration's node id (the `42` above),
//!   which changes whenever unrelated code is added to the compilation.
//!
//! [`stabilize_type_identifier`] removes both problems, producing the
//! canonical ids that [`crate::layout::Layout`]s are keyed by.

use ethnum::U256;

use crate::{ast::NodeId, layout::ArrayLength};

/// The type constructors whose identifiers embed a declaration's node id.
const USER_DEFINED_HEADS: [&str; 4] = [
    "t_struct(",
    "t_enum(",
    "t_contract(",
    "t_userDefinedValueType(",
];

/// The encoded forms of the structural characters, in matching priority.
const ENCODED_TOKENS: [(&[u8], u8); 3] = [(b"$_", b'('), (b"_$_", b','), (b"_$", b')')];

/// Decodes the bracket and comma encoding used by the compiler.
///
/// An encoded token is only decoded when it is followed by a (possibly empty)
/// run of further tokens and then by a character that is neither `_` nor `$`,
/// or by the end of the identifier. This is what disambiguates struct names
/// that themselves contain underscores.
#[must_use]
pub fn decode_type_identifier(type_identifier: &str) -> String {
    let bytes = type_identifier.as_bytes();
    let len = bytes.len();

    // `valid[i]` records whether a token ending at `i` is followed by a valid
    // continuation.
    let mut valid = vec![false; len + 1];
    valid[len] = true;
    for i in (0..len).rev() {
        valid[i] = !matches!(bytes[i], b'_' | b'$')
            || ENCODED_TOKENS.iter().any(|(token, _)| {
                bytes[i..].starts_with(token) && valid[i + token.len()]
            });
    }

    let mut decoded = Vec::with_capacity(len);
    let mut i = 0;
    while i < len {
        let token = ENCODED_TOKENS
            .iter()
            .find(|(token, _)| bytes[i..].starts_with(token) && valid[i + token.len()]);
        match token {
            Some((token, replacement)) => {
                decoded.push(*replacement);
                i += token.len();
            }
            None => {
                decoded.push(bytes[i]);
                i += 1;
            }
        }
    }

    // Only ASCII bytes are ever replaced, so the result remains valid UTF-8.
    String::from_utf8(decoded).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into())
}

/// Decodes `type_identifier` and unifies the storage pointer suffix.
///
/// The `_ptr` suffix of storage references appears in some AST positions but
/// not others, so it is removed to give one id per type.
#[must_use]
pub fn normalize_type_identifier(type_identifier: &str) -> String {
    decode_type_identifier(type_identifier).replace("_storage_ptr", "_storage")
}

/// Converts a raw compiler type identifier into a canonical one that does not
/// depend on the node ids of the compilation.
///
/// The node id that follows the name of each user-defined type is dropped,
/// along with the `_` that separates it from a storage location suffix. The
/// rest of the identifier is left as it is. For example
/// `t_struct$_Struct1_$12_storage` becomes `t_struct(Struct1)storage`, and
/// `t_enum$_Enum1_$4` becomes `t_enum(Enum1)`.
#[must_use]
pub fn stabilize_type_identifier(type_identifier: &str) -> String {
    stabilize_type_identifier_with(type_identifier, |_| None)
}

/// Converts a raw compiler type identifier into a canonical one, as
/// [`stabilize_type_identifier`] does, but lets `qualify` choose the name of
/// each user-defined type.
///
/// `qualify` is called with the node id of every user-defined type in the
/// identifier. Where it returns a name, that name replaces the declared one,
/// so that `t_struct$_Data_$12_storage` may become
/// `t_struct(LibA.Data)storage`.
#[must_use]
pub fn stabilize_type_identifier_with(
    type_identifier: &str,
    qualify: impl Fn(NodeId) -> Option<String>,
) -> String {
    let normalized = normalize_type_identifier(type_identifier);
    let mut stabilized = String::with_capacity(normalized.len());
    let mut rest = normalized.as_str();

    while let Some((start, head)) = USER_DEFINED_HEADS
        .iter()
        .filter_map(|head| rest.find(head).map(|i| (i, *head)))
        .min_by_key(|(i, _)| *i)
    {
        let name_start = start + head.len();
        let Some(name_len) = rest[name_start..].find(')') else {
            break;
        };
        let name_end = name_start + name_len;

        let after = &rest[name_end + 1..];
        let digits = after.len() - after.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        let node = after[..digits].parse::<NodeId>().ok();

        stabilized.push_str(&rest[..name_start]);
        match node.and_then(&qualify) {
            Some(name) => stabilized.push_str(&name),
            None => stabilized.push_str(&rest[name_start..name_end]),
        }
        stabilized.push(')');

        let mut skip = digits;
        if digits > 0 && after[digits..].starts_with('_') {
            skip += 1;
        }
        rest = &after[skip..];
    }

    stabilized.push_str(rest);
    stabilized
}

/// Gets the length of the array whose decoded identifier is `type_id`.
///
/// The length (or the `dyn` marker) follows the closing bracket of the
/// element type, as in `t_array(t_uint256)3_storage`. Returns [`None`] if
/// `type_id` is not an array identifier.
#[must_use]
pub fn array_length(type_id: &str) -> Option<ArrayLength> {
    let args = type_id.strip_prefix("t_array(")?;
    let mut depth = 1_usize;
    let close = args.char_indices().find_map(|(i, c)| {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => (),
        }
        (depth == 0).then_some(i)
    })?;

    let tail = &args[close + 1..];
    if tail.starts_with("dyn") {
        return Some(ArrayLength::Dynamic);
    }

    let digits_len = tail.len() - tail.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let length = U256::from_str_radix(&tail[..digits_len], 10).ok()?;
    Some(ArrayLength::Fixed(length.into()))
}
