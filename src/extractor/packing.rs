//! This module contains the rules by which the compiler assigns storage
//! locations to values.
//!
//! Values narrower than a slot are packed together, in declaration order,
//! into the low-order bytes first. Structs, arrays, mappings and dynamic
//! `string`/`bytes` always begin a fresh slot, and whatever follows them also
//! begins a fresh slot.

use ethnum::U256;

use crate::constant::{
    ADDRESS_WIDTH_BYTES,
    BOOL_WIDTH_BYTES,
    BYTE_SIZE_BITS,
    EXTERNAL_FUNCTION_WIDTH_BYTES,
    INTERNAL_FUNCTION_WIDTH_BYTES,
    WORD_SIZE_BYTES,
};

/// The amount of storage that a value of a given type occupies in place.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Footprint {
    /// The number of bytes occupied.
    pub bytes: U256,

    /// Whether the value must start (and be followed by) a fresh slot.
    pub own_slot: bool,
}

impl Footprint {
    /// A value of `bytes` bytes that may share a slot with its neighbours.
    #[must_use]
    pub fn packed(bytes: usize) -> Self {
        Self {
            bytes:    U256::from(bytes as u128),
            own_slot: false,
        }
    }

    /// A value occupying `slots` whole slots.
    ///
    /// Returns [`None`] if the number of bytes does not fit in a [`U256`].
    #[must_use]
    pub fn slots(slots: U256) -> Option<Self> {
        let bytes = slots.checked_mul(word())?;
        Some(Self {
            bytes,
            own_slot: true,
        })
    }

    /// A value occupying a single slot of its own, such as a mapping.
    #[must_use]
    pub fn word() -> Self {
        Self {
            bytes:    word(),
            own_slot: true,
        }
    }

    /// Gets the number of slots that the value touches.
    #[must_use]
    pub fn slot_count(&self) -> U256 {
        div_ceil(self.bytes, word())
    }
}

/// Computes the footprint of an elementary value type from its canonical
/// type id.
///
/// Returns [`None`] if `id` does not name an elementary type.
#[must_use]
pub fn value_footprint(id: &str) -> Option<Footprint> {
    let width = match id {
        "t_bool" => BOOL_WIDTH_BYTES,
        "t_address" | "t_address_payable" => ADDRESS_WIDTH_BYTES,
        _ if id.starts_with("t_string") || id.starts_with("t_bytes_") => {
            return Some(Footprint::word());
        }
        _ if id.starts_with("t_function_internal") => INTERNAL_FUNCTION_WIDTH_BYTES,
        _ if id.starts_with("t_function_external") => EXTERNAL_FUNCTION_WIDTH_BYTES,
        _ => {
            if let Some(bits) = id.strip_prefix("t_uint").or_else(|| id.strip_prefix("t_int")) {
                bits.parse::<usize>().ok()? / BYTE_SIZE_BITS
            } else if let Some(bytes) = id.strip_prefix("t_bytes") {
                bytes.parse::<usize>().ok()?
            } else if let Some(suffix) =
                id.strip_prefix("t_ufixed").or_else(|| id.strip_prefix("t_fixed"))
            {
                let (bits, _) = suffix.split_once('x')?;
                bits.parse::<usize>().ok()? / BYTE_SIZE_BITS
            } else {
                return None;
            }
        }
    };

    (1..=WORD_SIZE_BYTES)
        .contains(&width)
        .then(|| Footprint::packed(width))
}

/// Computes the footprint of a struct whose members have the provided
/// footprints, in declaration order.
///
/// Returns [`None`] on overflow.
pub fn struct_footprint(members: impl IntoIterator<Item = Footprint>) -> Option<Footprint> {
    let mut allocator = SlotAllocator::new();
    for member in members {
        allocator.place(member)?;
    }
    Footprint::slots(allocator.slots_used()?)
}

/// Computes the footprint of a fixed-size array of `length` elements, each
/// with the `element` footprint.
///
/// Elements that fit in a slot are packed as many to a slot as will fit,
/// without straddling slot boundaries. Returns [`None`] on overflow.
#[must_use]
pub fn fixed_array_footprint(element: Footprint, length: U256) -> Option<Footprint> {
    let slots = if element.own_slot {
        length.checked_mul(element.slot_count())?
    } else {
        let per_slot = word() / element.bytes;
        div_ceil(length, per_slot)
    };
    Footprint::slots(slots)
}

/// The running state of a sequential storage assignment.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SlotAllocator {
    /// The slot into which the next value will be placed if it fits.
    slot: U256,

    /// The number of bytes of `slot` that have been used.
    offset: usize,
}

impl SlotAllocator {
    /// Creates an allocator starting at slot zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next location to a value with the provided `footprint`,
    /// returning its slot and byte offset.
    ///
    /// Returns [`None`] if the value would extend past the last slot.
    pub fn place(&mut self, footprint: Footprint) -> Option<(U256, usize)> {
        let crosses_slot = footprint.bytes > U256::from((WORD_SIZE_BYTES - self.offset) as u128);
        if self.offset > 0 && (footprint.own_slot || crosses_slot) {
            self.slot = self.slot.checked_add(U256::ONE)?;
            self.offset = 0;
        }

        let position = (self.slot, self.offset);
        if footprint.own_slot {
            self.slot = self.slot.checked_add(footprint.slot_count())?;
        } else {
            // Packed values never exceed a slot, so this cannot truncate.
            self.offset += footprint.bytes.as_usize();
        }

        Some(position)
    }

    /// Gets the number of slots touched so far.
    ///
    /// Returns [`None`] if this count does not fit in a [`U256`].
    #[must_use]
    pub fn slots_used(&self) -> Option<U256> {
        if self.offset > 0 {
            self.slot.checked_add(U256::ONE)
        } else {
            Some(self.slot)
        }
    }
}

fn word() -> U256 {
    U256::from(WORD_SIZE_BYTES as u128)
}

fn div_ceil(numerator: U256, denominator: U256) -> U256 {
    let quotient = numerator / denominator;
    if numerator % denominator == U256::ZERO {
        quotient
    } else {
        quotient + U256::ONE
    }
}
