//! Sections: contiguous regions of code or data inside a module.

use super::ObjectBlockId;

/// Index of a [`Section`] within its owning [`super::Module`]'s
/// `sections` vector — sections are module-owned, not arena-global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SectionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionType {
    Mixed,
    Code,
    Data,
    Stack,
    Common,
    Dynamic,
    TaskCommon,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionLocation {
    Cm,
    Em,
    Lm,
    None,
}

/// A region of code or data within a module.
pub struct Section {
    pub id: String,
    pub kind: SectionType,
    pub location: SectionLocation,
    /// Set once `createObjectBlocks` assigns this section a home within
    /// its block.
    pub origin_offset: u32,
    /// Grown during pass 1 as instructions/data are emitted into it.
    pub size: u32,
    /// Byte/parcel index where the next emit begins.
    pub origin_counter: u32,
    /// Where the *current* instruction started (before this emit).
    pub location_counter: u32,
    /// Bit position within the current 64-bit word, 0..=63.
    pub word_bit_pos: u32,
    /// Bit position within the current 16-bit parcel, 0..=15.
    pub parcel_bit_pos: u32,
    /// Scratch accumulator used while evaluating an expression whose
    /// base is this section.
    pub relocation_coefficient: i64,
    pub immobile_coefficient: i64,
    pub block: Option<ObjectBlockId>,
}

impl Section {
    pub fn new(id: impl Into<String>, kind: SectionType, location: SectionLocation) -> Self {
        Section {
            id: id.into(),
            kind,
            location,
            origin_offset: 0,
            size: 0,
            origin_counter: 0,
            location_counter: 0,
            word_bit_pos: 0,
            parcel_bit_pos: 0,
            relocation_coefficient: 0,
            immobile_coefficient: 0,
            block: None,
        }
    }

    /// The two sections every module is seeded with: the unnamed mixed
    /// section (index 0) and the literals section `"="` (index 1).
    pub fn seed_unnamed() -> Self {
        Section::new("", SectionType::Mixed, SectionLocation::None)
    }

    pub fn seed_literals() -> Self {
        Section::new("=", SectionType::Data, SectionLocation::None)
    }

    /// True if nothing has been emitted into this section.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Word-internal bit cursor, derived from the parcel cursor: parcel
    /// address * 16 + parcel-bit-pos, mod 64.
    pub fn word_bit_cursor(&self) -> u32 {
        ((self.origin_counter % 4) * 16 + self.parcel_bit_pos) % 64
    }
}

/// Grouping key for object-block assignment: sections sharing
/// `(id, kind, location)` share one block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockKey {
    pub id_lower: String,
    pub kind: SectionTypeKey,
    pub location: SectionLocationKey,
}

// `SectionType`/`SectionLocation` aren't `Hash`, so mirror them with
// hashable keys for the grouping map in `createObjectBlocks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionTypeKey {
    Mixed,
    Code,
    Data,
    Stack,
    Common,
    Dynamic,
    TaskCommon,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionLocationKey {
    Cm,
    Em,
    Lm,
    None,
}

impl From<SectionType> for SectionTypeKey {
    fn from(t: SectionType) -> Self {
        match t {
            SectionType::Mixed => SectionTypeKey::Mixed,
            SectionType::Code => SectionTypeKey::Code,
            SectionType::Data => SectionTypeKey::Data,
            SectionType::Stack => SectionTypeKey::Stack,
            SectionType::Common => SectionTypeKey::Common,
            SectionType::Dynamic => SectionTypeKey::Dynamic,
            SectionType::TaskCommon => SectionTypeKey::TaskCommon,
            SectionType::None => SectionTypeKey::None,
        }
    }
}

impl From<SectionLocation> for SectionLocationKey {
    fn from(l: SectionLocation) -> Self {
        match l {
            SectionLocation::Cm => SectionLocationKey::Cm,
            SectionLocation::Em => SectionLocationKey::Em,
            SectionLocation::Lm => SectionLocationKey::Lm,
            SectionLocation::None => SectionLocationKey::None,
        }
    }
}

impl BlockKey {
    pub fn for_section(section: &Section) -> Self {
        BlockKey {
            id_lower: section.id.to_lowercase(),
            kind: section.kind.into(),
            location: section.location.into(),
        }
    }
}
