//! Code emission: packs arbitrary-width bitfields into a module's
//! object blocks at the current section cursor, tracking the section's
//! size and the block's written parcel extent as it goes.

pub mod float;

use crate::symtab::{ObjectBlock, Section};
use crate::util::ceil_to;

/// Emit the low `width` bits of `value`, most-significant bit first, at
/// the section's current bit cursor, then advance the cursor by
/// `width` bits. `block` must be the object block the section's
/// `origin_offset` is relative to.
pub fn emit_field(section: &mut Section, block: &mut ObjectBlock, value: u64, width: u32) {
    let abs_bit_start =
        (section.origin_offset as u64 + section.origin_counter as u64) * 16 + section.parcel_bit_pos as u64;
    write_bits(block, abs_bit_start, value, width);
    advance(section, width);
    let first_parcel = (abs_bit_start / 16) as u32;
    let last_parcel = ((abs_bit_start + width as u64 - 1).max(abs_bit_start) / 16) as u32;
    for p in first_parcel..=last_parcel {
        block.note_parcel_written(p);
    }
}

/// Pad the cursor forward to the next parcel boundary, emitting zero
/// bits, and return how many bits were skipped.
pub fn align_to_parcel(section: &mut Section, block: &mut ObjectBlock) -> u32 {
    if section.parcel_bit_pos == 0 {
        return 0;
    }
    let pad = 16 - section.parcel_bit_pos;
    emit_field(section, block, 0, pad);
    pad
}

/// Pad forward to the next word (4-parcel) boundary.
pub fn align_to_word(section: &mut Section, block: &mut ObjectBlock) {
    align_to_parcel(section, block);
    while section.origin_counter % 4 != 0 {
        emit_field(section, block, 0, 16);
    }
}

/// Emit a run of bytes (e.g. a string literal's character data),
/// parcel-aligning first.
pub fn emit_bytes(section: &mut Section, block: &mut ObjectBlock, bytes: &[u8]) {
    align_to_parcel(section, block);
    for chunk in bytes.chunks(2) {
        let value = if chunk.len() == 2 {
            ((chunk[0] as u64) << 8) | chunk[1] as u64
        } else {
            (chunk[0] as u64) << 8
        };
        emit_field(section, block, value, 16);
    }
}

/// Write `value`/`width` into `block` at the absolute bit position
/// implied by `origin_offset` (the section's post-assignment block
/// offset, in parcels) and `local_bit_start` (the bit position within
/// the section, captured during pass 1 before block offsets exist).
/// Used to replay the data recorded by pseudo-instruction handlers once
/// `create_object_blocks` has given every section a home.
pub fn emit_field_at(block: &mut ObjectBlock, origin_offset_parcels: u32, local_bit_start: u64, value: u64, width: u32) {
    let abs_bit_start = origin_offset_parcels as u64 * 16 + local_bit_start;
    write_bits(block, abs_bit_start, value, width);
    let first_parcel = (abs_bit_start / 16) as u32;
    let last_parcel = ((abs_bit_start + width as u64 - 1).max(abs_bit_start) / 16) as u32;
    for p in first_parcel..=last_parcel {
        block.note_parcel_written(p);
    }
}

/// Advance `section`'s emit cursor (and grow its size) by `width` bits
/// without writing into a block image yet. Pass 1 calls this through
/// the pseudo-instruction handlers to size sections before any
/// `ObjectBlock` exists; the bit position it returns is recorded so the
/// matching data can be written into the block once one does.
pub fn reserve_bits(section: &mut Section, width: u32) -> u64 {
    let start = section.origin_counter as u64 * 16 + section.parcel_bit_pos as u64;
    advance(section, width);
    start
}

fn advance(section: &mut Section, width: u32) {
    let total = section.parcel_bit_pos + width;
    section.origin_counter += total / 16;
    section.parcel_bit_pos = total % 16;
    section.word_bit_pos = section.word_bit_cursor();
    let occupied_parcels = ceil_to(section.origin_counter * 16 + section.parcel_bit_pos, 16) / 16;
    section.size = section.size.max(occupied_parcels);
}

fn write_bits(block: &mut ObjectBlock, abs_bit_start: u64, value: u64, width: u32) {
    for i in 0..width {
        let bit_index = abs_bit_start + i as u64;
        let byte_idx = (bit_index / 8) as usize;
        let bit_in_byte = 7 - (bit_index % 8) as u32;
        let bit_value = (value >> (width - 1 - i)) & 1;
        let mut byte = block.read_byte_at(byte_idx);
        if bit_value == 1 {
            byte |= 1 << bit_in_byte;
        } else {
            byte &= !(1 << bit_in_byte);
        }
        block.write_byte_at(byte_idx, byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symtab::{SectionLocation, SectionType};

    fn fresh() -> (Section, ObjectBlock) {
        let section = Section::new("CODE", SectionType::Code, SectionLocation::Cm);
        let block = ObjectBlock::new(
            "CODE",
            0,
            crate::symtab::SectionTypeKey::Code,
            crate::symtab::SectionLocationKey::Cm,
        );
        (section, block)
    }

    #[test]
    fn emitting_one_parcel_advances_size_by_one() {
        let (mut section, mut block) = fresh();
        emit_field(&mut section, &mut block, 0o177777, 16);
        assert_eq!(section.size, 1);
        assert_eq!(section.origin_counter, 1);
        assert_eq!(section.parcel_bit_pos, 0);
        assert_eq!(block.image()[0], 0xFF);
        assert_eq!(block.image()[1], 0xFF);
    }

    #[test]
    fn sub_parcel_field_packs_msb_first() {
        let (mut section, mut block) = fresh();
        emit_field(&mut section, &mut block, 0b101, 3);
        emit_field(&mut section, &mut block, 0, 13);
        assert_eq!(block.image()[0], 0b1010_0000);
    }

    #[test]
    fn align_to_word_rounds_up_to_four_parcels() {
        let (mut section, mut block) = fresh();
        emit_field(&mut section, &mut block, 0, 16);
        align_to_word(&mut section, &mut block);
        assert_eq!(section.origin_counter, 4);
    }

    #[test]
    fn emit_bytes_packs_two_chars_per_parcel() {
        let (mut section, mut block) = fresh();
        emit_bytes(&mut section, &mut block, b"AB");
        assert_eq!(block.image()[0], b'A');
        assert_eq!(block.image()[1], b'B');
        assert_eq!(section.origin_counter, 1);
    }
}
