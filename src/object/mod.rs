//! Object writer: serializes a finished module's PDT, TXT, BRT, and XRT
//! tables as four logical records framed by the COS dataset layer.

pub mod cos;

use std::io;

use fnv::FnvHasher;
use std::hash::Hasher;

use crate::pod::Pod;
use crate::symtab::{Module, ObjectBlock, SectionLocationKey, SymbolId};
use crate::util::{ceil_to, WritableBuffer};
use crate::value::Attr;
use cos::DatasetWriter;

unsafe impl Pod for BeWord {}

/// A single big-endian 64-bit object-record word. A thin wrapper so
/// `write_pod` can cast it to bytes without reaching for a bare `u64`
/// everywhere and forgetting the byte-swap.
#[derive(Clone, Copy)]
#[repr(transparent)]
struct BeWord(u64);

impl BeWord {
    fn new(v: u64) -> Self {
        BeWord(v.to_be())
    }
}

fn push_word(buf: &mut Vec<u8>, value: u64) {
    buf.write_pod(&BeWord::new(value));
}

/// Left-justify `name` into an 8-byte field. Names over 8 characters
/// keep a 4-character prefix and replace the rest with an FNV-64 hash
/// of the full name, so two long names that share a prefix still don't
/// collide in the fixed-width field.
fn encode_name(name: &str) -> [u8; 8] {
    let mut out = [b' '; 8];
    let bytes = name.as_bytes();
    if bytes.len() <= 8 {
        out[..bytes.len()].copy_from_slice(bytes);
        return out;
    }
    out[..4].copy_from_slice(&bytes[..4]);
    let mut hasher = FnvHasher::default();
    hasher.write(bytes);
    let hash = hasher.finish();
    let hex = format!("{:04X}", (hash & 0xFFFF) as u16);
    out[4..8].copy_from_slice(hex.as_bytes());
    out
}

const PDT_TABLE_TYPE: u64 = 0xE;
const TXT_TABLE_TYPE: u64 = 0x3;
const BRT_TABLE_TYPE: u64 = 0x6;
const XRT_TABLE_TYPE: u64 = 0x5;

/// Write `module`'s tables as COS logical records, in PDT, TXT (one per
/// block), BRT (one per block), XRT order. A module with no external
/// fixups at all writes no XRT record.
pub fn write_module<W: io::Write>(module: &Module, out: &mut DatasetWriter<W>) -> io::Result<()> {
    out.write_bytes(&build_pdt(module));
    out.end_record()?;

    for block in &module.object_blocks {
        out.write_bytes(&build_txt(block));
        out.end_record()?;
        out.write_bytes(&build_brt(block));
        out.end_record()?;
    }

    if module.object_blocks.iter().any(|b| !b.externals.is_empty()) {
        out.write_bytes(&build_xrt(module));
        out.end_record()?;
    }
    Ok(())
}

/// Program Definition Table. One per module: a bit-packed header word,
/// a fixed 20-word header entry, a 3-word machine-characteristics
/// entry, a 2-word program entry, one common-block entry per non-mixed
/// block, one 3-word entry per entry point, one 1-word entry per
/// external, and an 11-word-plus-comment trailer.
fn build_pdt(module: &Module) -> Vec<u8> {
    let mut body = Vec::new();

    body.write_bytes(&fixed_header_words(module));
    body.write_bytes(&machine_characteristics_words());
    body.write_bytes(&program_entry_words(module));

    let program_block = module.section(crate::symtab::UNNAMED_SECTION).block;
    for block in &module.object_blocks {
        if Some(crate::symtab::ObjectBlockId(block.index)) == program_block {
            continue;
        }
        body.write_bytes(&common_block_entry_words(block));
    }

    let mut entry_count = 0u64;
    for (i, id) in module.entry_points().enumerate() {
        body.write_bytes(&entry_entry_words(module, id, i == 0));
        entry_count += 1;
    }

    for id in module.externals() {
        body.write_bytes(&encode_name(&module.symbol(id).name));
    }

    body.write_bytes(&trailer_words(module));

    let total_length_words = 1 + (body.len() / 8) as u64;
    let header = (PDT_TABLE_TYPE << 60)
        | (total_length_words << 36)
        | ((module.external_count() as u64) << 22)
        | ((entry_count * 3) << 8)
        | ((module.object_blocks.len() as u64) * 2);

    let mut buf = Vec::with_capacity(8 + body.len());
    push_word(&mut buf, header);
    buf.extend_from_slice(&body);
    buf
}

/// The fixed 20-word header entry that opens every PDT body: a constant
/// machine-type/calling-sequence word, reserved zero words, and the
/// module-HLM (the total word extent of every block, plus an octal 0200
/// flag bit for a relocatable module) in word 14.
fn fixed_header_words(module: &Module) -> [u8; 20 * 8] {
    let mut words = [0u64; 20];
    words[0] = 0x0980000000000000;

    let mut hlm: u64 = module
        .object_blocks
        .iter()
        .map(|b| (ceil_to(b.highest_parcel + 4, 4) / 4) as u64)
        .sum();
    if !module.absolute {
        hlm += 0o200;
    }
    words[14] = hlm;

    let mut buf = [0u8; 20 * 8];
    for (i, w) in words.iter().enumerate() {
        buf[i * 8..i * 8 + 8].copy_from_slice(&w.to_be_bytes());
    }
    buf
}

/// Machine-characteristics entry: a length field, the target machine
/// name, and a flags word.
fn machine_characteristics_words() -> Vec<u8> {
    let mut buf = Vec::new();
    push_word(&mut buf, 3);
    buf.write_bytes(b"CRAY-XMP");
    push_word(&mut buf, 0);
    buf
}

/// Program entry: the module name (blank if the module has no mixed
/// block), then a flags-and-extent word (absolute bit, origin, and
/// program size in words).
fn program_entry_words(module: &Module) -> Vec<u8> {
    let mut buf = Vec::new();
    let program_block = module
        .section(crate::symtab::UNNAMED_SECTION)
        .block
        .map(|id| &module.object_blocks[id.0 as usize]);

    let name = if program_block.is_some() { module.name.as_str() } else { "" };
    buf.write_bytes(&encode_name(name));

    let size_words = program_block.map(|b| (b.offset / 4) as u64).unwrap_or(0);
    let mut word = size_words & 0xFFFFFF;
    if module.absolute {
        word |= 1 << 63;
        let origin = program_block.map(|b| b.offset as u64).unwrap_or(0);
        word |= (origin & 0xFFFFFF) << 24;
    }
    push_word(&mut buf, word);
    buf
}

/// Common-block entry for one non-mixed object block: its name, and a
/// word holding the EM-location flag and the block's size in words
/// (its parcel extent rounded out to whole words at both ends).
fn common_block_entry_words(block: &ObjectBlock) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.write_bytes(&encode_name(&block.id));

    let size_words = if block.highest_parcel == 0 {
        0
    } else {
        let lowest = block.lowest_parcel & !3;
        let highest = (block.highest_parcel + 4) & !3;
        (highest - lowest) / 4
    };
    let mut word = size_words as u64;
    if block.location == SectionLocationKey::Em {
        word |= 2u64 << 48;
    }
    push_word(&mut buf, word);
    buf
}

/// Entry-point entry: name, a flags word (parcel-relocation bit, owning
/// block index, primary-entry bit), and the entry's value.
fn entry_entry_words(module: &Module, id: SymbolId, primary: bool) -> Vec<u8> {
    let mut buf = Vec::new();
    let symbol = module.symbol(id);
    buf.write_bytes(&encode_name(&symbol.name));

    let block_index = symbol
        .value
        .section
        .and_then(|section| module.section(section).block)
        .map(|b| b.0 as u64)
        .unwrap_or(0);
    let mut flags = block_index << 1;
    if symbol.value.attrs.contains(Attr::PARCEL_ADDRESS) {
        flags |= 1;
    }
    if primary {
        flags |= 0x100;
    }
    push_word(&mut buf, flags);
    push_word(&mut buf, symbol.value.i64_value() as u64);
    buf
}

/// Fixed trailer: 11 reserved/identification words followed by the
/// module comment, packed 8 bytes per word and blank-padded.
fn trailer_words(module: &Module) -> Vec<u8> {
    let mut buf = Vec::new();
    for _ in 0..11 {
        push_word(&mut buf, 0);
    }
    buf.write_bytes(&pack_comment(&module.comment));
    buf
}

fn pack_comment(comment: &str) -> Vec<u8> {
    let bytes = comment.as_bytes();
    let word_count = ceil_to(bytes.len() as u32, 8) as usize / 8;
    let mut buf = vec![b' '; word_count * 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    buf
}

/// Text table for one block: a header word (table-type, parcel-count
/// field, load address) followed by the block's written parcel range.
/// A block nothing was ever written into emits a length-1 header only.
fn build_txt(block: &ObjectBlock) -> Vec<u8> {
    let mut buf = Vec::new();
    if block.highest_parcel == 0 {
        push_word(&mut buf, (TXT_TABLE_TYPE << 60) | (1 << 36));
        return buf;
    }

    let lowest = block.lowest_parcel & !3;
    let highest = (block.highest_parcel + 4) & !3;
    let parcel_count = (highest - lowest) as u64;
    let load_address = (lowest / 2) as u64;
    let header = (TXT_TABLE_TYPE << 60) | ((parcel_count / 2 + 1) << 36) | load_address;
    push_word(&mut buf, header);

    let image = block.image();
    let start = lowest as usize * 2;
    let end = (highest as usize * 2).min(image.len());
    buf.write_bytes(&image[start..end]);
    buf
}

/// Block Relocation Table for one block: a header word, then the
/// block's own relocation entries packed two per word as 32-bit fields
/// (target block index, parcel-relocation bit, offset). An odd count
/// pads the second half of the final word with all-ones.
fn build_brt(block: &ObjectBlock) -> Vec<u8> {
    let entries = block.relocations.len() as u64;
    let header = (BRT_TABLE_TYPE << 60) | (((entries + 1) / 2 + 1) << 36) | ((block.index as u64) << 25);

    let mut buf = Vec::new();
    push_word(&mut buf, header);

    let mut packed: Vec<u32> = block
        .relocations
        .iter()
        .map(|reloc| {
            let mut field = (reloc.target_block.0 & 0x7F) << 25;
            if reloc.parcel_relocation {
                field |= 1 << 24;
            }
            field | (reloc.offset & 0xFFFFFF)
        })
        .collect();
    if packed.len() % 2 != 0 {
        packed.push(0xffffffff);
    }
    for pair in packed.chunks(2) {
        let word = ((pair[0] as u64) << 32) | pair[1] as u64;
        push_word(&mut buf, word);
    }
    buf
}

/// External Reference Table for the whole module: a header word, then
/// one 64-bit entry per external fixup across every block (owning block
/// index, parcel-relocation bit, external index, field length, bit
/// address).
fn build_xrt(module: &Module) -> Vec<u8> {
    let entries: u64 = module.object_blocks.iter().map(|b| b.externals.len() as u64).sum();
    let header = (XRT_TABLE_TYPE << 60) | ((entries + 1) << 36);

    let mut buf = Vec::new();
    push_word(&mut buf, header);

    for block in &module.object_blocks {
        for ext in &block.externals {
            let mut word = (block.index as u64 & 0x1FFF) << 51;
            if ext.parcel_relocation {
                word |= 1 << 50;
            }
            word |= (ext.external_index as u64 & 0x3FFF) << 36;
            word |= (ext.field_length as u64 & 0x3F) << 30;
            word |= ext.bit_address as u64 & 0x3FFFFFFF;
            push_word(&mut buf, word);
        }
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symtab::{create_object_blocks, SectionLocation, SectionType, SectionTypeKey};

    #[test]
    fn short_name_is_blank_padded() {
        let enc = encode_name("FOO");
        assert_eq!(&enc, b"FOO     ");
    }

    #[test]
    fn long_name_keeps_prefix_and_hashes_the_rest() {
        let enc = encode_name("VERYLONGMODULENAME");
        assert_eq!(&enc[..4], b"VERY");
        assert_ne!(&enc[4..8], b"    ");
    }

    #[test]
    fn pdt_header_word_carries_the_table_type_code() {
        let module = Module::new("TEST");
        let pdt = build_pdt(&module);
        let header = u64::from_be_bytes(pdt[..8].try_into().unwrap());
        assert_eq!(header >> 60, PDT_TABLE_TYPE);
    }

    #[test]
    fn txt_header_encodes_parcel_count_and_load_address() {
        let mut module = Module::new("TEST");
        let sect = module.add_section("CODE", SectionType::Code, SectionLocation::Cm);
        module.section_mut(sect).size = 13 * 4; // 13 words worth of parcels
        create_object_blocks(&mut module);
        let block = &mut module.object_blocks[0];
        block.note_parcel_written(0);
        block.note_parcel_written(51); // 13 words = 52 parcels, last index 51
        block.write_byte_at(111, 0); // grow the image to cover the rounded-up range

        let txt = build_txt(block);
        let header = u64::from_be_bytes(txt[..8].try_into().unwrap());
        assert_eq!(header >> 60, TXT_TABLE_TYPE);
        // highest_parcel=52, (52+4)&~3=56 parcels -> parcel_count/2 + 1 = 29.
        assert_eq!((header >> 36) & 0xFFFFFF, 29);
        assert_eq!(txt.len(), 8 + 56 * 2);
    }

    #[test]
    fn txt_header_only_for_untouched_block() {
        let mut module = Module::new("TEST");
        let sect = module.add_section("BSS", SectionType::Data, SectionLocation::Cm);
        module.section_mut(sect).size = 4;
        create_object_blocks(&mut module);
        let block = &module.object_blocks[0];

        let txt = build_txt(block);
        assert_eq!(txt.len(), 8);
    }

    #[test]
    fn brt_pads_odd_entry_count_with_all_ones() {
        let block = ObjectBlock::new("CODE", 0, SectionTypeKey::Code, SectionLocationKey::Cm);
        let brt = build_brt(&block);
        let header = u64::from_be_bytes(brt[..8].try_into().unwrap());
        assert_eq!(header >> 60, BRT_TABLE_TYPE);
        assert_eq!(brt.len(), 8);
    }

    #[test]
    fn xrt_entry_packs_block_index_and_external_index() {
        let mut module = Module::new("TEST");
        let sect = module.add_section("CODE", SectionType::Code, SectionLocation::Cm);
        module.section_mut(sect).size = 4;
        create_object_blocks(&mut module);
        let block_id = module.section(sect).block.unwrap();
        module.object_blocks[block_id.0 as usize].add_external(crate::symtab::ExternalEntry {
            external_index: 3,
            bit_address: 10,
            field_length: 24,
            parcel_relocation: false,
        });

        let xrt = build_xrt(&module);
        let header = u64::from_be_bytes(xrt[..8].try_into().unwrap());
        assert_eq!(header >> 60, XRT_TABLE_TYPE);
        assert_eq!((header >> 36) & 0xFFFFFF, 2);

        let entry = u64::from_be_bytes(xrt[8..16].try_into().unwrap());
        assert_eq!((entry >> 36) & 0x3FFF, 3);
        assert_eq!((entry >> 30) & 0x3F, 24);
        assert_eq!(entry & 0x3FFFFFFF, 10);
    }

    #[test]
    fn write_module_emits_block_padded_records() {
        let mut module = Module::new("TEST");
        let sect = module.add_section("CODE", SectionType::Code, SectionLocation::Cm);
        module.section_mut(sect).size = 4;
        create_object_blocks(&mut module);

        let mut writer = DatasetWriter::new(Vec::new());
        write_module(&module, &mut writer).unwrap();
        let out = writer.into_inner();
        // PDT + one TXT/BRT pair, each padded to at least one 4096-byte block.
        assert_eq!(out.len() % cos::BYTES_PER_BLOCK, 0);
        assert!(out.len() >= cos::BYTES_PER_BLOCK * 3);
    }
}
