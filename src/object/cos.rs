//! COS dataset framing: relocatable object output is a sequence of
//! 512-word (4096-byte) physical blocks, each carrying a control word
//! that marks ordinary data, end-of-record (EOR), or end-of-file (EOF).
//! End-of-data (EOD) is two consecutive EOF control words.

use std::io;

use crate::util::WritableBuffer;

pub const WORDS_PER_BLOCK: usize = 512;
pub const BYTES_PER_BLOCK: usize = WORDS_PER_BLOCK * 8;

/// Control word values recognized in the first word of a physical
/// block, distinguishing data blocks from record/file boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Data,
    Eor,
    Eof,
}

impl Control {
    fn word(self) -> u64 {
        match self {
            Control::Data => 0,
            Control::Eor => 1 << 63,
            Control::Eof => 1 << 62,
        }
    }
}

/// Buffers logical record bytes and frames them into fixed-size COS
/// blocks as records/files close, the way the object writer's PDT/TXT/
/// BRT/XRT tables are each written as one logical record.
pub struct DatasetWriter<W> {
    buf: Vec<u8>,
    out: W,
}

impl<W: io::Write> DatasetWriter<W> {
    pub fn new(out: W) -> Self {
        DatasetWriter { buf: Vec::new(), out }
    }

    /// Append bytes to the record currently being accumulated.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.write_bytes(bytes);
    }

    /// Close the current logical record: pad to a whole number of
    /// blocks and flush, marking the final block EOR.
    pub fn end_record(&mut self) -> io::Result<()> {
        self.flush_blocks(Control::Eor)
    }

    /// Close the current logical file.
    pub fn end_file(&mut self) -> io::Result<()> {
        self.flush_blocks(Control::Eof)
    }

    /// Two consecutive end-of-file marks, the dataset-level terminator.
    pub fn end_dataset(&mut self) -> io::Result<()> {
        self.end_file()?;
        self.end_file()
    }

    fn flush_blocks(&mut self, terminal: Control) -> io::Result<()> {
        let payload_per_block = BYTES_PER_BLOCK - 8;
        if self.buf.is_empty() {
            return self.write_block(&[], terminal);
        }
        let mut offset = 0;
        while offset < self.buf.len() {
            let end = (offset + payload_per_block).min(self.buf.len());
            let is_last = end == self.buf.len();
            let control = if is_last { terminal } else { Control::Data };
            let chunk = self.buf[offset..end].to_vec();
            self.write_block(&chunk, control)?;
            offset = end;
        }
        self.buf.clear();
        Ok(())
    }

    fn write_block(&mut self, payload: &[u8], control: Control) -> io::Result<()> {
        self.out.write_all(&control.word().to_be_bytes())?;
        self.out.write_all(payload)?;
        let pad = BYTES_PER_BLOCK - 8 - payload.len();
        if pad > 0 {
            self.out.write_all(&vec![0u8; pad])?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_record_pads_to_one_block() {
        let mut w = DatasetWriter::new(Vec::new());
        w.write_bytes(b"hello");
        w.end_record().unwrap();
        let out = w.into_inner();
        assert_eq!(out.len(), BYTES_PER_BLOCK);
        assert_eq!(&out[8..13], b"hello");
        assert_eq!(u64::from_be_bytes(out[0..8].try_into().unwrap()), Control::Eor.word());
    }

    #[test]
    fn end_dataset_writes_two_eof_blocks() {
        let mut w = DatasetWriter::new(Vec::new());
        w.end_dataset().unwrap();
        let out = w.into_inner();
        assert_eq!(out.len(), BYTES_PER_BLOCK * 2);
        assert_eq!(
            u64::from_be_bytes(out[BYTES_PER_BLOCK..BYTES_PER_BLOCK + 8].try_into().unwrap()),
            Control::Eof.word()
        );
    }
}
