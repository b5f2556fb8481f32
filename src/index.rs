//! Binary side index of a volume
//!
//! Every record written with `Options::CREATE_INDEX_FILE` gets one fixed-size
//! [`IndexRecord`] in a `.idx` file next to the volume. A record stores the
//! volume offset of the line and, for each bracketed field, a seek delta from
//! the end of the previous field plus the field length. Walking the deltas in
//! field order recovers every field without scanning the volume.
//!
//! Layout, little-endian, 17 bytes:
//!
//! ```text
//! start_pos:u32 dt_off:u8 dt_len:u8 lvl_off:u8 lvl_len:u8
//! fl_off:u8 fl_len:u8 func_off:u8 func_len:u8 data_off:u8 data_len:u32
//! ```

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::compression;
use crate::config::CompressionAlgorithm;
use crate::error::{Error, Result};
use crate::volume;

/// Size of one encoded index record
pub const INDEX_RECORD_SIZE: usize = 17;

/// Longest location or function field an index record can describe
pub const MAX_FIELD_LEN: usize = u8::MAX as usize;

/// Offsets of one record's fields inside its volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexRecord {
    /// Volume offset of the opening `[`
    pub start_pos: u32,
    pub dt_off: u8,
    pub dt_len: u8,
    pub lvl_off: u8,
    pub lvl_len: u8,
    pub fl_off: u8,
    pub fl_len: u8,
    pub func_off: u8,
    pub func_len: u8,
    pub data_off: u8,
    /// Message length including the trailing newline
    pub data_len: u32,
}

impl IndexRecord {
    /// Describe a `[ts][L][file_line][func]: message\n` record starting at `start_pos`
    pub fn for_record(
        start_pos: u64,
        timestamp_len: usize,
        file_line_len: usize,
        func_len: usize,
        message_len: usize,
    ) -> Result<Self> {
        let start_pos = u32::try_from(start_pos)
            .map_err(|_| Error::index(format!("volume offset {} does not fit an index record", start_pos)))?;

        let narrow = |what: &str, len: usize| {
            u8::try_from(len).map_err(|_| Error::index(format!("{} field of {} bytes is too long", what, len)))
        };

        let data_len = message_len
            .checked_add(1)
            .and_then(|len| u32::try_from(len).ok())
            .ok_or_else(|| Error::index(format!("message of {} bytes is too long", message_len)))?;

        Ok(Self {
            start_pos,
            dt_off: 1,
            dt_len: narrow("timestamp", timestamp_len)?,
            lvl_off: 2,
            lvl_len: 1,
            fl_off: 2,
            fl_len: narrow("location", file_line_len)?,
            func_off: 2,
            func_len: narrow("function", func_len)?,
            data_off: 3,
            data_len,
        })
    }

    /// Write the packed form
    pub fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.start_pos)?;
        writer.write_u8(self.dt_off)?;
        writer.write_u8(self.dt_len)?;
        writer.write_u8(self.lvl_off)?;
        writer.write_u8(self.lvl_len)?;
        writer.write_u8(self.fl_off)?;
        writer.write_u8(self.fl_len)?;
        writer.write_u8(self.func_off)?;
        writer.write_u8(self.func_len)?;
        writer.write_u8(self.data_off)?;
        writer.write_u32::<LittleEndian>(self.data_len)?;
        Ok(())
    }

    /// Read the packed form
    pub fn decode<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            start_pos: reader.read_u32::<LittleEndian>()?,
            dt_off: reader.read_u8()?,
            dt_len: reader.read_u8()?,
            lvl_off: reader.read_u8()?,
            lvl_len: reader.read_u8()?,
            fl_off: reader.read_u8()?,
            fl_len: reader.read_u8()?,
            func_off: reader.read_u8()?,
            func_len: reader.read_u8()?,
            data_off: reader.read_u8()?,
            data_len: reader.read_u32::<LittleEndian>()?,
        })
    }

    /// Packed form as an array
    pub fn to_bytes(&self) -> [u8; INDEX_RECORD_SIZE] {
        let mut buf = [0u8; INDEX_RECORD_SIZE];
        buf[..4].copy_from_slice(&self.start_pos.to_le_bytes());
        buf[4..13].copy_from_slice(&[
            self.dt_off,
            self.dt_len,
            self.lvl_off,
            self.lvl_len,
            self.fl_off,
            self.fl_len,
            self.func_off,
            self.func_len,
            self.data_off,
        ]);
        buf[13..].copy_from_slice(&self.data_len.to_le_bytes());
        buf
    }
}

/// Fields of one record read back through its index record
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexData {
    pub datetime: String,
    pub level: char,
    pub file_line: String,
    pub func: String,
    /// Message without the trailing newline
    pub data: String,
}

/// Number of complete records in an index
pub fn index_count<R: Seek>(index: &mut R) -> Result<u64> {
    let len = index.seek(SeekFrom::End(0))?;
    Ok(len / INDEX_RECORD_SIZE as u64)
}

/// Load index record `n`
pub fn index_read<R: Read + Seek>(n: u64, index: &mut R) -> Result<IndexRecord> {
    let offset = n
        .checked_mul(INDEX_RECORD_SIZE as u64)
        .ok_or_else(|| Error::index(format!("record {} is out of range", n)))?;
    index.seek(SeekFrom::Start(offset))?;

    IndexRecord::decode(index).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::index(format!("record {} is past the end of the index", n)),
        _ => Error::Io(e),
    })
}

fn read_field<R: Read + Seek>(log: &mut R, skip: u8, len: usize, what: &str) -> Result<Vec<u8>> {
    log.seek(SeekFrom::Current(i64::from(skip)))?;
    let mut buf = vec![0u8; len];
    log.read_exact(&mut buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::index(format!("{} field runs past the end of the volume", what)),
        _ => Error::Io(e),
    })?;
    Ok(buf)
}

fn into_text(bytes: Vec<u8>, what: &str) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| Error::index(format!("{} field is not UTF-8: {}", what, e)))
}

/// Read the fields `record` points at from the volume
///
/// Each field's offset is relative to the end of the previous one, so the
/// fields are visited strictly in order.
pub fn index_read_data<R: Read + Seek>(record: &IndexRecord, log: &mut R) -> Result<IndexData> {
    log.seek(SeekFrom::Start(u64::from(record.start_pos)))?;

    let datetime = read_field(log, record.dt_off, record.dt_len as usize, "timestamp")?;
    let level = read_field(log, record.lvl_off, record.lvl_len as usize, "level")?;
    let file_line = read_field(log, record.fl_off, record.fl_len as usize, "location")?;
    let func = read_field(log, record.func_off, record.func_len as usize, "function")?;
    let data_len = (record.data_len as usize).saturating_sub(1);
    let data = read_field(log, record.data_off, data_len, "message")?;

    Ok(IndexData {
        datetime: into_text(datetime, "timestamp")?,
        level: level.first().map_or('X', |&b| b as char),
        file_line: into_text(file_line, "location")?,
        func: into_text(func, "function")?,
        data: into_text(data, "message")?,
    })
}

/// Read record `n` of `index` from `log`
pub fn index_read_nth<I, L>(n: u64, index: &mut I, log: &mut L) -> Result<IndexData>
where
    I: Read + Seek,
    L: Read + Seek,
{
    let record = index_read(n, index)?;
    index_read_data(&record, log)
}

/// Read every record of `index` from `log`
pub fn index_read_all<I, L>(index: &mut I, log: &mut L) -> Result<Vec<IndexData>>
where
    I: Read + Seek,
    L: Read + Seek,
{
    let count = index_count(index)?;
    (0..count).map(|n| index_read_nth(n, index, log)).collect()
}

/// Readable bytes of a finished volume
#[derive(Debug)]
pub enum VolumeSource {
    /// Plain volume read from disk
    Plain(BufReader<File>),
    /// Compressed volume inflated into memory
    Decompressed(Cursor<Vec<u8>>),
}

impl Read for VolumeSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(reader) => reader.read(buf),
            Self::Decompressed(cursor) => cursor.read(buf),
        }
    }
}

impl Seek for VolumeSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::Plain(reader) => reader.seek(pos),
            Self::Decompressed(cursor) => cursor.seek(pos),
        }
    }
}

/// Open a finished volume, inflating it when its name ends in `.gz`, `.zst` or `.lz4`
pub fn open_volume(path: &Path) -> Result<VolumeSource> {
    match CompressionAlgorithm::from_path(path) {
        Some(algorithm) => {
            let data = compression::decompress_file(path, algorithm)?;
            Ok(VolumeSource::Decompressed(Cursor::new(data)))
        }
        None => {
            let file = File::open(path).map_err(|e| Error::file(path, e))?;
            Ok(VolumeSource::Plain(BufReader::new(file)))
        }
    }
}

/// Index file paired with a finished volume
pub fn index_path_for_volume(volume_path: &Path) -> PathBuf {
    match CompressionAlgorithm::from_path(volume_path) {
        Some(algorithm) => {
            let name = volume_path.to_string_lossy();
            let plain = name.strip_suffix(algorithm.extension()).unwrap_or(&name);
            volume::index_path(Path::new(plain))
        }
        None => volume::index_path(volume_path),
    }
}

/// Random access to the records of one volume through its index
#[derive(Debug)]
pub struct IndexReader<I = BufReader<File>, L = VolumeSource> {
    index: I,
    log: L,
    len: u64,
}

impl IndexReader {
    /// Open a finished volume and the index next to it
    pub fn open(volume_path: impl AsRef<Path>) -> Result<Self> {
        let volume_path = volume_path.as_ref();
        let index_path = index_path_for_volume(volume_path);

        let index = File::open(&index_path).map_err(|e| Error::file(&index_path, e))?;
        let log = open_volume(volume_path)?;

        Self::new(BufReader::new(index), log)
    }
}

impl<I: Read + Seek, L: Read + Seek> IndexReader<I, L> {
    /// Pair an index with its volume
    pub fn new(mut index: I, log: L) -> Result<Self> {
        let len = index_count(&mut index)?;
        Ok(Self { index, log, len })
    }

    /// Number of indexed records
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the index holds no record
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw index record `n`
    pub fn record(&mut self, n: u64) -> Result<IndexRecord> {
        index_read(n, &mut self.index)
    }

    /// Fields of record `n`
    pub fn get(&mut self, n: u64) -> Result<IndexData> {
        if n >= self.len {
            return Err(Error::index(format!("record {} is out of range, index holds {}", n, self.len)));
        }
        index_read_nth(n, &mut self.index, &mut self.log)
    }

    /// Every record, in write order
    pub fn iter(&mut self) -> impl Iterator<Item = Result<IndexData>> + '_ {
        let len = self.len;
        (0..len).map(move |n| self.get(n))
    }
}
