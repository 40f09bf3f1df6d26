//! ZIP archive writer.
//!
//! Accepts named binary entries, deflate-compresses them (falling back to
//! stored when compression does not help), and finalizes to a single
//! downloadable blob with a 0–100 progress callback. Only the subset of the
//! ZIP format needed here: local headers, a central directory, and the
//! end-of-central-directory record, no zip64.

use chrono::{Datelike, Local, Timelike};
use flate2::{Compression, Crc, write::DeflateEncoder};
use std::io::Write;

use crate::error::SelloError;

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
const EOCD_SIG: u32 = 0x0605_4b50;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;
const VERSION_NEEDED: u16 = 20;

/// MS-DOS date/time pair used by ZIP headers. Two-second resolution.
fn dos_datetime() -> (u16, u16) {
    let now = Local::now();
    let year = now.year().clamp(1980, 2107) as u16;
    let date = ((year - 1980) << 9) | ((now.month() as u16) << 5) | now.day() as u16;
    let time =
        ((now.hour() as u16) << 11) | ((now.minute() as u16) << 5) | (now.second() as u16 / 2);
    (date, time)
}

struct EntryRecord {
    name: String,
    method: u16,
    crc: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    local_offset: u32,
    dos_date: u16,
    dos_time: u16,
}

/// Growing archive of named entries.
#[derive(Default)]
pub struct ZipWriter {
    buf: Vec<u8>,
    entries: Vec<EntryRecord>,
}

impl ZipWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compress and append one entry under `name`.
    pub fn add(&mut self, name: &str, data: &[u8]) -> Result<(), SelloError> {
        // The EOCD entry count is a u16; without zip64 the format tops out
        // at 65535 entries.
        if self.entries.len() >= u16::MAX as usize {
            return Err(SelloError::Archive(
                "archive is full: the zip format caps entries at 65535".to_string(),
            ));
        }
        if data.len() > u32::MAX as usize {
            return Err(SelloError::Archive(format!(
                "entry '{}' exceeds the 4 GiB zip limit",
                name
            )));
        }

        let mut crc = Crc::new();
        crc.update(data);

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(data)
            .map_err(|e| SelloError::Archive(format!("deflate failed for '{}': {}", name, e)))?;
        let compressed = encoder
            .finish()
            .map_err(|e| SelloError::Archive(format!("deflate failed for '{}': {}", name, e)))?;

        // Stored wins when deflate doesn't shrink the payload
        // (already-compressed PNG data often doesn't).
        let (method, payload) = if compressed.len() < data.len() {
            (METHOD_DEFLATE, compressed)
        } else {
            (METHOD_STORED, data.to_vec())
        };

        let (dos_date, dos_time) = dos_datetime();
        let record = EntryRecord {
            name: name.to_string(),
            method,
            crc: crc.sum(),
            compressed_size: payload.len() as u32,
            uncompressed_size: data.len() as u32,
            local_offset: self.buf.len() as u32,
            dos_date,
            dos_time,
        };

        self.write_local_header(&record);
        self.buf.extend_from_slice(&payload);
        self.entries.push(record);
        Ok(())
    }

    fn write_local_header(&mut self, record: &EntryRecord) {
        self.buf.extend_from_slice(&LOCAL_HEADER_SIG.to_le_bytes());
        self.buf.extend_from_slice(&VERSION_NEEDED.to_le_bytes());
        self.buf.extend_from_slice(&0u16.to_le_bytes()); // general purpose flags
        self.buf.extend_from_slice(&record.method.to_le_bytes());
        self.buf.extend_from_slice(&record.dos_time.to_le_bytes());
        self.buf.extend_from_slice(&record.dos_date.to_le_bytes());
        self.buf.extend_from_slice(&record.crc.to_le_bytes());
        self.buf
            .extend_from_slice(&record.compressed_size.to_le_bytes());
        self.buf
            .extend_from_slice(&record.uncompressed_size.to_le_bytes());
        self.buf
            .extend_from_slice(&(record.name.len() as u16).to_le_bytes());
        self.buf.extend_from_slice(&0u16.to_le_bytes()); // extra field length
        self.buf.extend_from_slice(record.name.as_bytes());
    }

    /// Write the central directory and finalize to the archive bytes.
    ///
    /// `progress` is called with 0–100 as directory records are written.
    pub fn finish(mut self, mut progress: impl FnMut(u8)) -> Result<Vec<u8>, SelloError> {
        progress(0);
        let central_offset = self.buf.len() as u32;
        let total = self.entries.len();

        let entries = std::mem::take(&mut self.entries);
        for (i, record) in entries.iter().enumerate() {
            self.write_central_header(record);
            progress((((i + 1) * 100) / total.max(1)) as u8);
        }
        let central_size = self.buf.len() as u32 - central_offset;

        self.buf.extend_from_slice(&EOCD_SIG.to_le_bytes());
        self.buf.extend_from_slice(&0u16.to_le_bytes()); // this disk
        self.buf.extend_from_slice(&0u16.to_le_bytes()); // central dir disk
        self.buf.extend_from_slice(&(total as u16).to_le_bytes());
        self.buf.extend_from_slice(&(total as u16).to_le_bytes());
        self.buf.extend_from_slice(&central_size.to_le_bytes());
        self.buf.extend_from_slice(&central_offset.to_le_bytes());
        self.buf.extend_from_slice(&0u16.to_le_bytes()); // comment length
        progress(100);

        Ok(self.buf)
    }

    fn write_central_header(&mut self, record: &EntryRecord) {
        self.buf
            .extend_from_slice(&CENTRAL_HEADER_SIG.to_le_bytes());
        self.buf.extend_from_slice(&VERSION_NEEDED.to_le_bytes()); // made by
        self.buf.extend_from_slice(&VERSION_NEEDED.to_le_bytes()); // needed
        self.buf.extend_from_slice(&0u16.to_le_bytes()); // flags
        self.buf.extend_from_slice(&record.method.to_le_bytes());
        self.buf.extend_from_slice(&record.dos_time.to_le_bytes());
        self.buf.extend_from_slice(&record.dos_date.to_le_bytes());
        self.buf.extend_from_slice(&record.crc.to_le_bytes());
        self.buf
            .extend_from_slice(&record.compressed_size.to_le_bytes());
        self.buf
            .extend_from_slice(&record.uncompressed_size.to_le_bytes());
        self.buf
            .extend_from_slice(&(record.name.len() as u16).to_le_bytes());
        self.buf.extend_from_slice(&0u16.to_le_bytes()); // extra length
        self.buf.extend_from_slice(&0u16.to_le_bytes()); // comment length
        self.buf.extend_from_slice(&0u16.to_le_bytes()); // disk number
        self.buf.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        self.buf.extend_from_slice(&0u32.to_le_bytes()); // external attrs
        self.buf.extend_from_slice(&record.local_offset.to_le_bytes());
        self.buf.extend_from_slice(record.name.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::DeflateDecoder;
    use std::io::Read;

    fn u16_at(bytes: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([bytes[at], bytes[at + 1]])
    }

    fn u32_at(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    #[test]
    fn single_entry_archive_layout() {
        let mut zip = ZipWriter::new();
        let data = b"hello zip hello zip hello zip";
        zip.add("greeting.txt", data).unwrap();
        let bytes = zip.finish(|_| {}).unwrap();

        // Local header at the start.
        assert_eq!(u32_at(&bytes, 0), LOCAL_HEADER_SIG);
        assert_eq!(u16_at(&bytes, 26) as usize, "greeting.txt".len());
        assert_eq!(&bytes[30..42], b"greeting.txt");

        // EOCD at the tail reports one entry.
        let eocd = bytes.len() - 22;
        assert_eq!(u32_at(&bytes, eocd), EOCD_SIG);
        assert_eq!(u16_at(&bytes, eocd + 10), 1);

        // Central directory offset points at a central header.
        let central_offset = u32_at(&bytes, eocd + 16) as usize;
        assert_eq!(u32_at(&bytes, central_offset), CENTRAL_HEADER_SIG);
    }

    #[test]
    fn entry_payload_round_trips() {
        let mut zip = ZipWriter::new();
        let data = b"the quick brown fox jumps over the lazy dog, repeatedly, \
                     the quick brown fox jumps over the lazy dog";
        zip.add("fox.txt", data).unwrap();
        let bytes = zip.finish(|_| {}).unwrap();

        let method = u16_at(&bytes, 8);
        let compressed_size = u32_at(&bytes, 18) as usize;
        let name_len = u16_at(&bytes, 26) as usize;
        let payload = &bytes[30 + name_len..30 + name_len + compressed_size];

        let restored = match method {
            METHOD_DEFLATE => {
                let mut out = Vec::new();
                DeflateDecoder::new(payload).read_to_end(&mut out).unwrap();
                out
            }
            METHOD_STORED => payload.to_vec(),
            other => panic!("unexpected method {}", other),
        };
        assert_eq!(restored, data);
    }

    #[test]
    fn incompressible_data_is_stored() {
        let mut zip = ZipWriter::new();
        // Pseudo-random bytes deflate poorly.
        let data: Vec<u8> = (0..512u32)
            .map(|i| (i.wrapping_mul(2654435761) >> 13) as u8)
            .collect();
        zip.add("noise.bin", &data).unwrap();
        let bytes = zip.finish(|_| {}).unwrap();
        let method = u16_at(&bytes, 8);
        if method == METHOD_STORED {
            assert_eq!(u32_at(&bytes, 18), data.len() as u32);
        }
    }

    #[test]
    fn crc_matches_known_value() {
        let mut zip = ZipWriter::new();
        // CRC-32 of "123456789" is the classic check value.
        zip.add("check.txt", b"123456789").unwrap();
        let bytes = zip.finish(|_| {}).unwrap();
        assert_eq!(u32_at(&bytes, 14), 0xCBF4_3926);
    }

    #[test]
    fn finish_reports_monotonic_progress() {
        let mut zip = ZipWriter::new();
        for i in 0..10 {
            zip.add(&format!("{}.txt", i), b"data data data").unwrap();
        }
        let mut seen = Vec::new();
        zip.finish(|pct| seen.push(pct)).unwrap();

        assert_eq!(*seen.first().unwrap(), 0);
        assert_eq!(*seen.last().unwrap(), 100);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
    }

    #[test]
    fn entry_count_is_capped_at_the_format_limit() {
        let mut zip = ZipWriter::new();
        // Fill the directory to the u16 ceiling without paying for 65535
        // deflate runs.
        for _ in 0..u16::MAX as usize {
            zip.entries.push(EntryRecord {
                name: String::new(),
                method: METHOD_STORED,
                crc: 0,
                compressed_size: 0,
                uncompressed_size: 0,
                local_offset: 0,
                dos_date: 0,
                dos_time: 0,
            });
        }
        let err = zip.add("overflow.png", b"x").unwrap_err();
        assert!(matches!(err, SelloError::Archive(_)));
        assert_eq!(zip.len(), u16::MAX as usize);
    }

    #[test]
    fn multiple_entries_counted_in_eocd() {
        let mut zip = ZipWriter::new();
        for i in 0..3 {
            zip.add(&format!("row_{}.png", i), &[i as u8; 16]).unwrap();
        }
        let bytes = zip.finish(|_| {}).unwrap();
        let eocd = bytes.len() - 22;
        assert_eq!(u16_at(&bytes, eocd + 10), 3);
    }
}
