//! Chunk accumulation and the finalized recording resource.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::capture::WEBM_MIME;

/// Append-only sequence of encoded chunks, in arrival order.
#[derive(Debug, Default)]
pub struct ChunkSequence {
    chunks: Vec<Vec<u8>>,
    total_bytes: usize,
}

impl ChunkSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk. Empty chunks are dropped and `false` is returned.
    pub fn append(&mut self, chunk: Vec<u8>) -> bool {
        if chunk.is_empty() {
            return false;
        }
        self.total_bytes += chunk.len();
        self.chunks.push(chunk);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Concatenates every chunk into one recording finalized at `at`.
    pub fn assemble(self, at: DateTime<Utc>) -> Recording {
        let chunk_count = self.chunks.len();
        let mut data = Vec::with_capacity(self.total_bytes);
        for chunk in self.chunks {
            data.extend_from_slice(&chunk);
        }
        Recording {
            file_name: recording_file_name(&at),
            data,
            chunk_count,
            finalized_at: at,
        }
    }
}

/// A finalized screen recording held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    data: Vec<u8>,
    file_name: String,
    chunk_count: usize,
    finalized_at: DateTime<Utc>,
}

impl Recording {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &'static str {
        WEBM_MIME
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn finalized_at(&self) -> DateTime<Utc> {
        self.finalized_at
    }
}

/// ISO 8601 UTC timestamp with millisecond precision, e.g. `2024-01-02T03:04:05.678Z`.
pub fn iso_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Download name for a timestamp string: `recording-<timestamp>.webm` with
/// every `:` and `.` replaced by `-`.
pub fn file_name_for_timestamp(timestamp: &str) -> String {
    let safe: String = timestamp
        .chars()
        .map(|c| if c == ':' || c == '.' { '-' } else { c })
        .collect();
    format!("recording-{safe}.webm")
}

pub fn recording_file_name(at: &DateTime<Utc>) -> String {
    file_name_for_timestamp(&iso_timestamp(at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap() + chrono::Duration::milliseconds(678)
    }

    #[test]
    fn test_file_name_replaces_colons_and_dots() {
        assert_eq!(
            file_name_for_timestamp("2024-01-02T03:04:05.678Z"),
            "recording-2024-01-02T03-04-05-678Z.webm"
        );
    }

    #[test]
    fn test_iso_timestamp_has_millis_and_z() {
        assert_eq!(iso_timestamp(&sample_time()), "2024-01-02T03:04:05.678Z");
        assert_eq!(
            recording_file_name(&sample_time()),
            "recording-2024-01-02T03-04-05-678Z.webm"
        );
    }

    #[test]
    fn test_assemble_preserves_arrival_order() {
        let mut chunks = ChunkSequence::new();
        assert!(chunks.append(b"c1".to_vec()));
        assert!(chunks.append(b"c2-".to_vec()));
        assert!(chunks.append(b"c3--".to_vec()));

        let recording = chunks.assemble(sample_time());
        assert_eq!(recording.data(), b"c1c2-c3--");
        assert_eq!(recording.chunk_count(), 3);
        assert_eq!(recording.size(), 9);
        assert_eq!(recording.mime_type(), "video/webm");
        assert_eq!(recording.file_name(), "recording-2024-01-02T03-04-05-678Z.webm");
        assert_eq!(recording.finalized_at(), sample_time());
    }

    #[test]
    fn test_empty_chunks_are_skipped() {
        let mut chunks = ChunkSequence::new();
        assert!(!chunks.append(Vec::new()));
        assert!(chunks.is_empty());
        assert!(chunks.append(vec![1]));
        assert!(!chunks.append(Vec::new()));

        let recording = chunks.assemble(sample_time());
        assert_eq!(recording.chunk_count(), 1);
        assert_eq!(recording.data(), &[1u8]);
    }

    #[test]
    fn test_empty_sequence_assembles_empty_recording() {
        let recording = ChunkSequence::new().assemble(sample_time());
        assert_eq!(recording.size(), 0);
        assert_eq!(recording.chunk_count(), 0);
    }
}
