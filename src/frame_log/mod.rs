//! # Frame Log Module
//!
//! Records transmitted DShot frames to JSONL files with rotation.
//!
//! This module handles:
//! - Formatting each transmitted frame as one JSON line
//! - Writing to rotating log files (max N records per file)
//! - Retaining only the last M files

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::FrameLogConfig;
use crate::dshot::protocol::Frame;
use crate::error::Result;

/// One transmitted frame, as written to the log
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FrameRecord {
    /// RFC 3339 timestamp (UTC)
    pub timestamp: String,
    pub channel: u8,
    pub throttle: u16,
    pub telemetry_request: bool,
    /// Raw frame as `0xXXXX`
    pub frame: String,
    pub checksum: u8,
}

impl FrameRecord {
    pub fn new(channel: u8, frame: &Frame) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            channel,
            throttle: frame.throttle(),
            telemetry_request: frame.telemetry_request(),
            frame: frame.to_string(),
            checksum: frame.checksum(),
        }
    }
}

/// JSONL writer with size-based rotation
pub struct FrameLogger {
    dir: PathBuf,
    session: String,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    records_in_file: usize,
    next_index: u32,
    files: VecDeque<PathBuf>,
}

impl std::fmt::Debug for FrameLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLogger")
            .field("dir", &self.dir)
            .field("records_in_file", &self.records_in_file)
            .field("files", &self.files)
            .finish_non_exhaustive()
    }
}

impl FrameLogger {
    /// Create a logger writing into `dir` (created if missing)
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new<P: AsRef<Path>>(dir: P, max_records_per_file: usize, max_files_to_keep: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            session: Local::now().format("%Y%m%d_%H%M%S").to_string(),
            max_records_per_file: max_records_per_file.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            writer: None,
            records_in_file: 0,
            next_index: 0,
            files: VecDeque::new(),
        })
    }

    pub fn from_config(config: &FrameLogConfig) -> Result<Self> {
        Self::new(&config.log_dir, config.max_records_per_file, config.max_files_to_keep)
    }

    /// Append one frame record
    pub fn record(&mut self, channel: u8, frame: &Frame) -> Result<()> {
        self.write_record(&FrameRecord::new(channel, frame))
    }

    /// Append an already-built record
    pub fn write_record(&mut self, record: &FrameRecord) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let line = serde_json::to_string(record)?;
        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{}", line)?;
        }
        self.records_in_file += 1;

        Ok(())
    }

    /// Flush buffered records to disk
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Path of the file currently being written
    pub fn current_file(&self) -> Option<&Path> {
        self.files.back().map(PathBuf::as_path)
    }

    fn rotate(&mut self) -> Result<()> {
        self.flush()?;

        let path = self
            .dir
            .join(format!("frames_{}_{:04}.jsonl", self.session, self.next_index));
        self.next_index += 1;

        self.writer = Some(BufWriter::new(File::create(&path)?));
        self.records_in_file = 0;
        debug!("Frame log rotated to {}", path.display());
        self.files.push_back(path);

        while self.files.len() > self.max_files_to_keep {
            if let Some(old) = self.files.pop_front() {
                if let Err(e) = fs::remove_file(&old) {
                    warn!("Failed to remove old frame log {}: {}", old.display(), e);
                }
            }
        }

        Ok(())
    }
}

impl Drop for FrameLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to flush frame log: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dshot::protocol::Command;

    fn frame(throttle: u16) -> Frame {
        Frame::new(Command::new(throttle, false)).unwrap()
    }

    fn jsonl_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().map_or(false, |ext| ext == "jsonl"))
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_record_fields() {
        let record = FrameRecord::new(3, &frame(1000));
        assert_eq!(record.channel, 3);
        assert_eq!(record.throttle, 1000);
        assert!(!record.telemetry_request);
        assert_eq!(record.frame, "0x7D0A");
        assert_eq!(record.checksum, 0xA);
    }

    #[test]
    fn test_writes_jsonl_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = FrameLogger::new(dir.path(), 100, 5).unwrap();

        logger.record(0, &frame(100)).unwrap();
        logger.record(1, &frame(200)).unwrap();
        logger.flush().unwrap();

        let contents = fs::read_to_string(logger.current_file().unwrap()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let value: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(value["channel"], 1);
        assert_eq!(value["throttle"], 200);
        assert_eq!(value["telemetry_request"], false);
    }

    #[test]
    fn test_rotation_keeps_last_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = FrameLogger::new(dir.path(), 2, 2).unwrap();

        // 7 records at 2 per file = 4 files, only the last 2 kept
        for throttle in 100..107 {
            logger.record(0, &frame(throttle)).unwrap();
        }
        logger.flush().unwrap();

        let files = jsonl_files(dir.path());
        assert_eq!(files.len(), 2);

        let last = fs::read_to_string(&files[1]).unwrap();
        assert_eq!(last.lines().count(), 1);
        assert!(last.contains("\"throttle\":106"));

        let previous = fs::read_to_string(&files[0]).unwrap();
        assert_eq!(previous.lines().count(), 2);
    }

    #[test]
    fn test_file_names_carry_session_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = FrameLogger::new(dir.path(), 1, 5).unwrap();

        logger.record(0, &frame(100)).unwrap();
        logger.record(0, &frame(101)).unwrap();
        logger.flush().unwrap();

        let names: Vec<String> = jsonl_files(dir.path())
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2);

        // frames_YYYYMMDD_HHMMSS_0000.jsonl
        let first = names[0].strip_prefix("frames_").unwrap();
        let (session, index) = first.rsplit_once('_').unwrap();
        assert_eq!(index, "0000.jsonl");
        assert_eq!(session.len(), "YYYYMMDD_HHMMSS".len());
        assert!(chrono::NaiveDateTime::parse_from_str(session, "%Y%m%d_%H%M%S").is_ok());

        assert_eq!(names[1], format!("frames_{}_0001.jsonl", session));
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs").join("frames");

        let mut logger = FrameLogger::new(&nested, 10, 1).unwrap();
        logger.record(0, &frame(48)).unwrap();

        assert!(nested.is_dir());
        assert_eq!(jsonl_files(&nested).len(), 1);
    }
}
