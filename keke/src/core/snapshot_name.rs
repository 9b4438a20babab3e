//! Snapshot naming, parsing, and ordering.
//!
//! A snapshot file is named `<base>.<stamp>.snap`, where `<stamp>` is a
//! second-resolution local timestamp (`YYYYMMDD_HHMMSS`) optionally followed by
//! `-<n>` when several snapshots of the same base name land in one second.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

pub const SNAPSHOT_SUFFIX: &str = "snap";
const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

static SNAPSHOT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>.+)\.(?P<time>\d{8}_\d{6})(?:-(?P<seq>\d+))?\.snap$").unwrap()
});

/// Timestamp plus same-second disambiguator. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotStamp {
    pub time: NaiveDateTime,
    pub seq: u32,
}

impl SnapshotStamp {
    pub fn new(time: NaiveDateTime) -> Self {
        Self { time, seq: 0 }
    }

    /// The same instant with the next disambiguator.
    pub fn next(self) -> Self {
        Self {
            time: self.time,
            seq: self.seq + 1,
        }
    }
}

impl fmt::Display for SnapshotStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.time.format(STAMP_FORMAT))?;
        if self.seq > 0 {
            write!(f, "-{}", self.seq)?;
        }
        Ok(())
    }
}

/// An immutable backup of one file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    /// Base name of the file the snapshot was taken from.
    pub original_file: String,
    pub timestamp: SnapshotStamp,
    /// Snapshot file name inside the snapshot directory.
    pub snapshot_file: String,
    /// Absolute location of the snapshot file.
    pub path: PathBuf,
    /// Project-relative location of the original, when recorded.
    pub original_path: Option<PathBuf>,
}

pub fn snapshot_file_name(base: &str, stamp: &SnapshotStamp) -> String {
    format!("{base}.{stamp}.{SNAPSHOT_SUFFIX}")
}

/// Split a snapshot file name into its base name and stamp.
pub fn parse_snapshot_file_name(name: &str) -> Option<(String, SnapshotStamp)> {
    let caps = SNAPSHOT_NAME_RE.captures(name)?;
    let time = NaiveDateTime::parse_from_str(&caps["time"], STAMP_FORMAT).ok()?;
    let seq = match caps.name("seq") {
        Some(seq) => seq.as_str().parse().ok()?,
        None => 0,
    };
    Some((caps["base"].to_string(), SnapshotStamp { time, seq }))
}

/// Group records by original file, newest first within each group.
pub fn group_by_original(records: Vec<SnapshotRecord>) -> BTreeMap<String, Vec<SnapshotRecord>> {
    let mut groups: BTreeMap<String, Vec<SnapshotRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.original_file.clone())
            .or_default()
            .push(record);
    }
    for group in groups.values_mut() {
        group.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .and_then(|d| d.and_hms_opt(h, m, s))
            .expect("valid time")
    }

    fn record(base: &str, stamp: SnapshotStamp) -> SnapshotRecord {
        let name = snapshot_file_name(base, &stamp);
        SnapshotRecord {
            original_file: base.to_string(),
            timestamp: stamp,
            path: PathBuf::from("/snap").join(&name),
            snapshot_file: name,
            original_path: None,
        }
    }

    #[test]
    fn name_matches_fixed_layout() {
        let stamp = SnapshotStamp::new(at(9, 5, 7));
        assert_eq!(
            snapshot_file_name("main.rs", &stamp),
            "main.rs.20260314_090507.snap"
        );
        assert_eq!(
            snapshot_file_name("main.rs", &stamp.next()),
            "main.rs.20260314_090507-1.snap"
        );
    }

    #[test]
    fn parse_keeps_dots_in_base_name() {
        let (base, stamp) =
            parse_snapshot_file_name("archive.tar.gz.20260314_090507-2.snap").expect("parse");
        assert_eq!(base, "archive.tar.gz");
        assert_eq!(stamp.time, at(9, 5, 7));
        assert_eq!(stamp.seq, 2);
    }

    #[test]
    fn parse_rejects_foreign_names() {
        assert!(parse_snapshot_file_name("index.json").is_none());
        assert!(parse_snapshot_file_name("a.txt.snap").is_none());
        assert!(parse_snapshot_file_name("a.txt.20261340_999999.snap").is_none());
        assert!(parse_snapshot_file_name(".20260314_090507.snap").is_none());
    }

    #[test]
    fn groups_sort_newest_first_including_sequence() {
        let base = SnapshotStamp::new(at(10, 0, 0));
        let mut later = base;
        for _ in 0..10 {
            later = later.next();
        }
        let records = vec![
            record("a.txt", SnapshotStamp::new(at(9, 0, 0))),
            record("b.txt", base),
            record("a.txt", base.next()),
            record("a.txt", later),
            record("a.txt", base),
        ];

        let groups = group_by_original(records);
        let a: Vec<String> = groups["a.txt"]
            .iter()
            .map(|r| r.timestamp.to_string())
            .collect();
        assert_eq!(
            a,
            vec![
                "20260314_100000-10",
                "20260314_100000-1",
                "20260314_100000",
                "20260314_090000"
            ]
        );
        assert_eq!(groups["b.txt"].len(), 1);
    }
}
