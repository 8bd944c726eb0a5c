use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::file_info::{FileInfo, FileStats, FileStatus, Origin, PointStats};

use itertools::Itertools;
use serde_json::Value;

/// The build's source file list, with aggregate statistics.
///
/// Origins are positions in this list; continued builds diff and append
/// rather than renumber, so an origin stays stable for the life of a tree.
pub struct Files {
    files: Vec<FileInfo>,
    point_stats: PointStats,
    file_stats: FileStats,
}

impl Files {
    pub fn new(mut files: Vec<FileInfo>) -> Self {
        let mut point_stats = PointStats::default();
        let mut file_stats = FileStats::default();
        for (origin, file) in files.iter_mut().enumerate() {
            if file.origin().is_none() {
                file.set_origin(origin as Origin);
            }
            point_stats.add(file.point_stats());
            tally(&mut file_stats, file.status());
        }
        Self {
            files,
            point_stats,
            file_stats,
        }
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let records = value
            .as_array()
            .ok_or_else(|| Error::InvalidManifest("file list must be an array".into()))?;
        let files = records
            .iter()
            .map(FileInfo::from_json)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(files))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn list(&self) -> &[FileInfo] {
        &self.files
    }

    /// First origin whose path contains `fragment`.
    pub fn find(&self, fragment: &str) -> Option<Origin> {
        self.files
            .iter()
            .position(|file| file.path().contains(fragment))
            .map(|position| position as Origin)
    }

    pub fn get(&self, origin: Origin) -> &FileInfo {
        &self.files[origin as usize]
    }

    pub fn get_mut(&mut self, origin: Origin) -> &mut FileInfo {
        &mut self.files[origin as usize]
    }

    pub fn set(&mut self, origin: Origin, status: FileStatus, message: Option<String>) {
        tally(&mut self.file_stats, status);
        self.get_mut(origin).set_status(status, message);
    }

    /// Record insertion stats against a file and the build totals.
    pub fn add(&mut self, origin: Origin, stats: &PointStats) {
        self.get_mut(origin).add_stats(stats);
        self.point_stats.add(stats);
    }

    /// Record out-of-bounds points; only the primary build counts them
    /// toward the totals.
    pub fn add_out_of_bounds(&mut self, origin: Origin, count: u64, primary: bool) {
        self.get_mut(origin).add_out_of_bounds(count);
        if primary {
            self.point_stats.add_out_of_bounds(count);
        }
    }

    pub fn point_stats(&self) -> &PointStats {
        &self.point_stats
    }

    pub fn file_stats(&self) -> &FileStats {
        &self.file_stats
    }

    pub fn total_points(&self) -> u64 {
        self.files.iter().map(FileInfo::points).sum()
    }

    pub fn total_inserts(&self) -> u64 {
        self.files
            .iter()
            .map(|file| file.point_stats().inserts())
            .sum()
    }

    /// Entries of `candidates` whose paths this list does not know yet.
    pub fn diff(&self, candidates: &[FileInfo]) -> Vec<FileInfo> {
        candidates
            .iter()
            .filter(|candidate| {
                !self
                    .files
                    .iter()
                    .any(|file| file.path() == candidate.path())
            })
            .cloned()
            .collect_vec()
    }

    /// Append new files for a continued build, skipping known paths.
    pub fn append(&mut self, candidates: Vec<FileInfo>) {
        for mut candidate in self.diff(&candidates) {
            candidate.set_origin(self.files.len() as Origin);
            self.point_stats.add(candidate.point_stats());
            tally(&mut self.file_stats, candidate.status());
            self.files.push(candidate);
        }
    }

    /// Merge another list: records sharing a path merge, the rest append.
    pub fn merge(&mut self, other: &Files) -> Result<()> {
        for incoming in other.list() {
            match self
                .files
                .iter_mut()
                .find(|file| file.path() == incoming.path())
            {
                Some(existing) => existing.merge(incoming)?,
                None => self.append(vec![incoming.clone()]),
            }
        }
        Ok(())
    }

    pub fn to_private_json(&self) -> Value {
        Value::Array(self.files.iter().map(FileInfo::to_private_json).collect())
    }

    pub fn to_sources_json(&self) -> Value {
        Value::Array(self.files.iter().map(FileInfo::to_sources_json).collect())
    }

    /// Persist the private projection for resumable indexing.
    pub fn write_private(&self, endpoint: &dyn Endpoint, postfix: &str) -> Result<()> {
        let body = serde_json::to_vec(&self.to_private_json())
            .map_err(|err| Error::InvalidManifest(err.to_string()))?;
        endpoint.put_subpath(&format!("files{}", postfix), &body)?;
        Ok(())
    }

    /// Persist the sources projection for catalog consumption.
    pub fn write_sources(&self, endpoint: &dyn Endpoint) -> Result<()> {
        let body = serde_json::to_vec(&self.to_sources_json())
            .map_err(|err| Error::InvalidManifest(err.to_string()))?;
        endpoint.put_subpath("sources", &body)?;
        Ok(())
    }
}

fn tally(stats: &mut FileStats, status: FileStatus) {
    match status {
        FileStatus::Inserted => stats.add_insert(),
        FileStatus::Omitted => stats.add_omit(),
        FileStatus::Error => stats.add_error(),
        FileStatus::Outstanding => {}
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::MemoryEndpoint;

    use serde_json::json;

    fn three_files() -> Files {
        Files::new(vec![
            FileInfo::new("scans/alpha.laz"),
            FileInfo::new("scans/beta.laz"),
            FileInfo::new("scans/gamma.laz"),
        ])
    }

    #[test]
    fn origins_number_the_list() {
        let files = three_files();
        assert_eq!(files.len(), 3);
        assert_eq!(files.get(1).origin(), Some(1));
        assert_eq!(files.find("beta"), Some(1));
        assert_eq!(files.find("delta"), None);
    }

    #[test]
    fn stats_accumulate_per_file_and_in_total() {
        let mut files = three_files();
        files.add(0, &PointStats::new(100, 5));
        files.add(1, &PointStats::new(50, 0));
        files.add_out_of_bounds(1, 3, true);
        files.add_out_of_bounds(2, 9, false);

        assert_eq!(files.point_stats().inserts(), 150);
        assert_eq!(files.point_stats().out_of_bounds(), 8);
        assert_eq!(files.get(2).point_stats().out_of_bounds(), 9);
        assert_eq!(files.total_inserts(), 150);

        files.set(0, FileStatus::Inserted, None);
        files.set(1, FileStatus::Error, Some("truncated".into()));
        assert_eq!(files.file_stats().inserts(), 1);
        assert_eq!(files.file_stats().errors(), 1);
        assert_eq!(files.get(1).message(), Some("truncated"));
    }

    #[test]
    fn append_skips_known_paths_and_numbers_new_ones() {
        let mut files = three_files();
        files.append(vec![
            FileInfo::new("scans/beta.laz"),
            FileInfo::new("scans/delta.laz"),
        ]);

        assert_eq!(files.len(), 4);
        assert_eq!(files.get(3).path(), "scans/delta.laz");
        assert_eq!(files.get(3).origin(), Some(3));
    }

    #[test]
    fn merge_combines_matching_paths() {
        let mut ours = three_files();
        ours.add(0, &PointStats::new(10, 0));

        let mut theirs = Files::new(vec![
            FileInfo::new("scans/alpha.laz"),
            FileInfo::new("scans/delta.laz"),
        ]);
        theirs.add(0, &PointStats::new(7, 2));
        theirs.set(0, FileStatus::Inserted, None);

        ours.merge(&theirs).unwrap();
        assert_eq!(ours.len(), 4);
        assert_eq!(ours.get(0).point_stats(), &PointStats::new(17, 2));
        assert_eq!(ours.get(0).status(), FileStatus::Inserted);
    }

    #[test]
    fn json_round_trip_preserves_status() {
        let mut files = three_files();
        files.set(2, FileStatus::Omitted, None);

        let back = Files::from_json(&files.to_private_json()).unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back.get(2).status(), FileStatus::Omitted);
        assert_eq!(back.file_stats().omits(), 1);
    }

    #[test]
    fn manifests_persist_through_an_endpoint() {
        let endpoint = MemoryEndpoint::new();
        let files = three_files();
        files.write_private(&endpoint, "-1").unwrap();
        files.write_sources(&endpoint).unwrap();

        assert_eq!(
            endpoint.paths(),
            vec!["files-1".to_owned(), "sources".to_owned()]
        );
        let stored: Value =
            serde_json::from_slice(&endpoint.get_subpath("sources").unwrap()).unwrap();
        assert_eq!(stored[0]["path"], json!("scans/alpha.laz"));
        assert_eq!(stored[1]["origin"], json!(1));
    }
}
