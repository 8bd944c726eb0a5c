use crate::error::{Error, Result};

use serde_json::{json, Map, Value};
use treeline_core::{Bounds, Point};

/// Ordinal of a source file within a build's file list.
pub type Origin = u64;

/// Ratio by which manifest bounds are grown to absorb coordinate jitter at
/// the edges of a source file.
const BOUNDS_EPSILON: f64 = 0.005;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileStatus {
    Outstanding,
    Inserted,
    Omitted,
    Error,
}

impl FileStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Outstanding => "outstanding",
            FileStatus::Inserted => "inserted",
            FileStatus::Omitted => "omitted",
            FileStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "outstanding" => Ok(FileStatus::Outstanding),
            "inserted" => Ok(FileStatus::Inserted),
            "omitted" => Ok(FileStatus::Omitted),
            "error" => Ok(FileStatus::Error),
            other => Err(Error::InvalidManifest(format!(
                "invalid file status: {}",
                other
            ))),
        }
    }
}

/// Per-file insertion tallies.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PointStats {
    inserts: u64,
    out_of_bounds: u64,
}

impl PointStats {
    pub fn new(inserts: u64, out_of_bounds: u64) -> Self {
        Self {
            inserts,
            out_of_bounds,
        }
    }

    pub fn inserts(&self) -> u64 {
        self.inserts
    }

    pub fn out_of_bounds(&self) -> u64 {
        self.out_of_bounds
    }

    pub fn add(&mut self, other: &PointStats) {
        self.inserts += other.inserts;
        self.out_of_bounds += other.out_of_bounds;
    }

    pub fn add_inserts(&mut self, count: u64) {
        self.inserts += count;
    }

    pub fn add_out_of_bounds(&mut self, count: u64) {
        self.out_of_bounds += count;
    }
}

/// File-list outcome tallies.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FileStats {
    inserts: u64,
    omits: u64,
    errors: u64,
}

impl FileStats {
    pub fn inserts(&self) -> u64 {
        self.inserts
    }

    pub fn omits(&self) -> u64 {
        self.omits
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn add_insert(&mut self) {
        self.inserts += 1;
    }

    pub fn add_omit(&mut self) {
        self.omits += 1;
    }

    pub fn add_error(&mut self) {
        self.errors += 1;
    }
}

/// One record per ingested source file.
///
/// Two JSON projections exist: the *private* one (status and statistics,
/// which makes indexing resumable) and the *sources* one (bounds, metadata,
/// and origin, for catalog consumption).
#[derive(Clone, Debug)]
pub struct FileInfo {
    path: String,
    status: FileStatus,
    bounds: Option<Bounds>,
    bounds_epsilon: Option<Bounds>,
    points: u64,
    point_stats: PointStats,
    metadata: Option<Value>,
    srs: Option<Value>,
    origin: Option<Origin>,
    message: Option<String>,
}

impl FileInfo {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Outstanding,
            bounds: None,
            bounds_epsilon: None,
            points: 0,
            point_stats: PointStats::default(),
            metadata: None,
            srs: None,
            origin: None,
            message: None,
        }
    }

    /// Accepts either a bare path string or a full record object.
    pub fn from_json(value: &Value) -> Result<Self> {
        let path = match value {
            Value::String(path) => path.clone(),
            Value::Object(map) => map
                .get("path")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| Error::InvalidManifest("file record without path".into()))?,
            _ => {
                return Err(Error::InvalidManifest(
                    "file record must be a string or object".into(),
                ))
            }
        };
        if path.is_empty() {
            return Err(Error::InvalidManifest("empty path in file record".into()));
        }

        let mut info = FileInfo::new(path);
        let map = match value {
            Value::Object(map) => map,
            _ => return Ok(info),
        };

        if let Some(status) = map.get("status").and_then(Value::as_str) {
            info.status = FileStatus::parse(status)?;
        }
        if let Some(bounds) = map.get("bounds") {
            info.set_bounds(bounds_from_json(bounds)?);
        }
        if let Some(points) = map.get("points").and_then(Value::as_u64) {
            info.points = points;
        }
        info.point_stats = PointStats::new(
            map.get("inserts").and_then(Value::as_u64).unwrap_or(0),
            map.get("outOfBounds").and_then(Value::as_u64).unwrap_or(0),
        );
        info.metadata = map.get("metadata").cloned();
        info.srs = map.get("srs").cloned();
        info.origin = map.get("origin").and_then(Value::as_u64);
        info.message = map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned);

        Ok(info)
    }

    /// The projection used to resume an interrupted build.
    pub fn to_private_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("path".into(), json!(self.path));
        if self.points != 0 {
            if let Some(bounds) = &self.bounds {
                map.insert("bounds".into(), bounds_to_json(bounds));
            }
            map.insert("points".into(), json!(self.points));
        }
        if self.status != FileStatus::Outstanding {
            map.insert("status".into(), json!(self.status.as_str()));
        }
        if self.point_stats.inserts() != 0 {
            map.insert("inserts".into(), json!(self.point_stats.inserts()));
        }
        if self.point_stats.out_of_bounds() != 0 {
            map.insert("outOfBounds".into(), json!(self.point_stats.out_of_bounds()));
        }
        if let Some(message) = &self.message {
            map.insert("message".into(), json!(message));
        }
        Value::Object(map)
    }

    /// The projection consumed by catalogs and manifests.
    pub fn to_sources_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("path".into(), json!(self.path));
        if let Some(bounds) = &self.bounds {
            map.insert("bounds".into(), bounds_to_json(bounds));
        }
        if let Some(metadata) = &self.metadata {
            map.insert("metadata".into(), metadata.clone());
        }
        if let Some(origin) = self.origin {
            map.insert("origin".into(), json!(origin));
        }
        if self.points != 0 {
            map.insert("points".into(), json!(self.points));
        }
        if let Some(srs) = &self.srs {
            map.insert("srs".into(), srs.clone());
        }
        Value::Object(map)
    }

    /// Combine a record for the same path: stats sum, and a decided status
    /// wins over an outstanding one.
    pub fn merge(&mut self, other: &FileInfo) -> Result<()> {
        if self.path != other.path {
            return Err(Error::MismatchedPaths(
                self.path.clone(),
                other.path.clone(),
            ));
        }
        if self.status == FileStatus::Outstanding && other.status != FileStatus::Outstanding {
            self.status = other.status;
        }
        self.point_stats.add(&other.point_stats);
        Ok(())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn status(&self) -> FileStatus {
        self.status
    }

    pub fn set_status(&mut self, status: FileStatus, message: Option<String>) {
        self.status = status;
        if message.is_some() {
            self.message = message;
        }
    }

    pub fn bounds(&self) -> Option<&Bounds> {
        self.bounds.as_ref()
    }

    /// The epsilon-grown bounds used for inclusion tests near file edges.
    pub fn bounds_epsilon(&self) -> Option<&Bounds> {
        self.bounds_epsilon.as_ref()
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds_epsilon = Some(bounds.grow_by(BOUNDS_EPSILON));
        self.bounds = Some(bounds);
    }

    pub fn points(&self) -> u64 {
        self.points
    }

    pub fn set_points(&mut self, points: u64) {
        self.points = points;
    }

    pub fn point_stats(&self) -> &PointStats {
        &self.point_stats
    }

    pub fn add_stats(&mut self, stats: &PointStats) {
        self.point_stats.add(stats);
    }

    pub fn metadata(&self) -> Option<&Value> {
        self.metadata.as_ref()
    }

    pub fn set_metadata(&mut self, metadata: Value) {
        self.metadata = Some(metadata);
    }

    pub fn srs(&self) -> Option<&Value> {
        self.srs.as_ref()
    }

    pub fn set_srs(&mut self, srs: Value) {
        self.srs = Some(srs);
    }

    pub fn origin(&self) -> Option<Origin> {
        self.origin
    }

    pub fn set_origin(&mut self, origin: Origin) {
        self.origin = Some(origin);
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub(crate) fn add_out_of_bounds(&mut self, count: u64) {
        self.point_stats.add_out_of_bounds(count);
    }
}

pub fn bounds_to_json(bounds: &Bounds) -> Value {
    json!([
        bounds.min().x,
        bounds.min().y,
        bounds.min().z,
        bounds.max().x,
        bounds.max().y,
        bounds.max().z,
    ])
}

pub fn bounds_from_json(value: &Value) -> Result<Bounds> {
    let values: Vec<f64> = value
        .as_array()
        .map(|array| array.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default();
    if values.len() != 6 {
        return Err(Error::InvalidManifest(format!(
            "bounds must be six numbers, got {}",
            value
        )));
    }
    Ok(Bounds::new(
        Point::new(values[0], values[1], values[2]),
        Point::new(values[3], values[4], values[5]),
    ))
}

/// Conservative density estimate across a file list: counted points over the
/// upper-bound area. Files lacking bounds or point counts are skipped, so
/// the true density can only be higher.
pub fn density_lower_bound(files: &[FileInfo]) -> f64 {
    let mut points = 0.0;
    for file in files {
        if let Some(bounds) = file.bounds() {
            if bounds.area() > 0.0 && file.points() != 0 {
                points += file.points() as f64;
            }
        }
    }
    points / area_upper_bound(files)
}

/// Upper-bound total footprint across a file list, counting overlapping
/// files twice on purpose.
pub fn area_upper_bound(files: &[FileInfo]) -> f64 {
    let mut area = 0.0;
    for file in files {
        if let Some(bounds) = file.bounds() {
            if bounds.area() > 0.0 {
                area += bounds.area();
            }
        }
    }
    area
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
