use crate::geometry::Point;

use static_assertions::const_assert_eq;

use std::mem;

/// Name of the column-identifier dimension prepended to the native layout
/// for the chunk wire format.
pub const TUBE_ID_DIM: &str = "TubeId";

/// Byte width of the [`TUBE_ID_DIM`] field.
pub const TUBE_ID_SIZE: usize = mem::size_of::<u64>();

const_assert_eq!(TUBE_ID_SIZE, 8);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DimKind {
    Floating,
    Unsigned,
    Signed,
}

/// One field of a point record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DimInfo {
    name: String,
    kind: DimKind,
    size: usize,
}

impl DimInfo {
    pub fn new(name: impl Into<String>, kind: DimKind, size: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            size,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DimKind {
        self.kind
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// An ordered point record layout.
///
/// The X/Y/Z dimensions are 8-byte floats; whatever else a source carries
/// (intensity, color, classification...) rides along as opaque bytes as far
/// as the indexing core is concerned.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Schema {
    dims: Vec<DimInfo>,
}

impl Schema {
    pub fn new(dims: Vec<DimInfo>) -> Self {
        assert!(!dims.is_empty(), "empty schema");
        Self { dims }
    }

    /// The minimal layout: X, Y, Z as 8-byte floats.
    pub fn xyz() -> Self {
        Self::new(vec![
            DimInfo::new("X", DimKind::Floating, 8),
            DimInfo::new("Y", DimKind::Floating, 8),
            DimInfo::new("Z", DimKind::Floating, 8),
        ])
    }

    pub fn dims(&self) -> &[DimInfo] {
        &self.dims
    }

    /// Total record byte size.
    pub fn point_size(&self) -> usize {
        self.dims.iter().map(DimInfo::size).sum()
    }

    /// Byte offset of the named dimension within a record.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let mut offset = 0;
        for dim in &self.dims {
            if dim.name() == name {
                return Some(offset);
            }
            offset += dim.size();
        }
        None
    }

    /// The wire-format layout: the 8-byte unsigned [`TUBE_ID_DIM`] column
    /// identifier followed by every native dimension.
    pub fn celled(&self) -> Schema {
        let mut dims = Vec::with_capacity(self.dims.len() + 1);
        dims.push(DimInfo::new(TUBE_ID_DIM, DimKind::Unsigned, TUBE_ID_SIZE));
        dims.extend(self.dims.iter().cloned());
        Schema::new(dims)
    }

    /// Read the named 8-byte float field out of a record.
    pub fn read_f64(&self, record: &[u8], name: &str) -> f64 {
        let offset = self
            .offset_of(name)
            .unwrap_or_else(|| panic!("schema has no dimension named {}", name));
        bytemuck::pod_read_unaligned(&record[offset..offset + 8])
    }

    /// Read the X/Y/Z fields out of a record.
    pub fn read_point(&self, record: &[u8]) -> Point {
        debug_assert_eq!(record.len(), self.point_size());
        Point::new(
            self.read_f64(record, "X"),
            self.read_f64(record, "Y"),
            self.read_f64(record, "Z"),
        )
    }

    /// Build a record with the X/Y/Z fields set and all other bytes zero.
    pub fn pack_point(&self, point: &Point) -> Vec<u8> {
        let mut record = vec![0u8; self.point_size()];
        for (name, value) in [("X", point.x), ("Y", point.y), ("Z", point.z)] {
            let offset = self
                .offset_of(name)
                .unwrap_or_else(|| panic!("schema has no dimension named {}", name));
            record[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
        }
        record
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
