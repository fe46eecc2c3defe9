//! Error types for ship construction, snapshots and invariant checks.
//!
//! The per-frame update never fails; these cover the operations around it.

use crate::types::ElementIndex;

/// Error raised while building a ship from a [`crate::builder::ShipBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub enum BuildError {
    PointIndexOutOfRange { index: ElementIndex, point_count: usize },
    MaterialIndexOutOfRange { index: usize, material_count: usize },
    /// Spring whose endpoints coincide.
    DegenerateSpring { point: ElementIndex },
    DuplicateSpring { point_a: ElementIndex, point_b: ElementIndex },
    TooManySpringsAtPoint { point: ElementIndex, max: usize },
    /// Triangle edge with no spring between its two points.
    MissingTriangleEdge { point_a: ElementIndex, point_b: ElementIndex },
    /// A spring used as an edge by more than two triangles.
    TooManySuperTriangles { spring: ElementIndex },
    TooManyTrianglesAtPoint { point: ElementIndex, max: usize },
    DuplicateElectricalElement { point: ElementIndex },
    EmptyShip,
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::PointIndexOutOfRange { index, point_count } => {
                write!(f, "Point index {} out of range (ship has {} points)", index, point_count)
            }
            BuildError::MaterialIndexOutOfRange { index, material_count } => {
                write!(f, "Material index {} out of range ({} materials)", index, material_count)
            }
            BuildError::DegenerateSpring { point } => write!(f, "Spring connects point {} to itself", point),
            BuildError::DuplicateSpring { point_a, point_b } => {
                write!(f, "Duplicate spring between points {} and {}", point_a, point_b)
            }
            BuildError::TooManySpringsAtPoint { point, max } => {
                write!(f, "Point {} has more than {} springs", point, max)
            }
            BuildError::MissingTriangleEdge { point_a, point_b } => {
                write!(f, "Triangle edge {}-{} has no spring", point_a, point_b)
            }
            BuildError::TooManySuperTriangles { spring } => {
                write!(f, "Spring {} is an edge of more than two triangles", spring)
            }
            BuildError::TooManyTrianglesAtPoint { point, max } => {
                write!(f, "Point {} has more than {} triangles", point, max)
            }
            BuildError::DuplicateElectricalElement { point } => {
                write!(f, "Point {} already hosts an electrical element", point)
            }
            BuildError::EmptyShip => write!(f, "Ship has no points"),
        }
    }
}

impl std::error::Error for BuildError {}

/// Error raised when saving or loading a ship snapshot.
#[derive(Debug)]
pub enum SnapshotError {
    Io(std::io::Error),
    Bincode(Box<bincode::ErrorKind>),
    VersionMismatch { expected: u32, found: u32 },
    /// Snapshot taken from a ship with a different number of elements.
    ShapeMismatch { what: &'static str, expected: usize, found: usize },
}

impl From<std::io::Error> for SnapshotError {
    fn from(e: std::io::Error) -> Self {
        SnapshotError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for SnapshotError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        SnapshotError::Bincode(e)
    }
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Io(e) => write!(f, "IO error: {}", e),
            SnapshotError::Bincode(e) => write!(f, "Serialization error: {}", e),
            SnapshotError::VersionMismatch { expected, found } => {
                write!(f, "Snapshot version mismatch: expected {}, found {}", expected, found)
            }
            SnapshotError::ShapeMismatch { what, expected, found } => {
                write!(f, "Snapshot {} count mismatch: expected {}, found {}", what, expected, found)
            }
        }
    }
}

impl std::error::Error for SnapshotError {}

/// Which structural invariant was found violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantKind {
    PointOutOfBounds,
    SpringConnectivity,
    TriangleConnectivity,
    SuperTriangle,
    Frontier,
    NegativeWater,
    DecayOutOfRange,
    LeakingHull,
    PlanePartition,
}

/// First violated invariant found by [`crate::ship::Ship::verify_invariants`].
#[derive(Debug, Clone, PartialEq)]
pub struct InvariantViolation {
    pub kind: InvariantKind,
    pub message: String,
}

impl InvariantViolation {
    pub fn new(kind: InvariantKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} invariant violated: {}", self.kind, self.message)
    }
}

impl std::error::Error for InvariantViolation {}

/// Error raised when the simulation thread pool cannot be created.
#[derive(Debug)]
pub struct ThreadManagerError(pub rayon::ThreadPoolBuildError);

impl From<rayon::ThreadPoolBuildError> for ThreadManagerError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        ThreadManagerError(e)
    }
}

impl std::fmt::Display for ThreadManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cannot build simulation thread pool: {}", self.0)
    }
}

impl std::error::Error for ThreadManagerError {}
