//! stageforge-export
//!
//! Converts an in-memory stage scene graph into the single relocatable
//! binary blob the game runtime loads directly. The export runs in phases:
//!
//! 1. **Grid partitioning** — each collision group's triangles are binned
//!    into its 2D grid, one task per group on the rayon pool.
//! 2. **Offset resolution** — a single forward pass reserves space for every
//!    section and records each entity's absolute address.
//! 3. **Section writing** — one pass per section type emits fixed-layout
//!    big-endian records, resolving cross references through the addresses
//!    from phase 2.
//!
//! The scene graph and mesh table are read-only throughout. Output is a
//! `Vec<u8>`; file I/O (and any compression) belongs to the caller.
//!
//! ```no_run
//! use stageforge_export::{export, FormatVersion};
//! # fn demo(stage: &stageforge_scene::Stage, models: &stageforge_scene::ModelTable) {
//! let buffer = export(stage, models, FormatVersion::Two, None).unwrap();
//! # }
//! ```

pub mod codec;
pub mod grid;
pub mod offsets;
pub mod v1;
pub mod v2;
pub mod writer;

use tracing::{debug, info};

use stageforge_core::error::{Error, Result};
use stageforge_scene::{ModelTable, Stage};

pub use codec::{encode_angle, encode_rotation, encode_triangle, AngleUnit, TriangleRecord};
pub use grid::{partition_groups, GroupCollision, Triangle, TriangleIntersectionGrid};
pub use offsets::{GroupCounts, Layout, NameTable, OffsetMap};
pub use writer::BinWriter;

/// Progress callback for the partitioning phase: (completed groups, total)
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Target format generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    /// First-generation runtime format
    One,
    /// Second-generation runtime format
    Two,
    /// The deluxe re-release format; recognized but not yet implemented
    Deluxe,
}

impl FormatVersion {
    pub fn is_supported(&self) -> bool {
        !matches!(self, FormatVersion::Deluxe)
    }
}

impl std::str::FromStr for FormatVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "1" => Ok(FormatVersion::One),
            "2" => Ok(FormatVersion::Two),
            "deluxe" => Ok(FormatVersion::Deluxe),
            other => Err(Error::UnsupportedVersion {
                version: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatVersion::One => write!(f, "1"),
            FormatVersion::Two => write!(f, "2"),
            FormatVersion::Deluxe => write!(f, "deluxe"),
        }
    }
}

/// Export `stage` as a binary stage buffer for `version`.
///
/// Fails before any work is done when the version has no writer or the
/// stage has no start node. A failure at any later phase aborts the whole
/// export; there is no partial output.
pub fn export(
    stage: &Stage,
    models: &ModelTable,
    version: FormatVersion,
    progress: Option<&ProgressCallback>,
) -> Result<Vec<u8>> {
    if !version.is_supported() {
        return Err(Error::UnsupportedVersion {
            version: version.to_string(),
        });
    }

    let started = std::time::Instant::now();
    let buffer = match version {
        FormatVersion::One => v1::generate(stage, models, progress)?,
        FormatVersion::Two => v2::generate(stage, models, progress)?,
        FormatVersion::Deluxe => unreachable!("rejected above"),
    };
    debug!(elapsed = ?started.elapsed(), "export finished");
    info!(
        version = %version,
        bytes = buffer.len(),
        "stage exported"
    );
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_from_str() {
        assert_eq!("1".parse::<FormatVersion>().unwrap(), FormatVersion::One);
        assert_eq!("2".parse::<FormatVersion>().unwrap(), FormatVersion::Two);
        assert_eq!(
            "DELUXE".parse::<FormatVersion>().unwrap(),
            FormatVersion::Deluxe
        );
        assert!("3".parse::<FormatVersion>().is_err());
    }

    #[test]
    fn test_deluxe_is_recognized_but_unsupported() {
        assert!(!FormatVersion::Deluxe.is_supported());
        assert!(FormatVersion::One.is_supported());
        assert!(FormatVersion::Two.is_supported());
    }
}
