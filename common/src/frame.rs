use std::fmt;

use chrono::{DateTime, Utc};

/// Horizontal field of view of the Kinect-class depth sensor, in degrees.
pub const DEFAULT_H_FOV: f32 = 58.5;
/// Vertical field of view of the Kinect-class depth sensor, in degrees.
pub const DEFAULT_V_FOV: f32 = 46.6;

/// Angular extent attached to every submitted frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldOfView {
    pub horizontal: f32,
    pub vertical: f32,
}

impl Default for FieldOfView {
    fn default() -> Self {
        Self {
            horizontal: DEFAULT_H_FOV,
            vertical: DEFAULT_V_FOV,
        }
    }
}

/// A depth snapshot: a `rows x cols` grid of 8-bit intensity samples.
///
/// Two frames are equal when their grids are identical sample for sample.
/// Capture metadata (`captured_at_ms`, `seq`) does not take part in equality,
/// so a sensor re-reporting the same scene compares equal to the earlier read.
///
/// Binary wire format (sensor bridge payload):
///
///   [0..4]   rows            (u32 big-endian)
///   [4..8]   cols            (u32 big-endian)
///   [8..16]  captured_at_ms  (i64 big-endian, Unix millis)
///   [16..24] seq             (u64 big-endian, sensor sequence number)
///   [24..]   samples         (rows * cols bytes, row-major)
#[derive(Clone)]
pub struct DepthFrame {
    rows: u32,
    cols: u32,
    samples: Vec<u8>,
    pub captured_at_ms: i64,
    pub seq: u64,
}

const HEADER_SIZE: usize = 24;

impl DepthFrame {
    /// Build a frame from row-major samples. `samples.len()` must equal `rows * cols`.
    pub fn new(
        rows: u32,
        cols: u32,
        samples: Vec<u8>,
        captured_at_ms: i64,
        seq: u64,
    ) -> Result<Self, FrameError> {
        if rows == 0 || cols == 0 {
            return Err(FrameError::Empty);
        }
        let expected = grid_len(rows, cols)?;
        if samples.len() != expected {
            return Err(FrameError::SizeMismatch {
                rows,
                cols,
                got: samples.len(),
            });
        }
        Ok(Self {
            rows,
            cols,
            samples,
            captured_at_ms,
            seq,
        })
    }

    /// Build a frame from nested rows. Every row must have the width of the first.
    pub fn from_rows(
        grid: Vec<Vec<u8>>,
        captured_at_ms: i64,
        seq: u64,
    ) -> Result<Self, FrameError> {
        let width = grid.first().map(Vec::len).unwrap_or(0);
        if width == 0 {
            return Err(FrameError::Empty);
        }
        let mut samples = Vec::with_capacity(width * grid.len());
        for (row, values) in grid.iter().enumerate() {
            if values.len() != width {
                return Err(FrameError::RaggedRow {
                    row,
                    expected: width,
                    got: values.len(),
                });
            }
            samples.extend_from_slice(values);
        }
        let rows = u32::try_from(grid.len()).map_err(|_| FrameError::TooLarge)?;
        let cols = u32::try_from(width).map_err(|_| FrameError::TooLarge)?;
        Self::new(rows, cols, samples, captured_at_ms, seq)
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Raw row-major samples.
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Iterate the grid one row at a time, top to bottom.
    pub fn row_slices(&self) -> impl Iterator<Item = &[u8]> {
        self.samples.chunks_exact(self.cols as usize)
    }

    /// Wall-clock capture time, falling back to "now" for out-of-range stamps.
    pub fn captured_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.captured_at_ms).unwrap_or_else(Utc::now)
    }

    // -- Serialization ----------------------------------------------------------

    /// Serialize to the sensor-bridge binary format.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.samples.len());
        buf.extend_from_slice(&self.rows.to_be_bytes());
        buf.extend_from_slice(&self.cols.to_be_bytes());
        buf.extend_from_slice(&self.captured_at_ms.to_be_bytes());
        buf.extend_from_slice(&self.seq.to_be_bytes());
        buf.extend_from_slice(&self.samples);
        buf
    }

    /// Deserialize a sensor-bridge payload. Trailing bytes are rejected.
    pub fn deserialize(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < HEADER_SIZE {
            return Err(FrameError::TooShort {
                got: data.len(),
                expected: HEADER_SIZE,
            });
        }
        let rows = u32::from_be_bytes(be_field(data, 0)?);
        let cols = u32::from_be_bytes(be_field(data, 4)?);
        let captured_at_ms = i64::from_be_bytes(be_field(data, 8)?);
        let seq = u64::from_be_bytes(be_field(data, 16)?);

        let body = &data[HEADER_SIZE..];
        let expected = grid_len(rows, cols)?;
        if body.len() < expected {
            return Err(FrameError::TooShort {
                got: data.len(),
                expected: HEADER_SIZE + expected,
            });
        }
        Self::new(rows, cols, body.to_vec(), captured_at_ms, seq)
    }
}

impl PartialEq for DepthFrame {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows && self.cols == other.cols && self.samples == other.samples
    }
}

impl Eq for DepthFrame {}

// Samples are left out: a VGA frame is 300k bytes.
impl fmt::Debug for DepthFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DepthFrame")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("captured_at_ms", &self.captured_at_ms)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

fn grid_len(rows: u32, cols: u32) -> Result<usize, FrameError> {
    (rows as usize)
        .checked_mul(cols as usize)
        .ok_or(FrameError::TooLarge)
}

fn be_field<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], FrameError> {
    data.get(offset..offset + N)
        .and_then(|s| s.try_into().ok())
        .ok_or(FrameError::TooShort {
            got: data.len(),
            expected: offset + N,
        })
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame payload too short: got {got} bytes, expected at least {expected}")]
    TooShort { got: usize, expected: usize },
    #[error("frame of {rows}x{cols} does not match {got} samples")]
    SizeMismatch { rows: u32, cols: u32, got: usize },
    #[error("row {row} has {got} samples, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("frame has no samples")]
    Empty,
    #[error("frame dimensions overflow")]
    TooLarge,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: u32, cols: u32, fill: u8) -> DepthFrame {
        DepthFrame::new(rows, cols, vec![fill; (rows * cols) as usize], 1708300000000, 1).unwrap()
    }

    #[test]
    fn wire_roundtrip_keeps_metadata() {
        let frame = DepthFrame::new(2, 3, vec![1, 2, 3, 4, 5, 6], 1708300000000, 42).unwrap();
        let bytes = frame.serialize();
        assert_eq!(bytes.len(), HEADER_SIZE + 6);
        let decoded = DepthFrame::deserialize(&bytes).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.captured_at_ms, 1708300000000);
        assert_eq!(decoded.seq, 42);
    }

    #[test]
    fn equality_ignores_capture_metadata() {
        let a = DepthFrame::new(1, 2, vec![9, 9], 1000, 1).unwrap();
        let b = DepthFrame::new(1, 2, vec![9, 9], 2000, 2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn single_sample_difference_is_unequal() {
        let a = grid(4, 4, 7);
        let mut samples = a.samples().to_vec();
        samples[15] = 8;
        let b = DepthFrame::new(4, 4, samples, 0, 0).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn same_samples_different_shape_is_unequal() {
        let a = grid(2, 3, 0);
        let b = grid(3, 2, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn rows_are_row_major() {
        let frame = DepthFrame::from_rows(vec![vec![1, 2], vec![3, 4], vec![5, 6]], 0, 0).unwrap();
        let rows: Vec<&[u8]> = frame.row_slices().collect();
        assert_eq!(rows, vec![&[1, 2][..], &[3, 4][..], &[5, 6][..]]);
        assert_eq!(frame.rows(), 3);
        assert_eq!(frame.cols(), 2);
    }

    #[test]
    fn ragged_rows_rejected() {
        let err = DepthFrame::from_rows(vec![vec![1, 2], vec![3]], 0, 0).unwrap_err();
        assert!(matches!(err, FrameError::RaggedRow { row: 1, expected: 2, got: 1 }));
    }

    #[test]
    fn empty_grid_rejected() {
        assert!(matches!(DepthFrame::from_rows(vec![], 0, 0), Err(FrameError::Empty)));
        assert!(matches!(DepthFrame::new(0, 5, vec![], 0, 0), Err(FrameError::Empty)));
    }

    #[test]
    fn deserialize_too_short() {
        assert!(matches!(
            DepthFrame::deserialize(&[0; 10]),
            Err(FrameError::TooShort { got: 10, .. })
        ));
    }

    #[test]
    fn deserialize_truncated_body() {
        let mut bytes = grid(4, 4, 1).serialize();
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(
            DepthFrame::deserialize(&bytes),
            Err(FrameError::TooShort { .. })
        ));
    }

    #[test]
    fn deserialize_rejects_trailing_bytes() {
        let mut bytes = grid(2, 2, 1).serialize();
        bytes.push(0);
        assert!(matches!(
            DepthFrame::deserialize(&bytes),
            Err(FrameError::SizeMismatch { rows: 2, cols: 2, got: 5 })
        ));
    }

    #[test]
    fn default_fov_is_kinect() {
        let fov = FieldOfView::default();
        assert_eq!(fov.horizontal, 58.5);
        assert_eq!(fov.vertical, 46.6);
    }
}
