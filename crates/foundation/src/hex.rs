//! Hex index decoding.
//!
//! Hex indexes are H3 cell indexes in their canonical hexadecimal string form
//! (e.g. `"8529a1d7fffffff"`).

use h3o::{CellIndex, LatLng};

use crate::geo::LngLat;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeFailure {
    #[error("empty hex index")]
    Empty,
    #[error("invalid hex index {index:?}: {reason}")]
    Invalid { index: String, reason: String },
}

/// A decoded hex cell.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HexCell {
    pub cell: CellIndex,
    pub resolution: u8,
    pub center: LngLat,
}

impl HexCell {
    /// Cell outline as a closed ring (first vertex repeated at the end).
    pub fn boundary(&self) -> Vec<LngLat> {
        let mut ring: Vec<LngLat> = self
            .cell
            .boundary()
            .iter()
            .map(|ll| LngLat::new(ll.lng(), ll.lat()))
            .collect();
        if let Some(first) = ring.first().copied() {
            ring.push(first);
        }
        ring
    }
}

/// Decodes a hex index string to its cell center.
pub fn decode_hex(index: &str) -> Result<HexCell, DecodeFailure> {
    let trimmed = index.trim();
    if trimmed.is_empty() {
        return Err(DecodeFailure::Empty);
    }
    let cell: CellIndex = trimmed.parse().map_err(|e| DecodeFailure::Invalid {
        index: trimmed.to_string(),
        reason: format!("{e}"),
    })?;
    let ll = LatLng::from(cell);
    Ok(HexCell {
        cell,
        resolution: u8::from(cell.resolution()),
        center: LngLat::new(ll.lng(), ll.lat()),
    })
}

/// Resolution of `index`, or `None` if it does not decode.
pub fn hex_resolution(index: &str) -> Option<u8> {
    decode_hex(index).ok().map(|c| c.resolution)
}
