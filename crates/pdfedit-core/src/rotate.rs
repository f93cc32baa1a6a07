//! Rotate every page of a PDF
//!
//! Rotation is cumulative: the requested angle is added to whatever
//! `/Rotate` each page already has (including a value inherited from the
//! page tree), modulo 360.

use crate::document::{inherited_attribute, load, page_ids, save};
use crate::error::PdfEditError;
use lopdf::Object;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A clockwise quarter-turn multiple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum RotationAngle {
    Quarter,
    Half,
    ThreeQuarter,
}

impl RotationAngle {
    pub fn degrees(self) -> i64 {
        match self {
            RotationAngle::Quarter => 90,
            RotationAngle::Half => 180,
            RotationAngle::ThreeQuarter => 270,
        }
    }
}

impl TryFrom<i64> for RotationAngle {
    type Error = PdfEditError;

    fn try_from(degrees: i64) -> Result<Self, Self::Error> {
        match degrees {
            90 => Ok(RotationAngle::Quarter),
            180 => Ok(RotationAngle::Half),
            270 => Ok(RotationAngle::ThreeQuarter),
            other => Err(PdfEditError::InvalidAngle(other)),
        }
    }
}

impl From<RotationAngle> for i64 {
    fn from(angle: RotationAngle) -> Self {
        angle.degrees()
    }
}

impl std::fmt::Display for RotationAngle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Fold any angle into `0..360`
pub fn normalize_rotation(degrees: i64) -> i64 {
    degrees.rem_euclid(360)
}

/// Effective rotation of each page, in page order
pub fn page_rotations(bytes: &[u8]) -> Result<Vec<i64>, PdfEditError> {
    let doc = load(bytes)?;
    Ok(page_ids(&doc)
        .into_iter()
        .map(|page_id| current_rotation(&doc, page_id))
        .collect())
}

fn current_rotation(doc: &lopdf::Document, page_id: lopdf::ObjectId) -> i64 {
    inherited_attribute(doc, page_id, b"Rotate")
        .and_then(|value| match value {
            Object::Integer(i) => Some(*i),
            Object::Real(r) => Some(r.round() as i64),
            _ => None,
        })
        .map(normalize_rotation)
        .unwrap_or(0)
}

/// Rotate every page by `angle`, on top of its current rotation
pub fn rotate_document(bytes: &[u8], angle: RotationAngle) -> Result<Vec<u8>, PdfEditError> {
    let mut doc = load(bytes)?;
    let pages = page_ids(&doc);

    debug!(pages = pages.len(), angle = angle.degrees(), "rotating pages");

    for page_id in pages {
        let rotated = normalize_rotation(current_rotation(&doc, page_id) + angle.degrees());
        let page = doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| PdfEditError::OperationError(format!("Invalid page object: {}", e)))?;
        page.set("Rotate", Object::Integer(rotated));
    }

    save(&mut doc)
}
