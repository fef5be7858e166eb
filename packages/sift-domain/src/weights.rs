use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ContentField;

/// Weight every field carries when an owner has never written a profile.
pub const UNIFORM_WEIGHT: f32 = 0.2;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WeightError {
	#[error("Unknown content field {field:?}.")]
	UnknownField { field: String },
	#[error("Weight for {field} is {value}; weights must be finite and within 0.0-1.0.")]
	OutOfRange { field: ContentField, value: f32 },
}

/// Per-field weights in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldWeights {
	pub raw_text_content: f32,
	pub image_caption: f32,
	pub ocr_text: f32,
	pub summary: f32,
	pub transcript_text: f32,
}
impl FieldWeights {
	pub fn uniform() -> Self {
		Self::splat(UNIFORM_WEIGHT)
	}

	pub fn zero() -> Self {
		Self::splat(0.0)
	}

	fn splat(weight: f32) -> Self {
		Self {
			raw_text_content: weight,
			image_caption: weight,
			ocr_text: weight,
			summary: weight,
			transcript_text: weight,
		}
	}

	pub fn get(&self, field: ContentField) -> f32 {
		match field {
			ContentField::RawTextContent => self.raw_text_content,
			ContentField::ImageCaption => self.image_caption,
			ContentField::OcrText => self.ocr_text,
			ContentField::Summary => self.summary,
			ContentField::TranscriptText => self.transcript_text,
		}
	}

	pub fn set(&mut self, field: ContentField, weight: f32) {
		let slot = match field {
			ContentField::RawTextContent => &mut self.raw_text_content,
			ContentField::ImageCaption => &mut self.image_caption,
			ContentField::OcrText => &mut self.ocr_text,
			ContentField::Summary => &mut self.summary,
			ContentField::TranscriptText => &mut self.transcript_text,
		};

		*slot = weight;
	}

	pub fn total(&self) -> f32 {
		ContentField::ALL.into_iter().map(|field| self.get(field)).sum()
	}

	/// Builds weights from a field-name mapping. Fields absent from the mapping weigh 0.0.
	pub fn from_named(named: &BTreeMap<String, f32>) -> Result<Self, WeightError> {
		let mut weights = Self::zero();

		for (name, value) in named {
			let field = name
				.parse::<ContentField>()
				.map_err(|_| WeightError::UnknownField { field: name.clone() })?;

			weights.set(field, *value);
		}

		weights.validate()?;

		Ok(weights)
	}

	pub fn to_named(&self) -> BTreeMap<String, f32> {
		ContentField::ALL
			.into_iter()
			.map(|field| (field.as_str().to_string(), self.get(field)))
			.collect()
	}

	pub fn validate(&self) -> Result<(), WeightError> {
		for field in ContentField::ALL {
			let value = self.get(field);

			if !value.is_finite() || !(0.0..=1.0).contains(&value) {
				return Err(WeightError::OutOfRange { field, value });
			}
		}

		Ok(())
	}
}
impl Default for FieldWeights {
	fn default() -> Self {
		Self::uniform()
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightProfile {
	pub owner_id: String,
	pub weights: FieldWeights,
	/// `None` for the implicit uniform profile of an owner who never wrote one.
	#[serde(with = "time::serde::rfc3339::option")]
	pub updated_at: Option<OffsetDateTime>,
}
impl WeightProfile {
	pub fn uniform(owner_id: impl Into<String>) -> Self {
		Self { owner_id: owner_id.into(), weights: FieldWeights::uniform(), updated_at: None }
	}

	pub fn is_default(&self) -> bool {
		self.updated_at.is_none()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn uniform_profile_weighs_every_field_equally() {
		let profile = WeightProfile::uniform("owner-a");

		assert!(profile.is_default());

		for field in ContentField::ALL {
			assert_eq!(profile.weights.get(field), UNIFORM_WEIGHT);
		}
	}

	#[test]
	fn named_weights_default_missing_fields_to_zero() {
		let named =
			BTreeMap::from([("image_caption".to_string(), 0.9), ("summary".to_string(), 0.4)]);
		let weights = FieldWeights::from_named(&named).expect("Weights must be valid.");

		assert_eq!(weights.image_caption, 0.9);
		assert_eq!(weights.summary, 0.4);
		assert_eq!(weights.raw_text_content, 0.0);
		assert_eq!(weights.to_named().len(), 5);
	}

	#[test]
	fn named_weights_reject_unknown_fields() {
		let named = BTreeMap::from([("thumbnail".to_string(), 0.5)]);

		assert_eq!(
			FieldWeights::from_named(&named),
			Err(WeightError::UnknownField { field: "thumbnail".to_string() })
		);
	}

	#[test]
	fn validation_rejects_out_of_range_and_non_finite() {
		let mut weights = FieldWeights::uniform();

		weights.set(ContentField::OcrText, 1.01);

		assert!(matches!(
			weights.validate(),
			Err(WeightError::OutOfRange { field: ContentField::OcrText, .. })
		));

		weights.set(ContentField::OcrText, f32::INFINITY);

		assert!(weights.validate().is_err());

		weights.set(ContentField::OcrText, -0.1);

		assert!(weights.validate().is_err());
	}
}
