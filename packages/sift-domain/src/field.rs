use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// One of the five text facets an uploaded item can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentField {
	RawTextContent,
	ImageCaption,
	OcrText,
	Summary,
	TranscriptText,
}
impl ContentField {
	pub const ALL: [Self; 5] = [
		Self::RawTextContent,
		Self::ImageCaption,
		Self::OcrText,
		Self::Summary,
		Self::TranscriptText,
	];
	/// Order in which fields are consulted when building a result snippet.
	pub const SNIPPET_PRIORITY: [Self; 5] = [
		Self::Summary,
		Self::RawTextContent,
		Self::TranscriptText,
		Self::ImageCaption,
		Self::OcrText,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::RawTextContent => "raw_text_content",
			Self::ImageCaption => "image_caption",
			Self::OcrText => "ocr_text",
			Self::Summary => "summary",
			Self::TranscriptText => "transcript_text",
		}
	}
}
impl fmt::Display for ContentField {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for ContentField {
	type Err = String;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|field| field.as_str() == raw.trim())
			.ok_or_else(|| format!("Unknown content field {raw:?}."))
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFields {
	#[serde(default)]
	pub raw_text_content: Option<String>,
	#[serde(default)]
	pub image_caption: Option<String>,
	#[serde(default)]
	pub ocr_text: Option<String>,
	#[serde(default)]
	pub summary: Option<String>,
	#[serde(default)]
	pub transcript_text: Option<String>,
}
impl ContentFields {
	pub fn get(&self, field: ContentField) -> Option<&str> {
		let value = match field {
			ContentField::RawTextContent => &self.raw_text_content,
			ContentField::ImageCaption => &self.image_caption,
			ContentField::OcrText => &self.ocr_text,
			ContentField::Summary => &self.summary,
			ContentField::TranscriptText => &self.transcript_text,
		};

		value.as_deref()
	}

	/// A field counts as present when it holds non-blank text.
	pub fn is_present(&self, field: ContentField) -> bool {
		self.get(field).map(|text| !text.trim().is_empty()).unwrap_or(false)
	}

	pub fn present_fields(&self) -> impl Iterator<Item = ContentField> + '_ {
		ContentField::ALL.into_iter().filter(|field| self.is_present(*field))
	}

	/// First `max_chars` grapheme clusters of the highest-priority non-empty field.
	pub fn snippet(&self, max_chars: usize) -> Option<String> {
		let field =
			ContentField::SNIPPET_PRIORITY.into_iter().find(|field| self.is_present(*field))?;
		let text = self.get(field)?.trim();
		let snippet: String = text.graphemes(true).take(max_chars).collect();

		Some(snippet.trim_end().to_string())
	}
}
