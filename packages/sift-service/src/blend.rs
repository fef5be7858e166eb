use serde::Serialize;

use sift_domain::{ContentField, UploadItem, WeightProfile};

use crate::{
	Error, Result,
	ranking::{self, ScoredItem},
};

/// How one content field fed the personalization boost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldContribution {
	pub field: ContentField,
	pub present: bool,
	pub weight: f32,
	/// Share of the boost this field produced, `weight × presence / Σ weight`.
	pub contribution: f32,
}

#[derive(Debug, Clone)]
pub struct BlendedItem {
	pub item: UploadItem,
	pub base_similarity: f32,
	pub boost: f32,
	pub blended_score: f32,
	pub fields: Vec<FieldContribution>,
}

/// Mixes semantic similarity with an owner's field preferences.
#[derive(Debug, Clone, Copy)]
pub struct Blender {
	similarity_weight: f32,
	boost_weight: f32,
}
impl Blender {
	pub fn new(cfg: &sift_config::Ranking) -> Self {
		Self { similarity_weight: cfg.similarity_weight, boost_weight: cfg.boost_weight }
	}

	/// Scores one ranked item as `clamp01(wSim × similarity + wBoost × boost)`.
	pub fn blend(
		&self,
		owner_id: &str,
		scored: ScoredItem,
		profile: &WeightProfile,
	) -> Result<BlendedItem> {
		if scored.item.owner_id != owner_id {
			return Err(Error::unauthorized(owner_id, scored.item.item_id));
		}
		if profile.owner_id != owner_id {
			return Err(Error::UnauthorizedAccess {
				message: format!("Weight profile of {:?} used for {owner_id:?}.", profile.owner_id),
			});
		}

		let total = profile.weights.total();
		let fields: Vec<FieldContribution> = ContentField::ALL
			.into_iter()
			.map(|field| {
				let present = scored.item.fields.is_present(field);
				let weight = profile.weights.get(field);
				let contribution =
					if present && total > 0.0 { weight / total } else { 0.0 };

				FieldContribution { field, present, weight, contribution }
			})
			.collect();
		let boost = fields.iter().map(|field| field.contribution).sum::<f32>().clamp(0.0, 1.0);
		let blended_score = (self.similarity_weight * scored.similarity + self.boost_weight * boost)
			.clamp(0.0, 1.0);

		Ok(BlendedItem {
			item: scored.item,
			base_similarity: scored.similarity,
			boost,
			blended_score,
			fields,
		})
	}

	/// Blends every item and re-sorts by blended score with the ranker's tie-breaks.
	///
	/// A missing profile is replaced by the uniform one.
	pub fn blend_all(
		&self,
		owner_id: &str,
		ranked: Vec<ScoredItem>,
		profile: Option<&WeightProfile>,
	) -> Result<Vec<BlendedItem>> {
		let uniform;
		let profile = match profile {
			Some(profile) => profile,
			None => {
				uniform = WeightProfile::uniform(owner_id);

				&uniform
			},
		};
		let mut blended = ranked
			.into_iter()
			.map(|scored| self.blend(owner_id, scored, profile))
			.collect::<Result<Vec<_>>>()?;

		blended.sort_by(|left, right| {
			ranking::cmp_scores(
				(left.blended_score, left.item.created_at, left.item.item_id),
				(right.blended_score, right.item.created_at, right.item.item_id),
			)
		});

		Ok(blended)
	}
}
