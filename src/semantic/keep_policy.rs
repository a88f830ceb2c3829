//! Which member of a duplicate cluster survives.

use std::cmp::Ordering;
use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::Identifier;
use crate::error::{DedupError, Result};

/// Keep policy for semantic duplicate clusters.
///
/// Serialized as `"hard"`, `"easy"`, `"random"` or
/// `{"metadata_ranked": {"field": "...", "descending": true}}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepPolicy {
    /// Keep the member closest to its k-means centroid.
    #[default]
    Hard,
    /// Keep the member farthest from its k-means centroid.
    Easy,
    /// Keep a member chosen by a seeded random draw.
    Random,
    /// Keep the member with the best externally supplied priority.
    MetadataRanked {
        /// Name of the priority field.
        field: String,
        /// Prefer higher priorities.
        #[serde(default)]
        descending: bool,
    },
}

/// One member of a duplicate cluster, as seen by a [`KeepPolicy`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeepCandidate {
    /// Member identifier.
    pub id: Identifier,
    /// Distance to the member's k-means centroid.
    pub centroid_distance: f32,
}

impl KeepPolicy {
    /// Get the name of this policy.
    pub fn name(&self) -> &'static str {
        match self {
            KeepPolicy::Hard => "hard",
            KeepPolicy::Easy => "easy",
            KeepPolicy::Random => "random",
            KeepPolicy::MetadataRanked { .. } => "metadata_ranked",
        }
    }

    /// Choose the identifier to keep among `members`.
    ///
    /// Ties always go to the lowest identifier. `Random` draws from an RNG
    /// seeded with `seed` mixed with the smallest member identifier, so the
    /// choice for a cluster does not depend on the order clusters are visited.
    /// `MetadataRanked` ranks members without a priority after all others.
    pub fn select(
        &self,
        members: &[KeepCandidate],
        seed: u64,
        priorities: Option<&HashMap<Identifier, f64>>,
    ) -> Result<Identifier> {
        if members.is_empty() {
            return Err(DedupError::other("cannot select from an empty cluster"));
        }

        let keep = match self {
            KeepPolicy::Hard => members.iter().min_by(|a, b| {
                a.centroid_distance
                    .total_cmp(&b.centroid_distance)
                    .then(a.id.cmp(&b.id))
            }),
            KeepPolicy::Easy => members.iter().min_by(|a, b| {
                b.centroid_distance
                    .total_cmp(&a.centroid_distance)
                    .then(a.id.cmp(&b.id))
            }),
            KeepPolicy::Random => {
                let mut ids: Vec<Identifier> = members.iter().map(|m| m.id).collect();
                ids.sort_unstable();
                let mut rng =
                    StdRng::seed_from_u64(seed ^ ids[0].wrapping_mul(0x9E37_79B9_7F4A_7C15));
                return Ok(ids[rng.random_range(0..ids.len())]);
            }
            KeepPolicy::MetadataRanked { field, descending } => {
                let priorities = priorities.ok_or_else(|| {
                    DedupError::invalid_config(format!(
                        "metadata_ranked keep policy needs priorities for field '{field}'"
                    ))
                })?;
                members.iter().min_by(|a, b| {
                    let ranked = match (priorities.get(&a.id), priorities.get(&b.id)) {
                        (Some(x), Some(y)) if *descending => y.total_cmp(x),
                        (Some(x), Some(y)) => x.total_cmp(y),
                        (Some(_), None) => Ordering::Less,
                        (None, Some(_)) => Ordering::Greater,
                        (None, None) => Ordering::Equal,
                    };
                    ranked.then(a.id.cmp(&b.id))
                })
            }
        };

        keep.map(|m| m.id)
            .ok_or_else(|| DedupError::other("cannot select from an empty cluster"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members() -> Vec<KeepCandidate> {
        vec![
            KeepCandidate { id: 7, centroid_distance: 0.2 },
            KeepCandidate { id: 3, centroid_distance: 0.5 },
            KeepCandidate { id: 5, centroid_distance: 0.1 },
            KeepCandidate { id: 9, centroid_distance: 0.5 },
        ]
    }

    #[test]
    fn test_hard_and_easy() {
        assert_eq!(KeepPolicy::Hard.select(&members(), 0, None).unwrap(), 5);
        // 3 and 9 tie on distance; the lower id wins.
        assert_eq!(KeepPolicy::Easy.select(&members(), 0, None).unwrap(), 3);
    }

    #[test]
    fn test_random_is_seeded_and_order_independent() {
        let mut reversed = members();
        reversed.reverse();
        let a = KeepPolicy::Random.select(&members(), 42, None).unwrap();
        let b = KeepPolicy::Random.select(&reversed, 42, None).unwrap();
        assert_eq!(a, b);
        assert!([3, 5, 7, 9].contains(&a));
    }

    #[test]
    fn test_metadata_ranked() {
        let priorities = HashMap::from([(7, 10.0), (3, 1.0), (9, 10.0)]);
        let ascending = KeepPolicy::MetadataRanked {
            field: "score".into(),
            descending: false,
        };
        let descending = KeepPolicy::MetadataRanked {
            field: "score".into(),
            descending: true,
        };

        assert_eq!(ascending.select(&members(), 0, Some(&priorities)).unwrap(), 3);
        assert_eq!(descending.select(&members(), 0, Some(&priorities)).unwrap(), 7);
        assert!(ascending.select(&members(), 0, None).unwrap_err().is_configuration());
    }

    #[test]
    fn test_serde_shapes() {
        assert_eq!(serde_json::to_string(&KeepPolicy::Hard).unwrap(), "\"hard\"");
        let parsed: KeepPolicy =
            serde_json::from_str(r#"{"metadata_ranked":{"field":"quality"}}"#).unwrap();
        assert_eq!(
            parsed,
            KeepPolicy::MetadataRanked {
                field: "quality".into(),
                descending: false
            }
        );
        assert_eq!(serde_json::from_str::<KeepPolicy>("\"easy\"").unwrap(), KeepPolicy::Easy);
        assert!(serde_json::from_str::<KeepPolicy>("\"oldest\"").is_err());
    }
}
