//! Arrival detection against checkpoint geofences.

use crate::models::checkpoint::Checkpoint;
use crate::utils::geo::GeoPoint;

/// A checkpoint whose geofence contains the sample position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrivalDecision<'a> {
    pub checkpoint: &'a Checkpoint,
    pub distance_m: f64,
}

/// Returns every checkpoint in `unattained` whose radius contains `position`.
///
/// Overlapping geofences are all attained by the same sample, in the order
/// the checkpoints were given. Callers pass only checkpoints that have no
/// attendance record for the participant, so attained ones are never
/// re-evaluated.
pub fn detect_arrivals<'a, I>(position: GeoPoint, unattained: I) -> Vec<ArrivalDecision<'a>>
where
    I: IntoIterator<Item = &'a Checkpoint>,
{
    unattained
        .into_iter()
        .filter_map(|checkpoint| {
            let center = GeoPoint::new(checkpoint.latitude, checkpoint.longitude);
            let distance_m = position.distance_to(&center);
            (distance_m <= checkpoint.radius_m).then_some(ArrivalDecision {
                checkpoint,
                distance_m,
            })
        })
        .collect()
}
