//! Per-participant position history and odometer.

use std::collections::VecDeque;

use crate::models::location::LocationSample;
use crate::utils::geo::GeoPoint;

/// Recent positions of one participant plus an odometer.
#[derive(Debug, Clone, Default)]
pub(crate) struct Track {
    history: VecDeque<LocationSample>,
    odometer_m: f64,
    odometer_at_arrival_m: f64,
}

impl Track {
    pub(crate) fn latest(&self) -> Option<&LocationSample> {
        self.history.back()
    }

    /// Bounded recent history, oldest first.
    pub(crate) fn history(&self) -> impl Iterator<Item = &LocationSample> + '_ {
        self.history.iter()
    }

    /// Odometer reading after moving from the latest sample to `position`.
    pub(crate) fn odometer_after(&self, position: GeoPoint) -> f64 {
        self.odometer_m
            + self
                .latest()
                .map_or(0.0, |latest| sample_point(latest).distance_to(&position))
    }

    /// Distance covered since the last arrival, given a new odometer reading.
    pub(crate) fn traveled_since_arrival(&self, odometer_m: f64) -> f64 {
        (odometer_m - self.odometer_at_arrival_m).max(0.0)
    }

    pub(crate) fn odometer_m(&self) -> f64 {
        self.odometer_m
    }

    pub(crate) fn push(&mut self, sample: LocationSample, limit: usize) {
        self.odometer_m = self.odometer_after(sample_point(&sample));
        self.history.push_back(sample);
        while self.history.len() > limit {
            self.history.pop_front();
        }
    }

    pub(crate) fn mark_arrival(&mut self) {
        self.odometer_at_arrival_m = self.odometer_m;
    }
}

pub(crate) fn sample_point(sample: &LocationSample) -> GeoPoint {
    GeoPoint::new(sample.latitude, sample.longitude)
}
