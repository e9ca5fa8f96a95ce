//! Live ride coordination: session lifecycle, location ingestion, geofence
//! detection, attendance, the activity feed, alerts and intercom arbitration.
//!
//! All state of one ride lives in its [`RideSession`]; components are thin
//! views over a session obtained through its accessors, e.g.
//! `session.locations().submit(..)`.

pub mod alert;
pub mod attendance;
pub mod error;
pub mod feed;
pub mod geofence;
pub mod intercom;
pub mod live_view;
pub mod location;
pub mod payload;
pub mod registry;
pub mod replay;
pub mod session;
pub mod settings;
mod track;

pub use alert::AlertBroadcaster;
pub use attendance::AttendanceTracker;
pub use error::{RideError, RideResult};
pub use feed::ActivityFeed;
pub use geofence::{detect_arrivals, ArrivalDecision};
pub use intercom::IntercomAuthority;
pub use location::{LocationIngestor, LocationOutcome};
pub use registry::RideRegistry;
pub use replay::{FeedProjection, ReplayError};
pub use live_view::{LiveRide, RiderStatus};
pub use session::{RideSession, SessionDeps};
pub use settings::CoordinationSettings;
