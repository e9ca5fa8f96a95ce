//! Collaborators of the coordination core: authorization, notification
//! delivery and intercom token signing.

pub mod authorization;
pub mod intercom_token;
pub mod notification;

pub use authorization::{AccessPolicy, PgAccessPolicy, StaticAccessPolicy};
pub use intercom_token::{IntercomTokenSigner, SignedGrant};
pub use notification::{spawn_alert_dispatcher, LogNotificationSink, NotificationSink};
