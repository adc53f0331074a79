pub mod attendance_service;
pub mod guardians;
pub mod roster_service;
pub mod sync_service;

pub use attendance_service::AttendanceService;
pub use guardians::GuardianLinks;
pub use roster_service::{RosterService, RosterSnapshot};
pub use sync_service::{MembershipSync, SyncFailure, SyncOp, SyncReport};
