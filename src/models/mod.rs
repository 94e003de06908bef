//! Rostering domain models.
//!
//! Provides the core data types for shift scheduling problems and their
//! solutions. Inputs (templates, demand, availability, workforce) are
//! owned by the host HR application; outputs (schedules, assignments,
//! conflicts, exceptions) are produced here.
//!
//! # Domain Mappings
//!
//! | u-roster | Hospital | Retail | Call centre |
//! |----------|----------|--------|-------------|
//! | ShiftTemplate | Ward shift | Store opening | Queue block |
//! | DemandRequirement | Nurse ratio | Floor staffing | Forecast agents |
//! | Assignee | Nurse / Team | Clerk | Agent / Squad |
//! | Schedule | Ward roster | Weekly rota | Week plan |

mod availability;
mod calendar;
mod conflict;
mod demand;
mod exception;
mod schedule;
mod shift;
mod workforce;

pub use availability::{AvailabilityKind, EmployeeAvailability};
pub use calendar::ShiftWindow;
pub use conflict::{Conflict, ConflictKind, ResolutionState, Severity};
pub use demand::DemandRequirement;
pub use exception::{ExceptionStatus, RuleException};
pub use schedule::{
    Algorithm, AssignedBy, Assignment, RunTelemetry, Schedule, ScheduleStatus, Slot, SlotFlag,
};
pub use shift::{ShiftCategory, ShiftTemplate};
pub use workforce::{Assignee, AssignmentMode, Employee, Team};
