mod admin;
mod calendar;
mod document;
mod errors;
mod process;
mod scan;
mod template;

pub use admin::Admin;
pub use calendar::{BusinessCalendar, GapSplit};
pub use document::{Document, DocumentStatus};
pub use errors::DomainError;
pub use process::{Process, ProcessActivity};
pub use scan::{ActivityScan, Decision};
pub use template::ProcessTemplate;
