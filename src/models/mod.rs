//! Domain models for subjects, inventory, jobs and results.

mod credentials;
mod inventory;
mod job;
mod result;
mod subject;
mod subject_list;

pub use credentials::Credentials;
pub use inventory::{
    Advisory, FinishedUnits, InventorySnapshot, ProcessingState, QuarantineUnits,
};
pub use job::{JobCounters, JobStatus, ScrapeJob};
pub use result::{ChangeSet, FieldChange, ResultStatus, ScrapeOutcome, ScrapeResult};
pub use subject::{FamilyHistory, FamilyMember, GeneticTestResult, HealthCondition, SubjectRecord};
pub use subject_list::{SubjectListEntry, MAX_CONSECUTIVE_FAILURES};
