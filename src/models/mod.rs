pub mod assignment;
pub mod loaders;
pub mod outcome;

pub use assignment::{Assignment, AssignmentRow, CredentialRow, Page, StudentKey, StudentRecord};
pub use loaders::{load_catalog_file, CatalogFile};
pub use outcome::{
    ArchivedResult, DispatchReport, FailureKind, FailurePolicy, GradingFailure, GradingOutcome,
    StudentDisposition,
};
