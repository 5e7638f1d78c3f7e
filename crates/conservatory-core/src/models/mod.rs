//! Typed records for conservatory entities.
//!
//! Rows are decoded from backend JSON into these structs once, at the
//! repository boundary, and passed around typed from there on:
//!
//! - `Student`, `Parent`, `Division`: enrollment
//! - `ContractTemplate`, `Contract`, `Signer`: contracts and signatures
//! - `PaymentSchedule`, `PaymentCategory`, `TuitionRate`: payments
//! - `Document`: rendered contract snapshots
//! - `Activity`, `Communication`, `EmailTemplate`: audit log and email

pub mod activity;
pub mod communication;
pub mod contract;
pub mod document;
pub mod payment;
pub mod student;

pub use activity::{Activity, ActivityKind, NewActivity};
pub use communication::{
    Communication, CommunicationStatus, EmailTemplate, NewCommunication, NewEmailTemplate,
};
pub use contract::{Contract, ContractStatus, ContractTemplate, NewContract, Signer};
pub use document::{Document, DocumentStatus, NewDocument};
pub use payment::{
    NewPaymentCategory, NewPaymentSchedule, NewTuitionRate, PaymentCategory, PaymentSchedule,
    PaymentStatus, TuitionRate,
};
pub use student::{Division, NewParent, NewStudent, Parent, Student, StudentStatus, SIGNING_AGE};
