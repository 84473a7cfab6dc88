//! Domain entities - policies, subjects and decisions.

mod decision;
mod policy;
mod subject;

pub use decision::Decision;
pub use policy::{Policy, TokenPolicies};
pub use subject::{LimitKind, SubjectKey};
