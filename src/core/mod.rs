pub mod allowance;
pub mod compare;
pub mod predicate;
pub mod requirement;
pub mod validate;

pub use allowance::Allowance;
pub use compare::{CompareOp, ResultMap, ResultSet};
pub use predicate::Predicate;
pub use requirement::{Checked, Expected, Requirement};
pub use validate::{validate, Subject, ValidationError};
