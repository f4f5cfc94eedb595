pub mod majority;
pub mod validate;

pub use majority::calculate_results;
pub use validate::{parse_grades, validate_ballot};
