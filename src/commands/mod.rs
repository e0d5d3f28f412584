pub mod downgrade;
pub mod scramble;
