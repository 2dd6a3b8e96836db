pub mod employee;
pub mod team;
