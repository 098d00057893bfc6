pub mod attacks;
pub mod execute;
pub mod magic;
pub mod magic_numbers;
pub mod movegen;
pub mod perft;
pub mod types;
