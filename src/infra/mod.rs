//! Low-level infrastructure: the register access layer the controller logic
//! is written against.
pub mod registers;
