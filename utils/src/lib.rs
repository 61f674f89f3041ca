// A set of helper structs for common operations
//
// These are shared by the render worker and anything driving it.
#[macro_use]
extern crate lazy_static;

pub mod timing;
#[macro_use]
pub mod logging;
pub mod event;
pub mod fdwatch;
pub mod log;
pub mod region;
