//! Small helpers shared by the API handlers and background tasks.

pub mod arrays;
pub mod dates;
pub mod text;
pub mod validation;
