//! Property-oriented tests for fragmentation insensitivity and round trips.

mod chunked;
mod end_of_message;
mod shared;
