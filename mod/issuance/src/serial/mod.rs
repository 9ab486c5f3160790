//! Serial-number format and allocation.
//!
//! Serial numbers follow `PREFIX-YYYY-NNNNNN`: a fixed organization
//! prefix, the 4-digit issuance year and a zero-padded 6-digit
//! sequence number. Within a year the set of issued suffixes is exactly
//! `1..max_issued`: no gaps, no duplicates, even across concurrent
//! production jobs and counter resets.

pub mod allocator;
pub mod format;

pub use allocator::SerialAllocator;
pub use format::{format_serial, parse_serial, ParsedSerial, SUFFIX_MAX};
