//! Host bridge for squigscan: the stdio message protocol and the
//! snapshot-scanning CLI.

pub mod logging;
pub mod output;
pub mod scan_cmd;
pub mod serve;
pub mod snapshot;
