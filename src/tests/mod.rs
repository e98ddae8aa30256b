//! Full runs against scripted in-memory targets.

mod runs;
