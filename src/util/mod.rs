
/// Helper functions for read/writing JSON via serde, optionally gzipped
pub mod json_io;
/// Helper functions for generating the progress bars
pub mod progress_bar;
