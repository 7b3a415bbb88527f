//! # Messages
//!
//! Constant strings and format functions for text written to the output sink.
//! Terminal sinks expect `\r\n` line endings.

pub const CONFIRMATION_NOTE: &str =
    "\r\nNote: An automatic confirmation was provided during this process.\r\n";

pub fn automatic_response(response: &str) -> String {
    format!("Automatic response: {}\n", response.trim_end())
}

pub fn error_block(message: &str) -> String {
    format!("\r\nError: {message}\r\n")
}

pub fn non_zero_exit(code: i32) -> String {
    format!("Process exited with non-zero code: {code}")
}

pub fn summary_line(id: &str, status: &str, label: &str) -> String {
    format!("[{status:>8}] {id}: {label}")
}
