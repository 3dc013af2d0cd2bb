// Terminal output for the consumer loop

pub mod report;

pub use report::{format_usage, print_report, render_report};
