//! CLI domain: parse, route, output, and presentation only.
//! Pipeline orchestration lives in `generation`; the route table only wires it up.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{format_check_result, format_pipeline_result};
pub use route::RunContext;
