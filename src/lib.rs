pub mod breakpoints;
pub mod call_stack;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod events;
pub mod line_reader;

#[doc(hidden)]
mod macros;
pub mod notification;
pub mod prelude;
pub mod reader;
pub mod requests;
pub mod responses;
pub mod run_state;
pub mod session;
pub mod transport;
pub mod types;
pub mod variables;
pub mod writer;
