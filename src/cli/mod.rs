pub mod app;
pub mod commands;
pub mod config;
pub mod context;
pub mod cookies;
pub mod dispatch;
pub mod env;
pub mod info;
pub mod output;
pub mod run;
pub mod runtime;
pub mod scan;
pub mod status;

pub use app::run;
