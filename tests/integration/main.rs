mod demo_pipeline;
mod error_handling;
#[cfg(unix)]
mod real_fs;
