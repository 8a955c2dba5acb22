//! A small upload/download service: files under one directory, upload times
//! in a JSON sidecar, downloads refused once a file's expiry window passes.

pub mod sys_config;
pub mod sys_core;
pub mod sys_fileapi;
pub mod sys_metadata;
pub mod sys_ratelimit;
