#![allow(dead_code)]

pub mod config;
pub mod counting;
pub mod server;
