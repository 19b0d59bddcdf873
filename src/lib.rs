pub mod action;
pub mod classifier;
pub mod config;
pub mod controller;
pub mod counter;
pub mod detector;
pub mod dom;
pub mod emulation;
pub mod error;
pub mod renderer;
pub mod rules;
pub mod scheduler;
