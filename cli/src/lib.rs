//! Burrow CLI - run a command inside a Docker Hub image.

pub mod commands;
