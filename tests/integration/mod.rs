//! Shared fixtures for the end-to-end tests.

#![allow(dead_code)]

pub mod helpers;
