//! Fakes and fixtures for the handler tests.

mod fakes;
mod fixtures;

pub(crate) use fakes::*;
pub(crate) use fixtures::*;
