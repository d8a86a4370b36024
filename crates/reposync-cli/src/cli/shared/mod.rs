use super::*;

mod checks;

pub(in crate::cli) use checks::*;
