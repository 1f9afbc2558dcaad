#![allow(dead_code)]

mod crl_der;

pub use crl_der::{CrlBuilder, at};
