//! JPQL text generation.
//!
//! - [`token`] - token types for JPQL output
//! - [`jpql`] - IR-to-JPQL renderer

pub mod jpql;
pub mod token;

pub use jpql::{render, JpqlRenderer};
pub use token::{Token, TokenStream};
