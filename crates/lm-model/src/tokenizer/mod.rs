pub mod dictionary;

pub use dictionary::{Dictionary, EOS, UNK};
