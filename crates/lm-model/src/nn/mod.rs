//! Building blocks shared by the encoder, recurrent stack and decoder.

pub mod dropout;
pub mod embedding;
pub mod init;
pub mod linear;
pub mod param;

pub use dropout::Dropout;
pub use embedding::Embedding;
pub use linear::Linear;
pub use param::SharedWeight;
