//! The bytecode text loader: parses the line-oriented assembly format into
//! linked prototypes, producing a runnable module without any external
//! toolchain.

pub mod text_format;
