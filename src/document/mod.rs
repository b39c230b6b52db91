//! Markdown document parsing.
//!
//! Turns markdown source into a flat list of block nodes and extracts what a
//! scenario needs from it: the title, front matter properties, command code
//! blocks with their expected outputs, and inline variable declarations.

mod ast;
mod block;
mod extract;

pub use ast::{Document, Node};
pub use block::{CodeBlock, ExpectedOutput, Pattern};
