//! Runtime values, HTML buffers and CSS output.

pub mod css;
pub mod html;
pub mod value;

pub use css::{ClassScope, ComponentStyle, StyleRule};
pub use html::{HtmlBuffer, HtmlChild, Node};
pub use value::{RcCell, StructValue, Value};
