//! XML names and DOM helpers shared by the parse and serialize paths.

mod qname;
mod utils;

pub use qname::QName;
pub use utils::{
    declared_namespaces, element_text, get_tag_name, pre_text, qualified_name, source_position,
};
