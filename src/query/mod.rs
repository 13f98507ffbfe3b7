pub mod markup;
pub mod spec;

pub use markup::Element;
pub use spec::QuerySpec;
