pub mod anchor;
pub mod links;
pub mod markup;
pub mod table;
