pub mod prelude;

pub mod links;
