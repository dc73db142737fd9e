pub use super::links::Entity as Links;
