//! Object model: the declared shape of every entity the store can hold

mod entity_description;
mod object_model;
mod sort;

pub use entity_description::{AttributeDescription, AttributeType, EntityDescription};
pub use object_model::ObjectModel;
pub use sort::{compare_values, SortDescriptor};
