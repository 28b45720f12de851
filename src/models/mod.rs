pub mod book;
pub mod course;
pub mod user;

pub use book::*;
pub use course::*;
pub use user::*;

use serde::Deserialize;

/// A field that older clients send as a single value and newer ones as a list.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}
