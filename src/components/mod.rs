pub mod history;
pub mod layers;
pub mod pointer;
pub mod tools;
