pub mod filters;
pub mod gradient;
pub mod pattern;
pub mod shapes;
pub mod text;
