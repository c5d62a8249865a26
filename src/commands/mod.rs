pub mod scan;
pub mod split;
