pub mod industry;
pub mod overlay;
pub mod platform;
pub mod pricing;
pub mod tenant;
