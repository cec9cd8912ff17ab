pub mod class_group;
pub mod user;
