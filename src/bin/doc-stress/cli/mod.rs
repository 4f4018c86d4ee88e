pub mod flags;
pub mod strconv;
