pub mod badge;
pub mod button;
pub mod heading;
pub mod notice;
