pub mod history;
pub mod treasury;
