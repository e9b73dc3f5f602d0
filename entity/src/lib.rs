pub mod activity;
pub mod deal;
