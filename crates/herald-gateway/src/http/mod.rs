pub mod events;
pub mod health;
pub mod history;
pub mod send;
pub mod ui;
