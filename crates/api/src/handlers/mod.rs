pub mod edits;
pub mod health;
pub mod webhooks;
