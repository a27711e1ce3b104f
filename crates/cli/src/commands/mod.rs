pub mod decide;
pub mod decisions;
pub mod health;
