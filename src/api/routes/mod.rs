pub mod characters;
pub mod dev;
pub mod health;
pub mod leaderboard;
pub mod steps;
