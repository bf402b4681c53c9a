pub mod evidence;
pub mod health;
pub mod runs;
pub mod state;
