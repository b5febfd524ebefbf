pub mod clock;
pub mod constants;
pub mod entities;
pub mod player;
pub mod spatial;
pub mod state;
pub mod switches;
pub mod targeting;
pub mod world;
