//! Guest roster: the invitados, their jury eligibility, storage, CRUD routes
//! and CSV exchange.

pub mod csv_io;
pub mod model;
pub mod roster;
pub mod routes;


pub use model::{GuestRecord, JuryEligibility};
pub use roster::{GuestRoster, JsonFileRoster, RosterError};
