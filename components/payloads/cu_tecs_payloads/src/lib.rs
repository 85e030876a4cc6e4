//! Payloads exchanged between the navigation reference, the flight mode logic and the
//! TECS longitudinal controller.

mod command;
mod nav;
mod output;

pub use command::{FlightStage, TecsCommandPayload};
pub use nav::{NavPayload, GRAVITY_MSS};
pub use output::{TecsDiagnostics, TecsFlags, TecsOutputPayload};
