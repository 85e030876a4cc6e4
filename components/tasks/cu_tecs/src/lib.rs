//! Total energy control system (TECS) for the longitudinal axis of fixed wing and hybrid
//! VTOL aircraft.
//!
//! The controller turns a height and airspeed demand into a pitch and a throttle demand by
//! controlling the total specific energy with the throttle and the balance between potential
//! and kinetic energy with the pitch. [`Tecs`] is the controller itself, [`TecsTask`] runs
//! it inside a Copper graph.

pub mod config;
pub mod controller;
pub mod demand;
pub mod energy;
pub mod estimator;
pub mod limits;
pub mod pid;
pub mod pitch;
pub mod protection;
pub mod recorder;
pub mod reset;
pub mod stage;
pub mod takeoff;
pub mod task;
pub mod throttle;
pub mod timing;

pub use config::{AirframeParams, BankDisableLevel, PidGains, TecsConfig};
pub use controller::{Tecs, TecsSnapshot};
pub use recorder::{NullRecorder, TecsRecorder};
pub use task::TecsTask;
pub use throttle::trim_throttle;
