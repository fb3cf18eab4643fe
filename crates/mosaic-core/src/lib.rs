pub mod cadence;
pub mod composite;
pub mod consts;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod render;
pub mod stamp;
